use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::{BookingError, Engine};

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends accumulate.
/// Spawn one per engine.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        match compact_if_due(&engine, threshold).await {
            Ok(true) => info!("wal compacted"),
            Ok(false) => {}
            Err(e) => tracing::warn!("wal compaction failed: {e}"),
        }
    }
}

/// One compactor step: compact when the append counter has reached the
/// threshold. Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> Result<bool, BookingError> {
    if engine.wal_appends_since_compact().await < threshold {
        return Ok(false);
    }
    engine.compact_wal().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemStatus;
    use crate::notify::NotifyHub;
    use crate::settings::FixedSettings;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("vermeil_test_maintenance");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn test_engine(path: PathBuf) -> Arc<Engine> {
        Arc::new(
            Engine::new(
                path,
                Arc::new(FixedSettings::default()),
                Arc::new(NotifyHub::new()),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn below_threshold_is_a_noop() {
        let engine = test_engine(test_wal_path("below_threshold.wal"));
        engine
            .register_item(Ulid::new(), "Locket".into(), None, 900, ItemStatus::Active)
            .await
            .unwrap();

        assert!(!compact_if_due(&engine, 100).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 1);
    }

    #[tokio::test]
    async fn at_threshold_compacts_and_resets() {
        let engine = test_engine(test_wal_path("at_threshold.wal"));
        for i in 0..5 {
            engine
                .register_item(Ulid::new(), format!("Piece {i}"), None, 900, ItemStatus::Active)
                .await
                .unwrap();
        }

        assert!(compact_if_due(&engine, 5).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert_eq!(engine.list_items().await.len(), 5);
    }
}
