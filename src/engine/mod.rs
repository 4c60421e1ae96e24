mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{blocked_windows, merge_contiguous, range_is_free};
pub use error::BookingError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::settings::SettingsProvider;
use crate::wal::Wal;

pub type SharedItemState = Arc<RwLock<ItemState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the batch before the non-append command.
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Engine ───────────────────────────────────────────────

/// The booking engine: per-item state behind per-item write locks, a lazy
/// customer directory, and a WAL that makes all of it durable. Holding an
/// item's write lock across read-check-insert is the serializability
/// guarantee that prevents double booking.
pub struct Engine {
    items: DashMap<Ulid, SharedItemState>,
    customers: DashMap<Ulid, Customer>,
    customers_by_email: DashMap<String, Ulid>,
    /// Reverse lookup: reservation id → item id.
    reservation_to_item: DashMap<Ulid, Ulid>,
    /// Group id → member reservation ids.
    groups: DashMap<Ulid, Vec<Ulid>>,
    wal_tx: mpsc::Sender<WalCommand>,
    settings: Arc<dyn SettingsProvider>,
    pub notify: Arc<NotifyHub>,
    /// Serializes first-booking profile creation so one normalized email can
    /// never yield two customer rows under concurrent submissions.
    customer_create: Mutex<()>,
}

/// Apply a per-item event to an ItemState (no locking — caller holds the lock).
fn apply_to_item(item: &mut ItemState, event: &Event, reservation_index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ReservationCreated {
            id,
            item_id,
            customer_id,
            range,
            group_id,
            notes,
        } => {
            item.insert_reservation(Reservation {
                id: *id,
                item_id: *item_id,
                customer_id: *customer_id,
                range: *range,
                status: ReservationStatus::Pending,
                group_id: *group_id,
                notes: notes.clone(),
            });
            reservation_index.insert(*id, *item_id);
        }
        Event::ReservationStatusChanged { id, status, .. } => {
            item.set_reservation_status(id, *status);
        }
        Event::ItemStatusChanged { status, .. } => {
            item.status = *status;
        }
        _ => {}
    }
}

/// Expand a group event into its member reservations, all Pending.
pub(super) fn group_members(
    group_id: Ulid,
    customer_id: Ulid,
    range: DateRange,
    notes: &Option<String>,
    entries: &[GroupEntry],
) -> Vec<Reservation> {
    entries
        .iter()
        .map(|entry| Reservation {
            id: entry.reservation_id,
            item_id: entry.item_id,
            customer_id,
            range,
            status: ReservationStatus::Pending,
            group_id: Some(group_id),
            notes: notes.clone(),
        })
        .collect()
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        settings: Arc<dyn SettingsProvider>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            items: DashMap::new(),
            customers: DashMap::new(),
            customers_by_email: DashMap::new(),
            reservation_to_item: DashMap::new(),
            groups: DashMap::new(),
            wal_tx,
            settings,
            notify,
            customer_create: Mutex::new(()),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds (no contention). Never block here: this may run inside an
        // async context.
        for event in &events {
            engine.replay_event(event);
        }

        metrics::gauge!(crate::observability::ITEMS_REGISTERED).set(engine.items.len() as f64);
        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::ItemRegistered {
                id,
                name,
                category,
                daily_rate_cents,
                status,
            } => {
                let state =
                    ItemState::new(*id, name.clone(), category.clone(), *daily_rate_cents, *status);
                self.items.insert(*id, Arc::new(RwLock::new(state)));
            }
            Event::CustomerCreated {
                id,
                email,
                full_name,
                company_name,
                organization_domain,
                role,
            } => {
                self.customers_by_email.insert(email.clone(), *id);
                self.customers.insert(
                    *id,
                    Customer {
                        id: *id,
                        email: email.clone(),
                        full_name: full_name.clone(),
                        company_name: company_name.clone(),
                        organization_domain: organization_domain.clone(),
                        role: *role,
                    },
                );
            }
            Event::CustomerDomainBackfilled {
                id,
                organization_domain,
            } => {
                if let Some(mut customer) = self.customers.get_mut(id) {
                    customer.organization_domain = Some(organization_domain.clone());
                }
            }
            Event::ReservationGroupCreated {
                group_id,
                customer_id,
                range,
                notes,
                entries,
            } => {
                for reservation in group_members(*group_id, *customer_id, *range, notes, entries) {
                    if let Some(entry) = self.items.get(&reservation.item_id) {
                        let item = entry.value().clone();
                        let mut guard = item.try_write().expect("replay: uncontended write");
                        self.reservation_to_item
                            .insert(reservation.id, reservation.item_id);
                        guard.insert_reservation(reservation);
                    }
                }
                self.groups
                    .insert(*group_id, entries.iter().map(|e| e.reservation_id).collect());
            }
            Event::ReservationCreated {
                id,
                item_id,
                group_id,
                ..
            } => {
                if let Some(entry) = self.items.get(item_id) {
                    let item = entry.value().clone();
                    let mut guard = item.try_write().expect("replay: uncontended write");
                    apply_to_item(&mut guard, event, &self.reservation_to_item);
                }
                // Compacted logs flatten groups into single rows; keep the
                // membership index intact either way.
                if let Some(group) = group_id {
                    self.groups.entry(*group).or_default().push(*id);
                }
            }
            Event::ItemStatusChanged { .. } | Event::ReservationStatusChanged { .. } => {
                if let Some(item_id) = event_item_id(event)
                    && let Some(entry) = self.items.get(&item_id)
                {
                    let item = entry.value().clone();
                    let mut guard = item.try_write().expect("replay: uncontended write");
                    apply_to_item(&mut guard, event, &self.reservation_to_item);
                }
            }
        }
    }

    /// Write an event through the background group-commit writer.
    /// Errors come back as strings; call sites wrap them in the right
    /// infrastructure error kind.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), String> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| "wal writer shut down".to_string())?;
        rx.await
            .map_err(|_| "wal writer dropped response".to_string())?
            .map_err(|e| e.to_string())
    }

    pub fn get_item(&self, id: &Ulid) -> Option<SharedItemState> {
        self.items.get(id).map(|e| e.value().clone())
    }

    pub fn item_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_item
            .get(reservation_id)
            .map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call.
    pub(super) async fn persist_and_apply(
        &self,
        item_id: Ulid,
        item: &mut ItemState,
        event: &Event,
    ) -> Result<(), String> {
        self.wal_append(event).await?;
        apply_to_item(item, event, &self.reservation_to_item);
        self.notify.send(item_id, event);
        Ok(())
    }

    /// Reservation id → owning item, with the item's write lock acquired.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ItemState>), BookingError> {
        let item_id = self
            .item_for_reservation(reservation_id)
            .ok_or(BookingError::ReservationNotFound(*reservation_id))?;
        let item = self
            .get_item(&item_id)
            .ok_or(BookingError::ItemNotFound(item_id))?;
        let guard = item.write_owned().await;
        Ok((item_id, guard))
    }
}

/// The item an event applies to, for per-item replay and notification.
fn event_item_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ItemStatusChanged { id, .. } => Some(*id),
        Event::ReservationCreated { item_id, .. }
        | Event::ReservationStatusChanged { item_id, .. } => Some(*item_id),
        Event::ItemRegistered { .. }
        | Event::CustomerCreated { .. }
        | Event::CustomerDomainBackfilled { .. }
        | Event::ReservationGroupCreated { .. } => None,
    }
}
