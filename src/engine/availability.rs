use crate::model::{DateRange, Reservation};

// ── Availability algorithm ────────────────────────────────────────
//
// A reservation in a blocking status blocks `[start, end + buffer]`: the
// turnaround buffer extends the end (cleaning, inspection) and never the
// start. A candidate range conflicts when it intersects any blocked window,
// inclusive on both ends.

/// Blocked windows of every blocking reservation, sorted by start.
/// Input order does not matter.
pub fn blocked_windows(reservations: &[Reservation], buffer_days: u32) -> Vec<DateRange> {
    let mut windows: Vec<DateRange> = reservations
        .iter()
        .filter(|r| r.status.is_blocking())
        .map(|r| r.range.extended_by(buffer_days))
        .collect();
    windows.sort_by_key(|w| w.start);
    windows
}

/// Coalesce sorted windows that overlap or touch (end and next start on
/// consecutive days) into disjoint spans — the calendar-hint shape clients
/// grey out.
pub fn merge_contiguous(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &window in sorted {
        if let Some(last) = merged.last_mut()
            && last.end.succ_opt().is_some_and(|next_day| window.start <= next_day)
        {
            last.end = last.end.max(window.end);
            continue;
        }
        merged.push(window);
    }
    merged
}

/// True when the candidate intersects none of the blocked windows.
pub fn range_is_free(candidate: &DateRange, windows: &[DateRange]) -> bool {
    windows.iter().all(|w| !w.overlaps(candidate))
}
