use chrono::{Datelike, Days};

use crate::limits::*;
use crate::model::{DateRange, ItemState};

use super::BookingError;

pub(crate) fn validate_range(range: &DateRange) -> Result<(), BookingError> {
    if range.start.year() < MIN_BOOKING_YEAR || range.end.year() > MAX_BOOKING_YEAR {
        return Err(BookingError::LimitExceeded("date outside bookable window"));
    }
    if range.days() > MAX_RANGE_DAYS {
        return Err(BookingError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

/// The authoritative availability check. Caller holds the item's write lock,
/// which is what makes check-then-insert serializable per item.
///
/// The search window reaches `buffer` days back from the candidate start so
/// reservations whose buffer-extended end touches the candidate are seen; it
/// never reaches forward past the candidate end, because the buffer extends
/// ends only.
pub(crate) fn check_no_conflict(
    item: &ItemState,
    candidate: &DateRange,
    buffer_days: u32,
) -> Result<(), BookingError> {
    let search_start = candidate
        .start
        .checked_sub_days(Days::new(u64::from(buffer_days)))
        .unwrap_or(chrono::NaiveDate::MIN);
    let search = DateRange {
        start: search_start,
        end: candidate.end,
    };

    for reservation in item.overlapping(&search) {
        if !reservation.status.is_blocking() {
            continue;
        }
        let blocked = reservation.range.extended_by(buffer_days);
        if blocked.overlaps(candidate) {
            return Err(BookingError::NotAvailable(item.id));
        }
    }
    Ok(())
}
