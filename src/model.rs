use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Inclusive calendar-date interval `[start, end]`. No time-of-day component;
/// a one-day rental has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Number of calendar days covered, both endpoints counted.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Inclusive-interval intersection test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// The range with its end pushed out by `days` — the blocked window of a
    /// reservation once turnaround time is added. The start never moves.
    pub fn extended_by(&self, days: u32) -> DateRange {
        let end = self
            .end
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        DateRange { start: self.start, end }
    }
}

/// Catalog status. Only `Active` items accept bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Active,
    Maintenance,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerRole {
    Customer,
    Admin,
}

/// A person or organization contact, created lazily on first booking and
/// never deleted. `email` is stored normalized (trimmed, lowercased) and is
/// unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub email: String,
    pub full_name: String,
    pub company_name: Option<String>,
    /// Derived from the email domain; `None` for public webmail addresses.
    pub organization_domain: Option<String>,
    pub role: CustomerRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Active,
    Returned,
    Cancelled,
}

impl ReservationStatus {
    /// Blocking statuses count against availability; `Returned` and
    /// `Cancelled` free the dates.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::Active)
    }

    /// Lifecycle: Pending → Confirmed → Active → Returned, with Cancelled
    /// reachable from any blocking status. Returned and Cancelled are
    /// terminal; no transition regresses.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Active)
                | (Active, Returned)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Active, Cancelled)
        )
    }
}

/// One item booked for one date range by one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub item_id: Ulid,
    pub customer_id: Ulid,
    pub range: DateRange,
    pub status: ReservationStatus,
    /// Shared by all reservations created from one bulk request.
    pub group_id: Option<Ulid>,
    pub notes: Option<String>,
}

/// Per-item state: catalog metadata plus every reservation ever taken on the
/// item, sorted by `range.start`.
#[derive(Debug, Clone)]
pub struct ItemState {
    pub id: Ulid,
    pub name: String,
    pub category: Option<String>,
    pub daily_rate_cents: i64,
    pub status: ItemStatus,
    pub reservations: Vec<Reservation>,
}

impl ItemState {
    pub fn new(
        id: Ulid,
        name: String,
        category: Option<String>,
        daily_rate_cents: i64,
        status: ItemStatus,
    ) -> Self {
        Self {
            id,
            name,
            category,
            daily_rate_cents,
            status,
            reservations: Vec::new(),
        }
    }

    /// Insert keeping the list sorted by start date.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn find_reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    /// Update a reservation's status in place. Returns false if unknown.
    pub fn set_reservation_status(&mut self, id: &Ulid, status: ReservationStatus) -> bool {
        match self.reservations.iter_mut().find(|r| r.id == *id) {
            Some(r) => {
                r.status = status;
                true
            }
            None => false,
        }
    }

    /// Reservations whose raw range intersects the query window.
    /// Binary search skips everything starting after `window.end`.
    pub fn overlapping(&self, window: &DateRange) -> impl Iterator<Item = &Reservation> {
        // Index >= cut starts after window.end — inclusive ranges can't reach back.
        let cut = self
            .reservations
            .partition_point(|r| r.range.start <= window.end);
        self.reservations[..cut]
            .iter()
            .filter(move |r| r.range.end >= window.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ItemRegistered {
        id: Ulid,
        name: String,
        category: Option<String>,
        daily_rate_cents: i64,
        status: ItemStatus,
    },
    ItemStatusChanged {
        id: Ulid,
        status: ItemStatus,
    },
    CustomerCreated {
        id: Ulid,
        email: String,
        full_name: String,
        company_name: Option<String>,
        organization_domain: Option<String>,
        role: CustomerRole,
    },
    CustomerDomainBackfilled {
        id: Ulid,
        organization_domain: String,
    },
    ReservationCreated {
        id: Ulid,
        item_id: Ulid,
        customer_id: Ulid,
        range: DateRange,
        group_id: Option<Ulid>,
        notes: Option<String>,
    },
    /// A whole bulk booking as one record, so replay can never surface a
    /// partial group.
    ReservationGroupCreated {
        group_id: Ulid,
        customer_id: Ulid,
        range: DateRange,
        notes: Option<String>,
        entries: Vec<GroupEntry>,
    },
    ReservationStatusChanged {
        id: Ulid,
        item_id: Ulid,
        status: ReservationStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub reservation_id: Ulid,
    pub item_id: Ulid,
}

// ── Request / response types ─────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub item_id: Ulid,
    pub email: String,
    pub full_name: String,
    pub company_name: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub access_password: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BulkBookingRequest {
    pub item_ids: Vec<Ulid>,
    pub email: String,
    pub full_name: String,
    pub company_name: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub access_password: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingReceipt {
    pub reservation_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReceipt {
    pub group_id: Ulid,
    /// In request order.
    pub reservation_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub id: Ulid,
    pub name: String,
    pub category: Option<String>,
    pub daily_rate_cents: i64,
    pub status: ItemStatus,
}
