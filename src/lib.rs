//! Availability & booking engine for a rental-inventory platform.
//!
//! Customers request date-ranged reservations of physical items; this crate
//! decides whether a range is free (including turnaround buffers), resolves
//! customer identity by email, and commits single or multi-item bookings
//! without ever allowing two overlapping blocking reservations on one item.
//! State is held in memory behind per-item locks and made durable through a
//! write-ahead log replayed at startup.

pub mod engine;
pub mod identity;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod settings;
pub mod wal;

pub use engine::{BookingError, Engine};
pub use model::{
    BookingReceipt, BookingRequest, BulkBookingRequest, Customer, CustomerRole, DateRange,
    GroupReceipt, ItemInfo, ItemStatus, Reservation, ReservationStatus,
};
pub use notify::NotifyHub;
pub use settings::{BookingSettings, FixedSettings, JsonFileSettings, SettingsProvider};
