use ulid::Ulid;

use crate::model::ReservationStatus;

/// Closed set of booking-engine failures. Validation and business-rule kinds
/// are expected outcomes the caller can act on; infrastructure kinds are
/// logged with context and surfaced to end users as a generic retry message.
#[derive(Debug)]
pub enum BookingError {
    InvalidEmail,
    InvalidDates,
    AccessDenied,
    /// The item cannot be booked for the requested range — an overlapping
    /// blocking reservation, its turnaround buffer, or a non-active item.
    NotAvailable(Ulid),
    ItemNotFound(Ulid),
    ItemAlreadyExists(Ulid),
    ReservationNotFound(Ulid),
    GroupNotFound(Ulid),
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    LimitExceeded(&'static str),
    SettingsUnavailable(String),
    ProfileWriteFailed(String),
    ReservationWriteFailed(String),
    /// Catalog-feed write failure (item registration, status change).
    StoreWriteFailed(String),
}

impl BookingError {
    /// Short stable label for metrics and logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            BookingError::InvalidEmail => "invalid_email",
            BookingError::InvalidDates => "invalid_dates",
            BookingError::AccessDenied => "access_denied",
            BookingError::NotAvailable(_) => "not_available",
            BookingError::ItemNotFound(_) => "item_not_found",
            BookingError::ItemAlreadyExists(_) => "item_already_exists",
            BookingError::ReservationNotFound(_) => "reservation_not_found",
            BookingError::GroupNotFound(_) => "group_not_found",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::LimitExceeded(_) => "limit_exceeded",
            BookingError::SettingsUnavailable(_) => "settings_unavailable",
            BookingError::ProfileWriteFailed(_) => "profile_write_failed",
            BookingError::ReservationWriteFailed(_) => "reservation_write_failed",
            BookingError::StoreWriteFailed(_) => "store_write_failed",
        }
    }

    /// Infrastructure failures get logged loudly and shown to users as a
    /// generic retry message; everything else is an expected outcome.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            BookingError::SettingsUnavailable(_)
                | BookingError::ProfileWriteFailed(_)
                | BookingError::ReservationWriteFailed(_)
                | BookingError::StoreWriteFailed(_)
        )
    }

    /// Message safe to show a non-technical end user. Never leaks internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            BookingError::InvalidEmail => "Please enter a valid email address.",
            BookingError::InvalidDates => {
                "Please choose a start date on or before the end date."
            }
            BookingError::AccessDenied => "The access password is incorrect.",
            BookingError::NotAvailable(_) => {
                "One or more items are not available for the selected dates."
            }
            BookingError::ItemNotFound(_) | BookingError::GroupNotFound(_) => {
                "That listing no longer exists."
            }
            BookingError::ItemAlreadyExists(_) => "That listing already exists.",
            BookingError::ReservationNotFound(_) => "That reservation no longer exists.",
            BookingError::InvalidTransition { .. } => {
                "That reservation can no longer be changed."
            }
            BookingError::LimitExceeded(_) => "The request is too large to process.",
            BookingError::SettingsUnavailable(_)
            | BookingError::ProfileWriteFailed(_)
            | BookingError::ReservationWriteFailed(_)
            | BookingError::StoreWriteFailed(_) => {
                "Something went wrong on our side. Please try again."
            }
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidEmail => write!(f, "invalid email address"),
            BookingError::InvalidDates => write!(f, "invalid date range"),
            BookingError::AccessDenied => write!(f, "access password mismatch"),
            BookingError::NotAvailable(item) => {
                write!(f, "item {item} not available for the requested dates")
            }
            BookingError::ItemNotFound(id) => write!(f, "item not found: {id}"),
            BookingError::ItemAlreadyExists(id) => write!(f, "item already exists: {id}"),
            BookingError::ReservationNotFound(id) => {
                write!(f, "reservation not found: {id}")
            }
            BookingError::GroupNotFound(id) => write!(f, "reservation group not found: {id}"),
            BookingError::InvalidTransition { from, to } => {
                write!(f, "illegal status transition: {from:?} -> {to:?}")
            }
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::SettingsUnavailable(e) => write!(f, "settings unavailable: {e}"),
            BookingError::ProfileWriteFailed(e) => write!(f, "profile write failed: {e}"),
            BookingError::ReservationWriteFailed(e) => {
                write!(f, "reservation write failed: {e}")
            }
            BookingError::StoreWriteFailed(e) => write!(f, "store write failed: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}
