//! Hard bounds enforced by the engine. Exceeding any of these yields a
//! recoverable `LimitExceeded` error, never a panic.

/// Maximum number of items a single store will track.
pub const MAX_ITEMS: usize = 100_000;

/// Maximum reservations (any status) kept per item.
pub const MAX_RESERVATIONS_PER_ITEM: usize = 10_000;

/// Maximum items in one bulk booking request.
pub const MAX_BATCH_ITEMS: usize = 100;

/// Maximum length of item names, customer names and company names.
pub const MAX_NAME_LEN: usize = 200;

/// RFC 5321 caps the whole address at 254 octets.
pub const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of free-form booking notes.
pub const MAX_NOTES_LEN: usize = 2_000;

/// Widest bookable date range, inclusive of both endpoints.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Turnaround buffers above this are treated as a misconfiguration and clamped.
pub const MAX_TURNAROUND_BUFFER_DAYS: u32 = 90;

/// Bookable calendar window. Dates outside it are rejected up front so the
/// date arithmetic below never has to consider overflow.
pub const MIN_BOOKING_YEAR: i32 = 2000;
pub const MAX_BOOKING_YEAR: i32 = 2999;
