/// Bin identifiers are 64-bit integers, matching the backing store's
/// BIGSERIAL primary keys.
pub type BinId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
