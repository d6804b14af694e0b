//! Temporary storage tier
//!
//! Keeps a timestamped history of API responses and reports per ticker. The
//! storage manager reads it after a cache miss and falls back to it, even when
//! stale, if a fresh fetch fails.

mod storage;

pub use storage::{TempKind, TempLookup, TempRecord, TempStorage};
