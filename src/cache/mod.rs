//! Cache module for storing responses to disk
//!
//! This module provides a namespaced cache manager that persists responses to
//! the filesystem under content-derived keys, with reads gated on a TTL. It is
//! the first tier consulted by the storage manager.

mod key;
mod manager;

pub use key::{Fingerprint, Namespace};
pub use manager::{CacheEntry, CacheManager};
