// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-facing layer of Flightwatch.
//!
//! [`CacheStore`] owns cache entries, history, hit/miss statistics and rate
//! limit counters; [`DistributedLock`] owns resolution locks. Both sit on the
//! same [`flightwatch_core::StoreBackend`], and no other component touches
//! the backend's cache, history, lock, or counter keys directly.

pub mod history;
pub mod keys;
pub mod lock;
pub mod rate_limit;
pub mod recording;
pub mod store;

pub use lock::{DistributedLock, LockLease, LockOptions, LockRecord};
pub use store::CacheStore;
