//! Change-reconciliation engine for the DDMS document index.
//!
//! Turns noisy, out-of-order, duplicate-prone filesystem notifications into
//! a small set of well-defined mutations against an authoritative SQLite
//! index. The moving parts:
//!
//! - [`watch`]: notify adapter and path normalization,
//! - [`index::coalesce`]: per-path debouncing of notification bursts,
//! - [`index::resolver`]: identity decisions (new file, content update,
//!   move/rename) keyed on path first, content hash second,
//! - [`index::walker`]: full-tree reconciliation pass with stale-entry
//!   pruning,
//! - [`store`]: the single-owner broker serializing every store operation,
//! - [`thumbs`]: JPEG preview generation and artifact cleanup.

pub mod error;
pub mod hashing;
pub mod index;
pub mod store;
pub mod thumbs;
pub mod watch;

pub use error::{IndexError, Result};
pub use index::engine::IndexEngine;
pub use index::walker::WalkSummary;
pub use store::broker::StoreHandle;
