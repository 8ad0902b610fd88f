//! Core data model definitions shared across DDMS crates.

pub mod change;
pub mod event;
pub mod hash;
pub mod item;

pub use change::{ChangeDescriptor, ChangeKind};
pub use event::{RawFsEvent, RawFsEventKind};
pub use hash::{ContentHash, HashParseError};
pub use item::Item;
