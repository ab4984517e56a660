//! Error handling for the cache system
//!
//! Every fallible cache operation returns [`CacheError`]. Variants carry the
//! namespace/key or path involved and a [`RecoveryHint`] describing what a
//! caller can reasonably do next.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
