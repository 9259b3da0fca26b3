//! Shared tracing setup for Uppe binaries.

mod tracing;

pub use self::tracing::{init_tracing, init_tracing_with_level};
