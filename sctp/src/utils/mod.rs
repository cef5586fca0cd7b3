//! Small helpers shared across the crate.

pub mod serial;

pub use serial::{tsn_ge, tsn_gt, tsn_lt};
