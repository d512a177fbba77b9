//! General helper utilities.

pub mod deduplication;

pub use deduplication::*;
