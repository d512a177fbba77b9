//! Collection types used throughout the triangulation engine.
//!
//! Hash maps and sets use the `rustc-hash` hasher, small scratch buffers use
//! `smallvec`, and the two linked-list arenas (edge store and feature list) are
//! backed by `slotmap`.

mod aliases;
mod helpers;
pub(crate) mod spatial_hash_grid;

pub use aliases::*;
pub use helpers::*;
