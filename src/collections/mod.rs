//! Typed wrappers around `Vec` for party-indexed protocol data.
mod typed_usize;
pub use typed_usize::TypedUsize;

mod vecmap;
pub use vecmap::VecMap;

mod vecmap_iter;
pub use vecmap_iter::VecMapIter;

mod fillvecmap;
pub use fillvecmap::FillVecMap;
