//! Vector index adapters.

pub mod chroma;
pub mod fixed;

pub use chroma::ChromaIndex;
pub use fixed::FixedIndex;
