//! Static point-of-interest catalog.
//!
//! Points are loaded once from a dataset, validated, and indexed by a static
//! k-d tree. Nothing here mutates after construction.

pub mod catalog;
pub mod error;
pub mod ingest;
pub mod point;
pub mod spatial;

pub use catalog::*;
pub use error::*;
pub use ingest::*;
pub use point::*;
pub use spatial::*;
