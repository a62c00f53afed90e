//! Runtime scene state for materialized points: labels, visibility policy,
//! the renderer seam and the entity state store.

pub mod label;
pub mod policy;
pub mod renderer;
pub mod store;

pub use label::*;
pub use policy::*;
pub use renderer::*;
pub use store::*;
