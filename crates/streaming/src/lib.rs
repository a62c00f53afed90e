//! Viewport streaming: which catalog points belong in the working set as the
//! camera moves.

pub mod viewport;

pub use viewport::*;
