//! Pointer input capture
//!
//! The host forwards raw pointer events into the sequence buffer; this crate
//! never listens to an input surface itself.

pub mod input;

pub use input::SequenceBuffer;
