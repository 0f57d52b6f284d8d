//! Foundational types shared by every stage of the preprocessor: source positions and the
//! diagnostic reporting surface.

pub mod errors;
pub mod position;
