//! Recognizes `define`/`include`/`endmacro` directive lines within a piece stream, lifting them
//! into structured records while passing every other piece through untouched.

pub mod recognizer;
pub mod records;
pub mod table;

pub use recognizer::Recognizer;
pub use records::{DefineRecord, EndMacroRecord, IncludeRecord, RecognizedItem};
