//! Turns raw text into a stream of classified, positioned pieces.

pub mod lexer;
pub mod piece;
pub mod stream;

pub use lexer::Lexer;
pub use piece::{Piece, PieceKind};
pub use stream::{ListPieceStream, Peekable, PieceSource};
