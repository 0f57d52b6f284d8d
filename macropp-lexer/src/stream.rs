use crate::piece::{Piece, PieceKind};

/// A pull-based source of pieces, advanced one at a time by whatever consumes it.
///
/// Every stage of the pipeline (lexer, recognizer, harvester, expander) holds a reference to (or
/// owns) its predecessor and only pulls the next piece when its own consumer asks for one. Stages
/// that need lookahead wrap their source in [`Peekable`] rather than this trait growing a
/// `position`/`set_position` pair, since the lexer reads lines off a file and has nothing
/// sensible to rewind to beyond a single buffered piece.
pub trait PieceSource {
    /// Returns the next piece. Once exhausted, keeps returning `EndOfFile` pieces forever.
    fn next_piece(&mut self) -> Piece;
}

impl<T> PieceSource for &mut T
where
    T: PieceSource,
{
    fn next_piece(&mut self) -> Piece {
        <T as PieceSource>::next_piece(self)
    }
}

/// One-piece lookahead buffer over any [`PieceSource`], per the pipeline's peek/unget needs
/// (e.g. the expander only consumes a macro name's `(` after having already seen the identifier).
pub struct Peekable<S> {
    inner: S,
    buffered: Option<Piece>,
}

impl<S: PieceSource> Peekable<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffered: None,
        }
    }

    pub fn peek(&mut self) -> Piece {
        if self.buffered.is_none() {
            self.buffered = Some(self.inner.next_piece());
        }
        self.buffered.clone().expect("just filled above")
    }

    /// Pushes a piece back onto the stream so the next `next_piece` call returns it again.
    pub fn unget(&mut self, piece: Piece) {
        debug_assert!(
            self.buffered.is_none(),
            "Peekable only supports a single slot of lookahead"
        );
        self.buffered = Some(piece);
    }
}

impl<S: PieceSource> PieceSource for Peekable<S> {
    fn next_piece(&mut self) -> Piece {
        self.buffered
            .take()
            .unwrap_or_else(|| self.inner.next_piece())
    }
}

/// A [`PieceSource`] over an already-materialized, finite list of pieces, used for macro
/// argument lists and macro body content, which are buffered in full before being re-expanded.
pub struct ListPieceStream {
    pieces: Vec<Piece>,
    cursor: usize,
    /// Synthesized once the list is exhausted, so callers see a stable `EndOfFile` position.
    end_of_file: Piece,
}

impl ListPieceStream {
    pub fn new(pieces: Vec<Piece>, end_of_file: Piece) -> Self {
        Self {
            pieces,
            cursor: 0,
            end_of_file,
        }
    }
}

impl PieceSource for ListPieceStream {
    fn next_piece(&mut self) -> Piece {
        if let Some(piece) = self.pieces.get(self.cursor) {
            self.cursor += 1;
            piece.clone()
        } else {
            let mut eof = self.end_of_file.clone();
            eof.kind = PieceKind::EndOfFile;
            eof
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macropp_foundation::position::Position;

    fn text_piece(text: &str) -> Piece {
        Piece::new(PieceKind::Text, Position::stdin(1, Some(0)), text)
    }

    #[test]
    fn list_stream_replays_pieces_then_eof() {
        let eof = Piece::new(PieceKind::EndOfFile, Position::stdin(2, Some(0)), "");
        let mut stream = ListPieceStream::new(vec![text_piece("a"), text_piece("b")], eof);

        assert_eq!(stream.next_piece().text, "a");
        assert_eq!(stream.next_piece().text, "b");
        assert_eq!(stream.next_piece().kind, PieceKind::EndOfFile);
        assert_eq!(stream.next_piece().kind, PieceKind::EndOfFile);
    }

    #[test]
    fn peekable_peek_does_not_advance_and_unget_replays() {
        let eof = Piece::new(PieceKind::EndOfFile, Position::stdin(2, Some(0)), "");
        let mut stream = Peekable::new(ListPieceStream::new(vec![text_piece("a")], eof));

        assert_eq!(stream.peek().text, "a");
        assert_eq!(stream.peek().text, "a");
        let piece = stream.next_piece();
        assert_eq!(piece.text, "a");
        stream.unget(piece);
        assert_eq!(stream.next_piece().text, "a");
    }
}
