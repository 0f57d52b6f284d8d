use std::collections::VecDeque;
use std::io::BufRead;

use macropp_foundation::position::Position;

use crate::piece::{Piece, PieceKind};
use crate::stream::PieceSource;

/// What matched at a given column, before the surrounding `Text` span (if any) is sliced off.
enum Match {
    Piece(PieceKind, usize),
    CommentBlockOpen,
    CommentLine,
}

/// Converts a byte stream into a lazy sequence of [`Piece`]s, one line at a time, terminated by
/// a single `EndOfFile` piece. Holds no more state than the current line and the block-comment
/// flag, per the resource model: nothing is read ahead of what's demanded.
pub struct Lexer {
    reader: Box<dyn BufRead>,
    file: Option<String>,
    line_no: u32,
    in_block_comment: bool,
    queue: VecDeque<Piece>,
    eof_piece: Option<Piece>,
}

impl Lexer {
    pub fn new(file: Option<String>, reader: Box<dyn BufRead>) -> Self {
        Self {
            reader,
            file,
            line_no: 0,
            in_block_comment: false,
            queue: VecDeque::new(),
            eof_piece: None,
        }
    }

    fn position_at(&self, column: usize) -> Position {
        Position::new(self.file.clone(), self.line_no, Some(column as u32))
    }

    fn read_next_line(&mut self) -> Option<String> {
        let mut buf = String::new();
        match self.reader.read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf),
            Err(_) => None,
        }
    }

    /// Scans a single physical line (newline retained if present) into pieces, honoring and
    /// updating the block-comment mode that may carry over from the previous line.
    fn scan_line(&mut self, raw_line: &str) -> Vec<Piece> {
        let has_newline = raw_line.ends_with('\n');
        let content = if has_newline {
            &raw_line[..raw_line.len() - 1]
        } else {
            raw_line
        };
        let chars: Vec<char> = content.chars().collect();
        let mut pieces = Vec::new();
        let mut col = 0usize;

        if self.in_block_comment {
            col = self.consume_block_comment(&chars, 0, &mut pieces);
        }

        while col < chars.len() {
            match self.find_next_match(&chars, col) {
                Some((start, matched)) => {
                    if start > col {
                        let text: String = chars[col..start].iter().collect();
                        pieces.push(Piece::new(PieceKind::Text, self.position_at(col), text));
                    }
                    col = match matched {
                        Match::Piece(kind, end) => {
                            let text: String = chars[start..end].iter().collect();
                            pieces.push(Piece::new(kind, self.position_at(start), text));
                            end
                        }
                        Match::CommentBlockOpen => {
                            self.in_block_comment = true;
                            self.consume_block_comment(&chars, start, &mut pieces)
                        }
                        Match::CommentLine => {
                            let text: String = chars[start..].iter().collect();
                            pieces.push(Piece::new(PieceKind::Comment, self.position_at(start), text));
                            chars.len()
                        }
                    };
                }
                None => {
                    let text: String = chars[col..].iter().collect();
                    pieces.push(Piece::new(PieceKind::Text, self.position_at(col), text));
                    col = chars.len();
                }
            }
        }

        if has_newline {
            pieces.push(Piece::new(PieceKind::Newline, self.position_at(chars.len()), "\n"));
        }

        pieces
    }

    /// Emits the `Comment` piece for a (possibly already in-progress) block comment on this line,
    /// starting at `start`. Closes the comment if `*/` appears on this line, otherwise leaves
    /// `in_block_comment` set for the next line. Returns the column scanning should resume from.
    fn consume_block_comment(&mut self, chars: &[char], start: usize, pieces: &mut Vec<Piece>) -> usize {
        if let Some(close) = find_substr(chars, start, "*/") {
            let end = close + 2;
            let text: String = chars[start..end].iter().collect();
            pieces.push(Piece::new(PieceKind::Comment, self.position_at(start), text));
            self.in_block_comment = false;
            end
        } else {
            let text: String = chars[start..].iter().collect();
            pieces.push(Piece::new(PieceKind::Comment, self.position_at(start), text));
            chars.len()
        }
    }

    /// Scans forward from `from` for the earliest column at which any pattern matches, breaking
    /// ties among patterns starting at the same column by the priority order in the table.
    fn find_next_match(&self, chars: &[char], from: usize) -> Option<(usize, Match)> {
        for col in from..chars.len() {
            if let Some(matched) = try_match_at(chars, col) {
                return Some((col, matched));
            }
        }
        None
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn try_match_at(chars: &[char], col: usize) -> Option<Match> {
    let c = chars[col];

    if c == ' ' || c == '\t' {
        let mut end = col + 1;
        while end < chars.len() && (chars[end] == ' ' || chars[end] == '\t') {
            end += 1;
        }
        return Some(Match::Piece(PieceKind::Whitespace, end));
    }

    if c == '"' {
        let mut idx = col + 1;
        loop {
            if idx >= chars.len() {
                break;
            }
            if chars[idx] == '\\' {
                if idx + 1 >= chars.len() {
                    break;
                }
                idx += 2;
                continue;
            }
            if chars[idx] == '"' {
                return Some(Match::Piece(PieceKind::String, idx + 1));
            }
            idx += 1;
        }
        // Unterminated on this line: falls through, becomes part of surrounding Text.
    }

    if (c.is_ascii_alphabetic() || c == '_') && (col == 0 || !is_word_char(chars[col - 1])) {
        let mut end = col + 1;
        while end < chars.len() && is_word_char(chars[end]) {
            end += 1;
        }
        return Some(Match::Piece(PieceKind::Identifier, end));
    }

    if c == '/' && chars.get(col + 1) == Some(&'*') {
        return Some(Match::CommentBlockOpen);
    }

    if c == '/' && chars.get(col + 1) == Some(&'/') {
        return Some(Match::CommentLine);
    }

    match c {
        '(' => Some(Match::Piece(PieceKind::ParenOpen, col + 1)),
        ')' => Some(Match::Piece(PieceKind::ParenClose, col + 1)),
        ',' => Some(Match::Piece(PieceKind::Comma, col + 1)),
        _ => None,
    }
}

fn find_substr(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || from + needle.len() > chars.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&i| chars[i..i + needle.len()] == needle[..])
}

impl PieceSource for Lexer {
    fn next_piece(&mut self) -> Piece {
        loop {
            if let Some(piece) = self.queue.pop_front() {
                return piece;
            }
            if let Some(eof) = &self.eof_piece {
                return eof.clone();
            }
            match self.read_next_line() {
                Some(line) => {
                    self.line_no += 1;
                    let pieces = self.scan_line(&line);
                    self.queue.extend(pieces);
                }
                None => {
                    let eof = Piece::new(
                        PieceKind::EndOfFile,
                        Position::new(self.file.clone(), self.line_no + 1, Some(0)),
                        "",
                    );
                    self.eof_piece = Some(eof);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn lex_all(input: &str) -> Vec<Piece> {
        let mut lexer = Lexer::new(None, Box::new(Cursor::new(input.to_owned())));
        let mut pieces = Vec::new();
        loop {
            let piece = lexer.next_piece();
            let done = piece.kind == PieceKind::EndOfFile;
            pieces.push(piece);
            if done {
                break;
            }
        }
        pieces
    }

    #[test]
    fn text_round_trips_exactly() {
        let input = "hello, (world) // a comment\n";
        let pieces = lex_all(input);
        let reconstructed: String = pieces
            .iter()
            .filter(|p| p.kind != PieceKind::EndOfFile)
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(reconstructed, input);
    }

    #[test]
    fn classifies_basic_pieces() {
        let pieces = lex_all("foo(a, b)\n");
        let kinds: Vec<_> = pieces.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PieceKind::Identifier,
                PieceKind::ParenOpen,
                PieceKind::Identifier,
                PieceKind::Comma,
                PieceKind::Whitespace,
                PieceKind::Identifier,
                PieceKind::ParenClose,
                PieceKind::Newline,
                PieceKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn block_comment_spans_multiple_lines() {
        let pieces = lex_all("a /* one\ntwo */ b\n");
        let comments: Vec<_> = pieces
            .iter()
            .filter(|p| p.kind == PieceKind::Comment)
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(comments, vec!["/* one", "two */"]);
    }

    #[test]
    fn string_literal_honors_backslash_escapes() {
        let pieces = lex_all(r#""a\"b"\n"#);
        assert_eq!(pieces[0].kind, PieceKind::String);
        assert_eq!(pieces[0].text, r#""a\"b""#);
    }

    #[test]
    fn eof_position_is_one_past_last_line() {
        let pieces = lex_all("a\nb\n");
        let eof = pieces.last().unwrap();
        assert_eq!(eof.kind, PieceKind::EndOfFile);
        assert_eq!(eof.position.line, 3);
    }

    #[test]
    fn identifier_does_not_match_mid_word_after_a_digit() {
        let pieces = lex_all("3x foo\n");
        let kinds: Vec<_> = pieces.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PieceKind::Text,
                PieceKind::Whitespace,
                PieceKind::Identifier,
                PieceKind::Newline,
                PieceKind::EndOfFile,
            ]
        );
        assert_eq!(pieces[0].text, "3x");
    }

    #[test]
    fn further_next_piece_calls_after_eof_keep_returning_eof() {
        let mut lexer = Lexer::new(None, Box::new(Cursor::new(String::new())));
        assert_eq!(lexer.next_piece().kind, PieceKind::EndOfFile);
        assert_eq!(lexer.next_piece().kind, PieceKind::EndOfFile);
    }
}
