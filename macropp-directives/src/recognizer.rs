use std::collections::VecDeque;

use macropp_foundation::errors::{Diagnostic, ReportSink};
use macropp_foundation::position::Position;
use macropp_lexer::{Piece, PieceSource};

use crate::records::{DefineRecord, EndMacroRecord, IncludeRecord, RecognizedItem};
use crate::table::{
    self, AccumulatorKind, Edge, SequenceAction, StateId, StoreAction,
};

struct Accumulator {
    kind: AccumulatorKind,
    pos: Option<Position>,
    name: Option<String>,
    parameters: Vec<String>,
    filename: Option<String>,
    /// Pieces consumed into this accumulator so far. Only ever used if the accumulator is
    /// discarded or reopened before reaching its `FinishState`; on a normal close the buffered
    /// pieces are simply dropped, since the structured record was built from the other fields.
    storeds: Vec<Piece>,
}

impl Accumulator {
    fn new(kind: AccumulatorKind) -> Self {
        Self {
            kind,
            pos: None,
            name: None,
            parameters: Vec::new(),
            filename: None,
            storeds: Vec::new(),
        }
    }

    fn into_record(self) -> RecognizedItem {
        let position = self
            .pos
            .expect("every accumulator stores its opening position before it can close");
        match self.kind {
            AccumulatorKind::Define => RecognizedItem::Define(DefineRecord {
                position,
                name: self.name.unwrap_or_default(),
                parameters: self.parameters,
                content: Vec::new(),
            }),
            AccumulatorKind::Include => RecognizedItem::Include(IncludeRecord {
                position,
                filename: self.filename.unwrap_or_default(),
            }),
            AccumulatorKind::EndMacro => RecognizedItem::EndMacro(EndMacroRecord { position }),
        }
    }
}

fn unescape_string_literal(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The directive recognizer: a table-driven state machine sitting between the lexer and the
/// definition harvester. Never alters pieces, only decides which ones get lifted into structured
/// `Define`/`Include`/`EndMacro` records versus passed through untouched.
pub struct Recognizer<S> {
    source: S,
    state: StateId,
    accumulator: Option<Accumulator>,
    queue: VecDeque<RecognizedItem>,
    halted: bool,
}

impl<S: PieceSource> Recognizer<S> {
    pub fn new(source: S) -> Self {
        table::self_check();
        Self {
            source,
            state: StateId::S1,
            accumulator: None,
            queue: VecDeque::new(),
            halted: false,
        }
    }

    pub fn next(&mut self, sink: &mut dyn ReportSink) -> Option<RecognizedItem> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(item);
            }
            if self.halted {
                return None;
            }
            if table::is_finish_state(self.state) {
                self.step_finish();
            } else {
                self.step_match(sink);
            }
        }
    }

    fn step_finish(&mut self) {
        if let Some(acc) = self.accumulator.take() {
            self.queue.push_back(acc.into_record());
        }
        match table::finish_goto(self.state) {
            Some(next) => self.state = next,
            None => self.halted = true,
        }
    }

    fn step_match(&mut self, sink: &mut dyn ReportSink) {
        let piece = self.source.next_piece();
        let edges = table::match_edges(self.state);
        let edge = find_edge(&edges, &piece);

        self.apply_sequence_action(edge);
        self.apply_disposition(edge, &piece);
        self.apply_store(edge, &piece, sink);

        if let Some(goto) = edge.goto {
            self.state = goto;
        }
    }

    fn apply_sequence_action(&mut self, edge: &Edge) {
        match edge.sequence_action {
            SequenceAction::Define => self.reopen(AccumulatorKind::Define),
            SequenceAction::Include => self.reopen(AccumulatorKind::Include),
            SequenceAction::EndMacro => self.reopen(AccumulatorKind::EndMacro),
            SequenceAction::Discard => {
                if let Some(old) = self.accumulator.take() {
                    self.flush(old);
                }
            }
            SequenceAction::Send | SequenceAction::None => {}
        }
    }

    fn reopen(&mut self, kind: AccumulatorKind) {
        if let Some(old) = self.accumulator.take() {
            self.flush(old);
        }
        self.accumulator = Some(Accumulator::new(kind));
    }

    fn flush(&mut self, accumulator: Accumulator) {
        for piece in accumulator.storeds {
            self.queue.push_back(RecognizedItem::Piece(piece));
        }
    }

    fn apply_disposition(&mut self, edge: &Edge, piece: &Piece) {
        let send = matches!(edge.sequence_action, SequenceAction::Send);
        if !send {
            if let Some(acc) = &mut self.accumulator {
                acc.storeds.push(piece.clone());
                return;
            }
        }
        self.queue.push_back(RecognizedItem::Piece(piece.clone()));
    }

    fn apply_store(&mut self, edge: &Edge, piece: &Piece, sink: &mut dyn ReportSink) {
        let Some(acc) = &mut self.accumulator else {
            return;
        };
        match edge.store {
            StoreAction::None => {}
            StoreAction::Position => acc.pos = Some(piece.position.clone()),
            StoreAction::Name => acc.name = Some(piece.text.clone()),
            StoreAction::Filename => acc.filename = Some(unescape_string_literal(&piece.text)),
            StoreAction::Parameter => {
                if acc.parameters.iter().any(|p| p == &piece.text) {
                    sink.report(
                        Diagnostic::error(format!(
                            "duplicate macro parameter name '{}'",
                            piece.text
                        ))
                        .with_position(piece.position.clone()),
                    );
                } else {
                    acc.parameters.push(piece.text.clone());
                }
            }
        }
    }
}

fn find_edge<'a>(edges: &'a [Edge], piece: &Piece) -> &'a Edge {
    edges
        .iter()
        .find(|e| e.kind == piece.kind && text_matches(e, piece))
        .expect("recognizer table is exhaustive; self_check() on construction guarantees this")
}

fn text_matches(edge: &Edge, piece: &Piece) -> bool {
    match edge.text {
        Some(expected) => expected == piece.text,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use indoc::indoc;
    use macropp_foundation::errors::CollectingSink;
    use macropp_lexer::{Lexer, PieceKind};

    use super::*;

    fn lexer_for(text: &str) -> Lexer {
        Lexer::new(None, Box::new(Cursor::new(text.as_bytes().to_vec())))
    }

    fn recognize_all(text: &str) -> (Vec<RecognizedItem>, CollectingSink) {
        let mut recognizer = Recognizer::new(lexer_for(text));
        let mut sink = CollectingSink::new();
        let mut items = Vec::new();
        while let Some(item) = recognizer.next(&mut sink) {
            items.push(item);
        }
        (items, sink)
    }

    fn names(items: &[RecognizedItem]) -> Vec<&'static str> {
        items
            .iter()
            .map(|item| match item {
                RecognizedItem::Piece(_) => "piece",
                RecognizedItem::Define(_) => "define",
                RecognizedItem::Include(_) => "include",
                RecognizedItem::EndMacro(_) => "endmacro",
            })
            .collect()
    }

    #[test]
    fn simple_define_endmacro_round_trip() {
        let (items, sink) = recognize_all(indoc! {"
            define GREETING
            hello
            endmacro
        "});
        assert!(!sink.has_severity(macropp_foundation::errors::Severity::Error));

        let define_index = items
            .iter()
            .position(|item| matches!(item, RecognizedItem::Define(_)))
            .expect("a Define item should be produced");
        let endmacro_index = items
            .iter()
            .position(|item| matches!(item, RecognizedItem::EndMacro(_)))
            .expect("an EndMacro item should be produced");
        assert!(define_index < endmacro_index);

        match &items[define_index] {
            RecognizedItem::Define(def) => {
                assert_eq!(def.name, "GREETING");
                assert!(def.parameters.is_empty());
            }
            _ => unreachable!(),
        }

        let passthrough_text: String = items[define_index + 1..endmacro_index]
            .iter()
            .filter_map(|item| match item {
                RecognizedItem::Piece(piece) => Some(piece.text.as_str()),
                _ => None,
            })
            .collect();
        assert!(passthrough_text.contains("hello"));
    }

    #[test]
    fn include_directive_captures_filename() {
        let (items, sink) = recognize_all("include \"other.pp\"\n");
        assert!(!sink.has_severity(macropp_foundation::errors::Severity::Error));

        let include = items
            .iter()
            .find_map(|item| match item {
                RecognizedItem::Include(inc) => Some(inc),
                _ => None,
            })
            .expect("an Include item should be produced");
        assert_eq!(include.filename, "other.pp");
    }

    #[test]
    fn define_with_parameters_captures_them_in_order() {
        let (items, _sink) = recognize_all(indoc! {"
            define F(x, y)
            endmacro
        "});
        let define = items
            .iter()
            .find_map(|item| match item {
                RecognizedItem::Define(def) => Some(def),
                _ => None,
            })
            .expect("a Define item should be produced");
        assert_eq!(define.parameters, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn duplicate_parameter_name_is_reported_as_an_error() {
        let (_items, sink) = recognize_all(indoc! {"
            define F(x, x)
            endmacro
        "});
        assert!(sink.has_severity(macropp_foundation::errors::Severity::Error));
    }

    #[test]
    fn same_line_define_and_endmacro_preserve_trailing_text_as_passthrough() {
        let (items, _sink) = recognize_all("define F endmacro\n");
        let has_passthrough_text = items.iter().any(|item| {
            matches!(item, RecognizedItem::Piece(piece) if piece.kind == PieceKind::Text || piece.kind == PieceKind::Identifier)
        });
        assert!(has_passthrough_text);
    }

    #[test]
    fn include_directive_followed_immediately_by_eof_still_emits_eof_piece() {
        let (items, _sink) = recognize_all("include \"other.pp\"");
        let has_eof_piece = items
            .iter()
            .any(|item| matches!(item, RecognizedItem::Piece(piece) if piece.kind == PieceKind::EndOfFile));
        assert!(has_eof_piece);
    }
}
