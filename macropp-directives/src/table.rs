//! The directive recognizer's state table. Kept data-driven (a table of edges) rather than a
//! hand-written match cascade per state, so the exhaustiveness and coherence checks below can
//! audit it mechanically instead of by code review.

use std::collections::HashSet;

use macropp_lexer::PieceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    S1,
    S2,
    S11,
    S12,
    S13,
    S14,
    S15,
    S18,
    S21,
    S22,
    S28,
    S29,
    S31,
    S99,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorKind {
    Define,
    Include,
    EndMacro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceAction {
    None,
    Define,
    Include,
    EndMacro,
    Discard,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    None,
    Position,
    Name,
    Parameter,
    Filename,
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub kind: PieceKind,
    pub text: Option<&'static str>,
    /// `None` means "stay in the current state".
    pub goto: Option<StateId>,
    pub sequence_action: SequenceAction,
    pub store: StoreAction,
}

fn edge(
    kind: PieceKind,
    text: Option<&'static str>,
    goto: Option<StateId>,
    sequence_action: SequenceAction,
    store: StoreAction,
) -> Edge {
    Edge {
        kind,
        text,
        goto,
        sequence_action,
        store,
    }
}

/// The accumulator kind a given state expects to be open (`None` means no accumulator should be
/// open while in this state). Used both to build records on `FinishState`s and to check edge
/// coherence in [`self_check`].
pub fn expected_kind(state: StateId) -> Option<AccumulatorKind> {
    use AccumulatorKind::*;
    use StateId::*;
    match state {
        S1 | S2 | S99 => None,
        S11 | S12 | S13 | S14 | S15 | S18 => Some(Define),
        S21 | S22 | S28 | S29 => Some(Include),
        S31 => Some(EndMacro),
    }
}

pub fn is_finish_state(state: StateId) -> bool {
    matches!(
        state,
        StateId::S18 | StateId::S28 | StateId::S29 | StateId::S31 | StateId::S99
    )
}

/// Where a `FinishState` transitions to after closing its accumulator. `None` only for the
/// terminal state.
pub fn finish_goto(state: StateId) -> Option<StateId> {
    match state {
        StateId::S18 => Some(StateId::S2),
        StateId::S28 => Some(StateId::S1),
        StateId::S29 => Some(StateId::S99),
        StateId::S31 => Some(StateId::S2),
        StateId::S99 => None,
        _ => unreachable!("finish_goto called on a non-finish state"),
    }
}

/// Edges for a `MatchState`. Evaluated in order; the first edge whose `(kind, text)` matches the
/// current piece fires.
pub fn match_edges(state: StateId) -> Vec<Edge> {
    use PieceKind::*;
    use SequenceAction as Seq;
    use StateId::*;
    use StoreAction as Store;

    match state {
        S1 => vec![
            edge(Identifier, Some("define"), Some(S11), Seq::Define, Store::Position),
            edge(Identifier, Some("include"), Some(S21), Seq::Include, Store::Position),
            edge(Identifier, Some("endmacro"), Some(S31), Seq::EndMacro, Store::Position),
            edge(Newline, None, None, Seq::None, Store::None),
            edge(EndOfFile, None, Some(S99), Seq::None, Store::None),
            edge(Identifier, None, Some(S2), Seq::None, Store::None),
            edge(Whitespace, None, Some(S2), Seq::None, Store::None),
            edge(Comment, None, Some(S2), Seq::None, Store::None),
            edge(String, None, Some(S2), Seq::None, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::None, Store::None),
            edge(ParenClose, None, Some(S2), Seq::None, Store::None),
            edge(Comma, None, Some(S2), Seq::None, Store::None),
            edge(Text, None, Some(S2), Seq::None, Store::None),
        ],
        S2 => vec![
            edge(Identifier, Some("endmacro"), Some(S31), Seq::EndMacro, Store::Position),
            edge(Newline, None, Some(S1), Seq::None, Store::None),
            edge(EndOfFile, None, Some(S99), Seq::None, Store::None),
            edge(Identifier, None, None, Seq::None, Store::None),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Comment, None, None, Seq::None, Store::None),
            edge(String, None, None, Seq::None, Store::None),
            edge(ParenOpen, None, None, Seq::None, Store::None),
            edge(ParenClose, None, None, Seq::None, Store::None),
            edge(Comma, None, None, Seq::None, Store::None),
            edge(Text, None, None, Seq::None, Store::None),
        ],
        S11 => vec![
            edge(Identifier, Some("endmacro"), Some(S31), Seq::EndMacro, Store::Position),
            edge(Identifier, Some("define"), Some(S2), Seq::Discard, Store::None),
            edge(Identifier, Some("include"), Some(S2), Seq::Discard, Store::None),
            edge(Identifier, None, Some(S12), Seq::None, Store::Name),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenClose, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S12 => vec![
            edge(ParenOpen, None, Some(S13), Seq::None, Store::None),
            edge(Identifier, Some("endmacro"), Some(S31), Seq::EndMacro, Store::Position),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Identifier, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenClose, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S13 => vec![
            edge(Identifier, Some("endmacro"), Some(S31), Seq::EndMacro, Store::Position),
            edge(Identifier, Some("define"), Some(S2), Seq::Discard, Store::None),
            edge(Identifier, Some("include"), Some(S2), Seq::Discard, Store::None),
            edge(Identifier, None, Some(S14), Seq::None, Store::Parameter),
            edge(ParenClose, None, Some(S18), Seq::None, Store::None),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S14 => vec![
            edge(Comma, None, Some(S15), Seq::None, Store::None),
            edge(ParenClose, None, Some(S18), Seq::None, Store::None),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Identifier, None, Some(S2), Seq::Discard, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S15 => vec![
            edge(Identifier, None, Some(S14), Seq::None, Store::Parameter),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(ParenClose, None, Some(S2), Seq::Discard, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S21 => vec![
            edge(String, None, Some(S22), Seq::None, Store::Filename),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Newline, None, Some(S1), Seq::Discard, Store::None),
            edge(EndOfFile, None, Some(S2), Seq::Discard, Store::None),
            edge(Identifier, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenClose, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S22 => vec![
            edge(Newline, None, Some(S28), Seq::None, Store::None),
            edge(EndOfFile, None, Some(S29), Seq::Send, Store::None),
            edge(Whitespace, None, None, Seq::None, Store::None),
            edge(Identifier, None, Some(S2), Seq::Discard, Store::None),
            edge(String, None, Some(S2), Seq::Discard, Store::None),
            edge(Comment, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenOpen, None, Some(S2), Seq::Discard, Store::None),
            edge(ParenClose, None, Some(S2), Seq::Discard, Store::None),
            edge(Comma, None, Some(S2), Seq::Discard, Store::None),
            edge(Text, None, Some(S2), Seq::Discard, Store::None),
        ],
        S18 | S28 | S29 | S31 | S99 => {
            unreachable!("match_edges called on a finish state")
        }
    }
}

const MATCH_STATES: [StateId; 9] = [
    StateId::S1,
    StateId::S2,
    StateId::S11,
    StateId::S12,
    StateId::S13,
    StateId::S14,
    StateId::S15,
    StateId::S21,
    StateId::S22,
];

/// Verifies the table is internally consistent: every `MatchState` has a catch-all (non-text)
/// edge for each of the ten piece kinds, and every edge's sequence action leads to a state whose
/// expected accumulator kind is coherent with what that action does to the accumulator. Panics on
/// failure: an inconsistent table is a bug in this program, not a user-facing error.
pub fn self_check() {
    for &state in &MATCH_STATES {
        let edges = match_edges(state);

        let covered: HashSet<PieceKind> = edges
            .iter()
            .filter(|e| e.text.is_none())
            .map(|e| e.kind)
            .collect();
        let all: HashSet<PieceKind> = PieceKind::ALL.into_iter().collect();
        assert_eq!(
            covered, all,
            "state {state:?} does not have a catch-all edge for every piece kind"
        );

        let here = expected_kind(state);
        for e in &edges {
            let destination = e.goto.unwrap_or(state);
            let destination_expects = expected_kind(destination);
            match e.sequence_action {
                SequenceAction::Define => assert_eq!(
                    destination_expects,
                    Some(AccumulatorKind::Define),
                    "define-opening edge in {state:?} must lead to a state expecting Define"
                ),
                SequenceAction::Include => assert_eq!(
                    destination_expects,
                    Some(AccumulatorKind::Include),
                    "include-opening edge in {state:?} must lead to a state expecting Include"
                ),
                SequenceAction::EndMacro => assert_eq!(
                    destination_expects,
                    Some(AccumulatorKind::EndMacro),
                    "endmacro-opening edge in {state:?} must lead to a state expecting EndMacro"
                ),
                SequenceAction::Discard => assert_eq!(
                    destination_expects, None,
                    "discard edge in {state:?} must lead to a state expecting no accumulator"
                ),
                SequenceAction::None | SequenceAction::Send => assert_eq!(
                    destination_expects, here,
                    "none/send edge in {state:?} must preserve the current accumulator kind"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_self_check_passes() {
        self_check();
    }
}
