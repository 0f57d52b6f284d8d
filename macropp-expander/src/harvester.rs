//! Folds `Define ... EndMacro` spans into a macro table and splices `Include` directives back
//! into the piece stream by recursively re-lexing and re-recognizing the referenced file.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use macropp_directives::{DefineRecord, RecognizedItem, Recognizer};
use macropp_foundation::errors::{Diagnostic, ReportSink};
use macropp_foundation::position::Position;
use macropp_lexer::{Lexer, Piece, PieceKind};

/// Recursive `include` nesting beyond this depth is a fatal error.
pub const MAX_INCLUDE_LEVEL: usize = 10;

/// Registered macro definitions, keyed case-sensitively by name.
#[derive(Debug, Default)]
pub struct MacroTable {
    definitions: HashMap<String, DefineRecord>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DefineRecord> {
        self.definitions.get(name)
    }

    /// Registers `def`, returning the previous definition under the same name if one existed
    /// (the caller reports the redefinition warning; this table just performs the overwrite).
    fn insert(&mut self, def: DefineRecord) -> Option<DefineRecord> {
        self.definitions.insert(def.name.clone(), def)
    }
}

/// Consumes a directive-recognizer's mixed output, harvesting definitions into a shared
/// [`MacroTable`] and yielding only the non-directive pieces, with included files' pieces
/// spliced in at the `include` directive's position.
pub struct Harvester {
    recognizer: Recognizer<Lexer>,
    base_dir: PathBuf,
    include_stack: Vec<Position>,
    current_def: Option<DefineRecord>,
    pending: Option<Box<Harvester>>,
    halted: bool,
}

impl Harvester {
    pub fn new(recognizer: Recognizer<Lexer>, base_dir: PathBuf) -> Self {
        Self {
            recognizer,
            base_dir,
            include_stack: Vec::new(),
            current_def: None,
            pending: None,
            halted: false,
        }
    }

    fn with_include_stack(
        recognizer: Recognizer<Lexer>,
        base_dir: PathBuf,
        include_stack: Vec<Position>,
    ) -> Self {
        Self {
            recognizer,
            base_dir,
            include_stack,
            current_def: None,
            pending: None,
            halted: false,
        }
    }

    pub fn next(&mut self, table: &mut MacroTable, sink: &mut dyn ReportSink) -> Option<Piece> {
        loop {
            if let Some(child) = &mut self.pending {
                if let Some(piece) = child.next(table, sink) {
                    return Some(piece);
                }
                self.pending = None;
            }

            if self.halted {
                return None;
            }

            let Some(item) = self.recognizer.next(sink) else {
                self.halted = true;
                return None;
            };

            match item {
                RecognizedItem::Piece(piece) => {
                    if let Some(def) = &mut self.current_def {
                        match piece.kind {
                            PieceKind::EndOfFile => {
                                sink.report(
                                    Diagnostic::error(format!(
                                        "end of file while still inside macro '{}'",
                                        def.name
                                    ))
                                    .with_position(def.position.clone()),
                                );
                                continue;
                            }
                            _ if piece.is_whitespace_or_newline() && def.content.is_empty() => {
                                continue;
                            }
                            _ => {
                                def.content.push(piece);
                                continue;
                            }
                        }
                    }
                    return Some(piece);
                }
                RecognizedItem::Define(def) => {
                    if self.current_def.is_some() {
                        sink.report(
                            Diagnostic::error("nested macro definition").with_position(def.position),
                        );
                        continue;
                    }
                    self.current_def = Some(def);
                }
                RecognizedItem::EndMacro(endmacro) => {
                    let Some(mut def) = self.current_def.take() else {
                        sink.report(
                            Diagnostic::error("'endmacro' without matching 'define'")
                                .with_position(endmacro.position),
                        );
                        continue;
                    };
                    strip_trailing_whitespace(&mut def.content);
                    if let Some(previous) = table.insert(def.clone()) {
                        sink.report(
                            Diagnostic::warning(format!(
                                "macro '{}' redefined, previous definition discarded",
                                def.name
                            ))
                            .with_position(previous.position)
                            .with_position(def.position),
                        );
                    }
                }
                RecognizedItem::Include(include) => {
                    if self.current_def.is_some() {
                        sink.report(
                            Diagnostic::error("'include' inside macro definition")
                                .with_position(include.position),
                        );
                        continue;
                    }
                    if self.include_stack.len() >= MAX_INCLUDE_LEVEL {
                        sink.report(
                            Diagnostic::error("include depth exceeded").with_position(include.position),
                        );
                        continue;
                    }

                    let path = self.base_dir.join(&include.filename);
                    match open_include(&path) {
                        Ok(lexer) => {
                            tracing::debug!(path = %path.display(), "resolving include");
                            let mut next_stack = self.include_stack.clone();
                            next_stack.push(include.position.clone());
                            let child_base = path
                                .parent()
                                .map(Path::to_path_buf)
                                .unwrap_or_else(|| self.base_dir.clone());
                            let recognizer = Recognizer::new(lexer);
                            self.pending = Some(Box::new(Harvester::with_include_stack(
                                recognizer, child_base, next_stack,
                            )));
                        }
                        Err(error) => {
                            sink.report(
                                Diagnostic::error(format!(
                                    "could not open included file '{}': {}",
                                    include.filename, error
                                ))
                                .with_position(include.position),
                            );
                        }
                    }
                }
            }
        }
    }
}

fn open_include(path: &Path) -> std::io::Result<Lexer> {
    let file = File::open(path)?;
    Ok(Lexer::new(
        Some(path.display().to_string()),
        Box::new(BufReader::new(file)),
    ))
}

fn strip_trailing_whitespace(content: &mut Vec<Piece>) {
    while matches!(content.last(), Some(piece) if piece.is_whitespace_or_newline()) {
        content.pop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use indoc::indoc;
    use macropp_foundation::errors::{CollectingSink, Severity};

    use super::*;

    fn harvest(text: &str) -> (String, MacroTable, CollectingSink) {
        let lexer = Lexer::new(None, Box::new(Cursor::new(text.as_bytes().to_vec())));
        let recognizer = Recognizer::new(lexer);
        let mut harvester = Harvester::new(recognizer, PathBuf::from("."));
        let mut table = MacroTable::new();
        let mut sink = CollectingSink::new();
        let mut out = String::new();
        while let Some(piece) = harvester.next(&mut table, &mut sink) {
            out.push_str(&piece.text);
        }
        (out, table, sink)
    }

    #[test]
    fn passthrough_text_with_no_directives_is_unchanged() {
        let (out, _table, sink) = harvest("plain text\nmore text\n");
        assert_eq!(out, "plain text\nmore text\n");
        assert!(!sink.has_severity(Severity::Error));
    }

    #[test]
    fn define_registers_a_macro_and_strips_body_whitespace() {
        let (_out, table, sink) = harvest(indoc! {"
            define GREETING
            hello
            endmacro
        "});
        assert!(!sink.has_severity(Severity::Error));
        let def = table.get("GREETING").expect("GREETING should be registered");
        let content: String = def.content.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(content, "hello");
    }

    #[test]
    fn redefinition_is_a_warning_and_overwrites() {
        let (_out, table, sink) = harvest(indoc! {"
            define M
            A
            endmacro
            define M
            B
            endmacro
        "});
        assert!(sink.has_severity(Severity::Warning));
        let def = table.get("M").unwrap();
        let content: String = def.content.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(content, "B");
    }

    #[test]
    fn endmacro_without_define_is_fatal() {
        let (_out, _table, sink) = harvest("endmacro\n");
        assert!(sink.has_severity(Severity::Error));
    }

    #[test]
    fn nested_define_is_fatal() {
        let (_out, _table, sink) = harvest(indoc! {"
            define A
            define B
            endmacro
            endmacro
        "});
        assert!(sink.has_severity(Severity::Error));
    }
}
