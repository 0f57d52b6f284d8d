use std::fmt;

/// A source location: an optional file name, a line number, and an optional column.
///
/// Ordering is total: missing file sorts before any named file (then file names compare
/// lexicographically), then by line, then missing column sorts before any present column.
/// This matches the field declaration order below, so the derived `Ord` is exactly right.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub file: Option<String>,
    pub line: u32,
    pub column: Option<u32>,
}

impl Position {
    pub fn new(file: Option<String>, line: u32, column: Option<u32>) -> Self {
        Self { file, line, column }
    }

    pub fn stdin(line: u32, column: Option<u32>) -> Self {
        Self::new(None, line, column)
    }

    pub fn in_file(file: impl Into<String>, line: u32, column: Option<u32>) -> Self {
        Self::new(Some(file.into()), line, column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.column) {
            (Some(file), Some(column)) => write!(f, "{file}:{}:{}", self.line, column),
            (Some(file), None) => write!(f, "{file}:{}", self.line),
            (None, Some(column)) => write!(f, "<stdin>:{}:{}", self.line, column),
            (None, None) => write!(f, "<stdin>:{}", self.line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_sorts_before_named_file() {
        let a = Position::stdin(1, None);
        let b = Position::in_file("a.x", 1, None);
        assert!(a < b);
    }

    #[test]
    fn files_compare_lexicographically() {
        let a = Position::in_file("a.x", 1, None);
        let b = Position::in_file("b.x", 1, None);
        assert!(a < b);
    }

    #[test]
    fn missing_column_sorts_before_present_column() {
        let a = Position::in_file("a.x", 1, None);
        let b = Position::in_file("a.x", 1, Some(0));
        assert!(a < b);
    }

    #[test]
    fn line_dominates_column() {
        let a = Position::in_file("a.x", 1, Some(99));
        let b = Position::in_file("a.x", 2, Some(0));
        assert!(a < b);
    }
}
