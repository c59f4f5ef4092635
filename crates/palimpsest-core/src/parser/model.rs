//! The per-file extraction record spec.md §4.6 specifies:
//! `{language, module_docstring?, imports[], classes[], functions[], calls[],
//! errors[]}`.

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read '{path}': {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("{0}")]
    GrammarSetup(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A function or method definition found in a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntity {
    pub name: String,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    /// `Some(class_name)` when this function is a method of a class/struct
    /// found elsewhere in `ParsedFile::classes`.
    pub containing_class: Option<String>,
}

/// A class/struct/interface definition found in a source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntity {
    pub name: String,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// A call expression found in a source file, best-effort (callee name only —
/// resolving the callee to a specific definition is the Query Engine's job,
/// not the extractor's).
#[derive(Debug, Clone, PartialEq)]
pub struct CallEntity {
    pub callee: String,
    pub line: u32,
}

/// The full per-file extraction result (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFile {
    pub language: String,
    pub module_docstring: Option<String>,
    pub imports: Vec<String>,
    pub classes: Vec<ClassEntity>,
    pub functions: Vec<FunctionEntity>,
    pub calls: Vec<CallEntity>,
    pub errors: Vec<String>,
}

impl ParsedFile {
    /// The empty extraction an unsupported extension yields (spec.md §4.6).
    pub fn unknown() -> Self {
        Self { language: "unknown".to_string(), ..Self::default() }
    }
}
