use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "java",
    extensions: &["java"],
    grammar: || tree_sitter_java::LANGUAGE.into(),
    function_kinds: &["method_declaration", "constructor_declaration"],
    class_kinds: &["class_declaration", "interface_declaration", "enum_declaration"],
    import_kinds: &["import_declaration"],
    call_kinds: &["method_invocation"],
    comment_kinds: &["line_comment", "block_comment"],
    python_style_docstring: false,
};

pub struct JavaParser;

impl LanguageParser for JavaParser {
    fn language(&self) -> &'static str {
        SPEC.name
    }

    fn extensions(&self) -> &'static [&'static str] {
        SPEC.extensions
    }

    fn parse(&self, source: &str, path: &Path) -> Result<ParsedFile> {
        parse_with_spec(&SPEC, source, path)
    }
}
