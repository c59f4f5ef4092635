use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "javascript",
    extensions: &["js", "jsx", "mjs", "cjs"],
    grammar: || tree_sitter_javascript::LANGUAGE.into(),
    function_kinds: &["function_declaration", "method_definition", "arrow_function"],
    class_kinds: &["class_declaration"],
    import_kinds: &["import_statement"],
    call_kinds: &["call_expression"],
    comment_kinds: &["comment"],
    python_style_docstring: false,
};

pub struct JavaScriptParser;

impl LanguageParser for JavaScriptParser {
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
