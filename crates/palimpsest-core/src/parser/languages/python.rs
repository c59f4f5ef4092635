use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "python",
    extensions: &["py", "pyi"],
    grammar: || tree_sitter_python::LANGUAGE.into(),
    function_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    import_kinds: &["import_statement", "import_from_statement"],
    call_kinds: &["call"],
    comment_kinds: &["comment"],
    python_style_docstring: true,
};

pub struct PythonParser;

impl LanguageParser for PythonParser {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_module_docstring_class_method_and_import() {
        let source = r#""""Widgets for the warehouse module."""
import os

class Widget:
    def area(self):
        return compute(self.size)

def compute(n):
    return n * n
"#;
        let parsed = PythonParser.parse(source, Path::new("widget.py")).unwrap();
        assert_eq!(parsed.language, "python");
        assert_eq!(parsed.module_docstring.as_deref(), Some("Widgets for the warehouse module."));
        assert!(parsed.imports.iter().any(|i| i.contains("os")));
        assert!(parsed.classes.iter().any(|c| c.name == "Widget"));
        assert!(parsed.functions.iter().any(|f| f.name == "area" && f.containing_class.as_deref() == Some("Widget")));
        assert!(parsed.calls.iter().any(|c| c.callee == "compute"));
    }
}
