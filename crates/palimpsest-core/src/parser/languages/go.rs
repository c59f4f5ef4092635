use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "go",
    extensions: &["go"],
    grammar: || tree_sitter_go::LANGUAGE.into(),
    function_kinds: &["function_declaration", "method_declaration"],
    class_kinds: &["type_spec"],
    import_kinds: &["import_declaration"],
    call_kinds: &["call_expression"],
    comment_kinds: &["comment"],
    python_style_docstring: false,
};

pub struct GoParser;

impl LanguageParser for GoParser {
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
    fn extracts_function_type_import_and_call() {
        let source = r#"
package widget

import "fmt"

type Widget struct {
    Size int
}

func compute(n int) int {
    return n * n
}

func (w *Widget) Area() int {
    return compute(w.Size)
}
"#;
        let parsed = GoParser.parse(source, Path::new("widget.go")).unwrap();
        assert_eq!(parsed.language, "go");
        assert!(parsed.imports.iter().any(|i| i.contains("fmt")));
        assert!(parsed.classes.iter().any(|c| c.name == "Widget"));
        assert!(parsed.functions.iter().any(|f| f.name == "compute"));
        assert!(parsed.calls.iter().any(|c| c.callee == "compute"));
    }
}
