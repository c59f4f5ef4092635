use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "rust",
    extensions: &["rs"],
    grammar: || tree_sitter_rust::LANGUAGE.into(),
    function_kinds: &["function_item"],
    class_kinds: &["struct_item", "enum_item", "trait_item", "impl_item"],
    import_kinds: &["use_declaration"],
    call_kinds: &["call_expression", "macro_invocation"],
    comment_kinds: &["line_comment", "block_comment"],
    python_style_docstring: false,
};

pub struct RustParser;

impl LanguageParser for RustParser {
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
    fn extracts_function_and_struct_and_call() {
        let source = r#"
struct Widget {
    size: u32,
}

impl Widget {
    fn area(&self) -> u32 {
        compute(self.size)
    }
}

fn compute(n: u32) -> u32 {
    n * n
}
"#;
        let parsed = RustParser.parse(source, Path::new("widget.rs")).unwrap();
        assert_eq!(parsed.language, "rust");
        assert!(parsed.classes.iter().any(|c| c.name == "Widget"));
        assert!(parsed.functions.iter().any(|f| f.name == "area" && f.containing_class.as_deref() == Some("Widget")));
        assert!(parsed.functions.iter().any(|f| f.name == "compute" && f.containing_class.is_none()));
        assert!(parsed.calls.iter().any(|c| c.callee == "compute"));
    }
}
