use std::path::Path;

use crate::parser::language::{parse_with_spec, LanguageParser, LanguageSpec};
use crate::parser::model::{ParsedFile, Result};

const SPEC: LanguageSpec = LanguageSpec {
    name: "csharp",
    extensions: &["cs"],
    grammar: || tree_sitter_c_sharp::LANGUAGE.into(),
    function_kinds: &["method_declaration", "constructor_declaration", "local_function_statement"],
    class_kinds: &["class_declaration", "interface_declaration", "struct_declaration", "enum_declaration"],
    import_kinds: &["using_directive"],
    call_kinds: &["invocation_expression"],
    comment_kinds: &["comment"],
    python_style_docstring: false,
};

pub struct CSharpParser;

impl LanguageParser for CSharpParser {
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
    fn extracts_class_method_import_and_call() {
        let source = r#"
using System;

class Widget {
    int Area() {
        return Compute(this.size);
    }
}
"#;
        let parsed = CSharpParser.parse(source, Path::new("Widget.cs")).unwrap();
        assert_eq!(parsed.language, "csharp");
        assert!(parsed.imports.iter().any(|i| i.contains("System")));
        assert!(parsed.classes.iter().any(|c| c.name == "Widget"));
        assert!(parsed.functions.iter().any(|f| f.name == "Area" && f.containing_class.as_deref() == Some("Widget")));
        assert!(parsed.calls.iter().any(|c| c.callee == "Compute"));
    }
}
