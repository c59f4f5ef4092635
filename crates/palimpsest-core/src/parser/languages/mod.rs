//! One file per supported language, each a thin [`LanguageParser`] adapter
//! over a [`super::language::LanguageSpec`] plus [`super::language::parse_with_spec`].

mod csharp;
mod go;
mod java;
mod javascript;
mod python;
mod rust_lang;

pub use csharp::CSharpParser;
pub use go::GoParser;
pub use java::JavaParser;
pub use javascript::JavaScriptParser;
pub use python::PythonParser;
pub use rust_lang::RustParser;

use super::language::LanguageParser;

/// Every built-in parser, in the order extension lookup should prefer them.
pub fn all() -> Vec<Box<dyn LanguageParser>> {
    vec![
        Box::new(RustParser),
        Box::new(PythonParser),
        Box::new(JavaScriptParser),
        Box::new(GoParser),
        Box::new(JavaParser),
        Box::new(CSharpParser),
    ]
}
