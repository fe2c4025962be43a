//! Block-to-Python code generation.
//!
//! Takes a block program as serialized by the visual editor and produces
//! Python source: statement chains become indented statements, expression
//! blocks are parenthesized only where Python's precedence requires it, and
//! imports or helper functions a program needs are emitted once at the top.
//!
//! ```
//! use blockpy_codegen::{generate, Workspace};
//!
//! let workspace = Workspace::from_json(r#"{
//!     "blocks": {"blocks": [{
//!         "type": "text_print",
//!         "inputs": {"TEXT": {"block": {"type": "text", "fields": {"TEXT": "hi"}}}}
//!     }]}
//! }"#).unwrap();
//! assert_eq!(generate(&workspace).unwrap().code, "print('hi')\n");
//! ```

pub mod block;
pub mod error;
pub mod generate;
pub mod syntax;

pub use block::{Block, Workspace};
pub use error::GenerateError;
pub use generate::{
    standard_rules, GenerateOptions, GenerateResult, Generator, Mapping, PythonGenerator, RuleSet, Walker,
};
pub use syntax::{check_python, SyntaxError};

/// Generate Python for a workspace with default options.
pub fn generate(workspace: &Workspace) -> Result<GenerateResult, GenerateError> {
    generate_with(workspace, &GenerateOptions::default())
}

/// Generate Python for a workspace with the standard rule set.
pub fn generate_with(workspace: &Workspace, options: &GenerateOptions) -> Result<GenerateResult, GenerateError> {
    PythonGenerator::new().generate(workspace, options)
}
