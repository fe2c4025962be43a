pub mod context;
pub mod names;
mod output;
pub mod precedence;
pub mod python;
pub mod rules;
pub mod template;
mod walker;

pub use context::{Definitions, GenerationContext};
pub use names::{NameAllocator, NameKind, PYTHON_RESERVED};
pub use output::{Mapping, Output};
pub use precedence::{needs_wrapping, Precedence};
pub use python::{standard_rules, PythonGenerator};
pub use rules::{Rule, RuleSet, StatementRule, ValueRule};
pub use template::{Expression, OnMissing, Piece, Template};
pub use walker::Walker;

use crate::block::Workspace;
use crate::error::GenerateError;
use serde::Serialize;

/// Generator options
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// One indentation step
    pub indent: String,
    /// Block nesting ceiling before `StructureTooDeep`
    pub max_depth: usize,
    /// Emit `name = None` for every workspace variable ahead of the program
    pub declare_variables: bool,
    /// Emit block comments as `#` lines
    pub emit_comments: bool,
    /// Parse the result with tree-sitter and fail on syntax errors
    pub verify_syntax: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            max_depth: 200,
            declare_variables: false,
            emit_comments: true,
            verify_syntax: false,
        }
    }
}

/// Generation result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateResult {
    pub code: String,
    pub mappings: Vec<Mapping>,
}

/// Generator trait - converts a workspace to code
pub trait Generator {
    fn generate(&self, workspace: &Workspace, options: &GenerateOptions) -> Result<GenerateResult, GenerateError>;
}
