use crate::syntax::SyntaxError;
use thiserror::Error;

/// Failure of a generation pass. No partial output accompanies an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("no generator rule for block type '{tag}' (block {block})")]
    UnknownBlockType { tag: String, block: String },

    #[error("block nesting exceeds {limit} levels at block {block}")]
    StructureTooDeep { block: String, limit: usize },

    #[error("required input '{slot}' is empty on block {block}")]
    MissingRequiredValue { slot: String, block: String },

    #[error("statement block '{tag}' used where a value is expected (block {block})")]
    UnexpectedStatement { tag: String, block: String },

    #[error("invalid block {block}: {message}")]
    InvalidBlock { block: String, message: String },

    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl GenerateError {
    pub fn invalid_block(block: &crate::block::Block, message: impl Into<String>) -> Self {
        GenerateError::InvalidBlock { block: block.id.clone(), message: message.into() }
    }

    /// Shorthand for a field a rule cannot do without.
    pub fn missing_field(block: &crate::block::Block, field: &str) -> Self {
        Self::invalid_block(block, format!("field '{}' is missing or has the wrong type", field))
    }

    /// Id of the block the host should highlight.
    pub fn block_id(&self) -> Option<&str> {
        match self {
            GenerateError::UnknownBlockType { block, .. }
            | GenerateError::StructureTooDeep { block, .. }
            | GenerateError::MissingRequiredValue { block, .. }
            | GenerateError::UnexpectedStatement { block, .. }
            | GenerateError::InvalidBlock { block, .. } => Some(block),
            GenerateError::Syntax(_) => None,
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            GenerateError::UnknownBlockType { .. } => {
                Some("the block catalog and the generator are out of sync; register a rule for this type")
            }
            GenerateError::StructureTooDeep { .. } => {
                Some("check the program for a cycle, or raise the depth limit")
            }
            GenerateError::MissingRequiredValue { .. } => Some("plug a block into the empty input"),
            GenerateError::UnexpectedStatement { .. } => {
                Some("only blocks with an output connection can fill a value input")
            }
            GenerateError::InvalidBlock { .. } | GenerateError::Syntax(_) => None,
        }
    }

    /// Render the error as a single consolidated message
    pub fn render(&self, filename: &str) -> String {
        self.render_inner(filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, filename: &str) -> String {
        self.render_inner(filename, true)
    }

    fn render_inner(&self, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');
        output.push_str(&format!(" {}file:{} {}\n", dim, reset, filename));
        output.push_str(&format!("{}error:{} {}\n", red, reset, self));

        if let Some(block) = self.block_id() {
            output.push_str(&format!("{}   |{} block {}\n", dim, reset, block));
        }
        if let GenerateError::Syntax(err) = self {
            output.push_str(&format!("{}{:>3} |{} {}\n", dim, err.line, reset, err.text));
            output.push_str(&format!(
                "{}   |{} {}{}^{}\n",
                dim,
                reset,
                " ".repeat(err.column.saturating_sub(1)),
                red,
                reset
            ));
        }

        if let Some(help) = self.help() {
            output.push('\n');
            output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help));
        }

        output.push('\n');
        output
    }
}
