use super::precedence::Precedence;

/// What to emit when a value slot has nothing plugged in.
#[derive(Debug, Clone, PartialEq)]
pub enum OnMissing {
    /// Fail with `MissingRequiredValue`
    Fail,
    /// The language's neutral placeholder (`None` for Python)
    Placeholder,
    /// A rule-chosen default literal
    Default(String),
}

/// One part of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum Piece {
    /// Literal text. May contain newlines; each line gets the current indent.
    Text(String),
    /// A value input, wrapped when looser than `required`.
    Value {
        input: String,
        required: Precedence,
        on_missing: OnMissing,
    },
    /// A statement input, generated one level deeper (`pass` when empty).
    Statements { input: String },
    /// Fixed text generated one level deeper.
    Body(Template),
}

/// Generated text with named slots, filled in by the walker.
///
/// Rules never indent or parenthesize themselves: the walker applies the
/// indentation prefix to text lines, indents nested chains and wraps value
/// slots, so those decisions happen in one place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pieces: Vec<Piece>,
    definition: Option<String>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        // Merge adjacent text so templates compare cleanly in tests
        if let Some(Piece::Text(last)) = self.pieces.last_mut() {
            last.push_str(&text);
        } else {
            self.pieces.push(Piece::Text(text));
        }
        self
    }

    /// Required value slot.
    pub fn value(self, input: &str, required: Precedence) -> Self {
        self.slot(input, required, OnMissing::Fail)
    }

    /// Optional value slot, filled with the language placeholder when empty.
    pub fn optional_value(self, input: &str, required: Precedence) -> Self {
        self.slot(input, required, OnMissing::Placeholder)
    }

    /// Optional value slot with a rule-chosen default.
    pub fn value_or(self, input: &str, required: Precedence, default: &str) -> Self {
        self.slot(input, required, OnMissing::Default(default.to_string()))
    }

    pub fn slot(mut self, input: &str, required: Precedence, on_missing: OnMissing) -> Self {
        self.pieces.push(Piece::Value { input: input.to_string(), required, on_missing });
        self
    }

    pub fn statements(mut self, input: &str) -> Self {
        self.pieces.push(Piece::Statements { input: input.to_string() });
        self
    }

    pub fn body(mut self, inner: Template) -> Self {
        self.pieces.push(Piece::Body(inner));
        self
    }

    /// Emit this statement into the definitions registry under `key` at
    /// indentation zero instead of in place.
    pub fn into_definition(mut self, key: impl Into<String>) -> Self {
        self.definition = Some(key.into());
        self
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn definition_key(&self) -> Option<&str> {
        self.definition.as_deref()
    }
}

/// A value rule's result: a template and the precedence of its outermost operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub template: Template,
    pub precedence: Precedence,
}

impl Expression {
    pub fn new(template: Template, precedence: Precedence) -> Self {
        Self { template, precedence }
    }

    /// A slot-free expression.
    pub fn code(code: impl Into<String>, precedence: Precedence) -> Self {
        Self::new(Template::new().text(code), precedence)
    }

    pub fn atomic(code: impl Into<String>) -> Self {
        Self::code(code, Precedence::ATOMIC)
    }
}
