use super::context::GenerationContext;
use super::template::{Expression, Template};
use crate::block::Block;
use crate::error::GenerateError;
use std::collections::HashMap;

pub type ValueRule = fn(&Block, &mut GenerationContext) -> Result<Expression, GenerateError>;
pub type StatementRule = fn(&Block, &mut GenerationContext) -> Result<Template, GenerateError>;

/// Generator for one block type.
#[derive(Clone, Copy)]
pub enum Rule {
    /// Expression-producing block
    Value(ValueRule),
    /// Statement block
    Statement(StatementRule),
}

/// Block-type tag → rule table, plus the target language's naming profile.
///
/// Immutable once built; share it freely between generation calls.
#[derive(Clone)]
pub struct RuleSet {
    rules: HashMap<String, Rule>,
    reserved_words: Vec<String>,
    placeholder: String,
    empty_body: String,
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            reserved_words: Vec::new(),
            placeholder: "None".to_string(),
            empty_body: "pass".to_string(),
        }
    }

    pub fn value(mut self, tag: &str, rule: ValueRule) -> Self {
        self.rules.insert(tag.to_string(), Rule::Value(rule));
        self
    }

    pub fn statement(mut self, tag: &str, rule: StatementRule) -> Self {
        self.rules.insert(tag.to_string(), Rule::Statement(rule));
        self
    }

    pub fn reserved_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_words.extend(words.into_iter().map(Into::into));
        self
    }

    /// Text emitted for an empty optional value slot.
    pub fn placeholder(mut self, text: &str) -> Self {
        self.placeholder = text.to_string();
        self
    }

    /// Statement emitted for a nested chain with nothing in it.
    pub fn empty_statement(mut self, text: &str) -> Self {
        self.empty_body = text.to_string();
        self
    }

    pub fn get(&self, tag: &str) -> Option<Rule> {
        self.rules.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.rules.contains_key(tag)
    }

    pub fn reserved(&self) -> &[String] {
        &self.reserved_words
    }

    pub fn missing_value(&self) -> &str {
        &self.placeholder
    }

    pub fn empty_body(&self) -> &str {
        &self.empty_body
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("tags", &self.tags())
            .field("placeholder", &self.placeholder)
            .field("empty_body", &self.empty_body)
            .finish()
    }
}
