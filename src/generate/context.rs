use super::names::{NameAllocator, NameKind};
use crate::error::GenerateError;
use indexmap::IndexMap;
use log::trace;
use std::collections::HashMap;

/// One-time top-level definitions (imports, helper functions, hoisted
/// procedures), keyed by a caller-chosen key.
///
/// The first registration of a key wins; later registrations are no-ops.
/// Iteration follows first-registration order.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    entries: IndexMap<String, String>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` under `key` unless the key is already present.
    /// Returns `true` when this call stored the text.
    pub fn register_once(&mut self, key: impl Into<String>, text: impl Into<String>) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        trace!("registered definition {:?}", key);
        self.entries.insert(key, text.into());
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions in first-registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Per-pass mutable state threaded through the walk.
#[derive(Debug)]
pub struct GenerationContext {
    pub names: NameAllocator,
    definitions: Definitions,
    functions: HashMap<String, String>,
    variables: Vec<String>,
    indent: usize,
    depth: usize,
    max_depth: usize,
}

impl GenerationContext {
    pub fn new(names: NameAllocator, max_depth: usize) -> Self {
        Self {
            names,
            definitions: Definitions::new(),
            functions: HashMap::new(),
            variables: Vec::new(),
            indent: 0,
            depth: 0,
            max_depth,
        }
    }

    /// See [`Definitions::register_once`].
    pub fn register_once(&mut self, key: impl Into<String>, text: impl Into<String>) -> bool {
        self.definitions.register_once(key, text)
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Register a helper function once and return the name it was given.
    ///
    /// `build` receives the allocated name and returns the full function text.
    /// Repeated requests for the same `desired` name return the first name.
    pub fn provide_function<F>(&mut self, desired: &str, build: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if let Some(name) = self.functions.get(desired) {
            return name.clone();
        }
        let name = self.names.distinct(desired);
        let text = build(&name);
        self.definitions.register_once(format!("fn:{}", desired), text);
        self.functions.insert(desired.to_string(), name.clone());
        name
    }

    /// Allocate a workspace variable up front and remember it as declared.
    pub fn declare_variable(&mut self, raw: &str) -> String {
        let name = self.names.allocate(NameKind::Variable, raw);
        if !self.variables.contains(&name) {
            self.variables.push(name.clone());
        }
        name
    }

    /// Safe names of the declared workspace variables, in declaration order.
    pub fn declared_variables(&self) -> &[String] {
        &self.variables
    }

    /// Current nesting level of statement text.
    pub fn indent_level(&self) -> usize {
        self.indent
    }

    pub(crate) fn set_indent(&mut self, level: usize) -> usize {
        std::mem::replace(&mut self.indent, level)
    }

    pub(crate) fn indent_in(&mut self) {
        self.indent += 1;
    }

    pub(crate) fn indent_out(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Enter one level of block nesting, failing past the ceiling.
    pub(crate) fn descend(&mut self, block_id: &str) -> Result<(), GenerateError> {
        if self.depth >= self.max_depth {
            return Err(GenerateError::StructureTooDeep {
                block: block_id.to_string(),
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
