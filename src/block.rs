use serde::Deserialize;
use std::collections::BTreeMap;

/// A workspace as serialized by the block editor.
///
/// Mirrors Blockly's JSON serialization:
/// `{"blocks": {"languageVersion": 0, "blocks": [...]}, "variables": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub blocks: TopBlocks,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
}

/// The ordered list of top-level statement chains.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopBlocks {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// A variable declared on the workspace.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariableDecl {
    pub id: String,
    pub name: String,
}

/// One visual program unit (statement or expression).
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub inputs: BTreeMap<String, Connection>,
    #[serde(default)]
    pub next: Option<Connection>,
    /// Legacy disabled flag (`"disabled": true`)
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Why the editor disabled the block; any reason disables it
    #[serde(default, rename = "disabledReasons")]
    pub disabled_reasons: Vec<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub icons: Option<Icons>,
    /// Mutator state (`elseIfCount`, `itemCount`, procedure params, ...)
    #[serde(default, rename = "extraState")]
    pub extra_state: Option<serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// Something plugged into an input or `next` connection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub block: Option<Box<Block>>,
    #[serde(default)]
    pub shadow: Option<Box<Block>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Icons {
    #[serde(default)]
    pub comment: Option<CommentIcon>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentIcon {
    pub text: String,
}

/// Literal value of a block field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Variable(VariableRef),
}

/// Variable field: `{"id": "..."}`, optionally with the name inlined.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct VariableRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl Block {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            kind: kind.into(),
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            next: None,
            disabled: false,
            enabled: true,
            disabled_reasons: Vec::new(),
            comment: None,
            icons: None,
            extra_state: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Connect `child` to the named input (value or statement).
    pub fn with_input(mut self, name: &str, child: Block) -> Self {
        self.inputs.entry(name.to_string()).or_default().block = Some(Box::new(child));
        self
    }

    pub fn with_shadow(mut self, name: &str, shadow: Block) -> Self {
        self.inputs.entry(name.to_string()).or_default().shadow = Some(Box::new(shadow));
        self
    }

    /// Append `block` as the next statement in this block's chain.
    pub fn with_next(mut self, block: Block) -> Self {
        self.next = Some(Connection { block: Some(Box::new(block)), shadow: None });
        self
    }

    pub fn with_extra_state(mut self, state: serde_json::Value) -> Self {
        self.extra_state = Some(state);
        self
    }

    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.disabled && self.disabled_reasons.is_empty()
    }

    pub fn next_block(&self) -> Option<&Block> {
        self.next.as_ref().and_then(|c| c.block.as_deref())
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text of a dropdown or text field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn field_number(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn field_bool(&self, name: &str) -> Option<bool> {
        match self.fields.get(name)? {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(text) => match text.as_str() {
                "TRUE" | "true" => Some(true),
                "FALSE" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// User-facing name held by a variable field.
    pub fn variable(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Variable(var) => var.name.as_deref(),
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// Block connected to an input, falling back to its shadow.
    pub fn input_block(&self, name: &str) -> Option<&Block> {
        let connection = self.inputs.get(name)?;
        connection.block.as_deref().or(connection.shadow.as_deref())
    }

    /// Head of the statement chain plugged into a statement input.
    pub fn statement_block(&self, name: &str) -> Option<&Block> {
        self.inputs.get(name)?.block.as_deref()
    }

    pub fn comment_text(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .or_else(|| self.icons.as_ref()?.comment.as_ref().map(|c| c.text.as_str()))
    }

    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra_state.as_ref()?.get(key)
    }

    pub fn extra_usize(&self, key: &str) -> Option<usize> {
        let value = self.extra(key)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(|n| n as usize)
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        let value = self.extra(key)?;
        value.as_bool().or_else(|| value.as_str().map(|s| s == "true"))
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra(key)?.as_str()
    }

    /// Move every connected block (inputs, shadows and `next`) onto `stack`.
    fn detach_children(&mut self, stack: &mut Vec<Box<Block>>) {
        let connections = std::mem::take(&mut self.inputs).into_values().chain(self.next.take());
        for connection in connections {
            stack.extend(connection.block);
            stack.extend(connection.shadow);
        }
    }
}

// Blockly nests every `next` inside the previous block, so a long program is a
// very deep tree. Tear it down with an explicit stack instead of recursion.
impl Drop for Block {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        self.detach_children(&mut stack);
        while let Some(mut block) = stack.pop() {
            block.detach_children(&mut stack);
        }
    }
}

impl Workspace {
    pub fn new(roots: Vec<Block>) -> Self {
        Self {
            blocks: TopBlocks { blocks: roots },
            variables: Vec::new(),
        }
    }

    pub fn with_variable(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.variables.push(VariableDecl { id: id.into(), name: name.into() });
        self
    }

    /// Parse a serialized workspace and resolve variable fields by id.
    ///
    /// Statement chains nest through `next`, so the JSON of a long program is
    /// as deep as the program is long. Parsing grows the stack on the heap
    /// instead of hitting serde_json's recursion limit.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let mut workspace = Workspace::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        workspace.resolve_variables();
        Ok(workspace)
    }

    pub fn roots(&self) -> &[Block] {
        &self.blocks.blocks
    }

    fn resolve_variables(&mut self) {
        let names: BTreeMap<String, String> = self
            .variables
            .iter()
            .map(|v| (v.id.clone(), v.name.clone()))
            .collect();
        let mut pending: Vec<&mut Block> = self.blocks.blocks.iter_mut().collect();
        while let Some(block) = pending.pop() {
            let Block { fields, inputs, next, .. } = block;
            for value in fields.values_mut() {
                if let FieldValue::Variable(var) = value {
                    if var.name.is_none() {
                        var.name = var.id.as_ref().and_then(|id| names.get(id)).cloned();
                    }
                }
            }
            for Connection { block: child, shadow } in inputs.values_mut().chain(next.as_mut()) {
                pending.extend(child.as_deref_mut());
                pending.extend(shadow.as_deref_mut());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blockly_json() {
        let json = r#"{
            "blocks": {
                "languageVersion": 0,
                "blocks": [{
                    "type": "variables_set",
                    "id": "set1",
                    "x": 20, "y": 20,
                    "fields": {"VAR": {"id": "v1"}},
                    "inputs": {"VALUE": {"block": {"type": "math_number", "id": "n1", "fields": {"NUM": 0}}}},
                    "next": {"block": {"type": "text_print", "id": "p1", "enabled": false}}
                }]
            },
            "variables": [{"name": "count", "id": "v1"}]
        }"#;
        let workspace = Workspace::from_json(json).unwrap();
        let root = &workspace.roots()[0];

        assert_eq!(root.kind, "variables_set");
        assert_eq!(root.variable("VAR"), Some("count"));
        assert_eq!(root.input_block("VALUE").unwrap().field_number("NUM"), Some(0.0));

        let next = root.next_block().unwrap();
        assert_eq!(next.id, "p1");
        assert!(!next.is_enabled());
    }

    #[test]
    fn test_shadow_fallback() {
        let block = Block::new("controls_repeat_ext")
            .with_shadow("TIMES", Block::new("math_number").with_field("NUM", 10.0));
        assert_eq!(block.input_block("TIMES").unwrap().field_number("NUM"), Some(10.0));
        assert!(block.statement_block("TIMES").is_none());

        let block = block.with_input("TIMES", Block::new("variables_get"));
        assert_eq!(block.input_block("TIMES").unwrap().kind, "variables_get");
    }

    #[test]
    fn test_legacy_disabled_and_comment() {
        let json = r#"{"type": "text_print", "disabled": true, "comment": "say hi"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert!(!block.is_enabled());
        assert_eq!(block.comment_text(), Some("say hi"));

        let json = r#"{"type": "text_print", "icons": {"comment": {"text": "pinned", "pinned": true}}}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert!(block.is_enabled());
        assert_eq!(block.comment_text(), Some("pinned"));
    }

    #[test]
    fn test_long_chain_parses_and_drops() {
        let mut json = String::from(r#"{"blocks": {"blocks": ["#);
        let length = 10_000;
        for _ in 0..length {
            json.push_str(r#"{"type": "text_print", "next": {"block": "#);
        }
        json.push_str(r#"{"type": "text_print"}"#);
        for _ in 0..length {
            json.push_str("}}");
        }
        json.push_str("]}}");

        let workspace = Workspace::from_json(&json).unwrap();
        let mut count = 0;
        let mut current = workspace.roots().first();
        while let Some(block) = current {
            count += 1;
            current = block.next_block();
        }
        assert_eq!(count, length + 1);
        drop(workspace);
    }

    #[test]
    fn test_deep_nesting_resolves_variables() {
        let depth = 5_000;
        let mut json = String::from(r#"{"variables": [{"name": "n", "id": "v"}], "blocks": {"blocks": ["#);
        for _ in 0..depth {
            json.push_str(r#"{"type": "controls_repeat", "inputs": {"DO": {"block": "#);
        }
        json.push_str(r#"{"type": "variables_get", "fields": {"VAR": {"id": "v"}}}"#);
        for _ in 0..depth {
            json.push_str("}}}");
        }
        json.push_str("]}}");

        let workspace = Workspace::from_json(&json).unwrap();
        let mut innermost = &workspace.roots()[0];
        while let Some(child) = innermost.statement_block("DO") {
            innermost = child;
        }
        assert_eq!(innermost.variable("VAR"), Some("n"));
    }

    #[test]
    fn test_disabled_reasons() {
        let json = r#"{"type": "text_print", "disabledReasons": ["MANUALLY_DISABLED"]}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert!(!block.is_enabled());

        let json = r#"{"type": "text_print", "disabledReasons": []}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert!(block.is_enabled());
    }

    #[test]
    fn test_extra_state_accessors() {
        let block = Block::new("controls_if")
            .with_extra_state(serde_json::json!({"elseIfCount": 2, "hasElse": true, "name": "go"}));
        assert_eq!(block.extra_usize("elseIfCount"), Some(2));
        assert_eq!(block.extra_bool("hasElse"), Some(true));
        assert_eq!(block.extra_str("name"), Some("go"));
        assert_eq!(block.extra_usize("missing"), None);
    }
}
