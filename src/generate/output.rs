use serde::Serialize;

/// Line-level mapping from generated code back to the block that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapping {
    /// Zero-based line in the generated code
    pub gen_line: usize,
    pub block_id: String,
}

/// Output buffer that accumulates generated code with mappings
#[derive(Debug)]
pub struct Output {
    lines: Vec<String>,
    current_line: String,
    line_number: usize,
    mappings: Vec<Mapping>,
    indent_unit: String,
}

impl Output {
    pub fn new(indent_unit: &str) -> Self {
        Self {
            lines: Vec::new(),
            current_line: String::new(),
            line_number: 0,
            mappings: Vec::new(),
            indent_unit: indent_unit.to_string(),
        }
    }

    /// Add text to the current line
    pub fn push(&mut self, text: &str) {
        self.current_line.push_str(text);
    }

    /// Add the indentation prefix for `level`
    pub fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.current_line.push_str(&self.indent_unit);
        }
    }

    /// Add multi-line text, indenting every non-empty line at `level`
    pub fn push_lines(&mut self, text: &str, level: usize) {
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                self.newline();
            }
            if segment.is_empty() {
                continue;
            }
            if self.at_line_start() {
                self.indent(level);
            }
            self.push(segment);
        }
    }

    /// Add a newline
    pub fn newline(&mut self) {
        self.current_line.push('\n');
        self.lines.push(std::mem::take(&mut self.current_line));
        self.line_number += 1;
    }

    /// Terminate the current line if anything was written to it
    pub fn end_line(&mut self) {
        if !self.at_line_start() {
            self.newline();
        }
    }

    pub fn at_line_start(&self) -> bool {
        self.current_line.is_empty()
    }

    /// Record that the current line starts `block_id`'s code
    pub fn map_block(&mut self, block_id: &str) {
        self.mappings.push(Mapping {
            gen_line: self.line_number,
            block_id: block_id.to_string(),
        });
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Finish and return the generated code
    pub fn finish(mut self) -> (String, Vec<Mapping>) {
        if !self.current_line.is_empty() {
            self.lines.push(std::mem::take(&mut self.current_line));
        }
        (self.lines.join(""), self.mappings)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new("    ")
    }
}
