use super::context::GenerationContext;
use super::names::NameAllocator;
use super::output::Output;
use super::precedence::{wrap, Precedence};
use super::rules::{Rule, RuleSet};
use super::template::{OnMissing, Piece, Template};
use super::{GenerateOptions, GenerateResult};
use crate::block::{Block, Workspace};
use crate::error::GenerateError;
use crate::syntax;
use log::{debug, trace};

/// Drives rules over a block tree.
///
/// Owns no per-pass state: everything mutable lives in the
/// [`GenerationContext`], so one walker can serve any number of passes.
pub struct Walker<'a> {
    rules: &'a RuleSet,
    options: &'a GenerateOptions,
}

impl<'a> Walker<'a> {
    pub fn new(rules: &'a RuleSet, options: &'a GenerateOptions) -> Self {
        Self { rules, options }
    }

    /// A fresh context using this rule set's reserved words and the depth ceiling.
    pub fn context(&self) -> GenerationContext {
        GenerationContext::new(
            NameAllocator::new(self.rules.reserved().iter().cloned()),
            self.options.max_depth,
        )
    }

    /// Generate a whole workspace in a fresh context.
    ///
    /// Workspace variables are allocated first, in declaration order, so user
    /// names keep their spelling ahead of engine-internal names.
    pub fn generate_workspace(&self, workspace: &Workspace) -> Result<GenerateResult, GenerateError> {
        let mut ctx = self.context();
        for variable in &workspace.variables {
            ctx.declare_variable(&variable.name);
        }
        if self.options.declare_variables && !ctx.declared_variables().is_empty() {
            let declarations: String = ctx
                .declared_variables()
                .iter()
                .map(|name| format!("{} = {}\n", name, self.rules.missing_value()))
                .collect();
            ctx.register_once("variables", declarations);
        }
        self.generate_program(workspace.roots(), &mut ctx)
    }

    /// Generate every root chain in order, then prepend the definitions.
    pub fn generate_program(
        &self,
        roots: &[Block],
        ctx: &mut GenerationContext,
    ) -> Result<GenerateResult, GenerateError> {
        debug!("generating {} top-level chain(s)", roots.len());

        let mut body = Output::new(&self.options.indent);
        for root in roots {
            self.emit_chain(Some(root), ctx, &mut body)?;
        }
        let (statements, mut mappings) = body.finish();

        // Function-sized definitions get a blank line on each side; imports stay packed
        let mut code = String::new();
        let mut previous_multiline = false;
        for (_, text) in ctx.definitions().iter() {
            let multiline = text.trim_end().contains('\n');
            if !code.is_empty() && (multiline || previous_multiline) {
                code.push('\n');
            }
            code.push_str(text);
            if !text.ends_with('\n') {
                code.push('\n');
            }
            previous_multiline = multiline;
        }
        if !code.is_empty() {
            code.push('\n');
            let shift = code.matches('\n').count();
            for mapping in &mut mappings {
                mapping.gen_line += shift;
            }
        }
        code.push_str(&statements);

        debug!(
            "generated {} line(s), {} definition(s)",
            code.lines().count(),
            ctx.definitions().len()
        );

        if self.options.verify_syntax {
            syntax::check_python(&code)?;
        }

        Ok(GenerateResult { code, mappings })
    }

    /// Generate the statement chain starting at `head` at the context's
    /// current indentation.
    pub fn generate_statement_chain(
        &self,
        head: &Block,
        ctx: &mut GenerationContext,
    ) -> Result<String, GenerateError> {
        let mut output = Output::new(&self.options.indent);
        self.emit_chain(Some(head), ctx, &mut output)?;
        Ok(output.finish().0)
    }

    /// Generate the block plugged into `slot` on `owner`, grouped when it binds
    /// looser than `required`.
    pub fn generate_value_input(
        &self,
        owner: &Block,
        slot: &str,
        required: Precedence,
        on_missing: &OnMissing,
        ctx: &mut GenerationContext,
    ) -> Result<String, GenerateError> {
        let child = owner.input_block(slot).filter(|block| block.is_enabled());
        let Some(child) = child else {
            return match on_missing {
                OnMissing::Fail => Err(GenerateError::MissingRequiredValue {
                    slot: slot.to_string(),
                    block: owner.id.clone(),
                }),
                OnMissing::Placeholder => Ok(self.rules.missing_value().to_string()),
                OnMissing::Default(literal) => Ok(literal.clone()),
            };
        };

        ctx.descend(&child.id)?;
        let expression = match self.rule_for(child)? {
            Rule::Value(rule) => rule(child, ctx)?,
            Rule::Statement(_) => return Err(unexpected_statement(child)),
        };
        let code = self.render_value(child, &expression.template, ctx)?;
        ctx.ascend();

        Ok(wrap(code, expression.precedence, required))
    }

    /// Emit a chain, skipping disabled blocks. Returns how many statements
    /// landed in `output` (hoisted definitions do not count).
    fn emit_chain(
        &self,
        head: Option<&Block>,
        ctx: &mut GenerationContext,
        output: &mut Output,
    ) -> Result<usize, GenerateError> {
        let mut emitted = 0;
        let mut current = head;
        while let Some(block) = current {
            if block.is_enabled() {
                if self.emit_statement(block, ctx, output)? {
                    emitted += 1;
                }
            } else {
                trace!("skipping disabled block {} ({})", block.id, block.kind);
            }
            current = block.next_block();
        }
        Ok(emitted)
    }

    fn emit_statement(
        &self,
        block: &Block,
        ctx: &mut GenerationContext,
        output: &mut Output,
    ) -> Result<bool, GenerateError> {
        ctx.descend(&block.id)?;
        trace!("block {} ({})", block.id, block.kind);

        let in_place = match self.rule_for(block)? {
            Rule::Statement(rule) => {
                let template = rule(block, ctx)?;
                match template.definition_key() {
                    Some(key) => {
                        self.hoist(block, &template, key, ctx)?;
                        false
                    }
                    None => {
                        self.emit_comment(block, ctx, output);
                        output.map_block(&block.id);
                        self.render_statement(block, &template, ctx, output)?;
                        true
                    }
                }
            }
            Rule::Value(rule) => {
                // A loose expression block at statement level
                let expression = rule(block, ctx)?;
                let code = self.render_value(block, &expression.template, ctx)?;
                self.emit_comment(block, ctx, output);
                output.map_block(&block.id);
                output.push_lines(&code, ctx.indent_level());
                output.newline();
                true
            }
        };

        ctx.ascend();
        Ok(in_place)
    }

    /// Render a statement at indentation zero into the definitions registry.
    fn hoist(
        &self,
        block: &Block,
        template: &Template,
        key: &str,
        ctx: &mut GenerationContext,
    ) -> Result<(), GenerateError> {
        let saved = ctx.set_indent(0);
        let mut hoisted = Output::new(&self.options.indent);
        self.emit_comment(block, ctx, &mut hoisted);
        let rendered = self.render_statement(block, template, ctx, &mut hoisted);
        ctx.set_indent(saved);
        rendered?;

        let (text, _) = hoisted.finish();
        ctx.register_once(key, text);
        Ok(())
    }

    fn emit_comment(&self, block: &Block, ctx: &GenerationContext, output: &mut Output) {
        if !self.options.emit_comments {
            return;
        }
        let Some(comment) = block.comment_text() else {
            return;
        };
        for line in comment.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                output.push_lines("#\n", ctx.indent_level());
            } else {
                output.push_lines(&format!("# {}\n", line), ctx.indent_level());
            }
        }
    }

    fn render_statement(
        &self,
        block: &Block,
        template: &Template,
        ctx: &mut GenerationContext,
        output: &mut Output,
    ) -> Result<(), GenerateError> {
        for piece in template.pieces() {
            match piece {
                Piece::Text(text) => output.push_lines(text, ctx.indent_level()),
                Piece::Value { input, required, on_missing } => {
                    let code = self.generate_value_input(block, input, *required, on_missing, ctx)?;
                    if output.at_line_start() {
                        output.indent(ctx.indent_level());
                    }
                    output.push(&code);
                }
                Piece::Statements { input } => {
                    output.end_line();
                    ctx.indent_in();
                    let emitted = self.emit_chain(block.statement_block(input), ctx, output)?;
                    if emitted == 0 {
                        output.push_lines(self.rules.empty_body(), ctx.indent_level());
                        output.end_line();
                    }
                    ctx.indent_out();
                }
                Piece::Body(inner) => {
                    output.end_line();
                    ctx.indent_in();
                    self.render_statement(block, inner, ctx, output)?;
                    ctx.indent_out();
                }
            }
        }
        output.end_line();
        Ok(())
    }

    fn render_value(
        &self,
        block: &Block,
        template: &Template,
        ctx: &mut GenerationContext,
    ) -> Result<String, GenerateError> {
        let mut code = String::new();
        for piece in template.pieces() {
            match piece {
                Piece::Text(text) => code.push_str(text),
                Piece::Value { input, required, on_missing } => {
                    code.push_str(&self.generate_value_input(block, input, *required, on_missing, ctx)?);
                }
                Piece::Statements { .. } | Piece::Body(_) => return Err(unexpected_statement(block)),
            }
        }
        Ok(code)
    }

    fn rule_for(&self, block: &Block) -> Result<Rule, GenerateError> {
        self.rules.get(&block.kind).ok_or_else(|| GenerateError::UnknownBlockType {
            tag: block.kind.clone(),
            block: block.id.clone(),
        })
    }
}

fn unexpected_statement(block: &Block) -> GenerateError {
    GenerateError::UnexpectedStatement {
        tag: block.kind.clone(),
        block: block.id.clone(),
    }
}
