use super::context::GenerationContext;
use super::names::{NameKind, PYTHON_RESERVED};
use super::precedence::Precedence;
use super::rules::RuleSet;
use super::template::{Expression, Template};
use super::walker::Walker;
use super::{GenerateOptions, GenerateResult, Generator};
use crate::block::{Block, FieldValue, Workspace};
use crate::error::GenerateError;
use serde_json::Value;

type ValueResult = Result<Expression, GenerateError>;
type StatementResult = Result<Template, GenerateError>;

/// The standard Python rule set: core control flow, logic, math, text,
/// variables and procedures, plus the robot's action block.
pub fn standard_rules() -> RuleSet {
    RuleSet::new()
        .reserved_words(PYTHON_RESERVED.iter().copied())
        .placeholder("None")
        .empty_statement("pass")
        // Control flow
        .statement("controls_if", controls_if)
        .statement("controls_repeat", controls_repeat)
        .statement("controls_repeat_ext", controls_repeat_ext)
        .statement("controls_whileUntil", controls_while_until)
        .statement("controls_for", controls_for)
        .statement("controls_forEach", controls_for_each)
        .statement("controls_flow_statements", controls_flow_statements)
        // Logic
        .value("logic_compare", logic_compare)
        .value("logic_operation", logic_operation)
        .value("logic_negate", logic_negate)
        .value("logic_boolean", logic_boolean)
        .value("logic_null", logic_null)
        .value("logic_ternary", logic_ternary)
        // Math
        .value("math_number", math_number)
        .value("math_arithmetic", math_arithmetic)
        .value("math_single", math_single)
        .value("math_modulo", math_modulo)
        .value("math_random_int", math_random_int)
        .statement("math_change", math_change)
        // Text
        .value("text", text)
        .value("text_join", text_join)
        .value("text_length", text_length)
        .statement("text_print", text_print)
        // Variables
        .value("variables_get", variables_get)
        .statement("variables_set", variables_set)
        // Procedures
        .statement("procedures_defnoreturn", procedures_def)
        .statement("procedures_defreturn", procedures_def)
        .statement("procedures_callnoreturn", procedures_call_statement)
        .value("procedures_callreturn", procedures_call_value)
        .statement("procedures_ifreturn", procedures_if_return)
        // Robot
        .statement("AlienbotPi_action", alienbot_action)
}

/// Python code generator over a [`RuleSet`] (the standard one by default).
pub struct PythonGenerator {
    rules: RuleSet,
}

impl PythonGenerator {
    pub fn new() -> Self {
        Self { rules: standard_rules() }
    }

    /// Generator over a custom rule set, e.g. the standard one extended with
    /// extra block types.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl Default for PythonGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for PythonGenerator {
    fn generate(&self, workspace: &Workspace, options: &GenerateOptions) -> Result<GenerateResult, GenerateError> {
        Walker::new(&self.rules, options).generate_workspace(workspace)
    }
}

/// Quote `text` as a Python string literal, choosing quotes the way `repr` does.
pub fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(delimiter);
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                quoted.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => quoted.push(c),
        }
    }
    quoted.push(delimiter);
    quoted
}

fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "float('nan')".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "float('inf')".to_string() } else { "-float('inf')".to_string() }
    } else {
        format!("{}", n)
    }
}

/// Enabled block in a value input, falling back to the shadow.
fn connected<'b>(block: &'b Block, input: &str) -> Option<&'b Block> {
    block.input_block(input).filter(|child| child.is_enabled())
}

/// Literal number in `input`: `Some(default)` when empty, `None` when the
/// input holds anything other than a number block.
fn literal_or(block: &Block, input: &str, default: f64) -> Option<f64> {
    match connected(block, input) {
        None => Some(default),
        Some(child) if child.kind == "math_number" => child.field_number("NUM"),
        Some(_) => None,
    }
}

fn field<'b>(block: &'b Block, name: &str) -> Result<&'b str, GenerateError> {
    block.field_str(name).ok_or_else(|| GenerateError::missing_field(block, name))
}

fn variable_name(block: &Block, field: &str, ctx: &mut GenerationContext) -> Result<String, GenerateError> {
    let raw = block.variable(field).ok_or_else(|| GenerateError::missing_field(block, field))?;
    Ok(ctx.names.allocate(NameKind::Variable, raw))
}

fn require_math(ctx: &mut GenerationContext) {
    ctx.register_once("import math", "import math");
}

/// One past the highest `{prefix}N` input present on the block.
fn numbered_inputs(block: &Block, prefix: &str) -> usize {
    block
        .inputs
        .keys()
        .filter_map(|name| name.strip_prefix(prefix)?.parse::<usize>().ok())
        .map(|n| n + 1)
        .max()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Control flow

fn controls_if(block: &Block, _ctx: &mut GenerationContext) -> StatementResult {
    let else_ifs = block
        .extra_usize("elseIfCount")
        .unwrap_or(0)
        .max(numbered_inputs(block, "IF").saturating_sub(1));
    let has_else = block.extra_bool("hasElse").unwrap_or(false) || block.has_input("ELSE");

    let mut template = Template::new()
        .text("if ")
        .value_or("IF0", Precedence::NONE, "False")
        .text(":")
        .statements("DO0");
    for n in 1..=else_ifs {
        template = template
            .text("elif ")
            .value_or(&format!("IF{}", n), Precedence::NONE, "False")
            .text(":")
            .statements(&format!("DO{}", n));
    }
    if has_else {
        template = template.text("else:").statements("ELSE");
    }
    Ok(template)
}

fn controls_repeat(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let times = block
        .field_number("TIMES")
        .ok_or_else(|| GenerateError::missing_field(block, "TIMES"))?;
    let counter = ctx.names.distinct("i");
    Ok(Template::new()
        .text(format!("for {} in range({}):", counter, times.max(0.0).trunc()))
        .statements("DO"))
}

fn controls_repeat_ext(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let counter = ctx.names.distinct("i");
    let integer_literal = connected(block, "TIMES")
        .filter(|child| child.kind == "math_number")
        .and_then(|child| child.field_number("NUM"))
        .is_some_and(|n| n.fract() == 0.0);

    let template = Template::new().text(format!("for {} in range(", counter));
    let template = if integer_literal || connected(block, "TIMES").is_none() {
        template.value("TIMES", Precedence::NONE)
    } else {
        template.text("int(").value("TIMES", Precedence::NONE).text(")")
    };
    Ok(template.text("):").statements("DO"))
}

fn controls_while_until(block: &Block, _ctx: &mut GenerationContext) -> StatementResult {
    let until = block.field_str("MODE") == Some("UNTIL");
    let template = if until {
        Template::new().text("while not ").value_or("BOOL", Precedence::LOGICAL_NOT, "False")
    } else {
        Template::new().text("while ").value_or("BOOL", Precedence::NONE, "False")
    };
    Ok(template.text(":").statements("DO"))
}

fn controls_for(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let variable = variable_name(block, "VAR", ctx)?;

    let from = literal_or(block, "FROM", 0.0);
    let to = literal_or(block, "TO", 0.0);
    let by = literal_or(block, "BY", 1.0);
    if let (Some(from), Some(to), Some(by)) = (from, to, by) {
        if let Some(range) = literal_range(from, to, by) {
            return Ok(Template::new()
                .text(format!("for {} in {}:", variable, range))
                .statements("DO"));
        }
    }

    let helper = ctx.provide_function("inclusive_range", |name| {
        format!(
            "def {}(start, stop, step):\n    step = abs(step) or 1\n    if start <= stop:\n        while start <= stop:\n            yield start\n            start += step\n    else:\n        while start >= stop:\n            yield start\n            start -= step\n",
            name
        )
    });
    Ok(Template::new()
        .text(format!("for {} in {}(", variable, helper))
        .value_or("FROM", Precedence::NONE, "0")
        .text(", ")
        .value_or("TO", Precedence::NONE, "0")
        .text(", ")
        .value_or("BY", Precedence::NONE, "1")
        .text("):")
        .statements("DO"))
}

/// Largest magnitude below which every integer is an exact `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// `range(...)` for integral literal bounds, or `None` when the bounds are
/// fractional or too large to do integer arithmetic on.
fn literal_range(from: f64, to: f64, by: f64) -> Option<String> {
    let exact = |n: f64| n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER;
    if !(exact(from) && exact(to) && exact(by)) {
        return None;
    }
    let (from, to) = (from as i64, to as i64);
    let step = match (by as i64).checked_abs()? {
        0 => 1,
        step => step,
    };
    let range = if from <= to {
        let stop = to.checked_add(1)?;
        match (from, step) {
            (0, 1) => format!("range({})", stop),
            (_, 1) => format!("range({}, {})", from, stop),
            _ => format!("range({}, {}, {})", from, stop, step),
        }
    } else {
        format!("range({}, {}, {})", from, to.checked_sub(1)?, step.checked_neg()?)
    };
    Some(range)
}

fn controls_for_each(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let variable = variable_name(block, "VAR", ctx)?;
    Ok(Template::new()
        .text(format!("for {} in ", variable))
        .value_or("LIST", Precedence::RELATIONAL, "[]")
        .text(":")
        .statements("DO"))
}

fn controls_flow_statements(block: &Block, _ctx: &mut GenerationContext) -> StatementResult {
    match field(block, "FLOW")? {
        "BREAK" => Ok(Template::new().text("break\n")),
        "CONTINUE" => Ok(Template::new().text("continue\n")),
        other => Err(GenerateError::invalid_block(block, format!("unknown flow statement '{}'", other))),
    }
}

// ---------------------------------------------------------------------------
// Logic

fn logic_compare(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let operator = match field(block, "OP")? {
        "EQ" => "==",
        "NEQ" => "!=",
        "LT" => "<",
        "LTE" => "<=",
        "GT" => ">",
        "GTE" => ">=",
        other => return Err(GenerateError::invalid_block(block, format!("unknown comparison '{}'", other))),
    };
    // Both sides tighter so `a < b < c` never turns into a chained comparison
    let operand = Precedence::RELATIONAL.tighter();
    let template = Template::new()
        .optional_value("A", operand)
        .text(format!(" {} ", operator))
        .optional_value("B", operand);
    Ok(Expression::new(template, Precedence::RELATIONAL))
}

fn logic_operation(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let (operator, precedence) = match field(block, "OP")? {
        "AND" => ("and", Precedence::LOGICAL_AND),
        "OR" => ("or", Precedence::LOGICAL_OR),
        other => return Err(GenerateError::invalid_block(block, format!("unknown logic operator '{}'", other))),
    };
    let both_empty = connected(block, "A").is_none() && connected(block, "B").is_none();
    let default = if both_empty || operator == "or" { "False" } else { "True" };
    let template = Template::new()
        .value_or("A", precedence, default)
        .text(format!(" {} ", operator))
        .value_or("B", precedence, default);
    Ok(Expression::new(template, precedence))
}

fn logic_negate(_block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let template = Template::new().text("not ").value_or("BOOL", Precedence::LOGICAL_NOT, "True");
    Ok(Expression::new(template, Precedence::LOGICAL_NOT))
}

fn logic_boolean(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let value = block
        .field_bool("BOOL")
        .ok_or_else(|| GenerateError::missing_field(block, "BOOL"))?;
    Ok(Expression::atomic(if value { "True" } else { "False" }))
}

fn logic_null(_block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    Ok(Expression::atomic("None"))
}

fn logic_ternary(_block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let template = Template::new()
        .optional_value("THEN", Precedence::CONDITIONAL.tighter())
        .text(" if ")
        .value_or("IF", Precedence::CONDITIONAL.tighter(), "False")
        .text(" else ")
        .optional_value("ELSE", Precedence::CONDITIONAL);
    Ok(Expression::new(template, Precedence::CONDITIONAL))
}

// ---------------------------------------------------------------------------
// Math

fn math_number(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let n = block
        .field_number("NUM")
        .ok_or_else(|| GenerateError::missing_field(block, "NUM"))?;
    let precedence = if n.is_sign_negative() && !n.is_nan() {
        Precedence::UNARY
    } else if n.is_infinite() || n.is_nan() {
        Precedence::FUNCTION_CALL
    } else {
        Precedence::ATOMIC
    };
    Ok(Expression::code(number_literal(n), precedence))
}

fn math_arithmetic(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let (operator, precedence) = match field(block, "OP")? {
        "ADD" => ("+", Precedence::ADDITIVE),
        "MINUS" => ("-", Precedence::ADDITIVE),
        "MULTIPLY" => ("*", Precedence::MULTIPLICATIVE),
        "DIVIDE" => ("/", Precedence::MULTIPLICATIVE),
        "POWER" => ("**", Precedence::EXPONENTIATION),
        other => return Err(GenerateError::invalid_block(block, format!("unknown arithmetic operator '{}'", other))),
    };
    // `**` groups to the right, the rest to the left
    let (left, right) = if operator == "**" {
        (precedence.tighter(), precedence)
    } else {
        (precedence, precedence.tighter())
    };
    let template = Template::new()
        .value("A", left)
        .text(format!(" {} ", operator))
        .value("B", right);
    Ok(Expression::new(template, precedence))
}

fn math_single(block: &Block, ctx: &mut GenerationContext) -> ValueResult {
    let op = field(block, "OP")?;
    let call = |function: &str| {
        Expression::new(
            Template::new().text(format!("{}(", function)).value("NUM", Precedence::NONE).text(")"),
            Precedence::FUNCTION_CALL,
        )
    };

    let expression = match op {
        "NEG" => Expression::new(
            Template::new().text("-").value("NUM", Precedence::UNARY),
            Precedence::UNARY,
        ),
        "ABS" => call("abs"),
        "ROUND" => call("round"),
        "POW10" => Expression::new(
            Template::new().text("10 ** ").value("NUM", Precedence::EXPONENTIATION),
            Precedence::EXPONENTIATION,
        ),
        "ROOT" | "LN" | "LOG10" | "EXP" | "ROUNDUP" | "ROUNDDOWN" => {
            require_math(ctx);
            call(match op {
                "ROOT" => "math.sqrt",
                "LN" => "math.log",
                "LOG10" => "math.log10",
                "EXP" => "math.exp",
                "ROUNDUP" => "math.ceil",
                _ => "math.floor",
            })
        }
        // Blocks work in degrees
        "SIN" | "COS" | "TAN" => {
            require_math(ctx);
            let template = Template::new()
                .text(format!("math.{}(", op.to_ascii_lowercase()))
                .value("NUM", Precedence::MULTIPLICATIVE)
                .text(" / 180.0 * math.pi)");
            Expression::new(template, Precedence::FUNCTION_CALL)
        }
        "ASIN" | "ACOS" | "ATAN" => {
            require_math(ctx);
            let template = Template::new()
                .text(format!("math.{}(", op.to_ascii_lowercase()))
                .value("NUM", Precedence::NONE)
                .text(") / math.pi * 180");
            Expression::new(template, Precedence::MULTIPLICATIVE)
        }
        other => return Err(GenerateError::invalid_block(block, format!("unknown math function '{}'", other))),
    };
    Ok(expression)
}

fn math_modulo(_block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let template = Template::new()
        .value("DIVIDEND", Precedence::MULTIPLICATIVE)
        .text(" % ")
        .value("DIVISOR", Precedence::MULTIPLICATIVE.tighter());
    Ok(Expression::new(template, Precedence::MULTIPLICATIVE))
}

fn math_random_int(_block: &Block, ctx: &mut GenerationContext) -> ValueResult {
    ctx.register_once("import random", "import random");
    let template = Template::new()
        .text("random.randint(")
        .value("FROM", Precedence::NONE)
        .text(", ")
        .value("TO", Precedence::NONE)
        .text(")");
    Ok(Expression::new(template, Precedence::FUNCTION_CALL))
}

fn math_change(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    ctx.register_once("from numbers import Number", "from numbers import Number");
    let variable = variable_name(block, "VAR", ctx)?;
    Ok(Template::new()
        .text(format!(
            "{0} = ({0} if isinstance({0}, Number) else 0) + ",
            variable
        ))
        .value_or("DELTA", Precedence::ADDITIVE.tighter(), "0")
        .text("\n"))
}

// ---------------------------------------------------------------------------
// Text

fn text(block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let content = block.field_str("TEXT").unwrap_or_default();
    Ok(Expression::atomic(quote(content)))
}

fn text_join(block: &Block, ctx: &mut GenerationContext) -> ValueResult {
    let items = block.extra_usize("itemCount").unwrap_or(0).max(numbered_inputs(block, "ADD"));
    let expression = match items {
        0 => Expression::atomic("''"),
        1 => Expression::new(
            Template::new().text("str(").value_or("ADD0", Precedence::NONE, "''").text(")"),
            Precedence::FUNCTION_CALL,
        ),
        2 => Expression::new(
            Template::new()
                .text("str(")
                .value_or("ADD0", Precedence::NONE, "''")
                .text(") + str(")
                .value_or("ADD1", Precedence::NONE, "''")
                .text(")"),
            Precedence::ADDITIVE,
        ),
        n => {
            let element = ctx.names.distinct("x");
            let mut template = Template::new().text(format!("''.join([str({0}) for {0} in [", element));
            for i in 0..n {
                if i > 0 {
                    template = template.text(", ");
                }
                template = template.value_or(&format!("ADD{}", i), Precedence::NONE, "''");
            }
            Expression::new(template.text("]])"), Precedence::FUNCTION_CALL)
        }
    };
    Ok(expression)
}

fn text_length(_block: &Block, _ctx: &mut GenerationContext) -> ValueResult {
    let template = Template::new().text("len(").value_or("VALUE", Precedence::NONE, "''").text(")");
    Ok(Expression::new(template, Precedence::FUNCTION_CALL))
}

fn text_print(_block: &Block, _ctx: &mut GenerationContext) -> StatementResult {
    Ok(Template::new()
        .text("print(")
        .value_or("TEXT", Precedence::NONE, "''")
        .text(")\n"))
}

// ---------------------------------------------------------------------------
// Variables

fn variables_get(block: &Block, ctx: &mut GenerationContext) -> ValueResult {
    Ok(Expression::atomic(variable_name(block, "VAR", ctx)?))
}

fn variables_set(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let variable = variable_name(block, "VAR", ctx)?;
    Ok(Template::new()
        .text(format!("{} = ", variable))
        .optional_value("VALUE", Precedence::NONE)
        .text("\n"))
}

// ---------------------------------------------------------------------------
// Procedures

/// Parameter names from the mutator: `[{"name": "x"}, ...]` or `["x", ...]`.
fn procedure_params(block: &Block) -> Vec<String> {
    block
        .extra("params")
        .and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .filter_map(|param| param.get("name").and_then(Value::as_str).or_else(|| param.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn procedure_name(block: &Block, ctx: &mut GenerationContext) -> Result<String, GenerateError> {
    let raw = block
        .extra_str("name")
        .or_else(|| block.field_str("NAME"))
        .ok_or_else(|| GenerateError::missing_field(block, "NAME"))?;
    Ok(ctx.names.allocate(NameKind::Procedure, raw))
}

fn procedures_def(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    let name = procedure_name(block, ctx)?;
    let params: Vec<String> = procedure_params(block)
        .iter()
        .map(|param| ctx.names.allocate(NameKind::Variable, param))
        .collect();
    let globals: Vec<&str> = ctx
        .declared_variables()
        .iter()
        .filter(|variable| !params.contains(variable))
        .map(String::as_str)
        .collect();
    let returns = block.kind == "procedures_defreturn" && connected(block, "RETURN").is_some();

    let mut template = Template::new().text(format!("def {}({}):", name, params.join(", ")));
    if !globals.is_empty() {
        template = template.body(Template::new().text(format!("global {}\n", globals.join(", "))));
    }
    if block.statement_block("STACK").is_some() || (globals.is_empty() && !returns) {
        template = template.statements("STACK");
    }
    if returns {
        template = template.body(
            Template::new()
                .text("return ")
                .value("RETURN", Precedence::NONE)
                .text("\n"),
        );
    }
    Ok(template.into_definition(format!("%{}", name)))
}

fn procedure_call(block: &Block, ctx: &mut GenerationContext) -> Result<Template, GenerateError> {
    let name = procedure_name(block, ctx)?;
    let args = procedure_params(block).len().max(numbered_inputs(block, "ARG"));
    let mut template = Template::new().text(format!("{}(", name));
    for i in 0..args {
        if i > 0 {
            template = template.text(", ");
        }
        template = template.optional_value(&format!("ARG{}", i), Precedence::NONE);
    }
    Ok(template.text(")"))
}

fn procedures_call_statement(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    Ok(procedure_call(block, ctx)?.text("\n"))
}

fn procedures_call_value(block: &Block, ctx: &mut GenerationContext) -> ValueResult {
    Ok(Expression::new(procedure_call(block, ctx)?, Precedence::FUNCTION_CALL))
}

fn procedures_if_return(block: &Block, _ctx: &mut GenerationContext) -> StatementResult {
    let has_value = block.extra_bool("hasReturnValue").unwrap_or_else(|| block.has_input("VALUE"));
    let body = if has_value {
        Template::new().text("return ").optional_value("VALUE", Precedence::NONE).text("\n")
    } else {
        Template::new().text("return\n")
    };
    Ok(Template::new()
        .text("if ")
        .value_or("CONDITION", Precedence::NONE, "False")
        .text(":")
        .body(body))
}

// ---------------------------------------------------------------------------
// Robot

fn alienbot_action(block: &Block, ctx: &mut GenerationContext) -> StatementResult {
    ctx.register_once("import SSR", "import home.pi.AlienbotPi.Serial_Servo_Running as SSR");
    let action = match block.field("action") {
        Some(FieldValue::Number(n)) => number_literal(*n),
        Some(FieldValue::Text(text)) if text.trim().parse::<f64>().is_ok() => text.trim().to_string(),
        Some(FieldValue::Text(text)) => quote(text),
        _ => return Err(GenerateError::missing_field(block, "action")),
    };
    Ok(Template::new()
        .text(format!("SSR.running_action_group({}, ", action))
        .value("time", Precedence::NONE)
        .text(")\n"))
}
