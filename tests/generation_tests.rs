use blockpy_codegen::block::Block;
use blockpy_codegen::generate::{Expression, GenerationContext, NameKind, OnMissing, Precedence, Template};
use blockpy_codegen::syntax::{expression_shape, strip_parentheses};
use blockpy_codegen::{
    check_python, generate, generate_with, standard_rules, GenerateError, GenerateOptions, Generator,
    PythonGenerator, RuleSet, Walker, Workspace,
};
use std::collections::HashSet;

const OPERATORS: [&str; 5] = ["ADD", "MINUS", "MULTIPLY", "DIVIDE", "POWER"];

fn symbol(op: &str) -> &'static str {
    match op {
        "ADD" => "+",
        "MINUS" => "-",
        "MULTIPLY" => "*",
        "DIVIDE" => "/",
        _ => "**",
    }
}

/// Arithmetic tree plus its fully parenthesized spelling
#[derive(Clone)]
enum Tree {
    Leaf(u32),
    Op(&'static str, Box<Tree>, Box<Tree>),
}

impl Tree {
    fn to_block(&self) -> Block {
        match self {
            Tree::Leaf(n) => Block::new("math_number").with_field("NUM", *n as f64),
            Tree::Op(op, a, b) => Block::new("math_arithmetic")
                .with_field("OP", *op)
                .with_input("A", a.to_block())
                .with_input("B", b.to_block()),
        }
    }

    fn explicit(&self) -> String {
        match self {
            Tree::Leaf(n) => n.to_string(),
            Tree::Op(op, a, b) => format!("({} {} {})", a.explicit(), symbol(op), b.explicit()),
        }
    }
}

fn small_trees() -> Vec<Tree> {
    let mut next = 0;
    let mut leaf = || {
        next += 1;
        Tree::Leaf(next)
    };
    let mut shallow = vec![leaf()];
    for op in OPERATORS {
        shallow.push(Tree::Op(op, Box::new(leaf()), Box::new(leaf())));
    }

    let mut trees = Vec::new();
    for op in OPERATORS {
        for a in &shallow {
            for b in &shallow {
                trees.push(Tree::Op(op, Box::new(a.clone()), Box::new(b.clone())));
            }
        }
    }
    trees
}

fn print_of(block: Block) -> Block {
    Block::new("text_print").with_input("TEXT", block)
}

fn expression_code(block: Block) -> String {
    let code = generate(&Workspace::new(vec![print_of(block)])).unwrap().code;
    code.trim_end()
        .strip_prefix("print(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or_else(|| panic!("unexpected output {:?}", code))
        .to_string()
}

/// Pairs of matching parentheses in `code`
fn paren_pairs(code: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut pairs = Vec::new();
    for (i, ch) in code.char_indices() {
        match ch {
            '(' => open.push(i),
            ')' => pairs.push((open.pop().unwrap(), i)),
            _ => {}
        }
    }
    pairs
}

#[test]
fn test_generated_grouping_matches_tree() {
    for tree in small_trees() {
        let generated = expression_code(tree.to_block());
        let expected_shape = strip_parentheses(&expression_shape(&tree.explicit()).unwrap());
        let actual_shape = strip_parentheses(&expression_shape(&generated).unwrap());
        assert_eq!(actual_shape, expected_shape, "{} generated as {}", tree.explicit(), generated);
    }
}

#[test]
fn test_no_redundant_parentheses() {
    for tree in small_trees() {
        let generated = expression_code(tree.to_block());
        let shape = strip_parentheses(&expression_shape(&generated).unwrap());
        for (open, close) in paren_pairs(&generated) {
            let mut without = generated.clone();
            without.remove(close);
            without.remove(open);
            let changed = expression_shape(&without).map(|s| strip_parentheses(&s));
            assert_ne!(
                changed.as_deref(),
                Some(shape.as_str()),
                "parentheses at {} in {} are redundant",
                open,
                generated
            );
        }
    }
}

#[test]
fn test_identifiers_unique_and_legal() {
    let raw_names = ["for", "print", "my var", "my_var", "2fast", "x", "X", "", "None", "math"];
    let mut chain: Option<Block> = None;
    for (i, raw) in raw_names.iter().enumerate().rev() {
        let mut set = Block::new("variables_set")
            .with_field("VAR", *raw)
            .with_input("VALUE", Block::new("math_number").with_field("NUM", i as f64));
        if let Some(next) = chain.take() {
            set = set.with_next(next);
        }
        chain = Some(set);
    }
    let code = generate(&Workspace::new(vec![chain.unwrap()])).unwrap().code;
    check_python(&code).unwrap();

    let assigned: Vec<&str> = code.lines().map(|line| line.split(" = ").next().unwrap()).collect();
    let unique: HashSet<&str> = assigned.iter().copied().collect();
    assert_eq!(unique.len(), raw_names.len(), "{:?}", assigned);
    assert_eq!(
        assigned,
        vec!["for2", "print2", "my_var", "my_var2", "my_2fast", "x", "X", "unnamed", "None2", "math2"]
    );
}

#[test]
fn test_same_name_same_identifier_everywhere() {
    let get = || Block::new("variables_get").with_field("VAR", "my var");
    let sum = Block::new("math_arithmetic")
        .with_field("OP", "ADD")
        .with_input("A", get())
        .with_input("B", get());
    let program = Block::new("variables_set")
        .with_field("VAR", "my var")
        .with_input("VALUE", Block::new("math_number").with_field("NUM", 1.0))
        .with_next(print_of(sum));
    let code = generate(&Workspace::new(vec![program])).unwrap().code;
    assert_eq!(code, "my_var = 1\nprint(my_var + my_var)\n");
}

#[test]
fn test_definitions_deduplicated_in_first_registration_order() {
    let random = || {
        Block::new("math_random_int")
            .with_input("FROM", Block::new("math_number").with_field("NUM", 1.0))
            .with_input("TO", Block::new("math_number").with_field("NUM", 6.0))
    };
    let root = Block::new("math_single")
        .with_field("OP", "ROOT")
        .with_input("NUM", Block::new("math_number").with_field("NUM", 4.0));
    let program = print_of(random()).with_next(print_of(root).with_next(print_of(random())));
    let code = generate(&Workspace::new(vec![program])).unwrap().code;
    assert_eq!(code.matches("import random").count(), 1);
    assert_eq!(code.matches("import math").count(), 1);
    assert!(code.starts_with("import random\nimport math\n\n"), "{}", code);
}

#[test]
fn test_disabled_block_is_transparent() {
    let say = |text: &str| print_of(Block::new("text").with_field("TEXT", text));
    let with_disabled = say("a").with_next(say("b").disabled().with_next(say("c")));
    let without = say("a").with_next(say("c"));
    let first = generate(&Workspace::new(vec![with_disabled])).unwrap().code;
    let second = generate(&Workspace::new(vec![without])).unwrap().code;
    assert_eq!(first, second);
    assert_eq!(first, "print('a')\nprint('c')\n");
}

#[test]
fn test_deterministic_across_runs() {
    let program = Block::new("controls_for")
        .with_field("VAR", "k")
        .with_input("TO", Block::new("variables_get").with_field("VAR", "n"))
        .with_input(
            "DO",
            Block::new("math_change")
                .with_field("VAR", "total")
                .with_input("DELTA", Block::new("variables_get").with_field("VAR", "k")),
        );
    let workspace = Workspace::new(vec![program]).with_variable("a", "total").with_variable("b", "n");
    let outputs: HashSet<String> = (0..5).map(|_| generate(&workspace).unwrap().code).collect();
    assert_eq!(outputs.len(), 1);
}

#[test]
fn test_missing_required_numeric_input() {
    let repeat = Block::new("controls_repeat_ext").with_id("loop");
    let err = generate(&Workspace::new(vec![repeat])).unwrap_err();
    assert_eq!(err, GenerateError::MissingRequiredValue { slot: "TIMES".into(), block: "loop".into() });
    assert_eq!(err.block_id(), Some("loop"));
}

#[test]
fn test_too_deep_from_json() {
    let levels = 60;
    let mut json = String::from(r#"{"blocks": {"blocks": ["#);
    for level in 0..levels {
        json.push_str(&format!(
            r#"{{"type": "controls_repeat", "id": "r{}", "fields": {{"TIMES": 1}}, "inputs": {{"DO": {{"block": "#,
            level
        ));
    }
    json.push_str(r#"{"type": "controls_flow_statements", "fields": {"FLOW": "BREAK"}}"#);
    for _ in 0..levels {
        json.push_str("}}}");
    }
    json.push_str("]}}");

    let workspace = Workspace::from_json(&json).unwrap();
    let options = GenerateOptions { max_depth: 50, ..Default::default() };
    let err = generate_with(&workspace, &options).unwrap_err();
    assert!(matches!(err, GenerateError::StructureTooDeep { ref block, limit: 50 } if block == "r50"), "{:?}", err);

    let options = GenerateOptions { max_depth: 100, ..Default::default() };
    let code = generate_with(&workspace, &options).unwrap().code;
    assert_eq!(code.lines().count(), levels + 1);
}

#[test]
fn test_long_program_and_runaway_nesting() {
    let statements = 10_000;
    let mut json = String::from(r#"{"blocks": {"blocks": ["#);
    for i in 0..statements - 1 {
        json.push_str(&format!(r#"{{"type": "text_print", "id": "p{}", "next": {{"block": "#, i));
    }
    json.push_str(r#"{"type": "text_print", "id": "last"}"#);
    for _ in 0..statements - 1 {
        json.push_str("}}");
    }
    json.push_str("]}}");

    let workspace = Workspace::from_json(&json).unwrap();
    let result = generate_with(&workspace, &GenerateOptions::default()).unwrap();
    assert_eq!(result.code.lines().count(), statements);
    assert!(result.code.lines().all(|line| line == "print('')"));
    assert_eq!(result.mappings.len(), statements);
    drop(workspace);

    let levels = 20_000;
    let mut json = String::from(r#"{"blocks": {"blocks": ["#);
    for level in 0..levels {
        json.push_str(&format!(
            r#"{{"type": "controls_repeat", "id": "r{}", "fields": {{"TIMES": 2}}, "inputs": {{"DO": {{"block": "#,
            level
        ));
    }
    json.push_str(r#"{"type": "text_print"}"#);
    for _ in 0..levels {
        json.push_str("}}}");
    }
    json.push_str("]}}");

    let workspace = Workspace::from_json(&json).unwrap();
    let options = GenerateOptions { max_depth: 50, ..Default::default() };
    let err = generate_with(&workspace, &options).unwrap_err();
    assert!(matches!(err, GenerateError::StructureTooDeep { ref block, limit: 50 } if block == "r50"), "{:?}", err);
}

fn move_front(block: &Block, _ctx: &mut GenerationContext) -> Result<Template, GenerateError> {
    let speed = block.field_number("SPEED").unwrap_or(50.0);
    Ok(Template::new().text(format!("robot.move_front({})\n", speed)))
}

#[test]
fn test_extended_rule_set() {
    let rules = standard_rules().statement("move_front", move_front);
    let generator = PythonGenerator::with_rules(rules);
    let workspace = Workspace::new(vec![Block::new("move_front").with_field("SPEED", 80.0)]);
    let result = generator.generate(&workspace, &GenerateOptions::default()).unwrap();
    assert_eq!(result.code, "robot.move_front(80)\n");
}

fn broken(_block: &Block, _ctx: &mut GenerationContext) -> Result<Template, GenerateError> {
    Ok(Template::new().text("x = (\n"))
}

#[test]
fn test_verify_syntax_catches_bad_rule() {
    let rules = RuleSet::new().statement("broken", broken);
    let options = GenerateOptions { verify_syntax: true, ..Default::default() };
    let walker = Walker::new(&rules, &options);
    let err = walker.generate_workspace(&Workspace::new(vec![Block::new("broken")])).unwrap_err();
    match err {
        GenerateError::Syntax(syntax) => assert!(syntax.line >= 1),
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

fn angle(block: &Block, ctx: &mut GenerationContext) -> Result<Expression, GenerateError> {
    let name = ctx.names.allocate(NameKind::Variable, block.field_str("NAME").unwrap_or("angle"));
    Ok(Expression::atomic(name))
}

fn turn(_block: &Block, _ctx: &mut GenerationContext) -> Result<Template, GenerateError> {
    Ok(Template::new()
        .text("turn(")
        .slot("DEGREES", Precedence::NONE, OnMissing::Placeholder)
        .text(")\n"))
}

#[test]
fn test_walker_with_custom_language_profile() {
    let rules = RuleSet::new()
        .reserved_words(["angle"])
        .placeholder("nil")
        .value("angle", angle)
        .statement("turn", turn);
    let options = GenerateOptions::default();
    let walker = Walker::new(&rules, &options);

    let turn = Block::new("turn").with_input("DEGREES", Block::new("angle"));
    let empty_turn = Block::new("turn");
    let result = walker.generate_workspace(&Workspace::new(vec![turn.with_next(empty_turn)])).unwrap();
    assert_eq!(result.code, "turn(angle2)\nturn(nil)\n");
}

#[test]
fn test_every_standard_fixture_program_parses() {
    let programs = [
        r#"{"blocks": {"blocks": [{"type": "controls_if", "extraState": {"hasElse": true}}]}}"#,
        r#"{"blocks": {"blocks": [{"type": "controls_forEach", "fields": {"VAR": "x"}}]}}"#,
        r#"{"blocks": {"blocks": [{"type": "procedures_defreturn", "fields": {"NAME": "f"}}]}}"#,
        r#"{"blocks": {"blocks": [{"type": "logic_ternary"}]}}"#,
        r#"{"blocks": {"blocks": [{"type": "text_join", "extraState": {"itemCount": 4}}]}}"#,
    ];
    for program in programs {
        let workspace = Workspace::from_json(program).unwrap();
        let code = generate(&workspace).unwrap().code;
        check_python(&code).unwrap_or_else(|err| panic!("{}\n{}", err, code));
    }
}
