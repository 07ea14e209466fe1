#![cfg(test)]
use std::collections::HashSet;

use indoc::indoc;

use crate::{
    code_generator::{CodeGenerator, Command, Segment},
    error::CompileError,
    sym_table::{Kind, Scopes, SymbolTable},
    tokenizer::Tokenizer,
    tokens::Token,
    vm_compilation_engine::{Call, Value, VmCompilationEngine},
};

fn engine(src: &str) -> VmCompilationEngine<Vec<u8>> {
    let tokens = Tokenizer::new().tokenize_str(src).unwrap();
    VmCompilationEngine::within_class(tokens, Vec::new(), "Main")
}

fn output(e: VmCompilationEngine<Vec<u8>>) -> Vec<String> {
    let out = e.finish().unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn vm(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

fn scanned(src: &str) -> Vec<Token> {
    let mut stream = Tokenizer::new().tokenize_str(src).unwrap();
    let mut v = Vec::new();
    while let Some(t) = stream.advance() {
        v.push(t);
    }
    v
}

#[test]
fn indices_are_dense_per_kind() {
    let mut t = SymbolTable::new();
    t.define("a", "int", Kind::Argument);
    t.define("x", "int", Kind::Local);
    t.define("b", "char", Kind::Argument);
    t.define("y", "Array", Kind::Local);
    t.define("c", "boolean", Kind::Argument);

    assert_eq!(t.index_of("a"), Some(0));
    assert_eq!(t.index_of("b"), Some(1));
    assert_eq!(t.index_of("c"), Some(2));
    assert_eq!(t.index_of("x"), Some(0));
    assert_eq!(t.index_of("y"), Some(1));
    assert_eq!(t.var_count(Kind::Argument), 3);
    assert_eq!(t.var_count(Kind::Local), 2);
    assert_eq!(t.var_count(Kind::Static), 0);
    assert_eq!(t.type_of("y"), Some("Array"));
    assert_eq!(t.kind_of("missing"), None);
}

#[test]
fn redefinition_overwrites_one_name_only() {
    let mut t = SymbolTable::new();
    t.define("a", "int", Kind::Static);
    t.define("b", "int", Kind::Field);
    t.define("c", "int", Kind::Field);

    let old = t.define("a", "char", Kind::Field).unwrap();
    assert_eq!(old.kind, Kind::Static);
    assert_eq!(t.kind_of("a"), Some(Kind::Field));
    assert_eq!(t.type_of("a"), Some("char"));
    assert_eq!(t.index_of("a"), Some(2));
    assert_eq!(t.index_of("b"), Some(0));
    assert_eq!(t.index_of("c"), Some(1));
    assert_eq!(t.var_count(Kind::Static), 1);
    assert_eq!(t.var_count(Kind::Field), 3);
    assert_eq!(t.var_count(Kind::Local), 0);
}

#[test]
fn reset_clears_names_and_counters() {
    let mut t = SymbolTable::new();
    t.define("a", "int", Kind::Argument);
    t.define("x", "int", Kind::Local);
    t.reset();
    assert_eq!(t.kind_of("a"), None);
    assert_eq!(t.var_count(Kind::Argument), 0);
    t.define("z", "int", Kind::Local);
    assert_eq!(t.index_of("z"), Some(0));
}

#[test]
fn subroutine_scope_shadows_class_scope() {
    let mut s = Scopes::new();
    s.define("x", "int", Kind::Field);
    s.define("n", "int", Kind::Static);
    s.start_subroutine();
    s.define("x", "char", Kind::Local);

    assert_eq!(s.resolve("x").unwrap().kind, Kind::Local);
    assert_eq!(s.resolve("n").unwrap().kind, Kind::Static);

    s.start_subroutine();
    assert_eq!(s.resolve("x").unwrap().kind, Kind::Field);
    assert_eq!(s.var_count(Kind::Local), 0);
    assert_eq!(s.var_count(Kind::Field), 1);
    assert!(!s.has_id("y"));
}

#[test]
fn fresh_labels_never_repeat() {
    let mut g = CodeGenerator::new(Vec::new());
    let mut seen = HashSet::new();
    for _ in 0..500 {
        assert!(seen.insert(g.fresh_label("Main.IF_FALSE")));
        assert!(seen.insert(g.fresh_label("Main.WHILE_EXP")));
    }
}

#[test]
fn code_generator_line_format() {
    let mut g = CodeGenerator::new(Vec::new());
    g.write_function("Main.main", 2).unwrap();
    g.write_push(Segment::Const, 7).unwrap();
    g.write_pop(Segment::Local, 1).unwrap();
    g.write_arithmetic(Command::Neg).unwrap();
    g.write_label("L$0").unwrap();
    g.write_goto("L$0").unwrap();
    g.write_if("L$0").unwrap();
    g.write_call("Math.multiply", 2).unwrap();
    g.write_return().unwrap();
    let out = String::from_utf8(g.close().unwrap()).unwrap();
    assert_eq!(
        out,
        indoc! {"
            function Main.main 2
            push constant 7
            pop local 1
            neg
            label L$0
            goto L$0
            if-goto L$0
            call Math.multiply 2
            return
        "}
    );
}

#[test]
fn segments_follow_kinds() {
    assert_eq!(Segment::from(Kind::Static), Segment::Static);
    assert_eq!(Segment::from(Kind::Field), Segment::This);
    assert_eq!(Segment::from(Kind::Argument), Segment::Arg);
    assert_eq!(Segment::from(Kind::Local), Segment::Local);
}

#[test]
fn tokenizer_categories() {
    let tokens = scanned(indoc! {r#"
        /** doc */
        class classy { // trailing
            let s = "a b"; /* block
            comment */ x[12] ~
        }
    "#});
    assert_eq!(
        tokens,
        vec![
            Token::Keyword("class".to_string()),
            Token::Identifier("classy".to_string()),
            Token::Symbol('{'),
            Token::Keyword("let".to_string()),
            Token::Identifier("s".to_string()),
            Token::Symbol('='),
            Token::StringConstant("a b".to_string()),
            Token::Symbol(';'),
            Token::Identifier("x".to_string()),
            Token::Symbol('['),
            Token::IntegerConstant(12),
            Token::Symbol(']'),
            Token::Symbol('~'),
            Token::Symbol('}'),
        ]
    );
}

#[test]
fn tokenizer_tracks_lines() {
    let mut stream = Tokenizer::new()
        .tokenize_str("class\n/* a\nb */ Main\n\n{")
        .unwrap();
    stream.advance();
    assert_eq!(stream.line(), 1);
    stream.advance();
    assert_eq!(stream.line(), 3);
    assert_eq!(stream.peek_line(), 5);
}

#[test]
fn tokenizer_rejects_bad_input() {
    let t = Tokenizer::new();
    assert!(matches!(
        t.tokenize_str("let s = \"open;\n"),
        Err(CompileError::Lex { line: 1, .. })
    ));
    assert!(matches!(
        t.tokenize_str("\nlet x = 32768;"),
        Err(CompileError::Lex { line: 2, .. })
    ));
    assert!(matches!(
        t.tokenize_str("let x = 1 # 2;"),
        Err(CompileError::Lex { .. })
    ));
    assert!(matches!(
        t.tokenize_str("class A { /* never closed"),
        Err(CompileError::Lex { .. })
    ));
    assert!(t.tokenize_str("let x = 32767;").is_ok());
}

#[test]
fn let_of_sum_into_first_local() {
    let mut e = engine("let x = 1 + 2;");
    e.scopes_mut().define("x", "int", Kind::Local);
    e.compile_let().unwrap();
    assert_eq!(
        output(e),
        vm("push constant 1\npush constant 2\nadd\npop local 0")
    );
}

#[test]
fn operators_apply_left_to_right() {
    let mut e = engine("1 + 2 * 3 - 4 / 2 = 5");
    assert_eq!(e.compile_expression().unwrap(), Value::Binary);
    assert_eq!(
        output(e),
        vm(indoc! {"
            push constant 1
            push constant 2
            add
            push constant 3
            call Math.multiply 2
            push constant 4
            sub
            push constant 2
            call Math.divide 2
            push constant 5
            eq
        "})
    );
}

#[test]
fn comparison_and_logic_operators() {
    let mut e = engine("(a < b) & (a > b) | (a = b)");
    e.scopes_mut().define("a", "int", Kind::Argument);
    e.scopes_mut().define("b", "int", Kind::Argument);
    e.compile_expression().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            push argument 0
            push argument 1
            lt
            push argument 0
            push argument 1
            gt
            and
            push argument 0
            push argument 1
            eq
            or
        "})
    );
}

#[test]
fn string_literal_builds_object() {
    let mut e = engine("\"AB\"");
    assert_eq!(e.compile_term().unwrap(), Value::Constant);
    assert_eq!(
        output(e),
        vm(indoc! {"
            push constant 2
            call String.new 1
            push constant 65
            call String.appendChar 2
            push constant 66
            call String.appendChar 2
        "})
    );
}

#[test]
fn empty_string_literal() {
    let mut e = engine("\"\"");
    e.compile_term().unwrap();
    assert_eq!(output(e), vm("push constant 0\ncall String.new 1"));
}

#[test]
fn string_characters_must_fit_a_constant() {
    let mut e = engine("\"a\u{FF01}\"");
    assert!(matches!(
        e.compile_term(),
        Err(CompileError::Lex { line: 1, .. })
    ));

    let mut e = engine("\"\u{7FFF}\"");
    e.compile_term().unwrap();
    assert_eq!(
        output(e),
        vm("push constant 1\ncall String.new 1\npush constant 32767\ncall String.appendChar 2")
    );
}

#[test]
fn string_length_must_fit_a_constant() {
    let long = format!("\"{}\"", "x".repeat(40000));
    let mut e = engine(&long);
    let err = e.compile_term().unwrap_err();
    assert!(matches!(err, CompileError::Lex { .. }));
    assert!(err.to_string().contains("40000 characters"));

    let longest = format!("\"{}\"", "x".repeat(32767));
    let mut e = engine(&longest);
    e.compile_term().unwrap();
    assert_eq!(output(e)[0], "push constant 32767");
}

#[test]
fn each_kind_holds_at_most_one_constant_range_of_names() {
    let mut e = engine("var int last; var int over;");
    for i in 0..32767 {
        e.scopes_mut().define(&format!("v{i}"), "int", Kind::Local);
    }
    e.compile_var_dec().unwrap();
    assert_eq!(e.scopes_mut().resolve("last").unwrap().index, 32767);
    assert!(matches!(
        e.compile_var_dec(),
        Err(CompileError::TooManyVariables {
            kind: Kind::Local,
            ..
        })
    ));
    assert!(!e.scopes_mut().has_id("over"));
    assert_eq!(e.scopes_mut().var_count(Kind::Argument), 0);
}

#[test]
fn keyword_constants() {
    let mut e = engine("true false null this");
    for _ in 0..4 {
        assert_eq!(e.compile_term().unwrap(), Value::Constant);
    }
    assert_eq!(
        output(e),
        vm(indoc! {"
            push constant 1
            neg
            push constant 0
            push constant 0
            push pointer 0
        "})
    );
}

#[test]
fn unary_operators() {
    let mut e = engine("-x ~done");
    e.scopes_mut().define("x", "int", Kind::Local);
    e.scopes_mut().define("done", "boolean", Kind::Static);
    assert_eq!(e.compile_term().unwrap(), Value::Unary(Command::Neg));
    assert_eq!(e.compile_term().unwrap(), Value::Unary(Command::Not));
    assert_eq!(
        output(e),
        vm("push local 0\nneg\npush static 0\nnot")
    );
}

#[test]
fn variable_terms_report_their_kind() {
    let mut e = engine("(size) size");
    e.scopes_mut().define("size", "int", Kind::Field);
    assert_eq!(e.compile_term().unwrap(), Value::Grouped);
    assert_eq!(e.compile_term().unwrap(), Value::Variable(Kind::Field));
    assert_eq!(output(e), vm("push this 0\npush this 0"));
}

#[test]
fn array_read() {
    let mut e = engine("a[i + 1]");
    e.scopes_mut().define("a", "Array", Kind::Argument);
    e.scopes_mut().define("i", "int", Kind::Local);
    assert_eq!(e.compile_term().unwrap(), Value::ArrayElement);
    assert_eq!(
        output(e),
        vm(indoc! {"
            push argument 0
            push local 0
            push constant 1
            add
            add
            pop pointer 1
            push that 0
        "})
    );
}

#[test]
fn array_assignment_from_same_array() {
    let mut e = engine("let a[i] = a[j];");
    e.scopes_mut().define("a", "Array", Kind::Local);
    e.scopes_mut().define("i", "int", Kind::Local);
    e.scopes_mut().define("j", "int", Kind::Local);
    e.compile_let().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            push local 0
            push local 1
            add
            push local 0
            push local 2
            add
            pop pointer 1
            push that 0
            pop temp 0
            pop pointer 1
            push temp 0
            pop that 0
        "})
    );
}

#[test]
fn array_assignment_with_nested_indexing() {
    let mut e = engine("let a[b[0]] = b[a[1]];");
    e.scopes_mut().define("a", "Array", Kind::Field);
    e.scopes_mut().define("b", "Array", Kind::Static);
    e.compile_let().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            push this 0
            push static 0
            push constant 0
            add
            pop pointer 1
            push that 0
            add
            push static 0
            push this 0
            push constant 1
            add
            pop pointer 1
            push that 0
            add
            pop pointer 1
            push that 0
            pop temp 0
            pop pointer 1
            push temp 0
            pop that 0
        "})
    );
}

#[test]
fn if_else_uses_two_distinct_labels() {
    let mut e = engine("if (x) { let y = 1; } else { let y = 2; }");
    e.scopes_mut().define("x", "boolean", Kind::Local);
    e.scopes_mut().define("y", "int", Kind::Local);
    e.compile_if().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            push local 0
            not
            if-goto Main.IF_FALSE$0
            push constant 1
            pop local 1
            goto Main.IF_END$1
            label Main.IF_FALSE$0
            push constant 2
            pop local 1
            label Main.IF_END$1
        "})
    );
}

#[test]
fn if_without_else_uses_one_label() {
    let mut e = engine("if (x) { let x = false; }");
    e.scopes_mut().define("x", "boolean", Kind::Argument);
    e.compile_if().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            push argument 0
            not
            if-goto Main.IF_FALSE$0
            push constant 0
            pop argument 0
            label Main.IF_FALSE$0
        "})
    );
}

#[test]
fn while_loop_retests_condition() {
    let mut e = engine("while (i < 10) { let i = i + 1; }");
    e.scopes_mut().define("i", "int", Kind::Local);
    e.compile_while().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            label Main.WHILE_EXP$0
            push local 0
            push constant 10
            lt
            not
            if-goto Main.WHILE_END$1
            push local 0
            push constant 1
            add
            pop local 0
            goto Main.WHILE_EXP$0
            label Main.WHILE_END$1
        "})
    );
}

#[test]
fn nested_statements_get_fresh_labels() {
    let mut e = engine("while (true) { if (false) { return; } }");
    e.compile_statements().unwrap();
    let out = output(e);
    let labels: HashSet<&String> = out.iter().filter(|l| l.starts_with("label ")).collect();
    assert_eq!(labels.len(), 3);
    assert!(out.contains(&"label Main.IF_FALSE$2".to_string()));
}

#[test]
fn do_discards_return_value() {
    let mut e = engine("do Output.printInt(1);");
    e.compile_do().unwrap();
    assert_eq!(
        output(e),
        vm("push constant 1\ncall Output.printInt 1\npop temp 0")
    );
}

#[test]
fn empty_argument_lists() {
    let mut e = engine("do Screen.clearScreen(); do draw(); do game.run();");
    e.scopes_mut().define("game", "SquareGame", Kind::Local);
    e.compile_statements().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            call Screen.clearScreen 0
            pop temp 0
            push pointer 0
            call Main.draw 1
            pop temp 0
            push local 0
            call SquareGame.run 1
            pop temp 0
        "})
    );
}

#[test]
fn call_terms_count_receiver() {
    let mut e = engine("area(w, h) sq.grow(2) Math.max(1, 2)");
    e.scopes_mut().define("w", "int", Kind::Field);
    e.scopes_mut().define("h", "int", Kind::Field);
    e.scopes_mut().define("sq", "Square", Kind::Argument);
    assert_eq!(
        e.compile_term().unwrap(),
        Value::Returned(Call {
            name: "Main.area".to_string(),
            n_args: 3
        })
    );
    assert_eq!(
        e.compile_term().unwrap(),
        Value::Returned(Call {
            name: "Square.grow".to_string(),
            n_args: 2
        })
    );
    assert_eq!(
        e.compile_term().unwrap(),
        Value::Returned(Call {
            name: "Math.max".to_string(),
            n_args: 2
        })
    );
    assert_eq!(
        output(e),
        vm(indoc! {"
            push pointer 0
            push this 0
            push this 1
            call Main.area 3
            push argument 0
            push constant 2
            call Square.grow 2
            push constant 1
            push constant 2
            call Math.max 2
        "})
    );
}

#[test]
fn bare_return_pushes_zero() {
    let mut e = engine("return; return 5;");
    e.compile_statements().unwrap();
    assert_eq!(
        output(e),
        vm("push constant 0\nreturn\npush constant 5\nreturn")
    );
}

#[test]
fn method_receiver_takes_argument_zero() {
    let mut e = engine("method void f(int a, int b) { return; }");
    e.compile_sub_routine_dec().unwrap();
    let this = e.scopes_mut().resolve("this").unwrap().clone();
    assert_eq!((this.kind, this.index, this.tp.as_str()), (Kind::Argument, 0, "Main"));
    assert_eq!(e.scopes_mut().resolve("a").unwrap().index, 1);
    assert_eq!(e.scopes_mut().resolve("b").unwrap().index, 2);
    assert_eq!(
        output(e),
        vm(indoc! {"
            function Main.f 0
            push argument 0
            pop pointer 0
            push constant 0
            return
        "})
    );
}

#[test]
fn function_parameters_start_at_zero() {
    let mut e = engine("function int f(int a, Array b) { var int x, y; var char c; return a; }");
    e.compile_sub_routine_dec().unwrap();
    assert!(e.scopes_mut().resolve("this").is_none());
    assert_eq!(e.scopes_mut().resolve("a").unwrap().index, 0);
    assert_eq!(e.scopes_mut().resolve("b").unwrap().index, 1);
    assert_eq!(e.scopes_mut().resolve("c").unwrap().index, 2);
    assert_eq!(
        output(e),
        vm("function Main.f 3\npush argument 0\nreturn")
    );
}

#[test]
fn constructor_allocates_fields() {
    let mut e = engine("constructor Main new() { var int tmp; let tmp = 0; return this; }");
    e.scopes_mut().define("x", "int", Kind::Field);
    e.scopes_mut().define("y", "int", Kind::Field);
    e.scopes_mut().define("count", "int", Kind::Static);
    e.compile_sub_routine_dec().unwrap();
    assert_eq!(
        output(e),
        vm(indoc! {"
            function Main.new 1
            push constant 2
            call Memory.alloc 1
            pop pointer 0
            push constant 0
            pop local 0
            push pointer 0
            return
        "})
    );
}

#[test]
fn unresolved_variable_is_fatal() {
    let mut e = engine("let y = 1;");
    assert!(matches!(
        e.compile_let(),
        Err(CompileError::UnresolvedSymbol { name, .. }) if name == "y"
    ));

    let mut e = engine("missing + 1");
    assert!(matches!(
        e.compile_expression(),
        Err(CompileError::UnresolvedSymbol { .. })
    ));
}

#[test]
fn syntax_error_names_expected_and_found() {
    let mut e = engine("let x 1;");
    e.scopes_mut().define("x", "int", Kind::Local);
    let err = e.compile_let().unwrap_err();
    assert_eq!(
        err.to_string(),
        "line 1: expected `=`, found integerConstant `1`"
    );
}

#[test]
fn syntax_error_at_end_of_input() {
    let mut e = engine("return");
    let err = e.compile_return().unwrap_err();
    assert!(err.to_string().ends_with("found end of input"));
}

#[test]
fn keyword_is_not_a_term() {
    let mut e = engine("let = 1;");
    assert!(matches!(
        e.compile_term(),
        Err(CompileError::Syntax { expected, .. }) if expected == "term"
    ));
}
