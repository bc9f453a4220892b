use std::collections::HashSet;
use std::path::PathBuf;

use p16c::{compile_source, CompileOptions, CompileOutput, ErrorKind};

const HALT_TRAP: &str = "SET PC, builtin_halt\n:builtin_halt\nSET PC, builtin_halt\n";

fn compile(source: &str) -> CompileOutput {
    compile_source(source, CompileOptions::empty()).expect("parse source")
}

/// Body lines and the footer lines that follow the halt trap.
fn segments(output: &CompileOutput) -> (Vec<String>, Vec<String>) {
    let at = output
        .assembly
        .find(HALT_TRAP)
        .expect("assembly contains the halt trap");
    let lines = |text: &str| text.lines().map(str::to_string).collect::<Vec<_>>();
    (
        lines(&output.assembly[..at]),
        lines(&output.assembly[at + HALT_TRAP.len()..]),
    )
}

fn kinds(output: &CompileOutput) -> Vec<ErrorKind> {
    output.diagnostics.iter().map(|diag| diag.kind().clone()).collect()
}

#[test]
fn register_assignment() {
    let output = compile("A = 5\nB = A\n");
    assert!(!output.failed);
    insta::assert_snapshot!(output.assembly, @r"
    SET A, 0x0005
    SET B, A
    SET PC, builtin_halt
    :builtin_halt
    SET PC, builtin_halt
    ");
}

#[test]
fn countdown_loop() {
    let output = compile("while A != 0:\n    A -= 1\n");
    assert!(!output.failed);
    insta::assert_snapshot!(output.assembly, @r"
    :builtin_loop_1_start
    IFE A, 0x0000
    SET PC, builtin_loop_1_end
    SUB A, 0x0001
    SET PC, builtin_loop_1_start
    :builtin_loop_1_end
    SET PC, builtin_halt
    :builtin_halt
    SET PC, builtin_halt
    ");
}

#[test]
fn empty_function_call() {
    let output = compile("def f():\n    pass\n\nf()\n");
    assert!(!output.failed);
    let (body, footer) = segments(&output);
    assert_eq!(body, vec!["JSR f"]);
    assert_eq!(footer, vec![":f", "SET J, POP", "SET PC, J"]);
}

#[test]
fn break_outside_loop_fails_but_keeps_going() {
    let output = compile("A = 1\nbreak\nB = undefined_constant\nC = 2\n");
    assert!(output.failed);
    assert_eq!(
        kinds(&output),
        vec![
            ErrorKind::LoopControlOutsideLoop("break"),
            ErrorKind::UndefinedName("undefined_constant".to_string()),
        ]
    );
    assert_eq!(output.diagnostics[0].line(), 2);
    assert_eq!(output.diagnostics[1].line(), 3);
    let (body, _) = segments(&output);
    assert_eq!(body, vec!["SET A, 0x0001", "SET C, 0x0002"]);
}

#[test]
fn call_pushes_each_argument_then_jumps() {
    let output = compile("def add(a, b, c):\n    a += b\n    a += c\n    return a\n\nX = add(1, X, 3)\n");
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (body, footer) = segments(&output);
    assert_eq!(
        body,
        vec!["SET PUSH, 0x0001", "SET PUSH, X", "SET PUSH, 0x0003", "JSR add", "SET X, POP"]
    );
    assert_eq!(
        footer,
        vec![
            ":add",
            "SET J, POP",
            "SET C, POP",
            "SET B, POP",
            "SET A, POP",
            "ADD A, B",
            "ADD A, C",
            "SET PUSH, A",
            "SET PC, J",
            "SET PC, J",
        ]
    );
}

#[test]
fn argument_count_must_match() {
    let output = compile("def add(a, b):\n    pass\n\nadd(1)\n");
    assert_eq!(
        kinds(&output),
        vec![ErrorKind::ArityMismatch {
            name: "add".to_string(),
            what: "arguments",
            expected: 2,
            found: 1,
        }]
    );
}

#[test]
fn multiple_return_values_need_matching_targets() {
    let swap = "def swap(a, b):\n    return b, a\n\n";
    let output = compile(&format!("{swap}A, B = swap(A, B)\n"));
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (body, footer) = segments(&output);
    assert_eq!(
        body,
        vec!["SET PUSH, A", "SET PUSH, B", "JSR swap", "SET B, POP", "SET A, POP"]
    );
    assert_eq!(&footer[4..6], ["SET PUSH, B", "SET PUSH, A"]);

    for (targets, found) in [("A", 1), ("A, B, C", 3)] {
        let output = compile(&format!("{swap}{targets} = swap(A, B)\n"));
        assert!(output.failed);
        assert_eq!(
            kinds(&output),
            vec![ErrorKind::ArityMismatch {
                name: "swap".to_string(),
                what: "return values",
                expected: 2,
                found,
            }]
        );
    }

    let output = compile(&format!("{swap}swap(A, B)\n"));
    assert!(output.failed);
}

#[test]
fn divergent_return_counts_are_rejected() {
    let output = compile("def f(a):\n    while a != 0:\n        return a\n    return\n\nA = f(A)\n");
    assert_eq!(
        kinds(&output),
        vec![ErrorKind::ArityMismatch {
            name: "f".to_string(),
            what: "return values",
            expected: 1,
            found: 0,
        }]
    );
}

#[test]
fn loop_control_targets_innermost_loop() {
    let source = "while A != 0:\n    while B != 0:\n        break\n    continue\n";
    let output = compile(source);
    assert!(!output.failed);
    let (body, _) = segments(&output);
    assert_eq!(
        body,
        vec![
            ":builtin_loop_1_start",
            "IFE A, 0x0000",
            "SET PC, builtin_loop_1_end",
            ":builtin_loop_2_start",
            "IFE B, 0x0000",
            "SET PC, builtin_loop_2_end",
            "SET PC, builtin_loop_2_end",
            "SET PC, builtin_loop_2_start",
            ":builtin_loop_2_end",
            "SET PC, builtin_loop_1_start",
            "SET PC, builtin_loop_1_start",
            ":builtin_loop_1_end",
        ]
    );
}

#[test]
fn loop_control_builtins_match_statements() {
    let statements = compile("while A == 1:\n    break\n    continue\n");
    let builtins = compile("while A == 1:\n    builtin_break()\n    builtin_continue()\n");
    assert_eq!(statements.assembly, builtins.assembly);
    assert!(statements.assembly.contains("IFN A, 0x0001\n"));

    let output = compile("builtin_continue()\n");
    assert_eq!(kinds(&output), vec![ErrorKind::LoopControlOutsideLoop("continue")]);
}

#[test]
fn ordering_loops_branch_into_the_body() {
    let output = compile("while A > B:\n    A -= 1\n");
    let (body, _) = segments(&output);
    assert_eq!(
        body,
        vec![
            ":builtin_loop_1_start",
            "IFG A, B",
            "SET PC, builtin_loop_1_body",
            "SET PC, builtin_loop_1_end",
            ":builtin_loop_1_body",
            "SUB A, 0x0001",
            "SET PC, builtin_loop_1_start",
            ":builtin_loop_1_end",
        ]
    );

    let output = compile("while A < 10:\n    A += 1\n");
    let (body, _) = segments(&output);
    assert_eq!(body[1], "IFG 0x000a, A");
}

#[test]
fn unsupported_loop_tests_emit_nothing() {
    let output = compile("while A <= B:\n    A += 1\n");
    assert_eq!(kinds(&output), vec![ErrorKind::UnsupportedOperator("<=".to_string())]);
    let (body, _) = segments(&output);
    assert!(body.is_empty());

    let output = compile("while A:\n    pass\n");
    assert!(matches!(kinds(&output)[..], [ErrorKind::UnsupportedSyntax(_)]));
}

#[test]
fn recursive_calls_save_the_return_register() {
    let source = "def countdown(n):\n    while n != 0:\n        n -= 1\n        countdown(n)\n\ncountdown(3)\n";
    let output = compile(source);
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (body, footer) = segments(&output);
    assert_eq!(body, vec!["SET PUSH, 0x0003", "JSR countdown"]);
    assert_eq!(
        footer,
        vec![
            ":countdown",
            "SET J, POP",
            "SET A, POP",
            ":builtin_loop_1_start",
            "IFE A, 0x0000",
            "SET PC, builtin_loop_1_end",
            "SUB A, 0x0001",
            "SET PUSH, J",
            "SET PUSH, A",
            "JSR countdown",
            "SET J, POP",
            "SET PC, builtin_loop_1_start",
            ":builtin_loop_1_end",
            "SET PC, J",
        ]
    );
}

#[test]
fn callee_bodies_follow_their_caller() {
    let output = compile("def g():\n    pass\n\ndef f():\n    g()\n\nf()\n");
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (body, footer) = segments(&output);
    assert_eq!(body, vec!["JSR f"]);
    assert_eq!(
        footer,
        vec![
            ":f",
            "SET J, POP",
            "SET PUSH, J",
            "JSR g",
            "SET J, POP",
            "SET PC, J",
            ":g",
            "SET J, POP",
            "SET PC, J",
        ]
    );
}

#[test]
fn deeply_nested_bodies_stay_contiguous() {
    let source = "\
def h():
    pass

def g():
    h()

def f():
    g()
    h()

f()
";
    let output = compile(source);
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (_, footer) = segments(&output);
    assert_eq!(
        footer,
        vec![
            ":f",
            "SET J, POP",
            "SET PUSH, J",
            "JSR g",
            "SET J, POP",
            "SET PUSH, J",
            "JSR h",
            "SET J, POP",
            "SET PC, J",
            ":h",
            "SET J, POP",
            "SET PC, J",
            ":g",
            "SET J, POP",
            "SET PUSH, J",
            "JSR h",
            "SET J, POP",
            "SET PC, J",
        ]
    );
}

#[test]
fn bodies_are_emitted_on_first_call_or_export() {
    let output = compile("def unused():\n    A = undefined\n\n@export\ndef kept():\n    pass\n");
    assert!(!output.failed);
    let (_, footer) = segments(&output);
    assert_eq!(footer, vec![":kept", "SET J, POP", "SET PC, J"]);

    let output = compile("def f():\n    pass\n\nf()\nf()\n");
    let (body, footer) = segments(&output);
    assert_eq!(body, vec!["JSR f", "JSR f"]);
    assert_eq!(footer.iter().filter(|line| line.as_str() == ":f").count(), 1);
}

#[test]
fn function_definition_errors() {
    let cases = [
        "@inline\ndef f():\n    pass\n",
        "@export\n@export\ndef f():\n    pass\n",
    ];
    for source in cases {
        let output = compile(source);
        assert!(matches!(kinds(&output)[..], [ErrorKind::InvalidDecorator(_)]), "{source}");
    }

    let cases = [
        "def builtin_mine():\n    pass\n",
        "def f(a, b, c, d, e, g, h, k):\n    pass\n",
        "def f(a, a):\n    pass\n",
        "def f():\n    pass\n\ndef f():\n    pass\n",
        "def f():\n    def g():\n        pass\n\nf()\n",
    ];
    for source in cases {
        let output = compile(source);
        assert!(matches!(kinds(&output)[..], [ErrorKind::InvalidFunction(_)]), "{source}");
    }
}

#[test]
fn memset_addresses() {
    let output = compile(
        "builtin_memset(I + 0x8000, 0)\nbuiltin_memset(0x8000 + I, A)\nbuiltin_memset(0x10 + 0x8000, 1)\nbuiltin_memset(0x9000, B)\n",
    );
    assert!(!output.failed, "{:?}", output.diagnostics);
    let (body, _) = segments(&output);
    assert_eq!(
        body,
        vec![
            "SET [I+0x8000], 0x0000",
            "SET [I+0x8000], A",
            "SET [0x8010], 0x0001",
            "SET [0x9000], B",
        ]
    );

    let output = compile("builtin_memset(I + J, 0)\nbuiltin_memset(I - 1, 0)\nbuiltin_memset(1)\n");
    let kinds = kinds(&output);
    assert!(matches!(kinds[0], ErrorKind::InvalidOperand(_)));
    assert_eq!(kinds[1], ErrorKind::UnsupportedOperator("-".to_string()));
    assert!(matches!(kinds[2], ErrorKind::ArityMismatch { expected: 2, found: 1, .. }));
}

#[test]
fn enumerated_constants_and_halt() {
    let output = compile("builtin_define_enumerate(RED, GREEN, BLUE)\nA = BLUE\nbuiltin_halt()\n");
    assert!(!output.failed);
    let (body, _) = segments(&output);
    assert_eq!(body, vec!["SET A, 0x0002", "SET PC, builtin_halt"]);

    let output = compile("builtin_print(A)\n");
    assert_eq!(kinds(&output), vec![ErrorKind::UndefinedName("builtin_print".to_string())]);
}

#[test]
fn assignment_errors() {
    let output = compile("foo = 1\nA = 70000\nA %= 2\nA = B = 1\nA, B = 1\nreturn A\n");
    let kinds = kinds(&output);
    assert_eq!(kinds.len(), 6, "{kinds:?}");
    assert!(matches!(kinds[0], ErrorKind::InvalidTarget(_)));
    assert!(matches!(kinds[1], ErrorKind::InvalidOperand(_)));
    assert_eq!(kinds[2], ErrorKind::UnsupportedOperator("%=".to_string()));
    assert!(matches!(kinds[3], ErrorKind::UnsupportedSyntax(_)));
    assert!(matches!(kinds[4], ErrorKind::InvalidTarget(_)));
    assert_eq!(kinds[5], ErrorKind::ReturnOutsideFunction);
}

#[test]
fn negative_literals_wrap() {
    let output = compile("A = -1\nB -= -2\n");
    let (body, _) = segments(&output);
    assert_eq!(body, vec!["SET A, 0xffff", "SUB B, 0xfffe"]);
}

#[test]
fn unsupported_nodes_warn_without_failing() {
    let output = compile("\"\"\"docs\"\"\"\nif A == 1:\n    pass\nA + 1\nA = 2\n");
    assert!(!output.failed);
    assert_eq!(
        kinds(&output),
        vec![
            ErrorKind::UnsupportedNode("If".to_string()),
            ErrorKind::UnsupportedNode("BinOp".to_string()),
        ]
    );
    assert_eq!(output.warnings().count(), 2);
    let (body, _) = segments(&output);
    assert_eq!(body, vec!["SET A, 0x0002"]);
}

#[test]
fn output_is_deterministic() {
    let source = std::fs::read_to_string(programs().join("swap.p16")).expect("fixture");
    let first = compile(&source);
    let second = compile(&source);
    assert_eq!(first.assembly, second.assembly);
}

#[test]
fn labels_are_unique() {
    let source = "\
def inner(a):
    while a != 0:
        a -= 1
    return a

def outer(a):
    while a > 1:
        a = inner(a)
    return a

A = outer(5)
while A != 3:
    A = inner(A)
    A = outer(A)
";
    let output = compile(source);
    assert!(!output.failed, "{:?}", output.diagnostics);
    let labels: Vec<&str> = output
        .assembly
        .lines()
        .filter(|line| line.starts_with(':'))
        .collect();
    let unique: HashSet<&str> = labels.iter().copied().collect();
    assert_eq!(labels.len(), unique.len(), "{labels:?}");
    assert!(output.assembly.ends_with('\n'));
}

fn programs() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../tests/programs")
}
