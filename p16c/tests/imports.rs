use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use tempfile::TempDir;

use p16c::{
    compile_source, CompileOptions, CompileOutput, ErrorKind, ExtensionRegistry, MacroError, NativeModule,
    Operand, Register, Value,
};

fn write(root: &Path, relative: &str, source: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create module dir");
    }
    fs::write(path, source).expect("write module");
}

fn compile(source: &str, options: CompileOptions) -> CompileOutput {
    compile_source(source, options).expect("parse source")
}

fn kinds(output: &CompileOutput) -> Vec<ErrorKind> {
    output.diagnostics.iter().map(|diag| diag.kind().clone()).collect()
}

fn lines(output: &CompileOutput) -> Vec<&str> {
    output.assembly.lines().collect()
}

/// `gfx.plot(address, value)` writes one word; importing `gfx` bumps `inits`.
fn gfx_registry(inits: Rc<Cell<u32>>) -> ExtensionRegistry {
    let module = NativeModule::new()
        .with_constant("width", Value::Number(32))
        .with_macro("plot", |emitter, _, args, _| {
            let [address, value] = args else {
                return Err(MacroError::new(format!("expected 2 arguments, found {}", args.len())));
            };
            let address = address
                .to_operand()
                .ok_or_else(|| MacroError::new("address must be a word or register"))?;
            let value = value
                .to_operand()
                .ok_or_else(|| MacroError::new("value must be a word or register"))?;
            emitter.set(Operand::mem(address), value);
            Ok(())
        })
        .with_init(move |emitter, _| {
            inits.set(inits.get() + 1);
            emitter.set(Register::Z, Operand::Lit(0));
            Ok(())
        });
    let mut registry = ExtensionRegistry::new();
    registry.register("gfx", module);
    registry
}

#[test]
fn source_module_functions_are_mangled() {
    let root = TempDir::new().expect("tempdir");
    write(root.path(), "lib/counter.p16", "def tick():\n    X += 1\n");
    let options = CompileOptions::empty().with_root(root.path());
    let output = compile("import lib.counter\nlib.counter.tick()\nlib.counter.tick()\n", options);
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert_eq!(
        lines(&output),
        vec![
            "JSR lib__counter__tick",
            "JSR lib__counter__tick",
            "SET PC, builtin_halt",
            ":builtin_halt",
            "SET PC, builtin_halt",
            ":lib__counter__tick",
            "SET J, POP",
            "ADD X, 0x0001",
            "SET PC, J",
        ]
    );
}

#[test]
fn first_root_wins() {
    let first = TempDir::new().expect("tempdir");
    let second = TempDir::new().expect("tempdir");
    write(first.path(), "pick.p16", "@export\ndef first():\n    pass\n");
    write(second.path(), "pick.p16", "@export\ndef second():\n    pass\n");
    let options = CompileOptions::empty().with_root(first.path()).with_root(second.path());
    let output = compile("import pick\n", options);
    assert!(output.assembly.contains(":pick__first\n"));
    assert!(!output.assembly.contains("second"));
}

#[test]
fn extension_is_installed_once() {
    let inits = Rc::new(Cell::new(0));
    let options = CompileOptions::empty().with_registry(gfx_registry(inits.clone()));
    let source = "import gfx\nimport gfx\ngfx.plot(0x8000, A)\nB = gfx.width\n";
    let output = compile(source, options);
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert_eq!(inits.get(), 1);
    assert_eq!(
        &lines(&output)[..3],
        ["SET Z, 0x0000", "SET [0x8000], A", "SET B, 0x0020"]
    );
}

#[test]
fn macros_see_parameter_registers() {
    let options = CompileOptions::empty().with_registry(gfx_registry(Rc::default()));
    let source = "import gfx\n\ndef draw(cell, value):\n    gfx.plot(cell, value)\n\ndraw(0x8001, 7)\n";
    let output = compile(source, options);
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert!(output.assembly.contains(":draw\nSET J, POP\nSET B, POP\nSET A, POP\nSET [A], B\nSET PC, J\n"));
}

#[test]
fn macro_failures_become_diagnostics() {
    let options = CompileOptions::empty().with_registry(gfx_registry(Rc::default()));
    let output = compile("import gfx\ngfx.plot(1)\nA = gfx.plot(1, 2)\n", options);
    assert_eq!(
        kinds(&output),
        vec![
            ErrorKind::Macro {
                name: "gfx.plot".to_string(),
                message: "expected 2 arguments, found 1".to_string(),
            },
            ErrorKind::InvalidTarget("`gfx.plot` produces no value to assign".to_string()),
        ]
    );
}

#[test]
fn extension_and_source_share_a_namespace() {
    let root = TempDir::new().expect("tempdir");
    write(root.path(), "gfx.p16", "def clear():\n    plot(0x8000, width)\n");
    let options = CompileOptions::empty()
        .with_root(root.path())
        .with_registry(gfx_registry(Rc::default()));
    let output = compile("import gfx\ngfx.clear()\n", options);
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert!(output
        .assembly
        .contains(":gfx__clear\nSET J, POP\nSET [0x8000], 0x0020\nSET PC, J\n"));
}

#[test]
fn missing_module() {
    let output = compile("import nowhere\n", CompileOptions::empty());
    assert!(output.failed);
    assert_eq!(
        kinds(&output),
        vec![ErrorKind::ModuleNotFound {
            name: "nowhere".to_string(),
            reason: None,
        }]
    );
}

#[test]
fn missing_module_is_reported_at_every_import() {
    let output = compile("import nowhere\nimport nowhere\n", CompileOptions::empty());
    let lines: Vec<u32> = output.diagnostics.iter().map(|diag| diag.line()).collect();
    assert_eq!(lines, vec![1, 2]);
    assert!(output
        .diagnostics
        .iter()
        .all(|diag| matches!(diag.kind(), ErrorKind::ModuleNotFound { .. })));
}

#[test]
fn errors_inside_imported_module_are_attributed() {
    let root = TempDir::new().expect("tempdir");
    write(root.path(), "broken.p16", "A = 1\nB = missing\n");
    let options = CompileOptions::empty().with_root(root.path()).with_file("main.p16");
    let output = compile("import broken\nC = 3\n", options);
    assert!(output.failed);
    assert_eq!(
        kinds(&output),
        vec![
            ErrorKind::UndefinedName("missing".to_string()),
            ErrorKind::ImportFailed("broken".to_string()),
        ]
    );
    let inner = &output.diagnostics[0];
    assert_eq!(inner.line(), 2);
    assert!(inner.file().is_some_and(|file| file.ends_with("broken.p16")));
    assert_eq!(output.diagnostics[1].file(), Some("main.p16"));
    assert!(output.assembly.contains("SET C, 0x0003\n"));
}

#[test]
fn aliased_imports_are_rejected() {
    let output = compile("import math as m\n", CompileOptions::default());
    assert!(matches!(kinds(&output)[..], [ErrorKind::UnsupportedSyntax(_)]));
}

#[test]
fn bundled_math_module() {
    let output = compile("import math\nA = math.clamp(A, 2, 9)\n", CompileOptions::default());
    assert!(!output.failed, "{:?}", output.diagnostics);
    for label in [":math__clamp\n", ":math__max\n", ":math__min\n"] {
        assert_eq!(output.assembly.matches(label).count(), 1, "{label}");
    }
    assert!(output.assembly.starts_with("SET PUSH, A\nSET PUSH, 0x0002\nSET PUSH, 0x0009\nJSR math__clamp\nSET A, POP\n"));

    let lines = lines(&output);
    let start = lines
        .iter()
        .position(|line| *line == ":math__clamp")
        .expect("clamp label");
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.starts_with(':'))
        .map_or(lines.len(), |offset| start + 1 + offset);
    assert_eq!(
        lines[start..end],
        [
            ":math__clamp",
            "SET J, POP",
            "SET C, POP",
            "SET B, POP",
            "SET A, POP",
            "SET PUSH, J",
            "SET PUSH, A",
            "SET PUSH, B",
            "JSR math__max",
            "SET A, POP",
            "SET J, POP",
            "SET PUSH, J",
            "SET PUSH, A",
            "SET PUSH, C",
            "JSR math__min",
            "SET A, POP",
            "SET J, POP",
            "SET PUSH, A",
            "SET PC, J",
            "SET PC, J",
        ]
    );
}

#[test]
fn init_routines_do_not_split_function_bodies() {
    let module = NativeModule::new().with_init(|emitter, symbols| {
        let label = symbols.expand_name("setup");
        emitter.in_footer(|e| {
            e.write_label(&label);
            e.return_from_subroutine();
        });
        Ok(())
    });
    let mut registry = ExtensionRegistry::new();
    registry.register("ticker", module);
    let options = CompileOptions::empty().with_registry(registry);
    let output = compile("def f():\n    import ticker\n    A = 1\n\nf()\n", options);
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert!(output.assembly.ends_with(
        ":f\nSET J, POP\nSET A, 0x0001\nSET PC, J\n:ticker__setup\nSET PC, POP\n"
    ));
}

#[test]
fn bundled_display_writes_screen_words() {
    let source = "import dev.display\n\
        dev.display.configure(color=dev.display.color_white, highlight_color=dev.display.color_black)\n\
        dev.display.write_static(\"hi\", 0x8000)\n";
    let output = compile(source, CompileOptions::default());
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert_eq!(&lines(&output)[..2], ["SET [0x8000], 0xf068", "SET [0x8001], 0xf069"]);

    let output = compile("import dev.display\ndev.display.write_static(\"hi\", 0x8000)\n", CompileOptions::default());
    assert!(matches!(kinds(&output)[..], [ErrorKind::Macro { .. }]));
}

#[test]
fn bundled_drivers_initialize_once() {
    let output = compile("import dev.drivers\nimport dev.drivers\n", CompileOptions::default());
    assert!(!output.failed, "{:?}", output.diagnostics);
    assert_eq!(output.assembly.matches("JSR dev__drivers__initialize\n").count(), 1);
    assert_eq!(output.assembly.matches(":dev__drivers__initialize\n").count(), 1);
}
