//! End-to-end compiler tests over real files, plus a full-toolchain check
//! that chains the compiler into the VM translator and the assembler.

use std::fs;
use std::path::Path;

use jack_compiler::{compile_file, compile_target, CompileError, Mode};

const POINT_JACK: &str = "\
/** A point with one coordinate. */
class Point {
    field int x;

    constructor Point new(int ax) {
        let x = ax;
        return this;
    }

    method int getX() {
        return x;
    }
}
";

#[test]
fn generates_vm_code_next_to_source() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Point.jack");
    fs::write(&input, POINT_JACK).unwrap();

    let output = compile_file(&input, Mode::Generate).unwrap();
    assert_eq!(output, dir.path().join("Point.vm"));

    let vm = fs::read_to_string(&output).unwrap();
    assert_eq!(
        vm,
        "function Point.new 0\n\
         push constant 1\n\
         call Memory.alloc 1\n\
         pop pointer 0\n\
         push argument 0\n\
         pop this 0\n\
         push pointer 0\n\
         return\n\
         function Point.getX 0\n\
         push argument 0\n\
         pop pointer 0\n\
         push this 0\n\
         return\n"
    );
}

#[test]
fn tokenize_mode_writes_t_xml() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Main.jack");
    fs::write(&input, "class Main { }\n").unwrap();

    let output = compile_file(&input, Mode::Tokenize).unwrap();
    assert_eq!(output, dir.path().join("MainT.xml"));

    let markup = fs::read_to_string(&output).unwrap();
    assert_eq!(
        markup,
        "<tokens>\n\
         <keyword> class </keyword>\n\
         <identifier> Main </identifier>\n\
         <symbol> { </symbol>\n\
         <symbol> } </symbol>\n\
         </tokens>\n"
    );
}

#[test]
fn parse_mode_writes_p_xml() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Main.jack");
    fs::write(&input, "class Main { }\n").unwrap();

    let output = compile_file(&input, Mode::Parse).unwrap();
    assert_eq!(output, dir.path().join("MainP.xml"));

    let markup = fs::read_to_string(&output).unwrap();
    assert!(markup.starts_with("<class>\n"));
    assert!(markup.ends_with("</class>\n"));
}

#[test]
fn directory_mode_compiles_every_class() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Point.jack"), POINT_JACK).unwrap();
    fs::write(
        dir.path().join("Main.jack"),
        "class Main { function void main() { var Point p; let p = Point.new(3); return; } }\n",
    )
    .unwrap();

    let outputs = compile_target(dir.path(), Mode::Generate).unwrap();
    assert_eq!(
        outputs,
        vec![dir.path().join("Main.vm"), dir.path().join("Point.vm")]
    );

    let main_vm = fs::read_to_string(dir.path().join("Main.vm")).unwrap();
    assert!(main_vm.contains("call Point.new 1\npop local 0\n"));
}

#[test]
fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        compile_target(dir.path(), Mode::Generate),
        Err(CompileError::NoJackFiles { .. })
    ));
}

#[test]
fn syntax_error_names_lexeme_and_expectation() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Broken.jack");
    fs::write(&input, "class Broken { function void f() { let ; } }\n").unwrap();

    match compile_file(&input, Mode::Generate) {
        Err(CompileError::ExpectedIdentifier { found }) => assert_eq!(found, ";"),
        other => panic!("expected ExpectedIdentifier, got {other:?}"),
    }
}

/// Compiles a two-class program, translates the directory of generated
/// `.vm` files, and assembles the combined output: every stage of the
/// toolchain has to accept the previous stage's output.
#[test]
fn full_toolchain_accepts_compiled_output() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("Sys.jack"),
        "class Sys { function void init() { do Main.main(); return; } }\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("Main.jack"),
        "class Main {
            static int result;
            function void main() {
                var int i;
                let i = 0;
                while (i < 5) {
                    let i = i + 1;
                }
                let result = i;
                return;
            }
        }\n",
    )
    .unwrap();

    compile_target(dir.path(), Mode::Generate).unwrap();
    let asm_path = vm_translator::translate_dir(dir.path()).unwrap();
    assert_vm_labels_resolve(&asm_path);

    let asm: Vec<String> = fs::read_to_string(&asm_path)
        .unwrap()
        .lines()
        .map(ToString::to_string)
        .collect();
    let binary = hack_assembler::assemble_lines(&asm).unwrap();
    for line in &binary {
        assert_eq!(line.len(), 16);
    }
}

/// Every `@label` referencing a minted label must have a matching
/// definition in the same program.
fn assert_vm_labels_resolve(asm_path: &Path) {
    let text = fs::read_to_string(asm_path).unwrap();
    let defined: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix('(').and_then(|l| l.strip_suffix(')')))
        .collect();
    for line in text.lines() {
        let Some(symbol) = line.strip_prefix('@') else {
            continue;
        };
        if symbol.contains('$') {
            assert!(
                defined.contains(&symbol),
                "label {symbol} referenced but never defined"
            );
        }
    }
}
