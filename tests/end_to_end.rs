use std::path::Path;

use anyhow::Context;
use indoc::indoc;
use minic::{
    CodegenOptions, CompileError, SourceFile, compile, diagnostics,
    frontend::{ast::NodeKind, lexer::Lexer, parser::Parser},
    write_atomically,
};

const BRANCHING_PROGRAM: &str = "int main(){ int x = 1; if (x < 2) { return 1; } return 0; }";

#[test]
fn branching_program_parses_to_one_function_with_one_slot() -> anyhow::Result<()> {
    let source = SourceFile::from_memory(BRANCHING_PROGRAM);
    let tokens = Lexer::new(&source).tokenize()?;
    let root = Parser::parse_program(&tokens)?.context("program should not be empty")?;

    let declarations: Vec<_> = root.list_items().collect();
    assert_eq!(declarations.len(), 1);

    let main = declarations[0].context("declaration should be present")?;
    assert_eq!(main.kind, NodeKind::Function { frame_slot_count: 1 });
    assert_eq!(main.text, "_main");

    Ok(())
}

#[test]
fn branching_program_compiles_to_the_expected_program() -> anyhow::Result<()> {
    let assembly = compile(&SourceFile::from_memory(BRANCHING_PROGRAM), &CodegenOptions::default())?;

    assert!(assembly.contains(indoc! {"
        _main:
            push rbp
            mov rbp, rsp
            sub rsp, 16
            mov rax, 1
            mov qword [rbp - 8], rax
            ; If
            mov rax, qword [rbp - 8]
            push rax
            mov rax, 2
            pop rbx
            cmp rbx, rax
            setl al
            and rax, 1
            cmp rax, 0
            jz _L1
            mov rax, 1
            ; Return
            mov rsp, rbp
            pop rbp
            ret
            jmp _L2
        _L1:
        _L2:
            mov rax, 0
            ; Return
            mov rsp, rbp
            pop rbp
            ret
    "}));

    Ok(())
}

#[test]
fn printing_program_calls_the_runtime() -> anyhow::Result<()> {
    let assembly = compile(
        &SourceFile::from_memory(indoc! {"
            int square(int n) { return n * n; }

            int main() {
                int i = 1;
                while (i <= 3) {
                    print_int(square(i));
                    i = i + 1;
                }
                return 0;
            }
        "}),
        &CodegenOptions::default(),
    )?;

    assert!(assembly.contains("    call _square\n"));
    assert!(assembly.contains("    imul rax, rbx\n"));
    assert!(assembly.contains("    call _print_int\n"));
    assert!(assembly.contains("\n_print_int:\n"));
    assert!(assembly.contains("    setle al\n"));

    Ok(())
}

#[test]
fn lexer_errors_stop_the_pipeline() {
    let source = SourceFile::from_memory("int main() {\n    return 1 @ 2;\n}\n");

    let error = compile(&source, &CodegenOptions::default()).unwrap_err();
    assert_eq!(
        error,
        CompileError::Lex {
            character: '@',
            line: 2
        }
    );

    let report = strip_ansi_escapes::strip_str(diagnostics::render(&error, &source));
    assert!(report.contains("Unexpected character `@`"));
    assert!(report.contains("reported by the lexer"));
    assert!(report.contains("2 |     return 1 @ 2;"));
}

#[test]
fn output_is_replaced_atomically() -> anyhow::Result<()> {
    let temp_dir = mktemp::Temp::new_dir()?;
    let directory: &Path = temp_dir.as_ref();
    let destination = directory.join("out.asm");

    std::fs::write(&destination, "stale")?;

    let assembly = compile(&SourceFile::from_memory(BRANCHING_PROGRAM), &CodegenOptions::default())?;
    write_atomically(&destination, &assembly)?;

    assert_eq!(std::fs::read_to_string(&destination)?, assembly);

    let entries = std::fs::read_dir(directory)?.count();
    assert_eq!(entries, 1, "temporary file should have been moved into place");

    Ok(())
}
