use indoc::indoc;
use itertools::Itertools;
use minic::{
    CodegenOptions, CompileError, SourceFile,
    backend::{self, targets::PRINT_INT_RUNTIME},
    compile,
    frontend::{
        ast::{Node, NodeKind, Slot},
        lexer::TokenKind,
    },
};

fn compile_str(source: &str) -> String {
    compile(&SourceFile::from_memory(source), &CodegenOptions::default())
        .expect("source should compile")
}

fn compile_quiet(source: &str) -> String {
    let options = CodegenOptions {
        emit_comments: false,
    };

    compile(&SourceFile::from_memory(source), &options).expect("source should compile")
}

/// The generated part of a program, without the bootstrap and the runtime
fn user_code(assembly: &str) -> &str {
    let (_, rest) = assembly
        .split_once("; user code\n")
        .expect("bootstrap should precede user code");
    let (code, _) = rest
        .split_once("; built-in functions")
        .expect("runtime should follow user code");

    code.trim_end()
}

/// The program with indentation removed, one instruction per line
fn flattened(assembly: &str) -> String {
    assembly.lines().map(str::trim).join("\n") + "\n"
}

fn labels(assembly: &str) -> Vec<&str> {
    assembly
        .lines()
        .filter_map(|line| line.strip_suffix(':'))
        .filter(|label| label.starts_with("_L"))
        .collect()
}

fn boxed(node: Node) -> Option<Box<Node>> {
    Some(node.boxed())
}

/// A program holding a single `main` whose body is the given statements
fn program(statements: Vec<Node>) -> Node {
    let body = statements.into_iter().rev().fold(None, |rest, statement| {
        boxed(Node::new(NodeKind::StatementList, "stmt", 1).with_children(boxed(statement), rest))
    });

    let main = Node::new(NodeKind::Function { frame_slot_count: 0 }, "_main", 1)
        .with_children(None, body);

    Node::new(NodeKind::DeclarationList, "dec", 1).with_children(boxed(main), None)
}

fn literal(value: &str) -> Node {
    Node::new(NodeKind::Literal, value, 1)
}

#[test]
fn smallest_program() {
    let assembly = compile_quiet("int main() { return 42; }");

    assert!(assembly.starts_with("global _start\n"));
    assert!(assembly.ends_with(PRINT_INT_RUNTIME));
    assert_eq!(
        user_code(&assembly),
        indoc! {"
            _main:
                push rbp
                mov rbp, rsp
                mov rax, 42
                mov rsp, rbp
                pop rbp
                ret"
        }
    );
}

#[test]
fn bootstrap_calls_main_and_exits_with_its_result() {
    let assembly = backend::generate(None, &CodegenOptions::default()).unwrap();

    assert!(assembly.contains(indoc! {"
        _start:
            call _main

            ; exit syscall using code passed in rax
            mov rdi, rax
            mov rax, 60
            syscall
    "}));
    assert_eq!(user_code(&assembly), "");
}

#[test]
fn generation_is_deterministic() {
    let source = indoc! {"
        int main() {
            int i = 0;
            while (i < 10) {
                if (i % 2 == 0) { print_int(i); }
                i = i + 1;
            }
            return 0;
        }
    "};

    assert_eq!(compile_str(source), compile_str(source));
}

#[test]
fn labels_are_unique_across_functions() {
    let assembly = compile_str(indoc! {"
        int spin(int n) {
            while (n > 0) { n = n - 1; }
            return n;
        }

        int main() {
            int i = 0;
            while (i < 3) { i = i + 1; }
            if (i == 3) { return spin(i); }
            return 1;
        }
    "});

    let labels = labels(&assembly);

    assert_eq!(labels.len(), 6);
    assert!(labels.iter().all_unique());

    // Loops branch back to the label preceding their condition
    assert!(assembly.contains("_L1:\n"));
    assert!(assembly.contains("    jmp _L1\n"));
    assert!(assembly.contains("    jz _L2\n"));
}

#[test]
fn frames_are_sized_by_the_largest_block() {
    let assembly = compile_str(indoc! {"
        int main() {
            { int a; int b; int c; }
            { int d; int e; int f; int g; int h; }
            return 0;
        }
    "});

    assert!(assembly.contains("    sub rsp, 48\n"));
}

#[test]
fn parameters_are_loaded_before_adding() {
    let assembly = compile_quiet("int add(int a, int b){ return a + b; }");

    assert_eq!(
        user_code(&assembly),
        indoc! {"
            _add:
                push rbp
                mov rbp, rsp
                mov rax, qword [rbp + 16]
                push rax
                mov rax, qword [rbp + 24]
                pop rbx
                add rax, rbx
                mov rsp, rbp
                pop rbp
                ret"
        }
    );
}

#[test]
fn calls_push_arguments_last_first_and_clean_up() {
    let assembly = compile_quiet(indoc! {"
        int sub(int a, int b) { return a - b; }
        int main() { return sub(7, 2); }
    "});

    let assembly = flattened(&assembly);

    assert!(assembly.contains(indoc! {"
            mov rax, 2
            push rax
            mov rax, 7
            push rax
            call _sub
            add rsp, 16
    "}));
    assert!(assembly.contains(indoc! {"
            pop rbx
            sub rbx, rax
            mov rax, rbx
    "}));
}

#[test]
fn calls_without_arguments_leave_the_stack_alone() {
    let assembly = compile_quiet(indoc! {"
        int seven() { return 7; }
        int main() { return seven(); }
    "});

    assert!(assembly.contains("    call _seven\n"));
    assert!(!assembly.contains("add rsp"));
}

#[test]
fn division_and_remainder_are_signed() {
    let assembly = compile_quiet("int main() { return 17 / 5 + 17 % 5; }");

    assert_eq!(assembly.matches("    cqo\n").count(), 2);
    assert_eq!(assembly.matches("    idiv rcx\n").count(), 2);
    assert_eq!(assembly.matches("    mov rax, rdx\n").count(), 1);
}

#[test]
fn unary_operators() {
    let assembly = flattened(&compile_quiet("int main() { return -!0; }"));

    assert!(assembly.contains(indoc! {"
            mov rax, 0
            not rax
            and rax, 1
            neg rax
    "}));
}

#[test]
fn logical_not_complements_the_low_bit() {
    let assembly = compile_quiet("int main() { return !2; }");

    // Non-canonical operands are masked, not compared against zero
    assert!(assembly.contains("    mov rax, 2\n    not rax\n    and rax, 1\n"));
    assert!(!user_code(&assembly).contains("sete"));
}

#[test]
fn logical_operators_produce_canonical_booleans() {
    let assembly = flattened(&compile_quiet("int main() { return 2 && 3 || 0; }"));

    assert!(assembly.contains(indoc! {"
            cmp rbx, 0
            setne bl
            cmp rax, 0
            setne al
            and al, bl
            and rax, 1
    "}));
    assert!(assembly.contains("\nor al, bl\n"));
}

#[test]
fn conditions_are_compared_against_zero() {
    let assembly = compile_quiet("int main() { int x = 3; while (x) { x = x - 1; } return x; }");

    assert!(assembly.contains(indoc! {"
        _L1:
            mov rax, qword [rbp - 8]
            cmp rax, 0
            jz _L2
    "}));
}

#[test]
fn fallthrough_bodies_get_a_trailing_epilogue() {
    let assembly = compile_str("int main() { int x = 1; }");

    assert!(assembly.contains("; Implicit return"));
    assert_eq!(user_code(&assembly).matches("    ret").count(), 1);

    let assembly = compile_str("int main() { return 0; }");
    assert!(!assembly.contains("; Implicit return"));
}

#[test]
fn comments_follow_the_options() {
    let source = "int main() { return 0; }";

    assert!(compile_str(source).contains("    ; Return\n"));
    assert!(!user_code(&compile_quiet(source)).contains(';'));
}

#[test]
fn globals_are_accepted_but_not_lowered() {
    let assembly = compile_quiet("int answer = 41; int main() { return 0; }");

    assert!(!assembly.contains("41"));
    assert!(assembly.contains("_main:"));
}

#[test]
fn assignment_needs_a_variable_target() {
    let error = compile(
        &SourceFile::from_memory("int main() {\n    1 = 2;\n    return 0;\n}"),
        &CodegenOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(error, CompileError::InvalidTree { line: 2, .. }));
}

#[test]
fn unresolved_identifiers_are_invalid() {
    let tree = program(vec![Node::new(
        NodeKind::Identifier { slot: None },
        "ghost",
        1,
    )]);

    let error = backend::generate(Some(&tree), &CodegenOptions::default()).unwrap_err();

    assert_eq!(
        error,
        CompileError::invalid_tree("Identifier 'ghost' was never resolved", 1)
    );
}

#[test]
fn operators_without_a_lowering_are_reported() {
    let not_equals = Node::new(NodeKind::Generic(TokenKind::NotEquals), "!=", 1)
        .with_children(boxed(literal("1")), boxed(literal("2")));
    let tree = program(vec![not_equals]);

    assert_eq!(
        backend::generate(Some(&tree), &CodegenOptions::default()),
        Err(CompileError::UnsupportedOperator {
            token: "!=".to_owned(),
            line: 1
        })
    );

    let address_of = Node::new(NodeKind::Generic(TokenKind::Ampersand), "&", 1).with_children(
        None,
        boxed(Node::new(NodeKind::Identifier { slot: Some(Slot(1)) }, "x", 1)),
    );
    let tree = program(vec![address_of]);

    assert!(matches!(
        backend::generate(Some(&tree), &CodegenOptions::default()),
        Err(CompileError::UnsupportedOperator { token, .. }) if token == "&"
    ));
}

#[test]
fn misplaced_list_cells_are_invalid() {
    let stray = Node::new(NodeKind::ArgumentList, "arg", 4);
    let tree = Node::new(NodeKind::DeclarationList, "dec", 1)
        .with_children(boxed(literal("1")), boxed(stray));

    assert_eq!(
        backend::generate(Some(&tree), &CodegenOptions::default()),
        Err(CompileError::invalid_tree(
            "Expected declaration list, found 'arg'",
            4
        ))
    );
}
