use crate::{
    backend::{
        CodegenOptions,
        assemblers::x86_64::{Assembler, X86FullRegister},
        targets::CodeGenerator,
    },
    error::{CompileError, CompileResult},
    frontend::{
        ast::{Node, NodeKind, Slot},
        lexer::{Keyword, TokenKind},
    },
};

/// Integer output routine appended verbatim to every program
pub const PRINT_INT_RUNTIME: &str = include_str!("./x86_64-linux-gnu_print_int.s");

/// Holds every expression result
const PRIMARY: X86FullRegister = X86FullRegister::Rax;
/// Receives the saved left operand of a binary operator
const SECONDARY: X86FullRegister = X86FullRegister::Rbx;
const DIVISOR: X86FullRegister = X86FullRegister::Rcx;
const REMAINDER: X86FullRegister = X86FullRegister::Rdx;

pub struct CodeGeneratorX86_64LinuxGnu;

impl CodeGenerator for CodeGeneratorX86_64LinuxGnu {
    fn translate_to_asm(
        &self,
        root: Option<&Node>,
        options: &CodegenOptions,
    ) -> CompileResult<String> {
        let mut emitter = Emitter {
            assembler: Assembler::new(options.emit_comments),
            label_count: 0,
        };

        if let Some(root) = root {
            emitter.codegen_declaration_list(root)?;
        }

        Ok(format!(
            indoc::indoc! {r#"
            global _start

            section .text

            ; program entrypoint
            _start:
                call _main

                ; exit syscall using code passed in rax
                mov rdi, rax
                mov rax, 60
                syscall

            ; user code
            {0}
            ; built-in functions
            {1}"#
            },
            emitter.assembler.into_output(),
            PRINT_INT_RUNTIME,
        ))
    }
}

/// State of one generation run. Labels are numbered from a counter that lives
/// as long as the run, so they are unique across all functions.
struct Emitter {
    assembler: Assembler,
    label_count: usize,
}

/// Items of the list chain starting at `head`, checking that every cell is
/// of kind `kind`
fn list_cells<'tree>(
    head: &'tree Node,
    kind: NodeKind,
    expecting: &str,
) -> CompileResult<Vec<Option<&'tree Node>>> {
    let mut items = Vec::new();
    let mut cell = Some(head);

    while let Some(current) = cell {
        if current.kind != kind {
            return Err(CompileError::invalid_tree(
                format!("Expected {expecting}, found '{}'", current.text),
                current.line,
            ));
        }

        items.push(current.left.as_deref());
        cell = current.right.as_deref();
    }

    Ok(items)
}

/// Byte offset of the resolved identifier `node`, which `parent` requires
fn resolved_offset(node: Option<&Node>, parent: &Node, expecting: &str) -> CompileResult<i64> {
    match node.and_then(Node::slot) {
        Some(slot) => Ok(slot.offset()),
        None => Err(CompileError::invalid_tree(
            format!("Expected {expecting} in '{}'", parent.text),
            parent.line,
        )),
    }
}

fn required_child<'tree>(
    child: &'tree Option<Box<Node>>,
    parent: &Node,
    expecting: &str,
) -> CompileResult<&'tree Node> {
    child.as_deref().ok_or_else(|| {
        CompileError::invalid_tree(
            format!("Expected {expecting} in '{}'", parent.text),
            parent.line,
        )
    })
}

fn is_return(node: &Node) -> bool {
    node.kind == NodeKind::Generic(TokenKind::Keyword(Keyword::Return))
}

impl Emitter {
    fn next_label(&mut self) -> String {
        self.label_count += 1;
        format!("_L{}", self.label_count)
    }

    fn codegen_declaration_list(&mut self, root: &Node) -> CompileResult<()> {
        for declaration in list_cells(root, NodeKind::DeclarationList, "declaration list")? {
            let Some(declaration) = declaration else {
                return Err(CompileError::invalid_tree("Declaration expected", root.line));
            };

            // Global variables are accepted by the parser but have no storage
            if let NodeKind::Function { .. } = declaration.kind {
                self.codegen_function(declaration)?;
            }
        }

        Ok(())
    }

    fn codegen_function(&mut self, function: &Node) -> CompileResult<()> {
        let frame_size = function.frame_size_bytes().unwrap_or_default();

        self.assembler.label(&function.text);
        self.assembler.function_prologue(frame_size);

        let mut ends_with_return = false;

        if let Some(body) = function.right.as_deref() {
            let statements = list_cells(body, NodeKind::StatementList, "statement list")?;
            ends_with_return = statements.last().copied().flatten().is_some_and(is_return);

            for statement in statements.into_iter().flatten() {
                self.codegen_statement(statement)?;
            }
        }

        // Keep control from running into whatever label follows
        if !ends_with_return {
            self.assembler.comment("Implicit return");
            self.assembler.function_epilogue();
        }

        self.assembler.blank_line();

        Ok(())
    }

    fn codegen_statement_list(&mut self, list: &Node) -> CompileResult<()> {
        for statement in list_cells(list, NodeKind::StatementList, "statement list")?
            .into_iter()
            .flatten()
        {
            self.codegen_statement(statement)?;
        }

        Ok(())
    }

    fn codegen_statement(&mut self, statement: &Node) -> CompileResult<()> {
        match &statement.kind {
            NodeKind::StatementList => self.codegen_statement_list(statement),
            NodeKind::If { condition } => self.codegen_if(statement, condition),
            NodeKind::Generic(TokenKind::Keyword(Keyword::Return)) => {
                let value = required_child(&statement.right, statement, "return value")?;

                self.codegen_expression(value)?;
                self.assembler.comment("Return");
                self.assembler.function_epilogue();

                Ok(())
            }
            NodeKind::Generic(TokenKind::Keyword(Keyword::While)) => self.codegen_while(statement),
            NodeKind::Generic(kind) if kind.is_type_keyword() => self.codegen_local(statement),
            _ => self.codegen_expression(statement),
        }
    }

    fn codegen_if(&mut self, statement: &Node, condition: &Node) -> CompileResult<()> {
        let negative_label = self.next_label();
        let end_label = self.next_label();

        self.assembler.comment("If");
        self.codegen_expression(condition)?;
        self.assembler.emit(format!("cmp {PRIMARY}, 0"));
        self.assembler.emit(format!("jz {negative_label}"));

        if let Some(positive) = statement.left.as_deref() {
            self.codegen_statement_list(positive)?;
        }

        self.assembler.emit(format!("jmp {end_label}"));
        self.assembler.label(&negative_label);

        if let Some(negative) = statement.right.as_deref() {
            self.codegen_statement_list(negative)?;
        }

        self.assembler.label(&end_label);

        Ok(())
    }

    fn codegen_while(&mut self, statement: &Node) -> CompileResult<()> {
        let condition = required_child(&statement.left, statement, "loop condition")?;

        let start_label = self.next_label();
        let end_label = self.next_label();

        self.assembler.comment("While");
        self.assembler.label(&start_label);
        self.codegen_expression(condition)?;
        self.assembler.emit(format!("cmp {PRIMARY}, 0"));
        self.assembler.emit(format!("jz {end_label}"));

        if let Some(body) = statement.right.as_deref() {
            self.codegen_statement_list(body)?;
        }

        self.assembler.emit(format!("jmp {start_label}"));
        self.assembler.label(&end_label);

        Ok(())
    }

    fn codegen_local(&mut self, declaration: &Node) -> CompileResult<()> {
        let offset = resolved_offset(
            declaration.left.as_deref(),
            declaration,
            "variable name in declaration",
        )?;

        // Uninitialized locals need no code
        let Some(initializer) = declaration.right.as_deref() else {
            return Ok(());
        };

        self.codegen_expression(initializer)?;
        self.assembler.store_slot(offset, PRIMARY);

        Ok(())
    }

    /// Leaves the value of `expression` in the primary register
    fn codegen_expression(&mut self, expression: &Node) -> CompileResult<()> {
        match &expression.kind {
            NodeKind::Literal => {
                self.assembler
                    .emit(format!("mov {PRIMARY}, {}", expression.text));
            }
            NodeKind::Identifier { slot: Some(slot) } => {
                self.assembler.load_slot(PRIMARY, slot.offset());
            }
            NodeKind::Identifier { slot: None } => {
                return Err(CompileError::invalid_tree(
                    format!("Identifier '{}' was never resolved", expression.text),
                    expression.line,
                ));
            }
            NodeKind::Call => self.codegen_function_call(expression)?,
            NodeKind::Generic(TokenKind::Equals) => {
                let offset = resolved_offset(
                    expression.left.as_deref(),
                    expression,
                    "identifier before '='",
                )?;
                let value = required_child(&expression.right, expression, "assigned value")?;

                self.codegen_expression(value)?;
                self.assembler.store_slot(offset, PRIMARY);
            }
            NodeKind::Generic(operator) => {
                match (expression.left.as_deref(), expression.right.as_deref()) {
                    (Some(lhs), Some(rhs)) => {
                        self.codegen_expression(lhs)?;
                        self.assembler.push(PRIMARY);
                        self.codegen_expression(rhs)?;
                        self.assembler.pop(SECONDARY);

                        self.lower_binary_operator(*operator, expression)?;
                    }
                    (None, Some(operand)) => {
                        self.codegen_expression(operand)?;

                        self.lower_unary_operator(*operator, expression)?;
                    }
                    _ => {
                        return Err(CompileError::invalid_tree(
                            format!("Operator '{}' is missing an operand", expression.text),
                            expression.line,
                        ));
                    }
                }
            }
            _ => {
                return Err(CompileError::invalid_tree(
                    format!("Expected expression, found '{}'", expression.text),
                    expression.line,
                ));
            }
        }

        Ok(())
    }

    /// Combines the left operand in the secondary register with the right
    /// operand in the primary register
    fn lower_binary_operator(&mut self, operator: TokenKind, node: &Node) -> CompileResult<()> {
        let condition_code = match operator {
            TokenKind::Plus => {
                self.assembler.emit(format!("add {PRIMARY}, {SECONDARY}"));
                return Ok(());
            }
            TokenKind::Minus => {
                self.assembler.emit(format!("sub {SECONDARY}, {PRIMARY}"));
                self.assembler.emit(format!("mov {PRIMARY}, {SECONDARY}"));
                return Ok(());
            }
            TokenKind::Asterisk => {
                self.assembler.emit(format!("imul {PRIMARY}, {SECONDARY}"));
                return Ok(());
            }
            TokenKind::Divide | TokenKind::Modulus => {
                self.assembler.emit(format!("mov {DIVISOR}, {PRIMARY}"));
                self.assembler.emit(format!("mov {PRIMARY}, {SECONDARY}"));
                self.assembler.emit("cqo");
                self.assembler.emit(format!("idiv {DIVISOR}"));

                if operator == TokenKind::Modulus {
                    self.assembler.emit(format!("mov {PRIMARY}, {REMAINDER}"));
                }

                return Ok(());
            }
            TokenKind::LogicalAnd | TokenKind::LogicalOr => {
                // Both operands are already evaluated; reduce each to 0/1
                // before combining them
                let combine = if operator == TokenKind::LogicalAnd { "and" } else { "or" };

                self.assembler.emit(format!("cmp {SECONDARY}, 0"));
                self.assembler.emit(format!("setne {}", SECONDARY.as_8_bit()));
                self.assembler.emit(format!("cmp {PRIMARY}, 0"));
                self.assembler.emit(format!("setne {}", PRIMARY.as_8_bit()));
                self.assembler.emit(format!(
                    "{combine} {}, {}",
                    PRIMARY.as_8_bit(),
                    SECONDARY.as_8_bit()
                ));
                self.assembler.emit(format!("and {PRIMARY}, 1"));
                return Ok(());
            }
            TokenKind::LessThan => "l",
            TokenKind::LessThanOrEqualTo => "le",
            TokenKind::GreaterThan => "g",
            TokenKind::GreaterThanOrEqualTo => "ge",
            TokenKind::DoubleEquals => "e",
            _ => {
                return Err(CompileError::UnsupportedOperator {
                    token: node.text.clone(),
                    line: node.line,
                });
            }
        };

        self.assembler.emit(format!("cmp {SECONDARY}, {PRIMARY}"));
        self.assembler
            .emit(format!("set{condition_code} {}", PRIMARY.as_8_bit()));
        self.assembler.emit(format!("and {PRIMARY}, 1"));

        Ok(())
    }

    fn lower_unary_operator(&mut self, operator: TokenKind, node: &Node) -> CompileResult<()> {
        match operator {
            TokenKind::Minus => self.assembler.emit(format!("neg {PRIMARY}")),
            TokenKind::Bang => {
                // Complement then keep the low bit, so only 0 and 1 invert
                self.assembler.emit(format!("not {PRIMARY}"));
                self.assembler.emit(format!("and {PRIMARY}, 1"));
            }
            _ => {
                return Err(CompileError::UnsupportedOperator {
                    token: node.text.clone(),
                    line: node.line,
                });
            }
        }

        Ok(())
    }

    /// Arguments are evaluated and pushed right to left, last argument first,
    /// so the first one ends up directly above the callee's return address.
    /// The caller pops them again after the call.
    fn codegen_function_call(&mut self, call: &Node) -> CompileResult<()> {
        let arguments = match call.left.as_deref() {
            Some(arguments) => list_cells(arguments, NodeKind::ArgumentList, "argument list")?,
            None => Vec::new(),
        };

        self.assembler.comment(format!("Call {}", call.text));

        for argument in arguments.iter().rev() {
            let Some(argument) = argument else {
                return Err(CompileError::invalid_tree(
                    format!("Argument expected in call to '{}'", call.text),
                    call.line,
                ));
            };

            self.codegen_expression(argument)?;
            self.assembler.push(PRIMARY);
        }

        self.assembler.emit(format!("call _{}", call.text));

        if !arguments.is_empty() {
            self.assembler.emit(format!(
                "add rsp, {}",
                arguments.len() as i64 * Slot::SIZE_BYTES
            ));
        }

        Ok(())
    }
}
