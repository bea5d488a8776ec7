//! The backend lowers the resolved syntax tree straight to assembly text.
//! Expressions are evaluated with a stack machine: every intermediate value
//! lives in `rax`, and the left operand of a binary operator is parked on the
//! native stack while the right operand is computed.

use crate::{
    error::CompileResult,
    frontend::ast::Node,
};

use self::targets::{CodeGenerator, Target};

pub mod assemblers;
pub mod targets;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Annotate generated code with `; ...` comments
    pub emit_comments: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            emit_comments: true,
        }
    }
}

/// Generates a complete program for the default target
pub fn generate(root: Option<&Node>, options: &CodegenOptions) -> CompileResult<String> {
    Target::default()
        .get_code_generator()
        .translate_to_asm(root, options)
}
