use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Every way a compilation can fail. Each stage stops at its first error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Unexpected character `{character}`")]
    Lex { character: char, line: usize },

    #[error("{message}")]
    Syntax { message: String, line: usize },

    #[error("Variable `{name}` is already declared in this scope")]
    DuplicateDeclaration { name: String, line: usize },

    #[error("Variable `{name}` is not declared in this scope")]
    UndeclaredVariable { name: String, line: usize },

    #[error("Invalid syntax tree: {description}")]
    InvalidTree { description: String, line: usize },

    #[error("No lowering for operator `{token}`")]
    UnsupportedOperator { token: String, line: usize },
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn invalid_tree(description: impl Into<String>, line: usize) -> Self {
        Self::InvalidTree {
            description: description.into(),
            line,
        }
    }

    /// The 1-based source line the error originated from
    pub fn line(&self) -> usize {
        match self {
            Self::Lex { line, .. }
            | Self::Syntax { line, .. }
            | Self::DuplicateDeclaration { line, .. }
            | Self::UndeclaredVariable { line, .. }
            | Self::InvalidTree { line, .. }
            | Self::UnsupportedOperator { line, .. } => *line,
        }
    }

    /// Name of the pipeline stage that produced the error
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "lexer",
            Self::Syntax { .. }
            | Self::DuplicateDeclaration { .. }
            | Self::UndeclaredVariable { .. } => "parser",
            Self::InvalidTree { .. } | Self::UnsupportedOperator { .. } => "code generator",
        }
    }
}
