//! A single-pass compiler for a small C-like language. Source text is
//! tokenized, parsed into a binary syntax tree with every variable already
//! bound to a stack slot, and lowered to NASM assembly for x86-64 Linux.

use std::path::Path;

pub mod backend;
pub mod diagnostics;
pub mod error;
pub mod frontend;

pub use backend::CodegenOptions;
pub use error::{CompileError, CompileResult};
pub use frontend::SourceFile;

use crate::frontend::{lexer::Lexer, parser::Parser};

/// Runs the whole pipeline over `source` and returns the assembly text
pub fn compile(source: &SourceFile, options: &CodegenOptions) -> CompileResult<String> {
    let tokens = Lexer::new(source).tokenize()?;
    let root = Parser::parse_program(&tokens)?;

    backend::generate(root.as_deref(), options)
}

/// Writes `contents` to a temporary file beside `destination` and moves it
/// into place, so the destination is never left half written
pub fn write_atomically(destination: &Path, contents: &str) -> std::io::Result<()> {
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = mktemp::Temp::new_file_in(directory)?;

    std::fs::write(&temp, contents)?;
    std::fs::rename(&temp, destination)?;

    // The file now lives at `destination`
    temp.release();

    Ok(())
}
