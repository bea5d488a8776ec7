use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{CommandFactory, Parser as ClapParser, error::ErrorKind};
use minic::{
    CodegenOptions, SourceFile, backend, diagnostics,
    frontend::{SourceFileOrigin, lexer::Lexer, parser::Parser},
};

#[derive(Debug, ClapParser)]
#[command(version, about, long_about = None)]
pub struct Args {
    source_file: PathBuf,

    /// Where to write the generated assembly
    #[arg(short, long, default_value = "out.asm")]
    output: PathBuf,

    /// Print the token stream to stderr
    #[arg(long)]
    dump_tokens: bool,

    /// Print the parsed tree to stderr
    #[arg(long)]
    dump_tree: bool,

    /// Leave annotation comments out of the generated assembly
    #[arg(long)]
    no_comments: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.source_file.exists() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Source file '{}' does not exist!", args.source_file.display()),
            )
            .exit()
    }

    if !args.source_file.is_file() {
        Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Input path '{}' is not a file!", args.source_file.display()),
            )
            .exit()
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&args.source_file).with_context(|| {
        format!(
            "Failed to read '{}' (or invalid UTF-8)",
            args.source_file.display()
        )
    })?;

    let source = SourceFile {
        contents,
        origin: SourceFileOrigin::File(args.source_file.clone()),
    };

    let options = CodegenOptions {
        emit_comments: !args.no_comments,
    };

    let Some(assembly) = compile_reporting(&source, &args, &options) else {
        anyhow::bail!("Compilation of '{}' failed", args.source_file.display());
    };

    minic::write_atomically(&args.output, &assembly)
        .with_context(|| format!("Failed to write '{}'", args.output.display()))
}

/// Runs each stage in turn, printing the requested dumps along the way.
/// Errors are reported here, where the source text is at hand.
fn compile_reporting(source: &SourceFile, args: &Args, options: &CodegenOptions) -> Option<String> {
    let result = Lexer::new(source).tokenize().and_then(|tokens| {
        if args.dump_tokens {
            for token in &tokens {
                eprintln!("{token}");
            }
        }

        let root = Parser::parse_program(&tokens)?;

        if args.dump_tree {
            match &root {
                Some(root) => eprintln!("{root}"),
                None => eprintln!("<empty program>"),
            }
        }

        backend::generate(root.as_deref(), options)
    });

    result
        .inspect_err(|error| diagnostics::report(error, source))
        .ok()
}
