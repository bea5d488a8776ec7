use std::io::IsTerminal;

use colored::Colorize;

use crate::{error::CompileError, frontend::SourceFile};

/// Formats `error` the way it is shown to the user: a headline naming the
/// failing stage and location, followed by the offending source line.
pub fn render(error: &CompileError, source: &SourceFile) -> String {
    let line = error.line();

    let mut report = format!(
        "{}: {} ({}:{})\n",
        "error".red().bold(),
        error.to_string().bold(),
        source.origin,
        line,
    );

    report.push_str(&format!(
        "  {} reported by the {}\n",
        "-->".blue(),
        error.stage()
    ));

    if let Some(text) = source.line(line) {
        let gutter = line.to_string();

        report.push_str(&format!("{} {}\n", " ".repeat(gutter.len()), "|".blue()));
        report.push_str(&format!("{} {} {text}\n", gutter.blue(), "|".blue()));
    }

    report
}

/// Prints a rendered error to stderr, dropping the colors when stderr is not
/// a terminal
pub fn report(error: &CompileError, source: &SourceFile) {
    let rendered = render(error, source);

    if std::io::stderr().is_terminal() {
        eprint!("{rendered}");
    } else {
        eprint!("{}", strip_ansi_escapes::strip_str(rendered));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_quotes_the_offending_line() {
        let source = SourceFile::from_memory("int main() {\n  return y;\n}\n");
        let error = CompileError::UndeclaredVariable {
            name: "y".into(),
            line: 2,
        };

        let rendered = strip_ansi_escapes::strip_str(render(&error, &source));

        assert!(rendered.starts_with("error: Variable `y` is not declared in this scope (<memory>:2)"));
        assert!(rendered.contains("reported by the parser"));
        assert!(rendered.contains("2 |   return y;"));
    }

    #[test]
    fn lines_past_the_end_are_not_quoted() {
        let source = SourceFile::from_memory("int main() {");
        let error = CompileError::syntax("Unexpected end of input", 9);

        let rendered = strip_ansi_escapes::strip_str(render(&error, &source));

        assert_eq!(rendered.lines().count(), 2);
    }
}
