use colored::Colorize;
use itertools::Itertools;

use crate::{
    analyzer::error::ScopeError, compiler::error::CompilerError, parser::error::ParserError,
    source::CodeArea,
};

pub struct ErrorDisplay {
    pub typ: &'static str,
    pub msg: String,
    pub area: CodeArea,
}

impl ErrorDisplay {
    pub fn render(&self) -> String {
        let code = self.area.src.code();
        let (line, col) = self.area.line_col();

        let mut out = format!(
            "{}: {}\n{} {}:{}:{}\n",
            self.typ.bright_red().bold(),
            self.msg.bright_yellow(),
            "in".dimmed(),
            self.area.src.name().bright_blue(),
            line,
            col,
        );

        let lines = code.split_inclusive('\n').collect_vec();
        let mut line_start = lines.iter().take(line - 1).map(|l| l.len()).sum::<usize>();

        let gutter = (line + lines.len()).to_string().len();

        for (n, text) in lines.iter().enumerate().skip(line - 1) {
            if n + 1 > line && line_start >= self.area.span.end {
                break;
            }
            let text = text.trim_end_matches(['\n', '\r']);
            let line_end = line_start + text.len();

            let from = self.area.span.start.clamp(line_start, line_end) - line_start;
            let to = self.area.span.end.clamp(line_start, line_end) - line_start;

            out += &format!(
                " {:>gutter$} {} {}{}{}\n",
                (n + 1).to_string().dimmed(),
                "|".dimmed(),
                &text[..from],
                text[from..to].bright_red().underline(),
                &text[to..],
            );
            out += &format!(
                " {:>gutter$} {} {}{}\n",
                "",
                "|".dimmed(),
                " ".repeat(text[..from].chars().count()),
                "^".repeat(text[from..to].chars().count().max(1)).bright_red(),
            );

            line_start += lines[n].len();
        }
        out
    }

    pub fn display(&self) {
        eprintln!("\n{}", self.render());
    }
}

/// Every fatal failure of one compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{}", .0.msg())]
    Parse(ParserError),
    #[error("{}", .0.msg())]
    Compile(CompilerError),
}

impl From<ParserError> for CompileError {
    fn from(value: ParserError) -> Self {
        CompileError::Parse(value)
    }
}
impl From<CompilerError> for CompileError {
    fn from(value: CompilerError) -> Self {
        CompileError::Compile(value)
    }
}

impl CompileError {
    pub fn into_display(self) -> ErrorDisplay {
        match self {
            CompileError::Parse(e) => e.into(),
            CompileError::Compile(e) => e.into(),
        }
    }
}

impl From<ScopeError> for ErrorDisplay {
    fn from(value: ScopeError) -> Self {
        ErrorDisplay {
            typ: "Scope Error",
            msg: value.msg(),
            area: value.area,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::source::ScriptSource;

    use super::*;

    #[test]
    fn caret_under_the_span() {
        colored::control::set_override(false);
        let src = Rc::new(ScriptSource::memory("demo", "a = 1\nb = nope + 2\n"));
        let display = ErrorDisplay {
            typ: "Type Error",
            msg: "bad".into(),
            area: crate::source::CodeSpan::from(10..14).into_area(src),
        };
        let text = display.render();
        assert!(text.contains("demo:2:5"), "{text}");
        assert!(text.contains("b = nope + 2"), "{text}");
        assert!(text.contains("    ^^^^"), "{text}");
    }
}
