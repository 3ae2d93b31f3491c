// Rask Error Handling Module
// Structured errors with spans, source excerpts, and stack traces

use colored::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

/// A span in the source code (start to end position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn from_positions(
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_col, 0),
            end: Position::new(end_line, end_col, 0),
        }
    }

    pub fn single(line: usize, column: usize, offset: usize) -> Self {
        let pos = Position::new(line, column, offset);
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Smallest span covering both inputs.
    pub fn merge(self, other: Span) -> Span {
        let start = if other.start.offset < self.start.offset {
            other.start
        } else {
            self.start
        };
        let end = if other.end.offset > self.end.offset {
            other.end
        } else {
            self.end
        };
        Span { start, end }
    }
}

/// Error categories surfaced by the compiler and the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("SyntaxError")]
    SyntaxError,
    #[error("TypeError")]
    TypeError,
    #[error("NameError")]
    NameError,
    #[error("ReferenceError")]
    ReferenceError,
    #[error("RuntimeError")]
    RuntimeError,
    #[error("AttributeError")]
    AttributeError,
    #[error("IndexError")]
    IndexError,
    #[error("ArgumentError")]
    ArgumentError,
    #[error("InternalError")]
    InternalError,
}

/// A stack frame for error traces.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl StackFrame {
    pub fn new(
        function_name: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  at {} ({}:{}:{})",
            self.function_name, self.file, self.line, self.column
        )
    }
}

/// Main error type for Rask.
#[derive(Debug, Clone)]
pub struct RaskError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub file: String,
    pub help: Option<String>,
    pub stack_trace: Vec<StackFrame>,
    source_lines: Vec<String>,
}

impl RaskError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Span,
        file: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            file: file.into(),
            help: None,
            stack_trace: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source_lines = source.lines().map(String::from).collect();
        self
    }

    pub fn with_stack_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.stack_trace = trace;
        self
    }

    pub fn push_frame(&mut self, frame: StackFrame) {
        self.stack_trace.push(frame);
    }

    /// Format the error for display.
    pub fn format(&self) -> String {
        let mut output = String::new();

        // Error header: TypeError: message at file:line:column
        let header = format!(
            "{}: {} at {}:{}:{}",
            self.kind.to_string().red().bold(),
            self.message.white().bold(),
            self.file,
            self.span.start.line,
            self.span.start.column
        );
        output.push_str(&header);
        output.push('\n');

        // Source context (show 3 lines: before, error line, after)
        if !self.source_lines.is_empty() {
            let error_line = self.span.start.line;
            let start_line = if error_line > 1 { error_line - 1 } else { 1 };
            let end_line = (error_line + 1).min(self.source_lines.len());

            output.push('\n');

            for line_num in start_line..=end_line {
                if line_num <= self.source_lines.len() {
                    let line_content = &self.source_lines[line_num - 1];
                    let line_num_str = format!("{:>4} |", line_num);

                    if line_num == error_line {
                        output.push_str(&format!("{} {}\n", line_num_str.red(), line_content));

                        // Caret pointing to the error
                        let spaces = " ".repeat(6 + self.span.start.column);
                        let caret_len = if self.span.end.column > self.span.start.column {
                            self.span.end.column - self.span.start.column + 1
                        } else {
                            1
                        };
                        let carets = "^".repeat(caret_len);
                        output.push_str(&format!("{}{}\n", spaces, carets.red().bold()));
                    } else {
                        output.push_str(&format!("{} {}\n", line_num_str.dimmed(), line_content));
                    }
                }
            }
        }

        if let Some(ref help) = self.help {
            output.push_str(&format!("\n      {}: {}\n", "Help".cyan().bold(), help));
        }

        if !self.stack_trace.is_empty() {
            output.push_str(&format!("\n{}:\n", "Stack trace".yellow().bold()));
            for frame in self.stack_trace.iter() {
                output.push_str(&format!("{}\n", frame));
            }
        }

        output
    }

    // Convenience constructors

    pub fn syntax(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message, span, file)
    }

    pub fn type_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message, span, file)
    }

    pub fn name_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameError, message, span, file)
    }

    pub fn reference(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError, message, span, file)
    }

    pub fn runtime(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message, span, file)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message, Span::default(), "<vm>")
    }

    /// Errors raised inside the interpreter before a source location is
    /// known. The dispatch loop attaches the failing instruction's span via
    /// [`RaskError::located`].
    pub fn raised(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, Span::default(), "<vm>")
    }

    pub fn located(mut self, span: Span, file: impl Into<String>) -> Self {
        self.span = span;
        self.file = file.into();
        self
    }
}

impl fmt::Display for RaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}:{}:{}",
            self.kind, self.message, self.file, self.span.start.line, self.span.start.column
        )
    }
}

impl std::error::Error for RaskError {}

pub type RaskResult<T> = Result<T, RaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(Position::new(1, 1, 0), Position::new(1, 5, 4));
        let b = Span::new(Position::new(2, 1, 10), Position::new(2, 8, 17));
        let merged = a.merge(b);
        assert_eq!(merged.start.offset, 0);
        assert_eq!(merged.end.offset, 17);
    }

    #[test]
    fn test_error_display() {
        let err = RaskError::name_error("n is not defined", Span::single(3, 7, 20), "demo.js");
        let text = err.to_string();
        assert!(text.contains("NameError"));
        assert!(text.contains("demo.js:3:7"));
    }
}
