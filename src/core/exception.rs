//! Captured error information attached to a record

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// One frame of a captured stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// Error kind, message and stack captured at the log call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<StackFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Capture a typed error; its `source()` chain becomes the cause chain.
    pub fn from_error<E: StdError + ?Sized>(error: &E) -> Self {
        let kind = short_type_name(std::any::type_name::<E>());
        let mut info = Self::new(kind, error.to_string());
        info.cause = error.source().map(|s| Box::new(Self::from_source(s)));
        info
    }

    fn from_source(error: &(dyn StdError + 'static)) -> Self {
        let mut info = Self::new("Error", error.to_string());
        info.cause = error.source().map(|s| Box::new(Self::from_source(s)));
        info
    }

    #[must_use]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: ExceptionInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Append the frames of the current thread's backtrace.
    ///
    /// Frames without symbol location information are skipped.
    #[must_use]
    pub fn with_backtrace(mut self) -> Self {
        let trace = std::backtrace::Backtrace::force_capture().to_string();
        self.frames.extend(parse_backtrace(&trace));
        self
    }

    /// Render kind, message, frames and causes as an indented block
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        out.push_str(&format!("{}: {}", self.kind, self.message));
        for frame in &self.frames {
            out.push_str(&format!(
                "\n  at {} ({}:{})",
                frame.function, frame.file, frame.line
            ));
        }
        if let Some(cause) = &self.cause {
            out.push_str("\nCaused by: ");
            cause.render_into(out);
        }
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn short_type_name(full: &str) -> String {
    // keep generic arguments intact, strip the module path of the outer type
    let head = full.split('<').next().unwrap_or(full);
    let short = head.rsplit("::").next().unwrap_or(head);
    format!("{}{}", short, &full[head.len()..])
}

fn parse_backtrace(trace: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut function: Option<String> = None;

    for line in trace.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            let Some(function) = function.take() else {
                continue;
            };
            let mut parts = location.rsplitn(3, ':');
            let _column = parts.next();
            let line_no = parts.next().and_then(|l| l.parse().ok());
            if let (Some(line_no), Some(file)) = (line_no, parts.next()) {
                frames.push(StackFrame::new(file, line_no, function));
            }
        } else if let Some((index, name)) = line.split_once(": ") {
            if index.chars().all(|c| c.is_ascii_digit()) {
                function = Some(name.to_string());
            }
        }
    }

    frames
}
