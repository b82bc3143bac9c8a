//! Indented C text accumulation
//!
//! A [`CodeSection`] collects the lines of one generation phase together with
//! the headers that phase needs. Sections are append-only; the orchestrator
//! takes ownership of a finished section with [`CodeSection::into_parts`].

use log::trace;
use mwg_common::Include;

/// Spaces per indentation level
pub const INDENT_STEP: usize = 4;

/// One phase worth of generated code and its required includes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSection {
    code: String,
    indent: usize,
    includes: Vec<Include>,
}

impl CodeSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A section whose lines start `levels` indentation levels deep
    pub fn with_indent(levels: usize) -> Self {
        Self {
            indent: levels * INDENT_STEP,
            ..Self::default()
        }
    }

    /// Append a line at the current indentation
    ///
    /// Only the first physical line of `content` is indented; embedded
    /// newlines are copied as-is, so a fragment can carry its own relative
    /// layout. Use [`add_block`](Self::add_block) to indent every line.
    pub fn add_line(&mut self, content: impl AsRef<str>) {
        let content = content.as_ref();
        trace!("emit: {}", content);
        if !content.is_empty() {
            self.code.extend(std::iter::repeat(' ').take(self.indent));
            self.code.push_str(content);
        }
        self.code.push('\n');
    }

    /// Append a multi-line fragment, indenting each of its lines
    pub fn add_block(&mut self, block: &str) {
        for line in block.lines() {
            self.add_line(line);
        }
    }

    pub fn indent(&mut self) {
        self.indent += INDENT_STEP;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(INDENT_STEP);
    }

    /// Run `body` one indentation level deeper
    pub fn indented(&mut self, body: impl FnOnce(&mut Self)) {
        self.indent();
        body(self);
        self.dedent();
    }

    /// Emit `header` (which ends with `{`) and open an indented scope
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.add_line(header);
        self.indent();
    }

    /// Close the scope opened by [`open`](Self::open)
    pub fn close(&mut self) {
        self.dedent();
        self.add_line("}");
    }

    /// Register a required header; already registered headers are ignored
    pub fn include(&mut self, include: Include) {
        if !self.includes.contains(&include) {
            self.includes.push(include);
        }
    }

    /// Emit a `printf` of `format` followed by a newline
    pub fn add_print(&mut self, format: &str, args: &[&str]) {
        self.add_line(format!("printf(\"{}\\n\"{});", format, join_args(args)));
    }

    /// Emit an `fprintf(stderr, ...)` of `format` followed by a newline
    pub fn add_error_print(&mut self, format: &str, args: &[&str]) {
        self.add_line(format!("fprintf(stderr, \"{}\\n\"{});", format, join_args(args)));
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<Include>) {
        (self.code, self.includes)
    }
}

fn join_args(args: &[&str]) -> String {
    args.iter().map(|arg| format!(", {}", arg)).collect()
}
