//! Indentation-aware Go source writer.

use std::collections::BTreeSet;

/// Line emitter. Go source is indented with tabs, as gofmt does.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buf.push('\t');
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    /// Write `text` and indent what follows (`if cond {`).
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Outdent and write `text` (`}`).
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Write `text` one level out, keeping the current indent (`} else {`).
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Go import set. Entries are import-spec text (`"fmt"`, `pb "example.com/gen/pb"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Imports {
    specs: BTreeSet<String>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unaliased import path.
    pub fn add(&mut self, path: &str) {
        self.specs.insert(format!("{:?}", path));
    }

    /// Add a pre-rendered import spec.
    pub fn add_spec(&mut self, spec: String) {
        self.specs.insert(spec);
    }

    pub fn extend(&mut self, other: &Imports) {
        self.specs.extend(other.specs.iter().cloned());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.specs.iter().any(|s| spec_path(s) == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.specs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// `import (…)` block: standard library first, then everything else,
    /// separated by a blank line.
    pub fn render(&self) -> String {
        let (std, third): (Vec<&String>, Vec<&String>) =
            self.specs.iter().partition(|s| is_std(spec_path(s)));
        let mut std = std;
        let mut third = third;
        std.sort_by_key(|s| spec_path(s));
        third.sort_by_key(|s| spec_path(s));

        let mut out = String::from("import (\n");
        for spec in &std {
            out.push('\t');
            out.push_str(spec);
            out.push('\n');
        }
        if !std.is_empty() && !third.is_empty() {
            out.push('\n');
        }
        for spec in &third {
            out.push('\t');
            out.push_str(spec);
            out.push('\n');
        }
        out.push(')');
        out
    }
}

fn spec_path(spec: &str) -> &str {
    let quoted = spec.rsplit(' ').next().unwrap_or(spec);
    quoted.trim_matches('"')
}

/// Standard-library paths have no dot in their first element.
fn is_std(path: &str) -> bool {
    !path.split('/').next().unwrap_or(path).contains('.')
}
