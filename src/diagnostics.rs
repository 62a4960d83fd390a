//! Non-fatal lowering diagnostics.
//!
//! Warnings never abort lowering; they travel next to the generated source
//! so callers can surface them separately from fatal [`LowerError`]s.
//!
//! [`LowerError`]: crate::error::LowerError

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// DML on a transient table was routed to the fallback backend.
    FallbackBackend,
    /// A request field was dropped because its source is not a literal shape.
    SkippedField,
    /// A construct was lowered approximately.
    Approximation,
    /// A construct was ignored.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Statement path (`3.1.2`) inside the procedure body.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.path, self.message)
    }
}

/// Ordered collection of warnings for one procedure.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, kind: WarningKind, path: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}: {}", path, message);
        self.warnings.push(Warning {
            kind,
            path: path.to_string(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let mut diags = Diagnostics::new();
        diags.warn(
            WarningKind::FallbackBackend,
            "4",
            "temporary table forced to fallback backend: #staging",
        );
        let w = diags.iter().next().unwrap();
        assert_eq!(
            w.to_string(),
            "[4] temporary table forced to fallback backend: #staging"
        );
        assert_eq!(diags.len(), 1);
    }
}
