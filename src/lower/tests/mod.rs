mod cursors;
mod exceptions;
mod procedures;
mod transactions;

use crate::ast::Procedure;
use crate::config::LowerConfig;
use crate::error::LowerError;
use crate::lower::{lower_procedure, LoweredProcedure};

pub(super) fn lower(proc: &Procedure) -> LoweredProcedure {
    lower_with(proc, &LowerConfig::default())
}

pub(super) fn lower_with(proc: &Procedure, config: &LowerConfig) -> LoweredProcedure {
    match lower_procedure(proc, config) {
        Ok(lowered) => lowered,
        Err(e) => panic!("lowering {} failed: {}", proc.name, e),
    }
}

pub(super) fn lower_err(proc: &Procedure) -> LowerError {
    match lower_procedure(proc, &LowerConfig::default()) {
        Ok(lowered) => panic!("expected an error, got:\n{}", lowered.source),
        Err(e) => e,
    }
}

/// Statement path of a located error.
pub(super) fn error_path(err: &LowerError) -> &str {
    match err {
        LowerError::InStatement { path, .. } => path,
        other => panic!("error carries no location: {}", other),
    }
}

#[track_caller]
pub(super) fn assert_contains(source: &str, needle: &str) {
    assert!(
        source.contains(needle),
        "generated source is missing {:?}:\n{}",
        needle,
        source
    );
}
