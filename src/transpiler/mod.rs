//! Query Builder.
//!
//! Renders T-SQL DML back to query text for one dialect. Every variable
//! reference becomes a positional placeholder and the matching Go argument
//! expression is collected in placeholder order.

pub mod dialect;
pub mod dml;
pub mod expr;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use crate::ast::{Delete, GlobalVar, Insert, Select, Update};
use crate::error::{LowerError, LowerResult};

pub use dialect::Dialect;
pub use dml::exec::build_exec;
pub use dml::select::{build_exists_probe, is_single_row};
pub use expr::QueryRenderer;
pub use traits::{escape_identifier, SqlGenerator};

/// Query text plus its Go argument expressions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedQuery {
    pub sql: String,
    pub args: Vec<String>,
}

impl RenderedQuery {
    /// `` `SELECT …`, a, b `` as it appears inside a Go call.
    pub fn call_args(&self) -> String {
        let mut out = crate::naming::go_query_literal(&self.sql);
        for arg in &self.args {
            out.push_str(", ");
            out.push_str(arg);
        }
        out
    }
}

/// Maps T-SQL variables, globals and intrinsics onto Go expressions that
/// are passed as query arguments.
pub trait ParamResolver {
    fn resolve_variable(&self, name: &str) -> LowerResult<String>;

    fn resolve_global(&self, global: GlobalVar) -> LowerResult<String> {
        Err(LowerError::unsupported(
            global.sql_name(),
            "not available inside query text",
        ))
    }

    /// Functions evaluated on the Go side (`ERROR_MESSAGE()`, `SCOPE_IDENTITY()`).
    fn resolve_intrinsic(&self, _name: &str) -> Option<LowerResult<String>> {
        None
    }

    /// Whether `+` involving this variable is string concatenation.
    fn is_string_variable(&self, _name: &str) -> bool {
        false
    }
}

impl<F> ParamResolver for F
where
    F: Fn(&str) -> LowerResult<String>,
{
    fn resolve_variable(&self, name: &str) -> LowerResult<String> {
        self(name)
    }
}

/// Trait for rendering DML nodes to parameterized query text.
pub trait ToQuery {
    fn to_query(&self, dialect: Dialect, resolver: &dyn ParamResolver) -> LowerResult<RenderedQuery>;
}

impl ToQuery for Select {
    fn to_query(&self, dialect: Dialect, resolver: &dyn ParamResolver) -> LowerResult<RenderedQuery> {
        dml::select::build_select(self, dialect.generator().as_ref(), resolver)
    }
}

impl ToQuery for Insert {
    fn to_query(&self, dialect: Dialect, resolver: &dyn ParamResolver) -> LowerResult<RenderedQuery> {
        dml::insert::build_insert(self, dialect.generator().as_ref(), resolver)
    }
}

impl ToQuery for Update {
    fn to_query(&self, dialect: Dialect, resolver: &dyn ParamResolver) -> LowerResult<RenderedQuery> {
        dml::update::build_update(self, dialect.generator().as_ref(), resolver)
    }
}

impl ToQuery for Delete {
    fn to_query(&self, dialect: Dialect, resolver: &dyn ParamResolver) -> LowerResult<RenderedQuery> {
        dml::delete::build_delete(self, dialect.generator().as_ref(), resolver)
    }
}
