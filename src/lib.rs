//! # tsql2go — T-SQL procedures as Go functions
//!
//! > **Stop hand-porting stored procedures.**
//!
//! tsql2go lowers a parsed T-SQL stored procedure into one idiomatic Go
//! function: variables become typed locals, DML becomes `database/sql`,
//! gRPC or mock-store calls, cursors become row iterators and TRY/CATCH
//! becomes a recovering closure.
//!
//! ## Quick Example
//!
//! ```rust
//! use tsql2go::prelude::*;
//!
//! let proc = Procedure::new("dbo.usp_DeleteOrder")
//!     .param(Parameter::input("@OrderID", "INT"))
//!     .body([delete("Orders")
//!         .filter(eq(col("Id"), var("@OrderID")))
//!         .into_statement()]);
//!
//! let lowered = lower_procedure(&proc, &LowerConfig::default()).unwrap();
//! assert_eq!(lowered.name, "DeleteOrder");
//! assert!(lowered.source.contains("db.ExecContext(ctx, `DELETE FROM Orders WHERE Id = $1`, orderID)"));
//! ```
//!
//! ## Backends
//!
//! | Backend | DML becomes                          | Handle parameter          |
//! |---------|--------------------------------------|---------------------------|
//! | `sql`   | `ExecContext` / `QueryRowContext`    | `db *sql.DB`              |
//! | `rpc`   | `<entity>Client.<Method>(ctx, req)`  | one client per service    |
//! | `mock`  | `store.<Method>(ctx, req)`           | `store *mockstore.Store`  |
//!
//! Temporary tables and table variables always go to the fallback backend.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lower;
pub mod naming;
pub mod symbols;
pub mod transpiler;
pub mod types;

pub use lower::{lower_procedure, render_file, LoweredProcedure};

pub mod prelude {
    pub use crate::ast::builders::*;
    pub use crate::ast::{Direction, Parameter, Procedure, Statement};
    pub use crate::config::{BackendKind, LowerConfig};
    pub use crate::diagnostics::{Warning, WarningKind};
    pub use crate::error::*;
    pub use crate::lower::{lower_procedure, render_file, LoweredProcedure};
    pub use crate::transpiler::Dialect;
}

/// Lower every procedure and render them into one Go file.
///
/// Warnings of all procedures are returned alongside the source.
pub fn lower_file(
    procedures: &[ast::Procedure],
    config: &config::LowerConfig,
) -> error::LowerResult<(String, Vec<diagnostics::Warning>)> {
    let mut lowered = Vec::with_capacity(procedures.len());
    for procedure in procedures {
        lowered.push(lower_procedure(procedure, config)?);
    }
    let warnings = lowered.iter().flat_map(|p| p.warnings.clone()).collect();
    Ok((render_file(&config.package, &lowered), warnings))
}
