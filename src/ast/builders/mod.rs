//! Ergonomic builder functions for procedure AST nodes.
//!
//! Used by tests and by front ends that build procedures in code instead of
//! handing over JSON.
//!
//! # Example
//! ```
//! use tsql2go::ast::builders::*;
//! use tsql2go::ast::Procedure;
//!
//! let proc = Procedure::new("dbo.usp_Touch").body([
//!     declare_init("@n", "INT", int(0)),
//!     set("@n", add(var("@n"), int(1))),
//! ]);
//! assert_eq!(proc.body.len(), 2);
//! ```

pub mod expressions;
pub mod queries;
pub mod statements;

pub use expressions::*;
pub use queries::{delete, exec, insert, select, update};
pub use statements::*;
