//! Procedure AST handed to the lowering engine.
//!
//! The front-end parser is an external collaborator; it produces these types
//! directly or serializes them as JSON (externally tagged, `snake_case`).

pub mod builders;
pub mod dml;
pub mod expr;
pub mod operators;
pub mod stmt;

pub use dml::*;
pub use expr::*;
pub use operators::*;
pub use stmt::*;

use serde::{Deserialize, Serialize};

/// Parameter direction. T-SQL `OUTPUT` parameters map to `Out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub default: Option<Expr>,
}

impl Parameter {
    pub fn input(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            direction: Direction::In,
            default: None,
        }
    }

    pub fn output(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            direction: Direction::Out,
            default: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Expr>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_output(&self) -> bool {
        self.direction == Direction::Out
    }
}

/// A stored procedure: name, ordered parameters, ordered body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn statement(mut self, stmt: Statement) -> Self {
        self.body.push(stmt);
        self
    }

    pub fn body(mut self, stmts: impl IntoIterator<Item = Statement>) -> Self {
        self.body.extend(stmts);
        self
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.is_output())
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.is_output())
    }

    /// Depth-first visit over every statement in the body.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Statement)) {
        for stmt in &self.body {
            stmt.visit(f);
        }
    }
}
