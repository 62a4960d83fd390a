//! Data-manipulation statement shapes.

use serde::{Deserialize, Serialize};

use super::expr::Expr;

/// A table reference (`dbo.Orders o`, `#staging`, `@pending`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Temp tables (`#t`, `##t`) and table variables (`@t`) live only for the
    /// current invocation.
    pub fn is_transient(&self) -> bool {
        let base = self.base_name();
        base.starts_with('#') || base.starts_with('@')
    }

    /// Name with any schema/database qualifier and brackets removed.
    pub fn base_name(&self) -> &str {
        let last = self.name.rsplit('.').next().unwrap_or(&self.name);
        last.trim_start_matches('[').trim_end_matches(']')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    #[serde(default)]
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: Expr,
    #[serde(default)]
    pub descending: bool,
}

/// One entry of a select list. `assign_to` holds the variable of
/// `SELECT @v = expr` forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub assign_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Select {
    #[serde(default)]
    pub top: Option<Expr>,
    #[serde(default)]
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    #[serde(default)]
    pub from: Option<TableRef>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Expr>,
    #[serde(default)]
    pub group_by: Vec<Expr>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl Select {
    /// Variables assigned by this select list, in order.
    pub fn assigned_variables(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| item.assign_to.as_deref())
            .collect()
    }

    pub fn assigns_variables(&self) -> bool {
        self.items.iter().any(|item| item.assign_to.is_some())
    }

    pub fn walk_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        if let Some(top) = &self.top {
            top.walk(f);
        }
        for item in &self.items {
            item.expr.walk(f);
        }
        for join in &self.joins {
            join.on.walk(f);
        }
        if let Some(w) = &self.where_clause {
            w.walk(f);
        }
        for g in &self.group_by {
            g.walk(f);
        }
        for o in &self.order_by {
            o.expr.walk(f);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<Select>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: TableRef,
    #[serde(default)]
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: TableRef,
    #[serde(default, rename = "where")]
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecArg {
    /// Named argument (`@CustomerID = @id`), without the value side.
    #[serde(default)]
    pub name: Option<String>,
    pub value: Expr,
    #[serde(default)]
    pub output: bool,
}

/// `EXEC [@status =] proc args…`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exec {
    pub procedure: String,
    #[serde(default)]
    pub args: Vec<ExecArg>,
    #[serde(default)]
    pub return_status: Option<String>,
}

impl Exec {
    /// Callee name without schema qualifier or brackets.
    pub fn base_name(&self) -> &str {
        let last = self.procedure.rsplit('.').next().unwrap_or(&self.procedure);
        last.trim_start_matches('[').trim_end_matches(']')
    }
}
