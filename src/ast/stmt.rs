use serde::{Deserialize, Serialize};

use super::dml::{Delete, Exec, Insert, Select, Update};
use super::expr::Expr;

/// One variable in a `DECLARE` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    #[default]
    Next,
    Prior,
    First,
    Last,
    Absolute(Expr),
    Relative(Expr),
}

impl FetchDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            FetchDirection::Next => "NEXT",
            FetchDirection::Prior => "PRIOR",
            FetchDirection::First => "FIRST",
            FetchDirection::Last => "LAST",
            FetchDirection::Absolute(_) => "ABSOLUTE",
            FetchDirection::Relative(_) => "RELATIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetch {
    pub cursor: String,
    #[serde(default)]
    pub direction: FetchDirection,
    #[serde(default)]
    pub into: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowArgs {
    pub number: Expr,
    pub message: Expr,
    pub state: Expr,
}

/// T-SQL procedural statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Declare(Vec<VarDecl>),
    DeclareCursor {
        name: String,
        query: Select,
    },
    Set {
        variable: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Vec<Statement>,
        #[serde(default)]
        else_branch: Option<Vec<Statement>>,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
    },
    /// `BEGIN … END`
    Block(Vec<Statement>),
    Return(Option<Expr>),
    Print(Expr),
    Break,
    Continue,
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Exec(Exec),
    /// `EXEC(@sql)` / `sp_executesql`
    ExecDynamic(Expr),
    Open(String),
    Fetch(Fetch),
    Close(String),
    Deallocate(String),
    BeginTransaction(Option<String>),
    CommitTransaction(Option<String>),
    RollbackTransaction(Option<String>),
    SaveTransaction(String),
    TryCatch {
        try_body: Vec<Statement>,
        catch_body: Vec<Statement>,
    },
    Raiserror {
        message: Expr,
        severity: Expr,
        state: Expr,
    },
    /// Bare `THROW;` re-raises inside CATCH.
    Throw(Option<ThrowArgs>),
}

impl Statement {
    /// Keyword used when reporting the statement in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Declare(_) => "DECLARE",
            Statement::DeclareCursor { .. } => "DECLARE CURSOR",
            Statement::Set { .. } => "SET",
            Statement::If { .. } => "IF",
            Statement::While { .. } => "WHILE",
            Statement::Block(_) => "BEGIN",
            Statement::Return(_) => "RETURN",
            Statement::Print(_) => "PRINT",
            Statement::Break => "BREAK",
            Statement::Continue => "CONTINUE",
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
            Statement::Exec(_) => "EXEC",
            Statement::ExecDynamic(_) => "EXEC (dynamic)",
            Statement::Open(_) => "OPEN",
            Statement::Fetch(_) => "FETCH",
            Statement::Close(_) => "CLOSE",
            Statement::Deallocate(_) => "DEALLOCATE",
            Statement::BeginTransaction(_) => "BEGIN TRANSACTION",
            Statement::CommitTransaction(_) => "COMMIT",
            Statement::RollbackTransaction(_) => "ROLLBACK",
            Statement::SaveTransaction(_) => "SAVE TRANSACTION",
            Statement::TryCatch { .. } => "BEGIN TRY",
            Statement::Raiserror { .. } => "RAISERROR",
            Statement::Throw(_) => "THROW",
        }
    }

    /// Statements that reach a data backend.
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            Statement::Select(_)
                | Statement::Insert(_)
                | Statement::Update(_)
                | Statement::Delete(_)
                | Statement::Exec(_)
        )
    }

    /// Nested statement lists, in source order.
    pub fn children(&self) -> Vec<&[Statement]> {
        match self {
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                let mut out = vec![then_branch.as_slice()];
                if let Some(e) = else_branch {
                    out.push(e.as_slice());
                }
                out
            }
            Statement::While { body, .. } => vec![body.as_slice()],
            Statement::Block(body) => vec![body.as_slice()],
            Statement::TryCatch {
                try_body,
                catch_body,
            } => vec![try_body.as_slice(), catch_body.as_slice()],
            _ => Vec::new(),
        }
    }

    /// Depth-first visit of this statement and all nested statements.
    pub fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a Statement)) {
        f(self);
        for child in self.children() {
            for stmt in child {
                stmt.visit(f);
            }
        }
    }

    /// Visit every expression owned directly by this statement (not nested
    /// statements). Cursor queries and DML clauses are included.
    pub fn walk_own_exprs<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match self {
            Statement::Declare(vars) => {
                for v in vars {
                    if let Some(init) = &v.init {
                        init.walk(f);
                    }
                }
            }
            Statement::DeclareCursor { query, .. } => query.walk_exprs(f),
            Statement::Set { value, .. } => value.walk(f),
            Statement::If { condition, .. } | Statement::While { condition, .. } => {
                condition.walk(f)
            }
            Statement::Return(Some(e)) | Statement::Print(e) | Statement::ExecDynamic(e) => {
                e.walk(f)
            }
            Statement::Select(s) => s.walk_exprs(f),
            Statement::Insert(i) => match &i.source {
                super::dml::InsertSource::Values(rows) => {
                    for row in rows {
                        for e in row {
                            e.walk(f);
                        }
                    }
                }
                super::dml::InsertSource::Select(s) => s.walk_exprs(f),
            },
            Statement::Update(u) => {
                for a in &u.assignments {
                    a.value.walk(f);
                }
                if let Some(w) = &u.where_clause {
                    w.walk(f);
                }
            }
            Statement::Delete(d) => {
                if let Some(w) = &d.where_clause {
                    w.walk(f);
                }
            }
            Statement::Exec(e) => {
                for a in &e.args {
                    a.value.walk(f);
                }
            }
            Statement::Raiserror {
                message,
                severity,
                state,
            } => {
                message.walk(f);
                severity.walk(f);
                state.walk(f);
            }
            Statement::Throw(Some(args)) => {
                args.number.walk(f);
                args.message.walk(f);
                args.state.walk(f);
            }
            _ => {}
        }
    }

    /// True when control never falls through past this statement.
    pub fn always_returns(&self) -> bool {
        match self {
            Statement::Return(_) => true,
            Statement::Throw(_) => true,
            Statement::Block(body) => body.last().is_some_and(Statement::always_returns),
            Statement::If {
                then_branch,
                else_branch: Some(else_branch),
                ..
            } => {
                then_branch.last().is_some_and(Statement::always_returns)
                    && else_branch.last().is_some_and(Statement::always_returns)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_reaches_nested_statements() {
        let stmt = Statement::If {
            condition: Expr::from(true),
            then_branch: vec![Statement::Block(vec![Statement::Break])],
            else_branch: Some(vec![Statement::TryCatch {
                try_body: vec![Statement::Continue],
                catch_body: vec![Statement::Print(Expr::from("x"))],
            }]),
        };
        let mut kinds = Vec::new();
        stmt.visit(&mut |s| kinds.push(s.kind_name()));
        assert_eq!(kinds, vec!["IF", "BEGIN", "BREAK", "BEGIN TRY", "CONTINUE", "PRINT"]);
    }

    #[test]
    fn test_always_returns_requires_both_branches() {
        let only_then = Statement::If {
            condition: Expr::from(true),
            then_branch: vec![Statement::Return(None)],
            else_branch: None,
        };
        assert!(!only_then.always_returns());

        let both = Statement::If {
            condition: Expr::from(true),
            then_branch: vec![Statement::Return(None)],
            else_branch: Some(vec![Statement::Block(vec![Statement::Return(None)])]),
        };
        assert!(both.always_returns());
    }

    #[test]
    fn test_statement_from_json() {
        let stmt: Statement = serde_json::from_str(
            r#"{"fetch": {"cursor": "c", "direction": {"absolute": {"literal": {"int": 3}}}, "into": ["@a"]}}"#,
        )
        .unwrap();
        match stmt {
            Statement::Fetch(f) => assert_eq!(f.direction.keyword(), "ABSOLUTE"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
