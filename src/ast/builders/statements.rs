//! Statement builders.

use crate::ast::{Expr, Fetch, FetchDirection, Select, Statement, ThrowArgs, VarDecl};

fn at(name: &str) -> String {
    if name.starts_with('@') {
        name.to_string()
    } else {
        format!("@{}", name)
    }
}

pub fn declare(name: &str, data_type: &str) -> Statement {
    Statement::Declare(vec![VarDecl {
        name: at(name),
        data_type: data_type.to_string(),
        init: None,
    }])
}

pub fn declare_init(name: &str, data_type: &str, init: Expr) -> Statement {
    Statement::Declare(vec![VarDecl {
        name: at(name),
        data_type: data_type.to_string(),
        init: Some(init),
    }])
}

pub fn set(name: &str, value: Expr) -> Statement {
    Statement::Set {
        variable: at(name),
        value,
    }
}

pub fn if_then(condition: Expr, then_branch: impl IntoIterator<Item = Statement>) -> Statement {
    Statement::If {
        condition,
        then_branch: then_branch.into_iter().collect(),
        else_branch: None,
    }
}

pub fn if_else(
    condition: Expr,
    then_branch: impl IntoIterator<Item = Statement>,
    else_branch: impl IntoIterator<Item = Statement>,
) -> Statement {
    Statement::If {
        condition,
        then_branch: then_branch.into_iter().collect(),
        else_branch: Some(else_branch.into_iter().collect()),
    }
}

pub fn while_loop(condition: Expr, body: impl IntoIterator<Item = Statement>) -> Statement {
    Statement::While {
        condition,
        body: body.into_iter().collect(),
    }
}

pub fn block(body: impl IntoIterator<Item = Statement>) -> Statement {
    Statement::Block(body.into_iter().collect())
}

pub fn ret() -> Statement {
    Statement::Return(None)
}

pub fn ret_value(value: Expr) -> Statement {
    Statement::Return(Some(value))
}

pub fn print(value: Expr) -> Statement {
    Statement::Print(value)
}

pub fn declare_cursor(name: &str, query: Select) -> Statement {
    Statement::DeclareCursor {
        name: name.to_string(),
        query,
    }
}

pub fn open(cursor: &str) -> Statement {
    Statement::Open(cursor.to_string())
}

pub fn fetch_next<'a>(cursor: &str, into: impl IntoIterator<Item = &'a str>) -> Statement {
    fetch(cursor, FetchDirection::Next, into)
}

pub fn fetch<'a>(
    cursor: &str,
    direction: FetchDirection,
    into: impl IntoIterator<Item = &'a str>,
) -> Statement {
    Statement::Fetch(Fetch {
        cursor: cursor.to_string(),
        direction,
        into: into.into_iter().map(at).collect(),
    })
}

pub fn close(cursor: &str) -> Statement {
    Statement::Close(cursor.to_string())
}

pub fn deallocate(cursor: &str) -> Statement {
    Statement::Deallocate(cursor.to_string())
}

pub fn begin_tran() -> Statement {
    Statement::BeginTransaction(None)
}

pub fn commit() -> Statement {
    Statement::CommitTransaction(None)
}

pub fn rollback() -> Statement {
    Statement::RollbackTransaction(None)
}

pub fn try_catch(
    try_body: impl IntoIterator<Item = Statement>,
    catch_body: impl IntoIterator<Item = Statement>,
) -> Statement {
    Statement::TryCatch {
        try_body: try_body.into_iter().collect(),
        catch_body: catch_body.into_iter().collect(),
    }
}

/// Bare `THROW;`
pub fn rethrow() -> Statement {
    Statement::Throw(None)
}

pub fn throw(number: Expr, message: Expr, state: Expr) -> Statement {
    Statement::Throw(Some(ThrowArgs {
        number,
        message,
        state,
    }))
}

pub fn raiserror(message: Expr, severity: Expr, state: Expr) -> Statement {
    Statement::Raiserror {
        message,
        severity,
        state,
    }
}
