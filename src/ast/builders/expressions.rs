//! Expression builders.

use crate::ast::{
    BinaryOp, CaseBranch, ColumnRef, Expr, GlobalVar, Literal, Select, UnaryOp,
};

/// Variable reference; the `@` prefix is added when missing.
pub fn var(name: &str) -> Expr {
    if name.starts_with('@') {
        Expr::Variable(name.to_string())
    } else {
        Expr::Variable(format!("@{}", name))
    }
}

pub fn int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Exact numeric literal (`dec("12.50")`).
pub fn dec(text: &str) -> Expr {
    Expr::Literal(Literal::Decimal(text.to_string()))
}

pub fn text(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()))
}

pub fn boolean(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn null() -> Expr {
    Expr::Literal(Literal::Null)
}

pub fn col(name: &str) -> Expr {
    Expr::Column(ColumnRef {
        table: None,
        name: name.to_string(),
    })
}

/// Qualified column (`o.Status`).
pub fn qcol(table: &str, name: &str) -> Expr {
    Expr::Column(ColumnRef {
        table: Some(table.to_string()),
        name: name.to_string(),
    })
}

pub fn star() -> Expr {
    Expr::Star
}

pub fn global(g: GlobalVar) -> Expr {
    Expr::Global(g)
}

/// `@@FETCH_STATUS`
pub fn fetch_status() -> Expr {
    Expr::Global(GlobalVar::FetchStatus)
}

pub fn func(name: &str, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args: args.into_iter().collect(),
    }
}

pub fn cast(expr: Expr, data_type: &str) -> Expr {
    Expr::Cast {
        expr: Box::new(expr),
        data_type: data_type.to_string(),
    }
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn ne(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::NotEq, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

pub fn lte(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::LtEq, left, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Gt, left, right)
}

pub fn gte(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::GtEq, left, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::And, left, right)
}

pub fn or(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Or, left, right)
}

pub fn add(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Mul, left, right)
}

pub fn div(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Div, left, right)
}

pub fn modulo(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Mod, left, right)
}

pub fn like(left: Expr, pattern: Expr) -> Expr {
    binary(BinaryOp::Like, left, pattern)
}

pub fn not(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        expr: Box::new(expr),
    }
}

pub fn neg(expr: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Neg,
        expr: Box::new(expr),
    }
}

pub fn is_null(expr: Expr) -> Expr {
    Expr::IsNull {
        expr: Box::new(expr),
        negated: false,
    }
}

pub fn is_not_null(expr: Expr) -> Expr {
    Expr::IsNull {
        expr: Box::new(expr),
        negated: true,
    }
}

pub fn in_list(expr: Expr, list: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::InList {
        expr: Box::new(expr),
        list: list.into_iter().collect(),
        negated: false,
    }
}

pub fn between(expr: Expr, low: Expr, high: Expr) -> Expr {
    Expr::Between {
        expr: Box::new(expr),
        low: Box::new(low),
        high: Box::new(high),
        negated: false,
    }
}

/// Searched CASE from `(when, then)` pairs.
pub fn case_when(
    branches: impl IntoIterator<Item = (Expr, Expr)>,
    otherwise: Option<Expr>,
) -> Expr {
    Expr::Case {
        branches: branches
            .into_iter()
            .map(|(when, then)| CaseBranch { when, then })
            .collect(),
        else_value: otherwise.map(Box::new),
    }
}

pub fn exists(query: Select) -> Expr {
    Expr::Exists(Box::new(query))
}

pub fn subquery(query: Select) -> Expr {
    Expr::Subquery(Box::new(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_adds_prefix() {
        assert_eq!(var("x"), Expr::Variable("@x".into()));
        assert_eq!(var("@x"), Expr::Variable("@x".into()));
    }

    #[test]
    fn test_case_when_builds_branches() {
        let e = case_when([(eq(var("@a"), int(1)), text("one"))], Some(text("many")));
        assert!(matches!(e, Expr::Case { ref branches, else_value: Some(_) } if branches.len() == 1));
    }
}
