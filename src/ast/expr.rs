use serde::{Deserialize, Serialize};

use super::dml::Select;
use super::operators::{BinaryOp, GlobalVar, UnaryOp};

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i64),
    /// Exact numeric kept as source text (`12.50`) so no precision is lost.
    Decimal(String),
    String(String),
    Bool(bool),
    Null,
}

/// A column reference, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(default)]
    pub table: Option<String>,
    pub name: String,
}

/// One `WHEN … THEN …` arm of a searched CASE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub when: Expr,
    pub then: Expr,
}

/// T-SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Literal),
    /// Local variable or parameter, spelled with its `@` prefix.
    Variable(String),
    Global(GlobalVar),
    Column(ColumnRef),
    /// `*` inside `COUNT(*)` or a select list.
    Star,
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    Function {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        data_type: String,
    },
    Case {
        branches: Vec<CaseBranch>,
        #[serde(default)]
        else_value: Option<Box<Expr>>,
    },
    Exists(Box<Select>),
    Subquery(Box<Select>),
}

impl Expr {
    /// Visit this expression and every nested expression, outermost first.
    /// Subqueries are entered so that variable references inside them are seen.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Literal(_) | Expr::Variable(_) | Expr::Global(_) | Expr::Column(_) | Expr::Star => {}
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } | Expr::Cast { expr, .. } => {
                expr.walk(f)
            }
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::InList { expr, list, .. } => {
                expr.walk(f);
                for item in list {
                    item.walk(f);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(f);
                low.walk(f);
                high.walk(f);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::Case {
                branches,
                else_value,
            } => {
                for branch in branches {
                    branch.when.walk(f);
                    branch.then.walk(f);
                }
                if let Some(e) = else_value {
                    e.walk(f);
                }
            }
            Expr::Exists(select) | Expr::Subquery(select) => select.walk_exprs(f),
        }
    }

    /// True when any nested node satisfies `pred`.
    pub fn any(&self, pred: &dyn Fn(&Expr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if pred(e) {
                found = true;
            }
        });
        found
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Null))
    }

    /// Case-insensitive function-name check.
    pub fn is_function(&self, wanted: &str) -> bool {
        matches!(self, Expr::Function { name, .. } if name.eq_ignore_ascii_case(wanted))
    }

    /// Split a top-level AND chain into its conjuncts.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Rebuild an AND chain from conjuncts. Returns `None` for an empty list.
    pub fn and_all(mut parts: Vec<Expr>) -> Option<Expr> {
        if parts.is_empty() {
            return None;
        }
        let first = parts.remove(0);
        Some(parts.into_iter().fold(first, |acc, next| Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(acc),
            right: Box::new(next),
        }))
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Literal::Int(n))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Literal::Int(n as i64))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }
}

/// Strings starting with `@` become variables; anything else a string literal.
impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        if s.starts_with('@') {
            Expr::Variable(s.to_string())
        } else {
            Expr::Literal(Literal::String(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let e = Expr::and_all(vec![
            Expr::Variable("@a".into()),
            Expr::Variable("@b".into()),
            Expr::Variable("@c".into()),
        ])
        .unwrap();
        let parts = e.conjuncts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], &Expr::Variable("@c".into()));
    }

    #[test]
    fn test_walk_sees_nested_variables() {
        let e = Expr::Function {
            name: "ISNULL".into(),
            args: vec![Expr::Variable("@x".into()), Expr::from(0)],
        };
        assert!(e.any(&|n| matches!(n, Expr::Variable(v) if v == "@x")));
        assert!(e.is_function("isnull"));
    }

    #[test]
    fn test_expr_from_json() {
        let e: Expr = serde_json::from_str(
            r#"{"binary": {"op": "lt", "left": {"variable": "@a"}, "right": {"literal": {"int": 3}}}}"#,
        )
        .unwrap();
        assert!(matches!(e, Expr::Binary { op: BinaryOp::Lt, .. }));
    }
}
