//! Expression rendering inside query text.

use crate::ast::{BinaryOp, Expr, GlobalVar, Literal, TableRef, UnaryOp};
use crate::error::{LowerError, LowerResult};
use crate::transpiler::traits::{unbracket, SqlGenerator};
use crate::transpiler::{ParamResolver, RenderedQuery};

/// Functions whose result is character data.
const STRING_FUNCTIONS: &[&str] = &[
    "UPPER", "LOWER", "LTRIM", "RTRIM", "TRIM", "SUBSTRING", "LEFT", "RIGHT", "REPLACE",
    "CONCAT", "STR", "FORMAT",
];

const TIMESTAMP_FUNCTIONS: &[&str] = &["GETDATE", "SYSDATETIME", "CURRENT_TIMESTAMP"];

/// Accumulates placeholders while rendering one statement.
pub struct QueryRenderer<'a> {
    generator: &'a dyn SqlGenerator,
    resolver: &'a dyn ParamResolver,
    args: Vec<String>,
}

impl<'a> QueryRenderer<'a> {
    pub fn new(generator: &'a dyn SqlGenerator, resolver: &'a dyn ParamResolver) -> Self {
        Self {
            generator,
            resolver,
            args: Vec::new(),
        }
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator
    }

    /// Push a Go argument and return the placeholder that refers to it.
    pub fn bind(&mut self, go_expr: String) -> String {
        self.args.push(go_expr);
        self.generator.placeholder(self.args.len())
    }

    pub fn finish(self, sql: String) -> RenderedQuery {
        RenderedQuery {
            sql,
            args: self.args,
        }
    }

    pub fn table(&self, table: &TableRef) -> String {
        let name = if table.is_transient() {
            self.generator.temp_table_name(table.base_name())
        } else {
            self.generator.quote_identifier(&table.name)
        };
        match &table.alias {
            Some(alias) => format!("{} {}", name, self.generator.quote_identifier(alias)),
            None => name,
        }
    }

    pub fn column(&self, name: &str) -> String {
        self.generator.quote_identifier(unbracket(name))
    }

    pub fn expr(&mut self, expr: &Expr) -> LowerResult<String> {
        match expr {
            Expr::Literal(lit) => Ok(self.literal(lit)),
            Expr::Variable(name) => {
                let arg = self.resolver.resolve_variable(name)?;
                Ok(self.bind(arg))
            }
            Expr::Global(GlobalVar::FetchStatus) => Err(LowerError::unsupported(
                "@@FETCH_STATUS",
                "cannot be referenced inside a query",
            )),
            Expr::Global(global) => {
                let arg = self.resolver.resolve_global(*global)?;
                Ok(self.bind(arg))
            }
            Expr::Column(col) => Ok(match &col.table {
                Some(t) => format!("{}.{}", self.column(t), self.column(&col.name)),
                None => self.column(&col.name),
            }),
            Expr::Star => Ok("*".to_string()),
            Expr::Unary { op, expr } => {
                let inner = self.operand(expr, 6, false)?;
                Ok(match op {
                    UnaryOp::Neg => format!("-{}", inner),
                    UnaryOp::Not => format!("NOT {}", inner),
                })
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::IsNull { expr, negated } => {
                let inner = self.operand(expr, 3, false)?;
                Ok(if *negated {
                    format!("{} IS NOT NULL", inner)
                } else {
                    format!("{} IS NULL", inner)
                })
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let inner = self.operand(expr, 3, false)?;
                let items = list
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<LowerResult<Vec<_>>>()?;
                let not = if *negated { "NOT " } else { "" };
                Ok(format!("{} {}IN ({})", inner, not, items.join(", ")))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let inner = self.operand(expr, 3, false)?;
                let low = self.operand(low, 4, false)?;
                let high = self.operand(high, 4, false)?;
                let not = if *negated { "NOT " } else { "" };
                Ok(format!("{} {}BETWEEN {} AND {}", inner, not, low, high))
            }
            Expr::Function { name, args } => self.function(name, args),
            Expr::Cast { expr, data_type } => {
                let inner = self.expr(expr)?;
                Ok(format!(
                    "CAST({} AS {})",
                    inner,
                    self.generator.cast_type(data_type)
                ))
            }
            Expr::Case {
                branches,
                else_value,
            } => {
                let mut sql = String::from("CASE");
                for branch in branches {
                    let when = self.expr(&branch.when)?;
                    let then = self.expr(&branch.then)?;
                    sql.push_str(&format!(" WHEN {} THEN {}", when, then));
                }
                if let Some(e) = else_value {
                    sql.push_str(&format!(" ELSE {}", self.expr(e)?));
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expr::Exists(select) => {
                let inner = super::dml::select::render_select(self, select)?;
                Ok(format!("EXISTS ({})", inner))
            }
            Expr::Subquery(select) => {
                let inner = super::dml::select::render_select(self, select)?;
                Ok(format!("({})", inner))
            }
        }
    }

    fn literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::Int(n) => n.to_string(),
            Literal::Decimal(s) => s.clone(),
            Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
            Literal::Bool(b) => self.generator.bool_literal(*b),
            Literal::Null => "NULL".to_string(),
        }
    }

    /// Render a child expression, parenthesized when it binds looser than
    /// its parent.
    fn operand(&mut self, expr: &Expr, parent: u8, right: bool) -> LowerResult<String> {
        let sql = self.expr(expr)?;
        let child = match expr {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::IsNull { .. } | Expr::InList { .. } | Expr::Between { .. } => 3,
            _ => return Ok(sql),
        };
        if child < parent || (right && child == parent) {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> LowerResult<String> {
        if op == BinaryOp::Add && (self.is_stringy(left) || self.is_stringy(right)) {
            let mut parts = Vec::new();
            for part in concat_parts(left).into_iter().chain(concat_parts(right)) {
                parts.push(self.operand(part, 5, false)?);
            }
            return Ok(self.generator.string_concat(&parts));
        }
        let prec = op.precedence();
        let l = self.operand(left, prec, false)?;
        // AND/OR are associative; keep right-nested chains flat.
        let r = self.operand(right, prec, !op.is_logical())?;
        Ok(format!("{} {} {}", l, op.sql_symbol(), r))
    }

    fn function(&mut self, name: &str, args: &[Expr]) -> LowerResult<String> {
        let upper = name.to_uppercase();
        if let Some(resolved) = self.resolver.resolve_intrinsic(&upper) {
            let arg = resolved?;
            return Ok(self.bind(arg));
        }
        if TIMESTAMP_FUNCTIONS.contains(&upper.as_str()) {
            return Ok(self.generator.current_timestamp().to_string());
        }
        let rendered = args
            .iter()
            .map(|a| self.expr(a))
            .collect::<LowerResult<Vec<_>>>()?;
        let name = match upper.as_str() {
            "ISNULL" => "COALESCE".to_string(),
            "LEN" => self.generator.length_function().to_string(),
            _ => upper,
        };
        Ok(format!("{}({})", name, rendered.join(", ")))
    }

    fn is_stringy(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Literal(Literal::String(_)) => true,
            Expr::Variable(name) => self.resolver.is_string_variable(name),
            Expr::Function { name, .. } => {
                STRING_FUNCTIONS.contains(&name.to_uppercase().as_str())
            }
            Expr::Cast { data_type, .. } => {
                let t = data_type.to_uppercase();
                t.contains("CHAR") || t.contains("TEXT")
            }
            Expr::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } => self.is_stringy(left) || self.is_stringy(right),
            _ => false,
        }
    }
}

/// Flatten a left-deep `a + b + c` chain into its parts.
fn concat_parts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            let mut parts = concat_parts(left);
            parts.extend(concat_parts(right));
            parts
        }
        other => vec![other],
    }
}
