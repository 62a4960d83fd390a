//! Go expression lowering.
//!
//! Every T-SQL expression evaluated outside query text becomes a [`GoExpr`]:
//! Go source plus what is known about its type. Untyped literals stay
//! untyped until [`coerce`] fixes them to a declared Go type, which is where
//! decimal wrapping and bit conversion happen.

use crate::ast::{BinaryOp, CaseBranch, Expr, GlobalVar, Literal, UnaryOp};
use crate::diagnostics::WarningKind;
use crate::error::{LowerError, LowerResult};
use crate::naming::go_string_literal;
use crate::types::{classify, GoType};

use super::context::LowerContext;
use super::{dispatch, exception, transaction};

/// Binding strength of a Go operand; higher binds tighter.
pub const ATOM: u8 = 10;
pub const UNARY: u8 = 8;
const COMPARE: u8 = 3;

/// What the lowering knows about a value's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Typed(GoType),
    /// Untyped integer constant.
    IntLit(i64),
    /// Untyped exact numeric constant, source text.
    DecLit(String),
    /// String constant; `code` holds the quoted form.
    StrLit(String),
    BoolLit(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoExpr {
    pub code: String,
    pub kind: ValueKind,
    pub prec: u8,
}

impl GoExpr {
    pub fn new(code: impl Into<String>, kind: ValueKind, prec: u8) -> Self {
        Self {
            code: code.into(),
            kind,
            prec,
        }
    }

    pub fn atom(code: impl Into<String>, kind: ValueKind) -> Self {
        Self::new(code, kind, ATOM)
    }

    pub fn typed(code: impl Into<String>, ty: GoType, prec: u8) -> Self {
        Self::new(code, ValueKind::Typed(ty), prec)
    }

    /// The Go type, when the value has one (string and bool constants count).
    pub fn go_type(&self) -> Option<GoType> {
        match &self.kind {
            ValueKind::Typed(t) => Some(*t),
            ValueKind::StrLit(_) => Some(GoType::String),
            ValueKind::BoolLit(_) => Some(GoType::Bool),
            _ => None,
        }
    }

    /// The code, parenthesized when it binds looser than `min`.
    pub fn wrapped(&self, min: u8) -> String {
        if self.prec < min {
            format!("({})", self.code)
        } else {
            self.code.clone()
        }
    }

    fn is_decimal(&self) -> bool {
        matches!(self.kind, ValueKind::Typed(GoType::Decimal))
    }

    fn is_float(&self) -> bool {
        matches!(self.kind, ValueKind::Typed(t) if t.is_float())
    }

    fn is_string(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::StrLit(_) | ValueKind::Typed(GoType::String)
        )
    }
}

fn int_lit(n: i64) -> GoExpr {
    let prec = if n < 0 { UNARY } else { ATOM };
    GoExpr::new(n.to_string(), ValueKind::IntLit(n), prec)
}

fn bool_expr(code: impl Into<String>, prec: u8) -> GoExpr {
    GoExpr::typed(code, GoType::Bool, prec)
}

/// Whether lowering `expr` emits statements ahead of its use.
pub fn needs_hoist(expr: &Expr) -> bool {
    expr.any(&|e| matches!(e, Expr::Exists(_) | Expr::Subquery(_)))
}

/// Lower an expression. `hint` is the type the value flows into, used to
/// type subqueries and CASE results.
pub fn lower_expr(ctx: &mut LowerContext<'_>, expr: &Expr, hint: Option<GoType>) -> LowerResult<GoExpr> {
    match expr {
        Expr::Literal(lit) => Ok(literal(lit)),
        Expr::Variable(name) => {
            let symbol = ctx.symbols.lookup(name)?;
            Ok(GoExpr::typed(symbol.go_name.clone(), symbol.ty.go, ATOM))
        }
        Expr::Global(global) => lower_global(ctx, *global),
        Expr::Column(col) => Err(LowerError::unsupported(
            format!("column reference {}", col.name),
            "columns can only appear inside a query",
        )),
        Expr::Star => Err(LowerError::unsupported("*", "outside of a query")),
        Expr::Unary { op, expr } => {
            let inner = lower_expr(ctx, expr, hint)?;
            match op {
                UnaryOp::Neg => negate(inner),
                UnaryOp::Not => {
                    let inner = coerce(ctx, inner, GoType::Bool)?;
                    Ok(bool_expr(format!("!{}", inner.wrapped(UNARY)), UNARY))
                }
            }
        }
        Expr::Binary { op, left, right } => lower_binary(ctx, *op, left, right, hint),
        Expr::IsNull { expr, negated } => {
            let inner = lower_expr(ctx, expr, None)?;
            is_zero(ctx, inner, *negated)
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let subject = lower_expr(ctx, expr, None)?;
            let op = if *negated { BinaryOp::NotEq } else { BinaryOp::Eq };
            let mut parts = Vec::with_capacity(list.len());
            for item in list {
                let item = lower_expr(ctx, item, subject.go_type())?;
                parts.push(compare(ctx, op, subject.clone(), item)?);
            }
            let (joiner, prec) = if *negated { (" && ", 2) } else { (" || ", 1) };
            let code = parts
                .iter()
                .map(|p| p.wrapped(prec))
                .collect::<Vec<_>>()
                .join(joiner);
            Ok(bool_expr(code, if parts.len() > 1 { prec } else { COMPARE }))
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let subject = lower_expr(ctx, expr, None)?;
            let low = lower_expr(ctx, low, subject.go_type())?;
            let high = lower_expr(ctx, high, subject.go_type())?;
            let lower = compare(ctx, BinaryOp::GtEq, subject.clone(), low)?;
            let upper = compare(ctx, BinaryOp::LtEq, subject, high)?;
            let code = format!("{} && {}", lower.wrapped(2), upper.wrapped(2));
            if *negated {
                Ok(bool_expr(format!("!({})", code), UNARY))
            } else {
                Ok(bool_expr(code, 2))
            }
        }
        Expr::Function { name, args } => lower_function(ctx, name, args, hint),
        Expr::Cast { expr, data_type } => {
            let target = classify(data_type)?.go;
            let inner = lower_expr(ctx, expr, Some(target))?;
            coerce(ctx, inner, target)
        }
        Expr::Case {
            branches,
            else_value,
        } => lower_case(ctx, branches, else_value.as_deref(), hint),
        Expr::Exists(select) => dispatch::hoist_exists(ctx, select),
        Expr::Subquery(select) => dispatch::hoist_scalar(ctx, select, hint),
    }
}

/// Lower a condition to Go `bool` code.
pub fn lower_condition(ctx: &mut LowerContext<'_>, expr: &Expr) -> LowerResult<String> {
    let value = lower_expr(ctx, expr, Some(GoType::Bool))?;
    Ok(coerce(ctx, value, GoType::Bool)?.code)
}

/// Lower a value flowing into a variable of type `target`.
pub fn lower_value(ctx: &mut LowerContext<'_>, expr: &Expr, target: GoType) -> LowerResult<String> {
    let value = lower_expr(ctx, expr, Some(target))?;
    Ok(coerce(ctx, value, target)?.code)
}

fn literal(lit: &Literal) -> GoExpr {
    match lit {
        Literal::Int(n) => int_lit(*n),
        Literal::Decimal(s) => {
            let prec = if s.starts_with('-') { UNARY } else { ATOM };
            GoExpr::new(s.clone(), ValueKind::DecLit(s.clone()), prec)
        }
        Literal::String(s) => GoExpr::atom(go_string_literal(s), ValueKind::StrLit(s.clone())),
        Literal::Bool(b) => GoExpr::atom(b.to_string(), ValueKind::BoolLit(*b)),
        Literal::Null => GoExpr::atom("nil", ValueKind::Null),
    }
}

fn lower_global(ctx: &mut LowerContext<'_>, global: GlobalVar) -> LowerResult<GoExpr> {
    match global {
        GlobalVar::RowCount => Ok(GoExpr::typed("rowCount", GoType::Int64, ATOM)),
        GlobalVar::Identity => Ok(GoExpr::typed("lastInsertID", GoType::Int64, ATOM)),
        GlobalVar::Error => {
            ctx.warn(
                WarningKind::Approximation,
                "@@ERROR is always 0: failed statements leave through the error path",
            );
            Ok(int_lit(0))
        }
        GlobalVar::TranCount => Ok(transaction::trancount(ctx)),
        GlobalVar::FetchStatus => Err(LowerError::unsupported(
            "@@FETCH_STATUS",
            "only supported as the condition of a WHILE loop over a cursor",
        )),
    }
}

fn negate(inner: GoExpr) -> LowerResult<GoExpr> {
    match &inner.kind {
        ValueKind::IntLit(n) => Ok(int_lit(-n)),
        ValueKind::DecLit(s) => {
            let text = match s.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{}", s),
            };
            let prec = if text.starts_with('-') { UNARY } else { ATOM };
            Ok(GoExpr::new(text.clone(), ValueKind::DecLit(text), prec))
        }
        ValueKind::Typed(GoType::Decimal) => Ok(GoExpr::typed(
            format!("{}.Neg()", inner.wrapped(ATOM)),
            GoType::Decimal,
            ATOM,
        )),
        ValueKind::Typed(t) if t.is_numeric() => Ok(GoExpr::typed(
            format!("-{}", inner.wrapped(UNARY)),
            *t,
            UNARY,
        )),
        _ => Err(LowerError::unsupported(
            "negation",
            format!("operand {} is not numeric", inner.code),
        )),
    }
}

/// Convert `value` to `target`, following T-SQL's implicit conversions.
pub fn coerce(ctx: &mut LowerContext<'_>, value: GoExpr, target: GoType) -> LowerResult<GoExpr> {
    use ValueKind::*;

    ctx.import_type(target);
    let out = |code: String, prec: u8| -> LowerResult<GoExpr> {
        Ok(GoExpr::typed(code, target, prec))
    };

    match (&value.kind, target) {
        (Null, t) => out(t.zero_value().to_string(), ATOM),
        (Typed(t), _) if *t == target => Ok(value),

        (IntLit(n), GoType::Decimal) => out(format!("decimal.NewFromInt({})", n), ATOM),
        (DecLit(s), GoType::Decimal) => out(
            format!("decimal.RequireFromString({})", go_string_literal(s)),
            ATOM,
        ),
        (StrLit(_), GoType::Decimal) | (Typed(GoType::String), GoType::Decimal) => {
            out(format!("decimal.RequireFromString({})", value.code), ATOM)
        }
        (BoolLit(b), GoType::Decimal) => out(format!("decimal.NewFromInt({})", *b as i64), ATOM),
        (Typed(GoType::Int64), GoType::Decimal) => {
            out(format!("decimal.NewFromInt({})", value.code), ATOM)
        }
        (Typed(t), GoType::Decimal) if t.is_integer() => {
            out(format!("decimal.NewFromInt(int64({}))", value.code), ATOM)
        }
        (Typed(GoType::Float64), GoType::Decimal) => {
            out(format!("decimal.NewFromFloat({})", value.code), ATOM)
        }
        (Typed(GoType::Float32), GoType::Decimal) => {
            out(format!("decimal.NewFromFloat(float64({}))", value.code), ATOM)
        }
        (Typed(GoType::Bool), GoType::Decimal) => {
            let rt = ctx.runtime();
            out(format!("decimal.NewFromInt(int64({}.BitValue({})))", rt, value.code), ATOM)
        }

        (IntLit(n), GoType::Bool) => out((*n != 0).to_string(), ATOM),
        (DecLit(s), GoType::Bool) => {
            let digits = s.trim_start_matches('-').trim_matches(|c: char| c == '0' || c == '.');
            out((!digits.is_empty()).to_string(), ATOM)
        }
        (BoolLit(b), GoType::Bool) => out(b.to_string(), ATOM),
        (StrLit(s), GoType::Bool) => {
            let truthy = s.eq_ignore_ascii_case("true") || s.trim() == "1";
            out(truthy.to_string(), ATOM)
        }
        (Typed(GoType::Decimal), GoType::Bool) => {
            out(format!("!{}.IsZero()", value.wrapped(ATOM)), UNARY)
        }
        (Typed(t), GoType::Bool) if t.is_numeric() => {
            out(format!("{} != 0", value.wrapped(4)), COMPARE)
        }
        (Typed(GoType::String), GoType::Bool) => {
            let rt = ctx.runtime();
            out(format!("{}.ParseBit({})", rt, value.code), ATOM)
        }

        (IntLit(n), t) if t.is_numeric() => Ok(GoExpr::new(n.to_string(), Typed(t), value.prec)),
        (DecLit(s), t) if t.is_float() => Ok(GoExpr::new(s.clone(), Typed(t), value.prec)),
        (DecLit(s), t) if t.is_integer() => {
            let whole = s.split('.').next().unwrap_or("0");
            let whole = if whole.is_empty() || whole == "-" { "0" } else { whole };
            let prec = if whole.starts_with('-') { UNARY } else { ATOM };
            Ok(GoExpr::new(whole.to_string(), Typed(t), prec))
        }
        (BoolLit(b), t) if t.is_numeric() => out((*b as i64).to_string(), ATOM),
        (StrLit(s), t) if t.is_numeric() => {
            let trimmed = s.trim();
            if trimmed.parse::<i64>().is_ok() || (t.is_float() && trimmed.parse::<f64>().is_ok()) {
                out(trimmed.to_string(), ATOM)
            } else {
                Err(LowerError::unsupported(
                    "conversion",
                    format!("'{}' is not a valid {}", s, t),
                ))
            }
        }
        (Typed(GoType::Decimal), GoType::Int64) => out(format!("{}.IntPart()", value.wrapped(ATOM)), ATOM),
        (Typed(GoType::Decimal), t) if t.is_integer() => {
            out(format!("{}({}.IntPart())", t, value.wrapped(ATOM)), ATOM)
        }
        (Typed(GoType::Decimal), GoType::Float64) => {
            out(format!("{}.InexactFloat64()", value.wrapped(ATOM)), ATOM)
        }
        (Typed(GoType::Decimal), GoType::Float32) => {
            out(format!("float32({}.InexactFloat64())", value.wrapped(ATOM)), ATOM)
        }
        (Typed(src), t) if src.is_numeric() && t.is_numeric() => {
            out(format!("{}({})", t, value.code), ATOM)
        }
        (Typed(GoType::Bool), t) if t.is_numeric() => {
            let rt = ctx.runtime();
            if t == GoType::Int32 {
                out(format!("{}.BitValue({})", rt, value.code), ATOM)
            } else {
                out(format!("{}({}.BitValue({}))", t, rt, value.code), ATOM)
            }
        }
        (Typed(GoType::String), t) if t.is_integer() => {
            let rt = ctx.runtime();
            out(format!("{}({}.ParseInt({}))", t, rt, value.code), ATOM)
        }
        (Typed(GoType::String), t) if t.is_float() => {
            let rt = ctx.runtime();
            out(format!("{}({}.ParseFloat({}))", t, rt, value.code), ATOM)
        }

        (StrLit(_), GoType::String) => out(value.code, ATOM),
        (IntLit(n), GoType::String) => out(go_string_literal(&n.to_string()), ATOM),
        (DecLit(s), GoType::String) => out(go_string_literal(s), ATOM),
        (BoolLit(b), GoType::String) => out(go_string_literal(if *b { "1" } else { "0" }), ATOM),
        (Typed(GoType::Decimal), GoType::String) | (Typed(GoType::Time), GoType::String) => {
            out(format!("{}.String()", value.wrapped(ATOM)), ATOM)
        }
        (Typed(GoType::Bytes), GoType::String) => out(format!("string({})", value.code), ATOM),
        (Typed(GoType::Bool), GoType::String) => {
            ctx.import("fmt");
            let rt = ctx.runtime();
            out(format!("fmt.Sprint({}.BitValue({}))", rt, value.code), ATOM)
        }
        (Typed(t), GoType::String) if t.is_numeric() => {
            ctx.import("fmt");
            out(format!("fmt.Sprint({})", value.code), ATOM)
        }

        (StrLit(_), GoType::Time) | (Typed(GoType::String), GoType::Time) => {
            let rt = ctx.runtime();
            out(format!("{}.ParseDateTime({})", rt, value.code), ATOM)
        }
        (StrLit(_), GoType::Bytes) | (Typed(GoType::String), GoType::Bytes) => {
            out(format!("[]byte({})", value.code), ATOM)
        }

        _ => Err(LowerError::unsupported(
            "conversion",
            format!("cannot convert {} to {}", value.code, target),
        )),
    }
}

fn lower_binary(
    ctx: &mut LowerContext<'_>,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    hint: Option<GoType>,
) -> LowerResult<GoExpr> {
    if op.is_logical() {
        let l = lower_expr(ctx, left, Some(GoType::Bool))?;
        let l = coerce(ctx, l, GoType::Bool)?;
        let r = lower_expr(ctx, right, Some(GoType::Bool))?;
        let r = coerce(ctx, r, GoType::Bool)?;
        let p = op.precedence();
        return Ok(bool_expr(
            format!("{} {} {}", l.wrapped(p), op.go_symbol(), r.wrapped(p)),
            p,
        ));
    }

    // Untyped literals take the type of the other operand.
    let l = lower_expr(ctx, left, None)?;
    let r = lower_expr(ctx, right, l.go_type().or(hint))?;

    match op {
        BinaryOp::Like | BinaryOp::NotLike => {
            let l = coerce(ctx, l, GoType::String)?;
            let r = coerce(ctx, r, GoType::String)?;
            let rt = ctx.runtime();
            let call = format!("{}.Like({}, {})", rt, l.code, r.code);
            if op == BinaryOp::NotLike {
                Ok(bool_expr(format!("!{}", call), UNARY))
            } else {
                Ok(bool_expr(call, ATOM))
            }
        }
        op if op.is_comparison() => compare(ctx, op, l, r),
        BinaryOp::Add if l.is_string() || r.is_string() => {
            let l = coerce(ctx, l, GoType::String)?;
            let r = coerce(ctx, r, GoType::String)?;
            Ok(GoExpr::typed(
                format!("{} + {}", l.wrapped(4), r.wrapped(5)),
                GoType::String,
                4,
            ))
        }
        _ => arithmetic(ctx, op, l, r, hint),
    }
}

fn numeric_kind(e: &GoExpr) -> bool {
    match &e.kind {
        ValueKind::IntLit(_) | ValueKind::DecLit(_) => true,
        ValueKind::Typed(t) => t.is_numeric() || *t == GoType::Decimal,
        _ => false,
    }
}

/// Decimal arithmetic applies when either side is a decimal, or an exact
/// literal meets a non-float operand.
fn uses_decimal(l: &GoExpr, r: &GoExpr) -> bool {
    let dec_lit = |e: &GoExpr| matches!(e.kind, ValueKind::DecLit(_));
    l.is_decimal() || r.is_decimal() || ((dec_lit(l) || dec_lit(r)) && !l.is_float() && !r.is_float())
}

fn fold(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div if b != 0 => a.checked_div(b),
        BinaryOp::Mod if b != 0 => a.checked_rem(b),
        _ => None,
    }
}

fn arithmetic(
    ctx: &mut LowerContext<'_>,
    op: BinaryOp,
    l: GoExpr,
    r: GoExpr,
    hint: Option<GoType>,
) -> LowerResult<GoExpr> {
    if let (ValueKind::IntLit(a), ValueKind::IntLit(b)) = (&l.kind, &r.kind) {
        if let Some(n) = fold(op, *a, *b) {
            return Ok(int_lit(n));
        }
    }
    if !numeric_kind(&l) || !numeric_kind(&r) {
        let construct = if matches!(l.kind, ValueKind::Typed(GoType::Time))
            || matches!(r.kind, ValueKind::Typed(GoType::Time))
        {
            "date arithmetic"
        } else {
            "arithmetic"
        };
        return Err(LowerError::unsupported(
            construct,
            format!("{} {} {} needs numeric operands (use DATEADD for dates)", l.code, op.sql_symbol(), r.code),
        ));
    }

    if uses_decimal(&l, &r) {
        let l = coerce(ctx, l, GoType::Decimal)?;
        let r = coerce(ctx, r, GoType::Decimal)?;
        let method = match op {
            BinaryOp::Add => "Add",
            BinaryOp::Sub => "Sub",
            BinaryOp::Mul => "Mul",
            BinaryOp::Div => "Div",
            _ => "Mod",
        };
        return Ok(GoExpr::typed(
            format!("{}.{}({})", l.wrapped(ATOM), method, r.code),
            GoType::Decimal,
            ATOM,
        ));
    }

    let ty = match (l.go_type(), r.go_type()) {
        (Some(a), Some(b)) => a.widen(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => hint.filter(|h| h.is_numeric()).unwrap_or(GoType::Int32),
    };
    // An exact literal against an integer operand computes in float64.
    let ty = if ty.is_integer()
        && (matches!(l.kind, ValueKind::DecLit(_)) || matches!(r.kind, ValueKind::DecLit(_)))
    {
        GoType::Float64
    } else {
        ty
    };
    let l = coerce(ctx, l, ty)?;
    let r = coerce(ctx, r, ty)?;
    if op == BinaryOp::Mod && ty.is_float() {
        ctx.import("math");
        let call = format!("math.Mod(float64({}), float64({}))", l.code, r.code);
        return Ok(if ty == GoType::Float64 {
            GoExpr::typed(format!("math.Mod({}, {})", l.code, r.code), ty, ATOM)
        } else {
            GoExpr::typed(format!("float32({})", call), ty, ATOM)
        });
    }
    let p = op.precedence();
    Ok(GoExpr::typed(
        format!("{} {} {}", l.wrapped(p), op.go_symbol(), r.wrapped(p + 1)),
        ty,
        p,
    ))
}

/// Lower a comparison; both operands are brought to a common Go type.
pub fn compare(ctx: &mut LowerContext<'_>, op: BinaryOp, l: GoExpr, r: GoExpr) -> LowerResult<GoExpr> {
    // `x = NULL` never matches in T-SQL; treat it as the IS NULL its author meant.
    if matches!(r.kind, ValueKind::Null) || matches!(l.kind, ValueKind::Null) {
        let subject = if matches!(r.kind, ValueKind::Null) { l } else { r };
        return match op {
            BinaryOp::Eq => is_zero(ctx, subject, false),
            BinaryOp::NotEq => is_zero(ctx, subject, true),
            _ => Err(LowerError::unsupported(
                "comparison with NULL",
                format!("{} NULL", op.sql_symbol()),
            )),
        };
    }

    let either = |t: GoType| l.go_type() == Some(t) || r.go_type() == Some(t);

    if either(GoType::Bool) {
        return compare_bool(ctx, op, l, r);
    }
    if either(GoType::Time) {
        let l = coerce(ctx, l, GoType::Time)?;
        let r = coerce(ctx, r, GoType::Time)?;
        let (a, b) = (l.wrapped(ATOM), r.code);
        return Ok(match op {
            BinaryOp::Eq => bool_expr(format!("{}.Equal({})", a, b), ATOM),
            BinaryOp::NotEq => bool_expr(format!("!{}.Equal({})", a, b), UNARY),
            BinaryOp::Lt => bool_expr(format!("{}.Before({})", a, b), ATOM),
            BinaryOp::Gt => bool_expr(format!("{}.After({})", a, b), ATOM),
            BinaryOp::LtEq => bool_expr(format!("!{}.After({})", a, b), UNARY),
            _ => bool_expr(format!("!{}.Before({})", a, b), UNARY),
        });
    }
    if either(GoType::String) {
        let l = coerce(ctx, l, GoType::String)?;
        let r = coerce(ctx, r, GoType::String)?;
        return Ok(bool_expr(
            format!("{} {} {}", l.wrapped(4), op.go_symbol(), r.wrapped(4)),
            COMPARE,
        ));
    }
    if !numeric_kind(&l) || !numeric_kind(&r) {
        return Err(LowerError::unsupported(
            "comparison",
            format!("{} {} {}", l.code, op.sql_symbol(), r.code),
        ));
    }
    if uses_decimal(&l, &r) {
        let l = coerce(ctx, l, GoType::Decimal)?;
        let r = coerce(ctx, r, GoType::Decimal)?;
        let (a, b) = (l.wrapped(ATOM), r.code);
        return Ok(match op {
            BinaryOp::Eq => bool_expr(format!("{}.Equal({})", a, b), ATOM),
            BinaryOp::NotEq => bool_expr(format!("!{}.Equal({})", a, b), UNARY),
            _ => bool_expr(format!("{}.Cmp({}) {} 0", a, b, op.go_symbol()), COMPARE),
        });
    }
    let ty = match (l.go_type(), r.go_type()) {
        (Some(a), Some(b)) if a != b => Some(a.widen(b)),
        _ => None,
    };
    let (l, r) = match ty {
        Some(t) => (coerce(ctx, l, t)?, coerce(ctx, r, t)?),
        None => (l, r),
    };
    Ok(bool_expr(
        format!("{} {} {}", l.wrapped(4), op.go_symbol(), r.wrapped(4)),
        COMPARE,
    ))
}

/// BIT comparisons: `@flag = 1` is `flag`, `@flag = 0` is `!flag`.
fn compare_bool(ctx: &mut LowerContext<'_>, op: BinaryOp, l: GoExpr, r: GoExpr) -> LowerResult<GoExpr> {
    if !matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
        return Err(LowerError::unsupported(
            "comparison",
            format!("ordering comparison {} on a BIT value", op.sql_symbol()),
        ));
    }
    let constant = |e: &GoExpr| match &e.kind {
        ValueKind::IntLit(n) => Some(*n != 0),
        ValueKind::BoolLit(b) => Some(*b),
        _ => None,
    };
    let (subject, value) = match (constant(&l), constant(&r)) {
        (None, Some(v)) => (l, v),
        (Some(v), None) => (r, v),
        _ => {
            let l = coerce(ctx, l, GoType::Bool)?;
            let r = coerce(ctx, r, GoType::Bool)?;
            return Ok(bool_expr(
                format!("{} {} {}", l.wrapped(4), op.go_symbol(), r.wrapped(4)),
                COMPARE,
            ));
        }
    };
    let subject = coerce(ctx, subject, GoType::Bool)?;
    if value == (op == BinaryOp::Eq) {
        Ok(subject)
    } else {
        Ok(bool_expr(format!("!{}", subject.wrapped(UNARY)), UNARY))
    }
}

/// IS NULL against a value type: compare with the zero value.
fn is_zero(ctx: &mut LowerContext<'_>, subject: GoExpr, negated: bool) -> LowerResult<GoExpr> {
    ctx.warn(
        WarningKind::Approximation,
        format!("IS NULL on {} compares against the zero value", subject.code),
    );
    let (eq, ne) = match subject.kind {
        ValueKind::Null => return Ok(bool_expr((!negated).to_string(), ATOM)),
        ValueKind::IntLit(_) | ValueKind::DecLit(_) | ValueKind::StrLit(_) | ValueKind::BoolLit(_) => {
            return Ok(bool_expr(negated.to_string(), ATOM))
        }
        ValueKind::Typed(GoType::Decimal) | ValueKind::Typed(GoType::Time) => {
            let call = format!("{}.IsZero()", subject.wrapped(ATOM));
            return Ok(if negated {
                bool_expr(format!("!{}", call), UNARY)
            } else {
                bool_expr(call, ATOM)
            });
        }
        ValueKind::Typed(GoType::Bool) => {
            return Ok(if negated {
                subject
            } else {
                bool_expr(format!("!{}", subject.wrapped(UNARY)), UNARY)
            });
        }
        ValueKind::Typed(GoType::Bytes) => {
            (format!("len({}) == 0", subject.code), format!("len({}) != 0", subject.code))
        }
        ValueKind::Typed(t) => {
            let zero = t.zero_value();
            (
                format!("{} == {}", subject.wrapped(4), zero),
                format!("{} != {}", subject.wrapped(4), zero),
            )
        }
    };
    Ok(bool_expr(if negated { ne } else { eq }, COMPARE))
}

/// Searched CASE as an immediately-invoked Go func literal.
fn lower_case(
    ctx: &mut LowerContext<'_>,
    branches: &[CaseBranch],
    else_value: Option<&Expr>,
    hint: Option<GoType>,
) -> LowerResult<GoExpr> {
    let mut conditions = Vec::with_capacity(branches.len());
    let mut values = Vec::with_capacity(branches.len());
    for branch in branches {
        conditions.push(lower_condition(ctx, &branch.when)?);
        values.push(lower_expr(ctx, &branch.then, hint)?);
    }
    let otherwise = match else_value {
        Some(e) => Some(lower_expr(ctx, e, hint)?),
        None => None,
    };

    let ty = hint
        .or_else(|| values.iter().chain(otherwise.iter()).find_map(GoExpr::go_type))
        .or_else(|| {
            values.iter().chain(otherwise.iter()).find_map(|v| match v.kind {
                ValueKind::IntLit(_) => Some(GoType::Int32),
                ValueKind::DecLit(_) => Some(GoType::Decimal),
                _ => None,
            })
        })
        .ok_or_else(|| LowerError::unsupported("CASE", "result type cannot be inferred"))?;

    let mut code = format!("func() {} {{ ", ty);
    for (cond, value) in conditions.into_iter().zip(values) {
        let value = coerce(ctx, value, ty)?;
        code.push_str(&format!("if {} {{ return {} }}; ", cond, value.code));
    }
    let fallback = match otherwise {
        Some(v) => coerce(ctx, v, ty)?.code,
        None => ty.zero_value().to_string(),
    };
    code.push_str(&format!("return {} }}()", fallback));
    Ok(GoExpr::typed(code, ty, ATOM))
}

fn arg<'e>(name: &str, args: &'e [Expr], i: usize) -> LowerResult<&'e Expr> {
    args.get(i).ok_or_else(|| {
        LowerError::unsupported(
            format!("{}()", name),
            format!("expects at least {} argument(s)", i + 1),
        )
    })
}

fn string_arg(ctx: &mut LowerContext<'_>, name: &str, args: &[Expr], i: usize) -> LowerResult<GoExpr> {
    let e = arg(name, args, i)?;
    let v = lower_expr(ctx, e, Some(GoType::String))?;
    coerce(ctx, v, GoType::String)
}

fn int_arg(ctx: &mut LowerContext<'_>, name: &str, args: &[Expr], i: usize) -> LowerResult<String> {
    let e = arg(name, args, i)?;
    let v = lower_expr(ctx, e, Some(GoType::Int64))?;
    Ok(match v.kind {
        ValueKind::IntLit(n) => n.to_string(),
        _ => format!("int({})", coerce(ctx, v, GoType::Int64)?.code),
    })
}

/// Date part argument: `day`, `'day'` or `dd`.
fn date_part(name: &str, e: &Expr) -> LowerResult<&'static str> {
    let raw = match e {
        Expr::Column(c) => c.name.as_str(),
        Expr::Literal(Literal::String(s)) => s.as_str(),
        _ => return Err(LowerError::unsupported(format!("{}()", name), "date part must be a keyword")),
    };
    Ok(match raw.to_lowercase().as_str() {
        "year" | "yy" | "yyyy" => "year",
        "quarter" | "qq" | "q" => "quarter",
        "month" | "mm" | "m" => "month",
        "dayofyear" | "dy" | "y" | "day" | "dd" | "d" => "day",
        "week" | "wk" | "ww" => "week",
        "hour" | "hh" => "hour",
        "minute" | "mi" | "n" => "minute",
        "second" | "ss" | "s" => "second",
        "millisecond" | "ms" => "millisecond",
        other => {
            return Err(LowerError::unsupported(
                format!("{}()", name),
                format!("unknown date part '{}'", other),
            ))
        }
    })
}

fn lower_function(
    ctx: &mut LowerContext<'_>,
    name: &str,
    args: &[Expr],
    hint: Option<GoType>,
) -> LowerResult<GoExpr> {
    let upper = name.to_uppercase();
    let n = upper.as_str();

    if let Some((code, kind)) = exception::error_intrinsic(ctx.in_catch(), &ctx.procedure.name, n) {
        if !ctx.in_catch() {
            ctx.warn(
                WarningKind::Approximation,
                format!("{}() outside a CATCH block lowers to its zero value", n),
            );
        }
        return Ok(GoExpr::atom(code, kind));
    }

    match n {
        "GETDATE" | "SYSDATETIME" | "CURRENT_TIMESTAMP" | "SYSDATETIMEOFFSET" => {
            ctx.import("time");
            Ok(GoExpr::typed("time.Now()", GoType::Time, ATOM))
        }
        "GETUTCDATE" | "SYSUTCDATETIME" => {
            ctx.import("time");
            Ok(GoExpr::typed("time.Now().UTC()", GoType::Time, ATOM))
        }
        "SCOPE_IDENTITY" | "IDENT_CURRENT" => Ok(GoExpr::typed("lastInsertID", GoType::Int64, ATOM)),
        "NEWID" => {
            let rt = ctx.runtime();
            Ok(GoExpr::typed(format!("{}.NewID()", rt), GoType::String, ATOM))
        }
        "ISNULL" | "COALESCE" => {
            let mut lowered = Vec::with_capacity(args.len());
            for a in args {
                lowered.push(lower_expr(ctx, a, hint)?);
            }
            let ty = lowered
                .iter()
                .find_map(|v| match v.kind {
                    ValueKind::Typed(t) => Some(t),
                    _ => None,
                })
                .or(hint)
                .or_else(|| lowered.iter().find_map(GoExpr::go_type))
                .ok_or_else(|| LowerError::unsupported(n, "argument type cannot be inferred"))?;
            let mut parts = Vec::with_capacity(lowered.len());
            for v in lowered {
                parts.push(coerce(ctx, v, ty)?.code);
            }
            let rt = ctx.runtime();
            Ok(GoExpr::typed(format!("{}.Coalesce({})", rt, parts.join(", ")), ty, ATOM))
        }
        "LEN" => {
            let s = string_arg(ctx, n, args, 0)?;
            ctx.import("strings");
            ctx.import("unicode/utf8");
            Ok(GoExpr::typed(
                format!("int32(utf8.RuneCountInString(strings.TrimRight({}, \" \")))", s.code),
                GoType::Int32,
                ATOM,
            ))
        }
        "DATALENGTH" => {
            let s = string_arg(ctx, n, args, 0)?;
            Ok(GoExpr::typed(format!("int32(len({}))", s.code), GoType::Int32, ATOM))
        }
        "UPPER" | "LOWER" | "LTRIM" | "RTRIM" | "TRIM" => {
            let s = string_arg(ctx, n, args, 0)?;
            ctx.import("strings");
            let code = match n {
                "UPPER" => format!("strings.ToUpper({})", s.code),
                "LOWER" => format!("strings.ToLower({})", s.code),
                "LTRIM" => format!("strings.TrimLeft({}, \" \")", s.code),
                "RTRIM" => format!("strings.TrimRight({}, \" \")", s.code),
                _ => format!("strings.TrimSpace({})", s.code),
            };
            Ok(GoExpr::typed(code, GoType::String, ATOM))
        }
        "REPLACE" => {
            let s = string_arg(ctx, n, args, 0)?;
            let from = string_arg(ctx, n, args, 1)?;
            let to = string_arg(ctx, n, args, 2)?;
            ctx.import("strings");
            Ok(GoExpr::typed(
                format!("strings.ReplaceAll({}, {}, {})", s.code, from.code, to.code),
                GoType::String,
                ATOM,
            ))
        }
        "SUBSTRING" => {
            let s = string_arg(ctx, n, args, 0)?;
            let start = int_arg(ctx, n, args, 1)?;
            let len = int_arg(ctx, n, args, 2)?;
            let rt = ctx.runtime();
            Ok(GoExpr::typed(
                format!("{}.Substring({}, {}, {})", rt, s.code, start, len),
                GoType::String,
                ATOM,
            ))
        }
        "LEFT" | "RIGHT" => {
            let s = string_arg(ctx, n, args, 0)?;
            let count = int_arg(ctx, n, args, 1)?;
            let rt = ctx.runtime();
            let f = if n == "LEFT" { "Left" } else { "Right" };
            Ok(GoExpr::typed(
                format!("{}.{}({}, {})", rt, f, s.code, count),
                GoType::String,
                ATOM,
            ))
        }
        "CHARINDEX" => {
            let needle = string_arg(ctx, n, args, 0)?;
            let hay = string_arg(ctx, n, args, 1)?;
            ctx.import("strings");
            Ok(GoExpr::typed(
                format!("int32(strings.Index({}, {}) + 1)", hay.code, needle.code),
                GoType::Int32,
                ATOM,
            ))
        }
        "CONCAT" => {
            let mut parts = Vec::with_capacity(args.len());
            for i in 0..args.len() {
                parts.push(string_arg(ctx, n, args, i)?.wrapped(5));
            }
            if parts.is_empty() {
                return Ok(GoExpr::typed("\"\"", GoType::String, ATOM));
            }
            let prec = if parts.len() > 1 { 4 } else { ATOM };
            Ok(GoExpr::typed(parts.join(" + "), GoType::String, prec))
        }
        "ABS" | "FLOOR" | "CEILING" | "ROUND" => {
            let v = lower_expr(ctx, arg(n, args, 0)?, hint)?;
            let v = match v.kind {
                ValueKind::IntLit(_) => coerce(ctx, v, hint.filter(|h| h.is_numeric()).unwrap_or(GoType::Int32))?,
                ValueKind::DecLit(_) => coerce(ctx, v, GoType::Decimal)?,
                _ => v,
            };
            let ty = v
                .go_type()
                .filter(|t| t.is_numeric() || *t == GoType::Decimal)
                .ok_or_else(|| LowerError::unsupported(n, format!("{} is not numeric", v.code)))?;
            if ty == GoType::Decimal {
                let recv = v.wrapped(ATOM);
                let code = match n {
                    "ABS" => format!("{}.Abs()", recv),
                    "FLOOR" => format!("{}.Floor()", recv),
                    "CEILING" => format!("{}.Ceil()", recv),
                    _ => format!("{}.Round(int32({}))", recv, int_arg(ctx, n, args, 1)?),
                };
                return Ok(GoExpr::typed(code, ty, ATOM));
            }
            match n {
                "ABS" => {
                    let rt = ctx.runtime();
                    Ok(GoExpr::typed(format!("{}.Abs({})", rt, v.code), ty, ATOM))
                }
                _ if ty.is_integer() => Ok(v),
                "ROUND" => {
                    let digits = int_arg(ctx, n, args, 1)?;
                    let rt = ctx.runtime();
                    Ok(GoExpr::typed(format!("{}.Round({}, {})", rt, v.code, digits), ty, ATOM))
                }
                _ => {
                    ctx.import("math");
                    let f = if n == "FLOOR" { "Floor" } else { "Ceil" };
                    let code = if ty == GoType::Float64 {
                        format!("math.{}({})", f, v.code)
                    } else {
                        format!("{}(math.{}(float64({})))", ty, f, v.code)
                    };
                    Ok(GoExpr::typed(code, ty, ATOM))
                }
            }
        }
        "YEAR" | "MONTH" | "DAY" => {
            let d = lower_expr(ctx, arg(n, args, 0)?, Some(GoType::Time))?;
            let d = coerce(ctx, d, GoType::Time)?;
            let method = match n {
                "YEAR" => "Year",
                "MONTH" => "Month",
                _ => "Day",
            };
            Ok(GoExpr::typed(
                format!("int32({}.{}())", d.wrapped(ATOM), method),
                GoType::Int32,
                ATOM,
            ))
        }
        "DATEADD" => {
            let part = date_part(n, arg(n, args, 0)?)?;
            let amount = int_arg(ctx, n, args, 1)?;
            let d = lower_expr(ctx, arg(n, args, 2)?, Some(GoType::Time))?;
            let d = coerce(ctx, d, GoType::Time)?;
            let rt = ctx.runtime();
            Ok(GoExpr::typed(
                format!("{}.DateAdd({:?}, {}, {})", rt, part, amount, d.code),
                GoType::Time,
                ATOM,
            ))
        }
        "DATEDIFF" => {
            let part = date_part(n, arg(n, args, 0)?)?;
            let start = lower_expr(ctx, arg(n, args, 1)?, Some(GoType::Time))?;
            let start = coerce(ctx, start, GoType::Time)?;
            let end = lower_expr(ctx, arg(n, args, 2)?, Some(GoType::Time))?;
            let end = coerce(ctx, end, GoType::Time)?;
            let rt = ctx.runtime();
            Ok(GoExpr::typed(
                format!("{}.DateDiff({:?}, {}, {})", rt, part, start.code, end.code),
                GoType::Int32,
                ATOM,
            ))
        }
        _ => Err(LowerError::unsupported(
            format!("function {}()", n),
            "no Go lowering for this built-in",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;
    use crate::ast::Procedure;
    use crate::config::LowerConfig;
    use crate::lower::prescan::Prescan;
    use crate::symbols::SymbolKind;
    use pretty_assertions::assert_eq;

    /// Run `f` against a context holding the given locals.
    fn with_locals<T>(locals: &[(&str, &str)], f: impl FnOnce(&mut LowerContext<'_>) -> T) -> T {
        let procedure = Procedure::new("usp_Expr");
        let config = LowerConfig::default();
        let mut ctx = LowerContext::new(&procedure, &config, Prescan::default());
        for (name, ty) in locals {
            ctx.symbols.declare(name, ty, SymbolKind::Local).unwrap();
        }
        f(&mut ctx)
    }

    fn value(locals: &[(&str, &str)], e: Expr, target: GoType) -> String {
        with_locals(locals, |ctx| lower_value(ctx, &e, target).unwrap())
    }

    fn condition(locals: &[(&str, &str)], e: Expr) -> String {
        with_locals(locals, |ctx| lower_condition(ctx, &e).unwrap())
    }

    #[test]
    fn test_null_becomes_zero_value() {
        assert_eq!(value(&[], null(), GoType::Int32), "0");
        assert_eq!(value(&[], null(), GoType::Decimal), "decimal.Zero");
        assert_eq!(value(&[], null(), GoType::Bool), "false");
    }

    #[test]
    fn test_literals_coerce_to_decimal_and_bit() {
        assert_eq!(value(&[], int(5), GoType::Decimal), "decimal.NewFromInt(5)");
        assert_eq!(
            value(&[], dec("12.50"), GoType::Decimal),
            "decimal.RequireFromString(\"12.50\")"
        );
        assert_eq!(value(&[], int(1), GoType::Bool), "true");
        assert_eq!(value(&[], int(0), GoType::Bool), "false");
        assert_eq!(value(&[], dec("0.00"), GoType::Bool), "false");
    }

    #[test]
    fn test_integer_variables_widen_into_decimal() {
        let locals = [("@n", "INT"), ("@big", "BIGINT")];
        assert_eq!(value(&locals, var("@n"), GoType::Decimal), "decimal.NewFromInt(int64(n))");
        assert_eq!(value(&locals, var("@big"), GoType::Decimal), "decimal.NewFromInt(big)");
    }

    #[test]
    fn test_decimal_arithmetic_and_comparison() {
        let locals = [("@price", "DECIMAL(18,2)")];
        assert_eq!(
            value(&locals, add(var("@price"), int(1)), GoType::Decimal),
            "price.Add(decimal.NewFromInt(1))"
        );
        assert_eq!(
            condition(&locals, gt(var("@price"), int(10))),
            "price.Cmp(decimal.NewFromInt(10)) > 0"
        );
        assert_eq!(
            condition(&locals, eq(var("@price"), int(0))),
            "price.Equal(decimal.NewFromInt(0))"
        );
    }

    #[test]
    fn test_integer_constants_fold() {
        assert_eq!(value(&[], mul(int(6), int(7)), GoType::Int32), "42");
        assert_eq!(value(&[], add(int(i64::MAX), int(1)), GoType::Int64), format!("{} + 1", i64::MAX));
    }

    #[test]
    fn test_bit_comparisons_read_as_flags() {
        let locals = [("@flag", "BIT")];
        assert_eq!(condition(&locals, eq(var("@flag"), int(1))), "flag");
        assert_eq!(condition(&locals, eq(var("@flag"), int(0))), "!flag");
        assert_eq!(condition(&locals, ne(var("@flag"), int(0))), "flag");
    }

    #[test]
    fn test_mixed_integer_widths_compare_in_wider_type() {
        let locals = [("@n", "INT"), ("@big", "BIGINT")];
        assert_eq!(condition(&locals, lt(var("@n"), var("@big"))), "int64(n) < big");
    }

    #[test]
    fn test_string_concatenation_formats_numbers() {
        let (code, imports_fmt) = with_locals(&[("@n", "INT")], |ctx| {
            let code = lower_value(ctx, &add(text("row "), var("@n")), GoType::String).unwrap();
            (code, ctx.imports.contains("fmt"))
        });
        assert_eq!(code, "\"row \" + fmt.Sprint(n)");
        assert!(imports_fmt);
    }

    #[test]
    fn test_null_comparison_checks_zero_with_warning() {
        let (code, warnings) = with_locals(&[("@n", "INT")], |ctx| {
            let code = lower_condition(ctx, &eq(var("@n"), null())).unwrap();
            (code, ctx.diagnostics.len())
        });
        assert_eq!(code, "n == 0");
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_error_global_is_zero() {
        let (code, warnings) = with_locals(&[], |ctx| {
            let code = lower_value(ctx, &global(GlobalVar::Error), GoType::Int32).unwrap();
            (code, ctx.diagnostics.len())
        });
        assert_eq!(code, "0");
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_column_outside_query_is_rejected() {
        let err = with_locals(&[], |ctx| lower_expr(ctx, &col("Id"), None).unwrap_err());
        assert!(matches!(err, LowerError::Unsupported { .. }));
    }
}
