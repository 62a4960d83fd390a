//! Transaction scope tracking.
//!
//! One flat flag: BEGIN binds `tx` and routes later DML through it, COMMIT
//! and ROLLBACK release it. Savepoints and nesting are rejected.

use crate::diagnostics::WarningKind;
use crate::error::{LowerError, LowerResult};
use crate::types::GoType;

use super::context::LowerContext;
use super::expr::{GoExpr, ValueKind, ATOM};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionState {
    /// A transaction is open on every path reaching this point.
    pub active: bool,
    /// Paths reaching this point disagree (TRY/CATCH joins), so the
    /// generated code checks `tx` at runtime.
    pub uncertain: bool,
}

impl TransactionState {
    /// State after two branches rejoin.
    pub fn join(self, other: TransactionState) -> TransactionState {
        TransactionState {
            active: self.active && other.active,
            uncertain: self.uncertain || other.uncertain || self.active != other.active,
        }
    }
}

fn has_handle(ctx: &LowerContext<'_>) -> bool {
    ctx.scan.uses_db
}

pub fn begin(ctx: &mut LowerContext<'_>, name: Option<&str>) -> LowerResult<()> {
    if ctx.tx.active {
        return Err(LowerError::Transaction(
            "nested BEGIN TRANSACTION is not supported".to_string(),
        ));
    }
    if let Some(name) = name {
        ctx.warn(
            WarningKind::Ignored,
            format!("transaction name {} has no Go counterpart", name),
        );
    }
    ctx.tx = TransactionState {
        active: true,
        uncertain: false,
    };
    if !has_handle(ctx) {
        ctx.warn(
            WarningKind::Ignored,
            "BEGIN TRANSACTION without a database handle; only the scope is tracked",
        );
        return Ok(());
    }
    ctx.emit_guarded("tx, err = db.BeginTx(ctx, nil)");
    ctx.open_block("defer func() {");
    ctx.open_block("if err != nil && tx != nil {");
    ctx.out.line("_ = tx.Rollback()");
    ctx.out.line("tx = nil");
    ctx.close_block("}");
    ctx.close_block("}()");
    Ok(())
}

fn check_open(ctx: &LowerContext<'_>, keyword: &str) -> LowerResult<()> {
    if ctx.tx.active || ctx.tx.uncertain {
        Ok(())
    } else {
        Err(LowerError::Transaction(format!(
            "{} without an open transaction",
            keyword
        )))
    }
}

pub fn commit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    check_open(ctx, "COMMIT")?;
    finish(ctx, "Commit")
}

pub fn rollback(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    check_open(ctx, "ROLLBACK")?;
    finish(ctx, "Rollback")
}

fn finish(ctx: &mut LowerContext<'_>, method: &str) -> LowerResult<()> {
    let uncertain = ctx.tx.uncertain;
    ctx.tx = TransactionState::default();
    if !has_handle(ctx) {
        ctx.warn(
            WarningKind::Ignored,
            format!("{} without a database handle; only the scope is tracked", method.to_uppercase()),
        );
        return Ok(());
    }
    if uncertain {
        ctx.open_block("if tx != nil {");
    }
    ctx.emit_guarded(&format!("err = tx.{}()", method));
    ctx.out.line("tx = nil");
    if uncertain {
        ctx.close_block("}");
    }
    Ok(())
}

pub fn save(_ctx: &mut LowerContext<'_>, name: &str) -> LowerResult<()> {
    Err(LowerError::Transaction(format!(
        "SAVE TRANSACTION {}: savepoints are not supported",
        name
    )))
}

/// Go code for `@@TRANCOUNT`.
pub fn trancount_code(ctx: &LowerContext<'_>) -> String {
    if ctx.tx.uncertain && has_handle(ctx) {
        "tsqlrt.TranCount(tx)".to_string()
    } else if ctx.tx.active {
        "1".to_string()
    } else {
        "0".to_string()
    }
}

pub fn trancount(ctx: &mut LowerContext<'_>) -> GoExpr {
    if ctx.tx.uncertain && has_handle(ctx) {
        let rt = ctx.runtime();
        return GoExpr::typed(format!("{}.TranCount(tx)", rt), GoType::Int32, ATOM);
    }
    let n = i64::from(ctx.tx.active);
    GoExpr::atom(n.to_string(), ValueKind::IntLit(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        let open = TransactionState {
            active: true,
            uncertain: false,
        };
        let closed = TransactionState::default();
        assert_eq!(open.join(open), open);
        assert_eq!(
            open.join(closed),
            TransactionState {
                active: false,
                uncertain: true
            }
        );
        assert_eq!(closed.join(closed), closed);
    }
}
