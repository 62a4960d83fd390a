//! TRY/CATCH, THROW and RAISERROR.
//!
//! A TRY/CATCH block becomes an immediately-invoked func literal whose
//! deferred handler recovers the failure and runs the CATCH body:
//!
//! ```go
//! func() {
//!     defer func() {
//!         if r := recover(); r != nil {
//!             err = nil
//!             // CATCH
//!         }
//!     }()
//!     // TRY
//! }()
//! ```
//!
//! Inside TRY every failure is a `panic`, so returned errors and runtime
//! panics reach the same handler.

use crate::ast::{Expr, Statement, ThrowArgs};
use crate::diagnostics::WarningKind;
use crate::error::{LowerError, LowerResult};
use crate::naming::go_string_literal;
use crate::types::GoType;

use super::context::{ExitScope, LowerContext};
use super::expr::{self, ValueKind};
use super::prescan::is_informational;
use super::stmt;
use super::transaction::TransactionState;

/// `ERROR_*()` intrinsics. Inside CATCH they describe `caught`; elsewhere
/// they are zero values.
pub fn error_intrinsic(in_catch: bool, procedure: &str, name: &str) -> Option<(String, ValueKind)> {
    let int = |n: i64| Some((n.to_string(), ValueKind::IntLit(n)));
    let text = |s: &str| Some((go_string_literal(s), ValueKind::StrLit(s.to_string())));
    match name.to_uppercase().as_str() {
        "ERROR_MESSAGE" if in_catch => Some((
            "caught.Error()".to_string(),
            ValueKind::Typed(GoType::String),
        )),
        "ERROR_MESSAGE" => text(""),
        "ERROR_NUMBER" => int(if in_catch { 50000 } else { 0 }),
        "ERROR_SEVERITY" => int(if in_catch { 16 } else { 0 }),
        "ERROR_STATE" => int(if in_catch { 1 } else { 0 }),
        "ERROR_LINE" => int(0),
        "ERROR_PROCEDURE" => text(if in_catch { procedure } else { "" }),
        _ => None,
    }
}

/// Which nested TRY/CATCH half a search skips.
#[derive(Clone, Copy)]
enum Skip {
    NestedTry,
    NestedCatch,
}

fn any_stmt(stmts: &[Statement], skip: Skip, pred: &dyn Fn(&Statement) -> bool) -> bool {
    stmts.iter().any(|s| {
        if pred(s) {
            return true;
        }
        match (s, skip) {
            (Statement::TryCatch { catch_body, .. }, Skip::NestedTry) => any_stmt(catch_body, skip, pred),
            (Statement::TryCatch { try_body, .. }, Skip::NestedCatch) => any_stmt(try_body, skip, pred),
            _ => s.children().into_iter().any(|c| any_stmt(c, skip, pred)),
        }
    })
}

fn is_transaction(s: &Statement) -> bool {
    matches!(
        s,
        Statement::BeginTransaction(_)
            | Statement::CommitTransaction(_)
            | Statement::RollbackTransaction(_)
    )
}

fn raises(s: &Statement) -> bool {
    match s {
        Statement::Throw(_) => true,
        Statement::Raiserror { severity, .. } => !is_informational(severity),
        _ => false,
    }
}

fn reads_caught(s: &Statement) -> bool {
    if matches!(s, Statement::Throw(None)) {
        return true;
    }
    let mut found = false;
    s.walk_own_exprs(&mut |e: &Expr| {
        if e.any(&|e| e.is_function("ERROR_MESSAGE")) {
            found = true;
        }
    });
    found
}

fn run_scoped<'a>(
    ctx: &mut LowerContext<'a>,
    scope: ExitScope,
    branch: usize,
    body: &[Statement],
) -> LowerResult<()> {
    ctx.push_exit(scope);
    ctx.enter_closure();
    ctx.enter(branch);
    let result = stmt::lower_block(ctx, body);
    ctx.leave();
    ctx.leave_closure();
    ctx.pop_exit();
    result
}

pub fn lower_try_catch(
    ctx: &mut LowerContext<'_>,
    try_body: &[Statement],
    catch_body: &[Statement],
) -> LowerResult<()> {
    let outer = ctx.exit_scope();
    let before = ctx.tx;

    let flag = if outer != ExitScope::Catch
        && any_stmt(try_body, Skip::NestedCatch, &|s| matches!(s, Statement::Return(_)))
    {
        let n = ctx.fresh("returned");
        let name = if n == "returned1" { "returned".to_string() } else { n };
        ctx.out.line(format!("var {} bool", name));
        Some(name)
    } else {
        None
    };

    ctx.open_block("func() {");
    ctx.open_block("defer func() {");
    ctx.open_block("if r := recover(); r != nil {");
    if any_stmt(catch_body, Skip::NestedCatch, &reads_caught) {
        ctx.import("fmt");
        ctx.out.line("caught, ok := r.(error)");
        ctx.open_block("if !ok {");
        ctx.out.line("caught = fmt.Errorf(\"%v\", r)");
        ctx.close_block("}");
    }
    if ctx.scan.needs_err {
        ctx.out.line("err = nil");
    }
    // The handler runs after any part of TRY may have executed.
    ctx.tx = if any_stmt(try_body, Skip::NestedCatch, &is_transaction) {
        TransactionState {
            active: false,
            uncertain: true,
        }
    } else {
        before
    };
    run_scoped(ctx, ExitScope::Catch, 1, catch_body)?;
    let after_catch = ctx.tx;
    ctx.close_block("}");
    ctx.close_block("}()");

    ctx.tx = before;
    ctx.return_flags.push(flag.clone());
    let result = run_scoped(ctx, ExitScope::Try, 0, try_body);
    ctx.return_flags.pop();
    result?;
    ctx.close_block("}()");
    ctx.tx = ctx.tx.join(after_catch);

    if let Some(flag) = flag {
        ctx.open_block(format!("if {} {{", flag));
        match outer {
            ExitScope::Body => ctx.emit_return("returnCode", "nil"),
            _ => propagate_return(ctx),
        }
        ctx.close_block("}");
    }
    if ctx.scan.needs_err && any_stmt(catch_body, Skip::NestedTry, &raises) {
        ctx.open_block("if err != nil {");
        if outer == ExitScope::Catch {
            ctx.out.line("return");
        } else {
            ctx.emit_error_exit("err");
        }
        ctx.close_block("}");
    }
    Ok(())
}

/// RETURN from inside a TRY closure: set the enclosing flag and leave.
fn propagate_return(ctx: &mut LowerContext<'_>) {
    match ctx.return_flags.last().cloned().flatten() {
        Some(flag) => ctx.out.line(format!("{} = true", flag)),
        None => ctx.warn(
            WarningKind::Approximation,
            "RETURN inside TRY only leaves the TRY block here",
        ),
    }
    ctx.out.line("return");
}

/// RETURN, routed by exit scope. `status` is the lowered return value.
pub fn lower_return(ctx: &mut LowerContext<'_>, status: Option<String>) {
    match ctx.exit_scope() {
        ExitScope::Body => {
            let status = status.unwrap_or_else(|| "0".to_string());
            ctx.emit_return(&status, "nil");
        }
        ExitScope::Try => {
            if let Some(status) = status {
                ctx.out.line(format!("returnCode = {}", status));
            }
            propagate_return(ctx);
        }
        ExitScope::Catch => {
            ctx.warn(
                WarningKind::Approximation,
                "RETURN inside CATCH cannot leave the procedure; execution continues after the handler",
            );
            let note = format!("{}: RETURN inside CATCH ignored", ctx.func_name);
            if ctx.config.log_hook {
                ctx.import("log/slog");
                ctx.out.line(format!("slog.WarnContext(ctx, {})", go_string_literal(&note)));
            } else {
                ctx.import("log");
                ctx.out.line(format!("log.Print({})", go_string_literal(&note)));
            }
        }
    }
}

/// Raise `error` through the exit semantics of the current scope.
fn raise(ctx: &mut LowerContext<'_>, error: &str) {
    match ctx.exit_scope() {
        ExitScope::Body => ctx.emit_return("returnCode", error),
        ExitScope::Try => ctx.out.line(format!("panic({})", error)),
        ExitScope::Catch => {
            ctx.out.line(format!("err = {}", error));
            ctx.out.line("return");
        }
    }
}

pub fn lower_throw(ctx: &mut LowerContext<'_>, args: Option<&ThrowArgs>) -> LowerResult<()> {
    let Some(args) = args else {
        if !ctx.in_catch() {
            return Err(LowerError::unsupported("THROW", "bare THROW outside of a CATCH block"));
        }
        raise(ctx, "caught");
        return Ok(());
    };
    let number = expr::lower_value(ctx, &args.number, GoType::Int32)?;
    let message = expr::lower_value(ctx, &args.message, GoType::String)?;
    ctx.import("fmt");
    raise(ctx, &format!("fmt.Errorf(\"%d: %s\", {}, {})", number, message));
    Ok(())
}

pub fn lower_raiserror(ctx: &mut LowerContext<'_>, message: &Expr, severity: &Expr) -> LowerResult<()> {
    let message = expr::lower_value(ctx, message, GoType::String)?;
    if is_informational(severity) {
        stmt::emit_print(ctx, &message);
        return Ok(());
    }
    ctx.import("errors");
    raise(ctx, &format!("errors.New({})", message));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;

    #[test]
    fn test_error_intrinsics() {
        assert_eq!(
            error_intrinsic(true, "usp_X", "error_message"),
            Some(("caught.Error()".to_string(), ValueKind::Typed(GoType::String)))
        );
        assert_eq!(
            error_intrinsic(true, "usp_X", "ERROR_NUMBER"),
            Some(("50000".to_string(), ValueKind::IntLit(50000)))
        );
        assert_eq!(
            error_intrinsic(false, "usp_X", "ERROR_SEVERITY"),
            Some(("0".to_string(), ValueKind::IntLit(0)))
        );
        assert_eq!(
            error_intrinsic(true, "usp_X", "ERROR_PROCEDURE").map(|(c, _)| c),
            Some("\"usp_X\"".to_string())
        );
        assert_eq!(error_intrinsic(true, "usp_X", "GETDATE"), None);
    }

    #[test]
    fn test_nested_search_skips() {
        let body = vec![try_catch([ret()], [rethrow()])];
        let is_return = |s: &Statement| matches!(s, Statement::Return(_));
        assert!(any_stmt(&body, Skip::NestedCatch, &is_return));
        assert!(!any_stmt(&body, Skip::NestedTry, &is_return));
        assert!(any_stmt(&body, Skip::NestedTry, &raises));
        assert!(!any_stmt(&body, Skip::NestedCatch, &raises));
    }

    #[test]
    fn test_reads_caught() {
        assert!(reads_caught(&rethrow()));
        assert!(reads_caught(&print(func("ERROR_MESSAGE", []))));
        assert!(!reads_caught(&print(func("ERROR_NUMBER", []))));
    }
}
