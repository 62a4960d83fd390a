//! Statement lowering.
//!
//! One handler per statement kind. Statement paths are the index of the
//! statement in its list, prefixed by the path of the enclosing statement
//! and the branch it sits in (`0` for THEN/loop/TRY bodies, `1` for ELSE
//! and CATCH).

use crate::ast::{Expr, Fetch, GlobalVar, Select, SelectItem, Statement, VarDecl};
use crate::error::{LowerError, LowerResult};
use crate::symbols::SymbolKind;
use crate::types::{classify, GoType};

use super::context::LowerContext;
use super::expr::{self, needs_hoist};
use super::{cursor, dispatch, exception, transaction};

/// Lower a statement list in order.
pub fn lower_block(ctx: &mut LowerContext<'_>, stmts: &[Statement]) -> LowerResult<()> {
    let mut pending: Option<&Fetch> = None;
    for (i, stmt) in stmts.iter().enumerate() {
        ctx.enter(i);
        let result = lower_statement(ctx, stmt, &stmts[i + 1..], &mut pending)
            .map_err(|e| ctx.locate(e));
        ctx.leave();
        result?;
    }
    Ok(())
}

fn branch(ctx: &mut LowerContext<'_>, index: usize, stmts: &[Statement]) -> LowerResult<()> {
    ctx.enter(index);
    let result = lower_block(ctx, stmts);
    ctx.leave();
    result
}

fn is_sentinel_loop(stmt: &Statement) -> bool {
    matches!(stmt, Statement::While { condition, .. } if cursor::split_sentinel(condition).is_some())
}

/// Whether `stmt` (at any depth) uses the cursor or reads `@@FETCH_STATUS`.
fn touches_cursor(stmt: &Statement, cursor: &str) -> bool {
    let mut hit = false;
    stmt.visit(&mut |s| {
        let named = match s {
            Statement::Open(n) | Statement::Close(n) | Statement::Deallocate(n) => Some(n),
            Statement::Fetch(f) => Some(&f.cursor),
            _ => None,
        };
        if named.is_some_and(|n| n.eq_ignore_ascii_case(cursor)) {
            hit = true;
        }
        s.walk_own_exprs(&mut |e| {
            if matches!(e, Expr::Global(GlobalVar::FetchStatus)) {
                hit = true;
            }
        });
    });
    hit
}

/// Whether `stmt` (at any depth) reads or assigns one of `vars`.
fn touches_vars(stmt: &Statement, vars: &[String]) -> bool {
    let is_target = |name: &str| vars.iter().any(|v| v.eq_ignore_ascii_case(name));
    let mut hit = false;
    stmt.visit(&mut |s| {
        match s {
            Statement::Set { variable, .. } if is_target(variable) => hit = true,
            Statement::Select(select)
                if select.assigned_variables().into_iter().any(|v| is_target(v)) =>
            {
                hit = true
            }
            _ => {}
        }
        s.walk_own_exprs(&mut |e| {
            if matches!(e, Expr::Variable(v) if is_target(v)) {
                hit = true;
            }
        });
    });
    hit
}

/// Whether a FETCH is the priming fetch of a later `WHILE @@FETCH_STATUS = 0`
/// in the same list. Statements in between may not use the cursor; if they
/// use the fetched variables the row would be seen out of order, which is
/// rejected.
fn primes_loop(fetch: &Fetch, rest: &[Statement]) -> LowerResult<bool> {
    let mut reads_row = false;
    for stmt in rest {
        if is_sentinel_loop(stmt) {
            if reads_row {
                return Err(LowerError::cursor(
                    &fetch.cursor,
                    "statements between the priming FETCH and its loop use the fetched variables",
                ));
            }
            return Ok(true);
        }
        if touches_cursor(stmt, &fetch.cursor) {
            return Ok(false);
        }
        reads_row |= touches_vars(stmt, &fetch.into);
    }
    Ok(false)
}

fn lower_statement<'s>(
    ctx: &mut LowerContext<'_>,
    stmt: &'s Statement,
    rest: &'s [Statement],
    pending: &mut Option<&'s Fetch>,
) -> LowerResult<()> {
    tracing::trace!("{} {}", ctx.path(), stmt.kind_name());
    match stmt {
        Statement::Declare(vars) => {
            for var in vars {
                lower_declare(ctx, var)?;
            }
            Ok(())
        }
        Statement::DeclareCursor { name, query } => cursor::declare(ctx, name, query),
        Statement::Set { variable, value } => lower_set(ctx, variable, value),
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => lower_if(ctx, condition, then_branch, else_branch.as_deref(), false),
        Statement::While { condition, body } => match cursor::split_sentinel(condition) {
            Some(rest) => {
                let fetch = pending
                    .take()
                    .or_else(|| cursor::first_fetch(body))
                    .ok_or_else(|| {
                        LowerError::unsupported(
                            "WHILE @@FETCH_STATUS",
                            "no FETCH names the cursor being iterated",
                        )
                    })?;
                ctx.enter(0);
                let result = cursor::lower_loop(ctx, fetch, rest.as_ref(), body);
                ctx.leave();
                result
            }
            None => lower_while(ctx, condition, body),
        },
        Statement::Block(body) => lower_block(ctx, body),
        Statement::Return(value) => {
            let status = match value {
                Some(v) => Some(expr::lower_value(ctx, v, GoType::Int32)?),
                None => None,
            };
            exception::lower_return(ctx, status);
            Ok(())
        }
        Statement::Print(value) => {
            let message = expr::lower_value(ctx, value, GoType::String)?;
            emit_print(ctx, &message);
            Ok(())
        }
        Statement::Break => {
            ctx.check_jump("BREAK")?;
            ctx.out.line("break");
            Ok(())
        }
        Statement::Continue => {
            ctx.check_jump("CONTINUE")?;
            ctx.out.line("continue");
            Ok(())
        }
        Statement::Select(select) => dispatch::lower_select(ctx, select),
        Statement::Insert(insert) => dispatch::lower_insert(ctx, insert),
        Statement::Update(update) => dispatch::lower_update(ctx, update),
        Statement::Delete(delete) => dispatch::lower_delete(ctx, delete),
        Statement::Exec(exec) => dispatch::lower_exec(ctx, exec),
        Statement::ExecDynamic(_) => Err(LowerError::unsupported(
            "dynamic SQL",
            "EXEC of a runtime string has no static lowering",
        )),
        Statement::Open(name) => cursor::open(ctx, name),
        Statement::Fetch(fetch) => {
            if primes_loop(fetch, rest)? {
                // Performed by the advance loop that follows.
                *pending = Some(fetch);
                return Ok(());
            }
            cursor::fetch(ctx, fetch)
        }
        Statement::Close(name) => cursor::close(ctx, name),
        Statement::Deallocate(name) => cursor::deallocate(ctx, name),
        Statement::BeginTransaction(name) => transaction::begin(ctx, name.as_deref()),
        Statement::CommitTransaction(_) => transaction::commit(ctx),
        Statement::RollbackTransaction(_) => transaction::rollback(ctx),
        Statement::SaveTransaction(name) => transaction::save(ctx, name),
        Statement::TryCatch {
            try_body,
            catch_body,
        } => exception::lower_try_catch(ctx, try_body, catch_body),
        Statement::Raiserror {
            message, severity, ..
        } => exception::lower_raiserror(ctx, message, severity),
        Statement::Throw(args) => exception::lower_throw(ctx, args.as_ref()),
    }
}

fn lower_declare(ctx: &mut LowerContext<'_>, var: &VarDecl) -> LowerResult<()> {
    // Declared at function entry; only the initializer runs here.
    if ctx.scan.is_hoisted(&var.name) {
        if let Some(init) = &var.init {
            let symbol = ctx.symbols.lookup(&var.name)?;
            let (go_name, ty) = (symbol.go_name.clone(), symbol.ty.go);
            let value = expr::lower_value(ctx, init, ty)?;
            ctx.out.line(format!("{} = {}", go_name, value));
        }
        return Ok(());
    }

    let ty = classify(&var.data_type)?.go;
    let value = match &var.init {
        Some(init) => Some(expr::lower_value(ctx, init, ty)?),
        None => None,
    };
    let go_name = ctx
        .symbols
        .declare(&var.name, &var.data_type, SymbolKind::Local)?
        .go_name
        .clone();
    ctx.import_type(ty);
    match value {
        Some(value) => ctx.out.line(format!("var {} {} = {}", go_name, ty, value)),
        None => ctx.out.line(format!("var {} {}", go_name, ty)),
    }
    if !ctx.scan.is_read(&var.name) {
        ctx.out.line(format!("_ = {}", go_name));
    }
    Ok(())
}

fn lower_set(ctx: &mut LowerContext<'_>, variable: &str, value: &Expr) -> LowerResult<()> {
    // `SET @x = (SELECT col FROM t …)` is a single-row assignment query.
    if let Expr::Subquery(query) = value {
        if query.from.is_some() && query.items.len() == 1 {
            let assign = Select {
                items: vec![SelectItem {
                    expr: query.items[0].expr.clone(),
                    alias: None,
                    assign_to: Some(variable.to_string()),
                }],
                ..(**query).clone()
            };
            ctx.symbols.lookup(variable)?;
            return dispatch::lower_select(ctx, &assign);
        }
    }
    let symbol = ctx.symbols.lookup(variable)?;
    let (go_name, ty) = (symbol.go_name.clone(), symbol.ty.go);
    let value = expr::lower_value(ctx, value, ty)?;
    ctx.out.line(format!("{} = {}", go_name, value));
    Ok(())
}

/// IF / ELSE IF / ELSE as one Go chain. An ELSE IF whose condition needs
/// statements ahead of it nests inside `else { … }` instead.
fn lower_if(
    ctx: &mut LowerContext<'_>,
    condition: &Expr,
    then_branch: &[Statement],
    else_branch: Option<&[Statement]>,
    chained: bool,
) -> LowerResult<()> {
    let cond = expr::lower_condition(ctx, condition)?;
    if chained {
        ctx.reopen_block(format!("}} else if {} {{", cond));
    } else {
        ctx.open_block(format!("if {} {{", cond));
    }
    branch(ctx, 0, then_branch)?;

    match else_branch {
        None => ctx.close_block("}"),
        Some(
            [Statement::If {
                condition,
                then_branch,
                else_branch,
            }],
        ) if !needs_hoist(condition) => {
            ctx.enter(1);
            ctx.enter(0);
            let result = lower_if(ctx, condition, then_branch, else_branch.as_deref(), true)
                .map_err(|e| ctx.locate(e));
            ctx.leave();
            ctx.leave();
            result?;
        }
        Some(stmts) => {
            ctx.reopen_block("} else {");
            branch(ctx, 1, stmts)?;
            ctx.close_block("}");
        }
    }
    Ok(())
}

fn lower_while(ctx: &mut LowerContext<'_>, condition: &Expr, body: &[Statement]) -> LowerResult<()> {
    if needs_hoist(condition) {
        // The condition's queries run at the top of every iteration.
        ctx.open_block("for {");
        ctx.enter_loop();
        let result = (|| {
            let cond = expr::lower_condition(ctx, condition)?;
            ctx.open_block(format!("if !({}) {{", cond));
            ctx.out.line("break");
            ctx.close_block("}");
            branch(ctx, 0, body)
        })();
        ctx.leave_loop();
        ctx.close_block("}");
        return result;
    }

    let cond = expr::lower_condition(ctx, condition)?;
    ctx.open_block(format!("for {} {{", cond));
    ctx.enter_loop();
    let result = branch(ctx, 0, body);
    ctx.leave_loop();
    ctx.close_block("}");
    result
}

/// PRINT: `slog.InfoContext` with the logging hook, `log.Println` without.
pub fn emit_print(ctx: &mut LowerContext<'_>, message: &str) {
    if ctx.config.log_hook {
        ctx.import("log/slog");
        ctx.out.line(format!("slog.InfoContext(ctx, {})", message));
    } else {
        ctx.import("log");
        ctx.out.line(format!("log.Println({})", message));
    }
}
