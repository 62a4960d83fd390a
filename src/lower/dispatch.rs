//! DML backend dispatch.
//!
//! Picks the backend per statement and emits the direct-SQL form; the
//! RPC and mock forms live in [`super::rpc`].

use crate::ast::{Delete, Exec, Expr, Insert, Select, TableRef, Update};
use crate::config::{BackendKind, LowerConfig};
use crate::diagnostics::WarningKind;
use crate::error::{LowerError, LowerResult};
use crate::transpiler::dml::{
    delete::build_delete, insert::build_insert, select::build_select, update::build_update,
};
use crate::transpiler::{build_exec, build_exists_probe, is_single_row, RenderedQuery};
use crate::types::GoType;

use super::context::LowerContext;
use super::expr::{self, GoExpr, ATOM};
use super::rpc;

/// Effective backend for a statement on `table`, and whether the table
/// forced the fallback.
pub fn resolve_backend(config: &LowerConfig, table: Option<&TableRef>) -> (BackendKind, bool) {
    match table {
        Some(t) if t.is_transient() => (
            config.fallback_backend,
            config.fallback_backend != config.backend,
        ),
        _ => (config.backend, false),
    }
}

pub fn backend_for(ctx: &mut LowerContext<'_>, table: &TableRef) -> BackendKind {
    let (backend, forced) = resolve_backend(ctx.config, Some(table));
    if forced {
        ctx.warn(
            WarningKind::FallbackBackend,
            format!("temporary table forced to fallback backend: {}", table.name),
        );
    }
    backend
}

/// `if err = <call>.Scan(&a, &b); errors.Is(err, sql.ErrNoRows) { … }`
///
/// A missing row leaves the targets unchanged and is not an error.
fn emit_row_scan(
    ctx: &mut LowerContext<'_>,
    call: &str,
    targets: &[String],
    track_rows: bool,
) {
    ctx.import("errors");
    ctx.import("database/sql");
    let dests = targets
        .iter()
        .map(|t| format!("&{}", t))
        .collect::<Vec<_>>()
        .join(", ");
    ctx.open_block(format!(
        "if err = {}.Scan({}); errors.Is(err, sql.ErrNoRows) {{",
        call, dests
    ));
    ctx.out.line("err = nil");
    if track_rows {
        ctx.out.line("rowCount = 0");
    }
    ctx.reopen_block("} else if err != nil {");
    ctx.emit_error_exit("err");
    if track_rows {
        ctx.reopen_block("} else {");
        ctx.out.line("rowCount = 1");
    }
    ctx.close_block("}");
}

/// Single-row query scanned into Go variables.
pub fn scan_into(
    ctx: &mut LowerContext<'_>,
    handle: &str,
    query: &RenderedQuery,
    targets: &[String],
    track_rows: bool,
) {
    let call = format!("{}.QueryRowContext(ctx, {})", handle, query.call_args());
    emit_row_scan(ctx, &call, targets, track_rows);
}

/// `ExecContext`, keeping the result when row count or identity is read.
fn exec_statement(ctx: &mut LowerContext<'_>, query: &RenderedQuery, identity: bool) -> LowerResult<()> {
    let handle = ctx.sql_handle();
    let call = format!("{}.ExecContext(ctx, {})", handle, query.call_args());
    let rows = ctx.scan.tracks_rowcount;
    let identity = identity && ctx.scan.tracks_identity;
    if !rows && !identity {
        ctx.emit_guarded(&format!("_, err = {}", call));
        return Ok(());
    }
    ctx.import("database/sql");
    let res = ctx.local_name("res");
    let op = ctx.bind_local(&res, "sql.Result");
    ctx.out.line(format!("{}, err {} {}", res, op, call));
    ctx.emit_checked(|ctx| {
        if rows {
            ctx.out.line(format!("rowCount, _ = {}.RowsAffected()", res));
        }
        if identity {
            ctx.out.line(format!("lastInsertID, _ = {}.LastInsertId()", res));
        }
        Ok(())
    })
}

pub fn lower_select(ctx: &mut LowerContext<'_>, select: &Select) -> LowerResult<()> {
    let Some(table) = &select.from else {
        return lower_values(ctx, select);
    };
    match backend_for(ctx, table) {
        BackendKind::Sql => {}
        backend => return rpc::lower_select(ctx, select, backend),
    }
    let query = ctx.render(|g, r| build_select(select, g, r))?;
    let handle = ctx.sql_handle();

    if select.assigns_variables() {
        if select.items.iter().any(|i| i.assign_to.is_none()) {
            return Err(LowerError::unsupported(
                "SELECT",
                "variable assignment mixed with result columns",
            ));
        }
        let mut targets = Vec::new();
        for var in select.assigned_variables() {
            targets.push(ctx.symbols.lookup(var)?.go_name.clone());
        }
        let track = ctx.scan.tracks_rowcount;
        scan_into(ctx, handle, &query, &targets, track);
        return Ok(());
    }

    let rt = ctx.runtime();
    let sink = if is_single_row(select) { "EmitRow" } else { "EmitRows" };
    let count = if ctx.scan.tracks_rowcount { "rowCount" } else { "_" };
    ctx.emit_guarded(&format!(
        "{}, err = {}.{}(ctx, {}, {})",
        count,
        rt,
        sink,
        handle,
        query.call_args()
    ));
    Ok(())
}

/// SELECT without FROM: Go-side assignments or a literal result row.
fn lower_values(ctx: &mut LowerContext<'_>, select: &Select) -> LowerResult<()> {
    if select.assigns_variables() {
        for item in &select.items {
            let Some(target) = &item.assign_to else {
                return Err(LowerError::unsupported(
                    "SELECT",
                    "variable assignment mixed with result columns",
                ));
            };
            let symbol = ctx.symbols.lookup(target)?;
            let (go_name, ty) = (symbol.go_name.clone(), symbol.ty.go);
            let value = expr::lower_value(ctx, &item.expr, ty)?;
            ctx.out.line(format!("{} = {}", go_name, value));
        }
        if ctx.scan.tracks_rowcount {
            ctx.out.line("rowCount = 1");
        }
        return Ok(());
    }
    let mut values = Vec::with_capacity(select.items.len());
    for item in &select.items {
        let value = expr::lower_expr(ctx, &item.expr, None)?;
        let value = match value.go_type() {
            Some(_) => value,
            None => {
                let ty = match value.kind {
                    expr::ValueKind::DecLit(_) => GoType::Decimal,
                    expr::ValueKind::Null => {
                        values.push("nil".to_string());
                        continue;
                    }
                    _ => GoType::Int32,
                };
                expr::coerce(ctx, value, ty)?
            }
        };
        values.push(value.code);
    }
    let rt = ctx.runtime();
    ctx.out.line(format!("{}.EmitValues(ctx, {})", rt, values.join(", ")));
    if ctx.scan.tracks_rowcount {
        ctx.out.line("rowCount = 1");
    }
    Ok(())
}

pub fn lower_insert(ctx: &mut LowerContext<'_>, insert: &Insert) -> LowerResult<()> {
    match backend_for(ctx, &insert.table) {
        BackendKind::Sql => {
            let query = ctx.render(|g, r| build_insert(insert, g, r))?;
            exec_statement(ctx, &query, true)
        }
        backend => rpc::lower_insert(ctx, insert, backend),
    }
}

pub fn lower_update(ctx: &mut LowerContext<'_>, update: &Update) -> LowerResult<()> {
    match backend_for(ctx, &update.table) {
        BackendKind::Sql => {
            let query = ctx.render(|g, r| build_update(update, g, r))?;
            exec_statement(ctx, &query, false)
        }
        backend => rpc::lower_update(ctx, update, backend),
    }
}

pub fn lower_delete(ctx: &mut LowerContext<'_>, delete: &Delete) -> LowerResult<()> {
    match backend_for(ctx, &delete.table) {
        BackendKind::Sql => {
            let query = ctx.render(|g, r| build_delete(delete, g, r))?;
            exec_statement(ctx, &query, false)
        }
        backend => rpc::lower_delete(ctx, delete, backend),
    }
}

/// EXEC on the primary backend. Over SQL, OUTPUT arguments come back as the
/// single result row.
pub fn lower_exec(ctx: &mut LowerContext<'_>, exec: &Exec) -> LowerResult<()> {
    let backend = ctx.config.backend;
    if backend != BackendKind::Sql {
        return rpc::lower_exec(ctx, exec, backend);
    }
    let query = ctx.render(|g, r| build_exec(exec, g, r))?;
    let mut outputs = Vec::new();
    for arg in exec.args.iter().filter(|a| a.output) {
        let Expr::Variable(var) = &arg.value else {
            return Err(LowerError::unsupported("EXEC", "OUTPUT argument must be a variable"));
        };
        outputs.push(ctx.symbols.lookup(var)?.go_name.clone());
    }

    if outputs.is_empty() {
        exec_statement(ctx, &query, false)?;
    } else {
        let handle = ctx.sql_handle();
        scan_into(ctx, handle, &query, &outputs, false);
    }

    if let Some(status) = &exec.return_status {
        let symbol = ctx.symbols.lookup(status)?;
        let line = format!("{} = {}", symbol.go_name, symbol.ty.go.zero_value());
        ctx.warn(
            WarningKind::Approximation,
            format!(
                "return status of {} is not reported by database/sql; {} is set to its zero value",
                exec.base_name(),
                status
            ),
        );
        ctx.out.line(line);
    }
    Ok(())
}

/// Evaluate `EXISTS (…)` ahead of the statement that uses it.
pub fn hoist_exists(ctx: &mut LowerContext<'_>, select: &Select) -> LowerResult<GoExpr> {
    let Some(table) = &select.from else {
        // A FROM-less SELECT always yields its row.
        return Ok(GoExpr::typed("true", GoType::Bool, ATOM));
    };
    let name = ctx.fresh("exists");
    ctx.out.line(format!("var {} bool", name));
    match backend_for(ctx, table) {
        BackendKind::Sql => {
            let query = ctx.render(|g, r| build_exists_probe(select, g, r))?;
            let handle = ctx.sql_handle();
            ctx.emit_guarded(&format!(
                "err = {}.QueryRowContext(ctx, {}).Scan(&{})",
                handle,
                query.call_args(),
                name
            ));
        }
        backend => rpc::lower_exists(ctx, select, backend, &name)?,
    }
    Ok(GoExpr::typed(name, GoType::Bool, ATOM))
}

/// Scalar subquery result type: COUNT is known, anything else takes the
/// type of the value it flows into.
fn scalar_type(select: &Select, hint: Option<GoType>) -> Option<GoType> {
    if let [item] = select.items.as_slice() {
        if let Expr::Function { name, .. } = &item.expr {
            if name.eq_ignore_ascii_case("COUNT") {
                return Some(GoType::Int32);
            }
            if name.eq_ignore_ascii_case("COUNT_BIG") {
                return Some(GoType::Int64);
            }
        }
    }
    hint
}

/// Evaluate `(SELECT …)` ahead of the statement that uses it.
pub fn hoist_scalar(ctx: &mut LowerContext<'_>, select: &Select, hint: Option<GoType>) -> LowerResult<GoExpr> {
    if select.items.len() != 1 {
        return Err(LowerError::unsupported(
            "scalar subquery",
            "must select exactly one column",
        ));
    }
    let Some(table) = &select.from else {
        return expr::lower_expr(ctx, &select.items[0].expr, hint);
    };
    let backend = backend_for(ctx, table);
    if backend != BackendKind::Sql {
        return Err(LowerError::unsupported(
            "scalar subquery",
            format!("not expressible on the {} backend", backend),
        ));
    }
    let ty = scalar_type(select, hint).ok_or_else(|| {
        LowerError::unsupported("scalar subquery", "result type cannot be inferred")
    })?;
    ctx.import_type(ty);
    let name = ctx.fresh("scalar");
    ctx.out.line(format!("var {} {}", name, ty));
    let query = ctx.render(|g, r| build_select(select, g, r))?;
    let handle = ctx.sql_handle();
    scan_into(ctx, handle, &query, std::slice::from_ref(&name), false);
    Ok(GoExpr::typed(name, ty, ATOM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_tables_use_fallback() {
        let config = LowerConfig::builder()
            .backend(BackendKind::Rpc)
            .fallback(BackendKind::Mock)
            .build();
        assert_eq!(
            resolve_backend(&config, Some(&TableRef::new("#staging"))),
            (BackendKind::Mock, true)
        );
        assert_eq!(
            resolve_backend(&config, Some(&TableRef::new("@pending"))),
            (BackendKind::Mock, true)
        );
        assert_eq!(
            resolve_backend(&config, Some(&TableRef::new("Orders"))),
            (BackendKind::Rpc, false)
        );
    }

    #[test]
    fn test_fallback_equal_to_primary_is_not_forced() {
        let config = LowerConfig::default();
        assert_eq!(
            resolve_backend(&config, Some(&TableRef::new("#t"))),
            (BackendKind::Sql, false)
        );
        assert_eq!(resolve_backend(&config, None), (BackendKind::Sql, false));
    }

    #[test]
    fn test_scalar_type() {
        use crate::ast::builders::*;
        let count = select([func("COUNT", [star()])]).from("Orders");
        assert_eq!(scalar_type(&count, None), Some(GoType::Int32));
        let total = select([col("Total")]).from("Orders");
        assert_eq!(scalar_type(&total, None), None);
        assert_eq!(scalar_type(&total, Some(GoType::Decimal)), Some(GoType::Decimal));
    }
}
