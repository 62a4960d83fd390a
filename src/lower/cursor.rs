//! Cursor-to-iteration transform.
//!
//! A cursor becomes a row iterator (`*sql.Rows` or the mock store's
//! `*Rows`). DECLARE only records the query; OPEN starts the stream and
//! defers its release; the `WHILE @@FETCH_STATUS = 0` idiom becomes a single
//! `for it.Next()` loop.

use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, Fetch, FetchDirection, GlobalVar, Literal, Select, Statement};
use crate::config::BackendKind;
use crate::error::{LowerError, LowerResult};
use crate::naming;
use crate::transpiler::dml::select::build_select;

use super::context::LowerContext;
use super::{dispatch, expr, rpc, stmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Declared,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Cursor {
    pub name: String,
    pub query: Select,
    /// Go iterator variable (`ordersRows`).
    pub iterator: String,
    pub state: CursorState,
    pub backend: BackendKind,
}

/// Cursors of one procedure, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct CursorTable {
    cursors: HashMap<String, Cursor>,
    /// Cursors whose advance loop is being emitted, innermost last.
    looping: Vec<String>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl CursorTable {
    pub fn get(&self, name: &str) -> LowerResult<&Cursor> {
        self.cursors
            .get(&key(name))
            .ok_or_else(|| LowerError::cursor(name, "not declared (or already deallocated)"))
    }

    fn get_mut(&mut self, name: &str) -> LowerResult<&mut Cursor> {
        self.cursors
            .get_mut(&key(name))
            .ok_or_else(|| LowerError::cursor(name, "not declared (or already deallocated)"))
    }

    /// Whether FETCHes on `name` are performed by an enclosing loop.
    pub fn is_looping(&self, name: &str) -> bool {
        let k = key(name);
        self.looping.iter().any(|c| *c == k)
    }
}

fn iterator_name(ctx: &LowerContext<'_>, cursor: &str) -> String {
    ctx.local_name(&format!("{}Rows", naming::to_camel_case(cursor)))
}

fn iterator_type(ctx: &mut LowerContext<'_>, backend: BackendKind) -> String {
    match backend {
        BackendKind::Mock => format!("*{}.Rows", ctx.mock_package()),
        _ => {
            ctx.import("database/sql");
            "*sql.Rows".to_string()
        }
    }
}

/// Declare at function depth the iterators of cursors opened inside a Go
/// block, so code after that block still sees them. Iterators opened inside
/// a TRY/CATCH closure are released when the function returns, not when the
/// closure does.
pub fn hoist_iterators(ctx: &mut LowerContext<'_>) {
    let procedure = ctx.procedure;
    let mut hoisted = Vec::new();
    procedure.visit(&mut |s| {
        if let Statement::DeclareCursor { name, query } = s {
            if ctx.scan.hoists_cursor(name) {
                hoisted.push((name.as_str(), query));
            }
        }
    });
    for (name, query) in hoisted {
        let Some(table) = &query.from else { continue };
        let (backend, _) = dispatch::resolve_backend(ctx.config, Some(table));
        if backend == BackendKind::Rpc {
            // Rejected when the DECLARE is lowered.
            continue;
        }
        let it = iterator_name(ctx, name);
        let ty = iterator_type(ctx, backend);
        ctx.names.bind(&it);
        ctx.out.line(format!("var {} {}", it, ty));
        if ctx.scan.releases_cursor_at_entry(name) {
            ctx.open_block("defer func() {");
            ctx.open_block(format!("if {} != nil {{", it));
            ctx.out.line(format!("_ = {}.Close()", it));
            ctx.close_block("}");
            ctx.close_block("}()");
        }
    }
}

pub fn declare(ctx: &mut LowerContext<'_>, name: &str, query: &Select) -> LowerResult<()> {
    if ctx.cursors.cursors.contains_key(&key(name)) {
        return Err(LowerError::cursor(name, "already declared"));
    }
    let backend = match &query.from {
        Some(table) => dispatch::backend_for(ctx, table),
        None => return Err(LowerError::cursor(name, "cursor query has no FROM clause")),
    };
    if backend == BackendKind::Rpc {
        return Err(LowerError::cursor(
            name,
            "the rpc backend has no row iterator; route the table to sql or mock",
        ));
    }
    let iterator = iterator_name(ctx, name);
    tracing::debug!("cursor {} -> {} ({})", name, iterator, backend);
    ctx.cursors.cursors.insert(
        key(name),
        Cursor {
            name: name.to_string(),
            query: query.clone(),
            iterator,
            state: CursorState::Declared,
            backend,
        },
    );
    Ok(())
}

pub fn open(ctx: &mut LowerContext<'_>, name: &str) -> LowerResult<()> {
    let cursor = ctx.cursors.get(name)?.clone();
    if cursor.state == CursorState::Open {
        return Err(LowerError::cursor(name, "OPEN of a cursor that is already open"));
    }
    let it = cursor.iterator.as_str();
    let call = match cursor.backend {
        BackendKind::Mock => rpc::cursor_call(ctx, &cursor.query)?,
        _ => {
            let query = ctx.render(|g, r| build_select(&cursor.query, g, r))?;
            format!("{}.QueryContext(ctx, {})", ctx.sql_handle(), query.call_args())
        }
    };
    let ty = iterator_type(ctx, cursor.backend);
    let op = ctx.bind_local(it, &ty);
    ctx.out.line(format!("{}, err {} {}", it, op, call));
    if ctx.scan.releases_cursor_at_entry(name) {
        ctx.open_block("if err != nil {");
        ctx.emit_error_exit("err");
        ctx.close_block("}");
    } else {
        ctx.emit_checked(|ctx| {
            ctx.out.line(format!("defer {}.Close()", it));
            Ok(())
        })?;
    }
    ctx.cursors.get_mut(name)?.state = CursorState::Open;
    Ok(())
}

fn check_fetch(ctx: &LowerContext<'_>, fetch: &Fetch) -> LowerResult<String> {
    if fetch.direction != FetchDirection::Next {
        return Err(LowerError::unsupported(
            format!("FETCH {}", fetch.direction.keyword()),
            "only FETCH NEXT has a static lowering",
        ));
    }
    let cursor = ctx.cursors.get(&fetch.cursor)?;
    if cursor.state != CursorState::Open {
        return Err(LowerError::cursor(&fetch.cursor, "FETCH on a cursor that is not open"));
    }
    Ok(cursor.iterator.clone())
}

fn scan_targets(ctx: &LowerContext<'_>, fetch: &Fetch) -> LowerResult<String> {
    let mut dests = Vec::with_capacity(fetch.into.len());
    for target in &fetch.into {
        dests.push(format!("&{}", ctx.symbols.lookup(target)?.go_name));
    }
    Ok(dests.join(", "))
}

/// FETCH NEXT outside an advance loop: one guarded step.
pub fn fetch(ctx: &mut LowerContext<'_>, fetch: &Fetch) -> LowerResult<()> {
    let it = check_fetch(ctx, fetch)?;
    if ctx.cursors.is_looping(&fetch.cursor) {
        // The enclosing loop advances the iterator.
        return Ok(());
    }
    let dests = scan_targets(ctx, fetch)?;
    ctx.open_block(format!("if {}.Next() {{", it));
    ctx.emit_guarded(&format!("err = {}.Scan({})", it, dests));
    ctx.close_block("}");
    Ok(())
}

pub fn close(ctx: &mut LowerContext<'_>, name: &str) -> LowerResult<()> {
    let cursor = ctx.cursors.get_mut(name)?;
    match cursor.state {
        CursorState::Open => {
            cursor.state = CursorState::Closed;
            Ok(())
        }
        CursorState::Closed => Err(LowerError::cursor(name, "CLOSE of a cursor that is already closed")),
        CursorState::Declared => Err(LowerError::cursor(name, "CLOSE of a cursor that was never opened")),
    }
}

pub fn deallocate(ctx: &mut LowerContext<'_>, name: &str) -> LowerResult<()> {
    ctx.cursors.get(name)?;
    ctx.cursors.cursors.remove(&key(name));
    Ok(())
}

fn is_sentinel(e: &Expr) -> bool {
    let Expr::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = e
    else {
        return false;
    };
    matches!(
        (left.as_ref(), right.as_ref()),
        (Expr::Global(GlobalVar::FetchStatus), Expr::Literal(Literal::Int(0)))
            | (Expr::Literal(Literal::Int(0)), Expr::Global(GlobalVar::FetchStatus))
    )
}

/// Split a WHILE condition into the fetch-status sentinel and the remaining
/// predicate. `None` when the condition is not a sentinel loop.
pub fn split_sentinel(condition: &Expr) -> Option<Option<Expr>> {
    let parts = condition.conjuncts();
    let sentinels = parts.iter().filter(|p| is_sentinel(p)).count();
    if sentinels != 1 {
        return None;
    }
    let rest = parts
        .into_iter()
        .filter(|p| !is_sentinel(p))
        .cloned()
        .collect();
    Some(Expr::and_all(rest))
}

/// First FETCH in a loop body, at any depth.
pub fn first_fetch(body: &[Statement]) -> Option<&Fetch> {
    let mut found = None;
    for stmt in body {
        stmt.visit(&mut |s| {
            if let Statement::Fetch(f) = s {
                found.get_or_insert(f);
            }
        });
        if found.is_some() {
            break;
        }
    }
    found
}

/// `for it.Next() { Scan; [guard]; body }` followed by the `Err()` check.
pub fn lower_loop(
    ctx: &mut LowerContext<'_>,
    fetch: &Fetch,
    rest: Option<&Expr>,
    body: &[Statement],
) -> LowerResult<()> {
    let it = check_fetch(ctx, fetch)?;
    let dests = scan_targets(ctx, fetch)?;
    tracing::debug!("cursor loop over {}", fetch.cursor);

    ctx.cursors.looping.push(key(&fetch.cursor));
    ctx.open_block(format!("for {}.Next() {{", it));
    ctx.enter_loop();
    let result = (|| {
        ctx.emit_guarded(&format!("err = {}.Scan({})", it, dests));
        if let Some(rest) = rest {
            let cond = expr::lower_condition(ctx, rest)?;
            ctx.open_block(format!("if !({}) {{", cond));
            ctx.out.line("break");
            ctx.close_block("}");
        }
        stmt::lower_block(ctx, body)
    })();
    ctx.leave_loop();
    ctx.close_block("}");
    ctx.cursors.looping.pop();
    result?;

    ctx.emit_guarded(&format!("err = {}.Err()", it));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builders::*;

    #[test]
    fn test_split_sentinel_forms() {
        assert_eq!(split_sentinel(&eq(fetch_status(), int(0))), Some(None));
        assert_eq!(split_sentinel(&eq(int(0), fetch_status())), Some(None));

        let compound = and(eq(fetch_status(), int(0)), lt(var("@n"), int(10)));
        assert_eq!(split_sentinel(&compound), Some(Some(lt(var("@n"), int(10)))));

        assert_eq!(split_sentinel(&lt(var("@n"), int(10))), None);
        assert_eq!(split_sentinel(&ne(fetch_status(), int(0))), None);
    }

    #[test]
    fn test_first_fetch_searches_nested_blocks() {
        let body = vec![
            print(text("row")),
            block([fetch_next("c", ["@id"])]),
            fetch_next("other", ["@x"]),
        ];
        assert_eq!(first_fetch(&body).map(|f| f.cursor.as_str()), Some("c"));
        assert!(first_fetch(&[print(text("x"))]).is_none());
    }
}
