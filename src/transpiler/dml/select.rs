//! SELECT SQL generation.

use crate::ast::*;
use crate::error::LowerResult;
use crate::transpiler::expr::QueryRenderer;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParamResolver, RenderedQuery};

pub fn build_select(
    select: &Select,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let sql = render_select(&mut r, select)?;
    Ok(r.finish(sql))
}

/// Wrap the query in the dialect's EXISTS probe so it yields one boolean row.
pub fn build_exists_probe(
    select: &Select,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let inner = render_select(&mut r, select)?;
    let sql = generator.exists_probe(&inner);
    Ok(r.finish(sql))
}

/// Render a SELECT into `r`, binding placeholders in text order.
pub(crate) fn render_select(r: &mut QueryRenderer<'_>, select: &Select) -> LowerResult<String> {
    let mut sql = String::from("SELECT ");
    if select.distinct {
        sql.push_str("DISTINCT ");
    }

    // TOP either precedes the select list or becomes a trailing limit. It is
    // rendered once, where it lands, so its placeholder binds in text order.
    let mut limit = None;
    if let Some(top) = &select.top {
        if r.generator().leading_top() {
            let n = r.expr(top)?;
            if let Some(prefix) = r.generator().top_prefix(&n) {
                sql.push_str(&prefix);
            }
        } else {
            limit = Some(top);
        }
    }

    let mut items = Vec::with_capacity(select.items.len());
    for item in &select.items {
        let mut rendered = r.expr(&item.expr)?;
        if let Some(alias) = &item.alias {
            rendered.push_str(" AS ");
            rendered.push_str(&r.column(alias));
        }
        items.push(rendered);
    }
    sql.push_str(&items.join(", "));

    if let Some(from) = &select.from {
        sql.push_str(" FROM ");
        sql.push_str(&r.table(from));
    }

    for join in &select.joins {
        let kind = match join.kind {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::Left => " LEFT JOIN ",
        };
        sql.push_str(kind);
        sql.push_str(&r.table(&join.table));
        sql.push_str(" ON ");
        sql.push_str(&r.expr(&join.on)?);
    }

    if let Some(cond) = &select.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(&r.expr(cond)?);
    }

    if !select.group_by.is_empty() {
        let groups = select
            .group_by
            .iter()
            .map(|g| r.expr(g))
            .collect::<LowerResult<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&groups.join(", "));
    }

    if !select.order_by.is_empty() {
        let mut orders = Vec::with_capacity(select.order_by.len());
        for o in &select.order_by {
            let e = r.expr(&o.expr)?;
            orders.push(if o.descending {
                format!("{} DESC", e)
            } else {
                e
            });
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders.join(", "));
    }

    if let Some(top) = limit {
        let n = r.expr(top)?;
        sql.push_str(&r.generator().limit_suffix(&n));
    }

    Ok(sql)
}

/// Whether a query yields at most one row: an explicit `TOP 1`, or a single
/// equality predicate on an identifier-like column.
pub fn is_single_row(select: &Select) -> bool {
    if let Some(Expr::Literal(Literal::Int(1))) = &select.top {
        return true;
    }
    match &select.where_clause {
        Some(Expr::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        }) => match (left.as_ref(), right.as_ref()) {
            (Expr::Column(col), other) | (other, Expr::Column(col)) => {
                is_identifier_column(&col.name) && !matches!(other, Expr::Column(_))
            }
            _ => false,
        },
        _ => false,
    }
}

fn is_identifier_column(name: &str) -> bool {
    let name = name.trim_start_matches('[').trim_end_matches(']');
    let lower = name.to_lowercase();
    // `CustomerID`, `customerId`, `customer_id`, but not `paid` or `valid`.
    lower == "id"
        || lower.ends_with("_id")
        || name.ends_with("ID")
        || name.ends_with("Id")
        || lower.ends_with("_key")
        || lower.ends_with("uuid")
        || lower.ends_with("guid")
}
