//! INSERT SQL generation.

use crate::ast::*;
use crate::error::LowerResult;
use crate::transpiler::expr::QueryRenderer;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParamResolver, RenderedQuery};

pub fn build_insert(
    insert: &Insert,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let mut sql = String::from("INSERT INTO ");
    sql.push_str(&r.table(&insert.table));

    if !insert.columns.is_empty() {
        let cols: Vec<String> = insert.columns.iter().map(|c| r.column(c)).collect();
        sql.push_str(" (");
        sql.push_str(&cols.join(", "));
        sql.push(')');
    }

    match &insert.source {
        InsertSource::Values(rows) => {
            let mut rendered_rows = Vec::with_capacity(rows.len());
            for row in rows {
                let values = row
                    .iter()
                    .map(|v| r.expr(v))
                    .collect::<LowerResult<Vec<_>>>()?;
                rendered_rows.push(format!("({})", values.join(", ")));
            }
            sql.push_str(" VALUES ");
            sql.push_str(&rendered_rows.join(", "));
        }
        InsertSource::Select(query) => {
            sql.push(' ');
            sql.push_str(&super::select::render_select(&mut r, query)?);
        }
    }

    Ok(r.finish(sql))
}
