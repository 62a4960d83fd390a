//! UPDATE SQL generation.

use crate::ast::*;
use crate::error::LowerResult;
use crate::transpiler::expr::QueryRenderer;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParamResolver, RenderedQuery};

pub fn build_update(
    update: &Update,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let mut sql = String::from("UPDATE ");
    sql.push_str(&r.table(&update.table));

    // SET binds before WHERE so argument order follows the text.
    let mut sets = Vec::with_capacity(update.assignments.len());
    for a in &update.assignments {
        let value = r.expr(&a.value)?;
        sets.push(format!("{} = {}", r.column(&a.column), value));
    }
    sql.push_str(" SET ");
    sql.push_str(&sets.join(", "));

    if let Some(cond) = &update.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(&r.expr(cond)?);
    }

    Ok(r.finish(sql))
}
