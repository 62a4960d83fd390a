//! DELETE SQL generation.

use crate::ast::*;
use crate::error::LowerResult;
use crate::transpiler::expr::QueryRenderer;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParamResolver, RenderedQuery};

pub fn build_delete(
    delete: &Delete,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let mut sql = String::from("DELETE FROM ");
    sql.push_str(&r.table(&delete.table));

    if let Some(cond) = &delete.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(&r.expr(cond)?);
    }

    Ok(r.finish(sql))
}
