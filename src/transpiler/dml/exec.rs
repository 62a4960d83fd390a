//! Stored procedure calls.

use crate::ast::*;
use crate::error::LowerResult;
use crate::transpiler::expr::QueryRenderer;
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{ParamResolver, RenderedQuery};

/// Render `EXEC proc args` in the dialect's call syntax. OUTPUT arguments are
/// passed with their current value; callers read them back from the result
/// row.
pub fn build_exec(
    exec: &Exec,
    generator: &dyn SqlGenerator,
    resolver: &dyn ParamResolver,
) -> LowerResult<RenderedQuery> {
    let mut r = QueryRenderer::new(generator, resolver);
    let mut args = Vec::with_capacity(exec.args.len());
    for arg in &exec.args {
        let value = r.expr(&arg.value)?;
        args.push(match &arg.name {
            Some(name) => generator.named_argument(name, &value),
            None => value,
        });
    }
    let name = exec
        .procedure
        .split('.')
        .map(|part| part.trim_start_matches('[').trim_end_matches(']'))
        .collect::<Vec<_>>()
        .join(".");
    let sql = generator.call_procedure(&name, &args);
    Ok(r.finish(sql))
}
