//! Procedure lowering.
//!
//! [`lower_procedure`] turns one [`Procedure`] into one exported Go function.
//! The body is pre-scanned to fix the signature, then lowered statement by
//! statement into a [`CodeWriter`]; a trailing return is added when control
//! can fall off the end.

pub mod context;
pub mod cursor;
pub mod dispatch;
pub mod emit;
pub mod exception;
pub mod expr;
pub mod prescan;
pub mod rpc;
pub mod stmt;
pub mod transaction;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::{Direction, Expr, Literal, Procedure, Statement, UnaryOp};
use crate::config::LowerConfig;
use crate::diagnostics::Warning;
use crate::error::LowerResult;
use crate::naming::go_string_literal;
use crate::symbols::SymbolKind;

use context::LowerContext;
pub use emit::{CodeWriter, Imports};

/// Generated Go for one procedure.
#[derive(Debug, Clone, Serialize)]
pub struct LoweredProcedure {
    /// Exported Go function name.
    pub name: String,
    /// Source procedure name.
    pub source_name: String,
    /// Function declaration, doc comment included.
    pub source: String,
    #[serde(skip)]
    pub imports: Imports,
    pub warnings: Vec<Warning>,
}

/// Lower one procedure.
pub fn lower_procedure(procedure: &Procedure, config: &LowerConfig) -> LowerResult<LoweredProcedure> {
    config.validate()?;
    let scan = prescan::scan(procedure, config);
    let mut ctx = LowerContext::new(procedure, config, scan);
    lower_function(&mut ctx).map_err(|e| ctx.locate(e))?;

    tracing::info!(
        "lowered {} -> {} ({} warnings)",
        procedure.name,
        ctx.func_name,
        ctx.diagnostics.len()
    );
    Ok(LoweredProcedure {
        name: ctx.func_name,
        source_name: procedure.name.clone(),
        source: ctx.out.finish(),
        imports: ctx.imports,
        warnings: ctx.diagnostics.into_vec(),
    })
}

fn lower_function(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let procedure = ctx.procedure;

    for param in &procedure.params {
        let kind = match param.direction {
            Direction::In => SymbolKind::Input,
            Direction::Out => SymbolKind::Output,
        };
        ctx.symbols.declare(&param.name, &param.data_type, kind)?;
    }
    declare_hoisted(ctx)?;

    write_doc(ctx);
    let signature = signature(ctx);
    ctx.out.open(format!("{} {{", signature));
    prologue(ctx)?;

    stmt::lower_block(ctx, &procedure.body)?;

    let falls_through = !procedure.body.last().is_some_and(Statement::always_returns);
    if falls_through && !ctx.result_values("0", "nil").is_empty() {
        ctx.emit_return("0", "nil");
    }
    ctx.out.close("}");
    Ok(())
}

/// Locals declared inside a Go block are declared once at function entry.
fn declare_hoisted(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    if ctx.scan.hoisted.is_empty() {
        return Ok(());
    }
    let mut types = HashMap::new();
    ctx.procedure.visit(&mut |s| {
        if let Statement::Declare(vars) = s {
            for v in vars {
                types
                    .entry(v.name.to_lowercase())
                    .or_insert_with(|| v.data_type.clone());
            }
        }
    });
    let hoisted = ctx.scan.hoisted.clone();
    for name in &hoisted {
        if let Some(data_type) = types.get(&name.to_lowercase()) {
            ctx.symbols.declare(name, data_type, SymbolKind::Local)?;
        }
    }
    Ok(())
}

/// Input default as it appears in the doc comment.
fn default_text(expr: &Expr) -> String {
    match expr {
        Expr::Literal(Literal::Int(n)) => n.to_string(),
        Expr::Literal(Literal::Decimal(s)) => s.clone(),
        Expr::Literal(Literal::String(s)) => format!("'{}'", s.replace('\'', "''")),
        Expr::Literal(Literal::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        Expr::Literal(Literal::Null) => "NULL".to_string(),
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => format!("-{}", default_text(expr)),
        Expr::Function { name, args } if args.is_empty() => format!("{}()", name.to_uppercase()),
        _ => "an expression".to_string(),
    }
}

fn write_doc(ctx: &mut LowerContext<'_>) {
    let procedure = ctx.procedure;
    ctx.out.line(format!(
        "// {} is generated from the T-SQL procedure {}.",
        ctx.func_name, procedure.name
    ));
    let defaults: Vec<String> = procedure
        .inputs()
        .filter_map(|p| {
            let default = p.default.as_ref()?;
            let go_name = &ctx.symbols.get(&p.name)?.go_name;
            Some(format!("{} defaults to {}", go_name, default_text(default)))
        })
        .collect();
    if !defaults.is_empty() {
        ctx.out.line("//");
        ctx.out.line("// Callers must pass every argument explicitly:");
        for line in defaults {
            ctx.out.line(format!("//   - {}", line));
        }
    }
}

fn signature(ctx: &mut LowerContext<'_>) -> String {
    ctx.import("context");
    let mut params = vec!["ctx context.Context".to_string()];
    if ctx.scan.uses_db {
        ctx.import("database/sql");
        params.push("db *sql.DB".to_string());
    }
    if !ctx.scan.clients.is_empty() {
        let pkg = ctx.rpc_package();
        let clients: Vec<String> = ctx.scan.clients.iter().map(|c| c.param(&pkg)).collect();
        params.extend(clients);
    }
    if ctx.scan.uses_store {
        let pkg = ctx.mock_package();
        params.push(format!("store *{}.Store", pkg));
    }

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for symbol in ctx.symbols.iter() {
        let field = format!("{} {}", symbol.go_name, symbol.ty.go);
        match symbol.kind {
            SymbolKind::Input => inputs.push((field, symbol.ty.go)),
            SymbolKind::Output => outputs.push((field, symbol.ty.go)),
            SymbolKind::Local => {}
        }
    }
    for (field, ty) in inputs {
        ctx.import_type(ty);
        params.push(field);
    }
    let mut results = Vec::new();
    for (field, ty) in outputs {
        ctx.import_type(ty);
        results.push(field);
    }
    if ctx.scan.has_status {
        results.push("returnCode int32".to_string());
    }
    if ctx.scan.needs_err {
        results.push("err error".to_string());
    }

    let head = format!("func {}({})", ctx.func_name, params.join(", "));
    if results.is_empty() {
        head
    } else {
        format!("{} ({})", head, results.join(", "))
    }
}

fn prologue(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let procedure = ctx.procedure;
    if ctx.config.log_hook {
        ctx.import("log/slog");
        let mut args = vec![
            "ctx".to_string(),
            go_string_literal(&format!("{}: enter", ctx.func_name)),
        ];
        for p in procedure.inputs() {
            let go_name = ctx.symbols.lookup(&p.name)?.go_name.clone();
            args.push(go_string_literal(&go_name));
            args.push(go_name);
        }
        ctx.out.line(format!("slog.DebugContext({})", args.join(", ")));
    }

    for p in procedure.outputs() {
        let Some(default) = &p.default else { continue };
        let symbol = ctx.symbols.lookup(&p.name)?;
        let (go_name, ty) = (symbol.go_name.clone(), symbol.ty.go);
        let value = expr::lower_value(ctx, default, ty)?;
        ctx.out.line(format!("{} = {}", go_name, value));
    }

    if ctx.scan.tracks_rowcount {
        ctx.out.line("var rowCount int64");
    }
    if ctx.scan.tracks_identity {
        ctx.out.line("var lastInsertID int64");
    }
    if ctx.scan.has_transaction && ctx.scan.uses_db {
        ctx.import("database/sql");
        ctx.out.line("var tx *sql.Tx");
    }

    let hoisted = ctx.scan.hoisted.clone();
    for name in &hoisted {
        let Some(symbol) = ctx.symbols.get(name) else { continue };
        let (go_name, ty) = (symbol.go_name.clone(), symbol.ty.go);
        ctx.import_type(ty);
        ctx.out.line(format!("var {} {}", go_name, ty));
        if !ctx.scan.is_read(name) {
            ctx.out.line(format!("_ = {}", go_name));
        }
    }
    cursor::hoist_iterators(ctx);
    Ok(())
}

/// A complete Go file holding `procedures`.
pub fn render_file(package: &str, procedures: &[LoweredProcedure]) -> String {
    let mut imports = Imports::new();
    for p in procedures {
        imports.extend(&p.imports);
    }
    let mut out = String::from("// Code generated by tsql2go. DO NOT EDIT.\n\n");
    out.push_str(&format!("package {}\n", package));
    if !imports.is_empty() {
        out.push('\n');
        out.push_str(&imports.render());
        out.push('\n');
    }
    for p in procedures {
        out.push('\n');
        out.push_str(&p.source);
    }
    out
}
