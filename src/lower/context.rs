//! Per-procedure lowering state.
//!
//! One [`LowerContext`] is created per `lower_procedure` call and dropped when
//! it returns. Nothing here is shared between procedures.

use crate::ast::{GlobalVar, Procedure};
use crate::config::LowerConfig;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{LowerError, LowerResult};
use crate::naming;
use crate::symbols::{Binding, GeneratedNames, SymbolTable};
use crate::transpiler::{ParamResolver, RenderedQuery, SqlGenerator};
use crate::types::{Category, GoType};

use super::cursor::CursorTable;
use super::emit::{CodeWriter, Imports};
use super::exception;
use super::prescan::Prescan;
use super::transaction::{self, TransactionState};

/// Which exit-path semantics apply to the code being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitScope {
    /// Function body: failures return.
    Body,
    /// Inside a TRY closure: failures panic into the recovery handler.
    Try,
    /// Inside a CATCH handler: failures are acknowledged and dropped.
    Catch,
}

pub struct LowerContext<'a> {
    pub config: &'a LowerConfig,
    pub procedure: &'a Procedure,
    /// Exported Go function name.
    pub func_name: String,
    generator: Box<dyn SqlGenerator>,
    pub symbols: SymbolTable,
    pub names: GeneratedNames,
    pub cursors: CursorTable,
    pub tx: TransactionState,
    pub scan: Prescan,
    pub out: CodeWriter,
    pub imports: Imports,
    pub diagnostics: Diagnostics,
    /// Per TRY closure: the flag a RETURN sets, when it can propagate.
    pub return_flags: Vec<Option<String>>,
    exits: Vec<ExitScope>,
    /// Open loops per closure frame; BREAK may not cross a frame.
    loops: Vec<usize>,
    path: Vec<usize>,
}

impl<'a> LowerContext<'a> {
    pub fn new(procedure: &'a Procedure, config: &'a LowerConfig, scan: Prescan) -> Self {
        let mut symbols = SymbolTable::new();
        for client in &scan.clients {
            symbols.reserve(&client.var);
        }
        symbols.reserve(&config.rpc_package.alias);
        symbols.reserve(&config.mock_package.alias);
        Self {
            config,
            procedure,
            func_name: naming::function_name(&procedure.name),
            generator: config.dialect.generator(),
            symbols,
            names: GeneratedNames::new(),
            cursors: CursorTable::default(),
            tx: TransactionState::default(),
            scan,
            out: CodeWriter::new(),
            imports: Imports::new(),
            diagnostics: Diagnostics::new(),
            return_flags: Vec::new(),
            exits: vec![ExitScope::Body],
            loops: vec![0],
            path: Vec::new(),
        }
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    // ---- imports -------------------------------------------------------

    pub fn import(&mut self, path: &str) {
        self.imports.add(path);
    }

    /// Import the runtime helper package and return its qualifier.
    pub fn runtime(&mut self) -> &'static str {
        let line = self.config.runtime_import_line();
        self.imports.add_spec(line);
        "tsqlrt"
    }

    pub fn import_type(&mut self, ty: GoType) {
        if let Some(path) = ty.import() {
            self.imports.add(path);
        }
    }

    pub fn rpc_package(&mut self) -> String {
        let spec = self.config.rpc_package.clone();
        self.imports.add_spec(spec.import_line());
        spec.alias
    }

    pub fn mock_package(&mut self) -> String {
        let spec = self.config.mock_package.clone();
        self.imports.add_spec(spec.import_line());
        spec.alias
    }

    // ---- statement paths and diagnostics -------------------------------

    pub fn enter(&mut self, index: usize) {
        self.path.push(index);
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Dotted statement path (`3.1.2`); `entry` before the first statement.
    pub fn path(&self) -> String {
        if self.path.is_empty() {
            return "entry".to_string();
        }
        self.path
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn locate(&self, err: LowerError) -> LowerError {
        err.located(&self.procedure.name, &self.path())
    }

    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let path = self.path();
        self.diagnostics.warn(kind, &path, message);
    }

    // ---- exit scopes and loops -----------------------------------------

    pub fn exit_scope(&self) -> ExitScope {
        self.exits.last().copied().unwrap_or(ExitScope::Body)
    }

    /// Inside a CATCH handler at any depth; error intrinsics see `caught`.
    pub fn in_catch(&self) -> bool {
        self.exits.contains(&ExitScope::Catch)
    }

    pub fn push_exit(&mut self, scope: ExitScope) {
        self.exits.push(scope);
    }

    pub fn pop_exit(&mut self) {
        if self.exits.len() > 1 {
            self.exits.pop();
        }
    }

    pub fn enter_loop(&mut self) {
        if let Some(n) = self.loops.last_mut() {
            *n += 1;
        }
    }

    pub fn leave_loop(&mut self) {
        if let Some(n) = self.loops.last_mut() {
            *n = n.saturating_sub(1);
        }
    }

    /// A Go closure starts a fresh loop frame.
    pub fn enter_closure(&mut self) {
        self.loops.push(0);
    }

    pub fn leave_closure(&mut self) {
        if self.loops.len() > 1 {
            self.loops.pop();
        }
    }

    /// BREAK/CONTINUE target check.
    pub fn check_jump(&self, keyword: &str) -> LowerResult<()> {
        let frame = self.loops.last().copied().unwrap_or(0);
        if frame > 0 {
            return Ok(());
        }
        if self.loops.iter().any(|n| *n > 0) {
            Err(LowerError::unsupported(
                keyword,
                "cannot leave a loop across a TRY/CATCH boundary",
            ))
        } else {
            Err(LowerError::unsupported(keyword, "outside of a WHILE loop"))
        }
    }

    // ---- blocks and generated names ------------------------------------

    pub fn open_block(&mut self, text: impl AsRef<str>) {
        self.out.open(text);
        self.names.push_scope();
    }

    pub fn close_block(&mut self, text: impl AsRef<str>) {
        self.names.pop_scope();
        self.out.close(text);
    }

    /// `} else {` and friends: closes one Go scope and opens its sibling.
    pub fn reopen_block(&mut self, text: impl AsRef<str>) {
        self.names.pop_scope();
        self.out.reopen(text);
        self.names.push_scope();
    }

    /// Assignment operator for a generated local paired with `err`.
    ///
    /// `:=` is only used at function depth, where it cannot shadow the named
    /// `err` result; deeper blocks get a `var` declaration and plain `=`.
    pub fn bind_local(&mut self, name: &str, go_type: &str) -> &'static str {
        match self.names.bind(name) {
            Binding::Assign => "=",
            Binding::Define if self.names.depth() == 0 => ":=",
            Binding::Define => {
                self.out.line(format!("var {} {}", name, go_type));
                "="
            }
        }
    }

    /// A generated name that does not collide with a user variable.
    pub fn local_name(&self, base: &str) -> String {
        if self.symbols.is_taken(base) {
            format!("{}Gen", base)
        } else {
            base.to_string()
        }
    }

    pub fn fresh(&mut self, base: &str) -> String {
        loop {
            let name = self.names.fresh(base);
            if !self.symbols.is_taken(&name) {
                return name;
            }
        }
    }

    // ---- exit paths ----------------------------------------------------

    /// Values of a `return` statement: outputs, then status and error when
    /// the signature carries them.
    pub fn result_values(&self, status: &str, err: &str) -> Vec<String> {
        let mut values: Vec<String> = self
            .procedure
            .outputs()
            .filter_map(|p| self.symbols.get(&p.name))
            .map(|s| s.go_name.clone())
            .collect();
        if self.scan.has_status {
            values.push(status.to_string());
        }
        if self.scan.needs_err {
            values.push(err.to_string());
        }
        values
    }

    pub fn emit_return(&mut self, status: &str, err: &str) {
        let values = self.result_values(status, err);
        if values.is_empty() {
            self.out.line("return");
        } else {
            self.out.line(format!("return {}", values.join(", ")));
        }
    }

    /// Route a failure through the exit semantics of the current scope.
    pub fn emit_error_exit(&mut self, err: &str) {
        match self.exit_scope() {
            ExitScope::Body => self.emit_return("returnCode", err),
            ExitScope::Try => self.out.line(format!("panic({})", err)),
            ExitScope::Catch => {
                self.emit_acknowledge(err);
                if err == "err" {
                    self.out.line("err = nil");
                }
            }
        }
    }

    /// Log a failure that a CATCH handler swallows.
    pub fn emit_acknowledge(&mut self, err: &str) {
        if self.config.log_hook {
            self.import("log/slog");
            self.out.line(format!(
                "slog.ErrorContext(ctx, {}, \"err\", {})",
                naming::go_string_literal(&format!("{}: error ignored in CATCH block", self.func_name)),
                err
            ));
        } else {
            self.import("log");
            self.out.line(format!(
                "log.Printf({}, {})",
                naming::go_string_literal(&format!(
                    "{}: error ignored in CATCH block: %v",
                    self.func_name
                )),
                err
            ));
        }
    }

    /// `if <init>; err != nil { <exit> }`
    pub fn emit_guarded(&mut self, init: &str) {
        self.open_block(format!("if {}; err != nil {{", init));
        self.emit_error_exit("err");
        self.close_block("}");
    }

    /// Check an `err` bound by the previous line, then emit the success path.
    /// In a CATCH handler the success path moves into an `else` branch, since
    /// the failure branch falls through.
    pub fn emit_checked<F>(&mut self, success: F) -> LowerResult<()>
    where
        F: FnOnce(&mut Self) -> LowerResult<()>,
    {
        self.open_block("if err != nil {");
        self.emit_error_exit("err");
        if self.exit_scope() == ExitScope::Catch {
            self.reopen_block("} else {");
            success(self)?;
            self.close_block("}");
        } else {
            self.close_block("}");
            success(self)?;
        }
        Ok(())
    }

    // ---- query rendering -----------------------------------------------

    /// Render a DML node with this procedure's variables as arguments.
    pub fn render<F>(&mut self, build: F) -> LowerResult<RenderedQuery>
    where
        F: FnOnce(&dyn SqlGenerator, &dyn ParamResolver) -> LowerResult<RenderedQuery>,
    {
        let query = {
            let resolver = QueryArgs { ctx: self };
            build(self.generator.as_ref(), &resolver)?
        };
        if query.args.iter().any(|a| a.starts_with("tsqlrt.")) {
            self.runtime();
        }
        Ok(query)
    }

    /// Handle that data calls go through: `tx` inside a transaction.
    pub fn sql_handle(&self) -> &'static str {
        if self.tx.active && self.scan.uses_db {
            "tx"
        } else {
            "db"
        }
    }
}

/// Resolves query arguments against the symbol table.
struct QueryArgs<'c, 'a> {
    ctx: &'c LowerContext<'a>,
}

impl ParamResolver for QueryArgs<'_, '_> {
    fn resolve_variable(&self, name: &str) -> LowerResult<String> {
        Ok(self.ctx.symbols.lookup(name)?.go_name.clone())
    }

    fn resolve_global(&self, global: GlobalVar) -> LowerResult<String> {
        match global {
            GlobalVar::RowCount => Ok("rowCount".to_string()),
            GlobalVar::Identity => Ok("lastInsertID".to_string()),
            GlobalVar::Error => Ok("0".to_string()),
            GlobalVar::TranCount => Ok(transaction::trancount_code(self.ctx)),
            GlobalVar::FetchStatus => Err(LowerError::unsupported(
                "@@FETCH_STATUS",
                "cannot be referenced inside a query",
            )),
        }
    }

    fn resolve_intrinsic(&self, name: &str) -> Option<LowerResult<String>> {
        if name == "SCOPE_IDENTITY" {
            return Some(Ok("lastInsertID".to_string()));
        }
        exception::error_intrinsic(self.ctx.in_catch(), &self.ctx.procedure.name, name)
            .map(|(code, _)| Ok(code))
    }

    fn is_string_variable(&self, name: &str) -> bool {
        self.ctx
            .symbols
            .get(name)
            .is_some_and(|s| s.ty.category == Category::String)
    }
}
