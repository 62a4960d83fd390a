//! Whole-body pre-scan.
//!
//! Decides the shape of the generated signature before any statement is
//! emitted: which handles the function takes, whether it returns a status
//! code and an error, and which locals need hoisting.

use std::collections::HashSet;

use crate::ast::{Expr, GlobalVar, Literal, Procedure, Select, Statement, TableRef};
use crate::config::{BackendKind, LowerConfig};

use super::dispatch::resolve_backend;
use super::rpc::{self, ClientRef};

#[derive(Debug, Default, Clone)]
pub struct Prescan {
    /// Some statement can fail at runtime; every return carries `err`.
    pub needs_err: bool,
    /// Some RETURN carries a value; every return carries `returnCode`.
    pub has_status: bool,
    pub uses_db: bool,
    pub uses_store: bool,
    /// RPC clients in first-use order.
    pub clients: Vec<ClientRef>,
    pub tracks_rowcount: bool,
    pub tracks_identity: bool,
    pub has_transaction: bool,
    /// Variables declared inside a Go block; declared at function entry.
    pub hoisted: Vec<String>,
    /// Cursors OPENed inside a Go block (folded names).
    nested_opens: HashSet<String>,
    /// Cursors OPENed inside a TRY or CATCH closure (folded names).
    closure_opens: HashSet<String>,
    closure_depth: usize,
    /// Variables whose value is read somewhere (folded keys).
    read: HashSet<String>,
}

fn fold(name: &str) -> String {
    name.trim_start_matches('@').to_lowercase()
}

impl Prescan {
    pub fn is_read(&self, name: &str) -> bool {
        self.read.contains(&fold(name))
    }

    /// The cursor's iterator is declared at function entry.
    pub fn hoists_cursor(&self, name: &str) -> bool {
        self.nested_opens.contains(&name.to_lowercase())
    }

    /// The cursor is opened inside a closure; its release is deferred at
    /// function entry instead of at the OPEN.
    pub fn releases_cursor_at_entry(&self, name: &str) -> bool {
        self.closure_opens.contains(&name.to_lowercase())
    }

    pub fn is_hoisted(&self, name: &str) -> bool {
        let key = fold(name);
        self.hoisted.iter().any(|h| fold(h) == key)
    }

    fn note_table(&mut self, config: &LowerConfig, table: &TableRef) {
        let (backend, _) = resolve_backend(config, Some(table));
        match backend {
            BackendKind::Sql => self.uses_db = true,
            BackendKind::Mock => self.uses_store = true,
            BackendKind::Rpc => self.note_client(rpc::client_ref(config, table)),
        }
    }

    fn note_client(&mut self, client: ClientRef) {
        if !self.clients.contains(&client) {
            self.clients.push(client);
        }
    }

    fn note_expr(&mut self, config: &LowerConfig, expr: &Expr, go_side: bool) {
        expr.walk(&mut |e| match e {
            Expr::Variable(name) => {
                self.read.insert(fold(name));
            }
            Expr::Global(GlobalVar::RowCount) => self.tracks_rowcount = true,
            Expr::Global(GlobalVar::Identity) => self.tracks_identity = true,
            Expr::Function { name, .. }
                if name.eq_ignore_ascii_case("SCOPE_IDENTITY")
                    || name.eq_ignore_ascii_case("IDENT_CURRENT") =>
            {
                self.tracks_identity = true
            }
            _ => {}
        });
        if go_side {
            let mut probes: Vec<&Select> = Vec::new();
            expr.walk(&mut |e| {
                if let Expr::Exists(s) | Expr::Subquery(s) = e {
                    probes.push(s);
                }
            });
            for select in probes {
                self.needs_err = true;
                if let Some(from) = &select.from {
                    self.note_table(config, from);
                }
            }
        }
    }

    fn walk(&mut self, config: &LowerConfig, stmts: &[Statement], nested: bool) {
        for stmt in stmts {
            self.statement(config, stmt, nested);
        }
    }

    fn statement(&mut self, config: &LowerConfig, stmt: &Statement, nested: bool) {
        let go_side = go_side_exprs(stmt);
        stmt.walk_own_exprs(&mut |e| self.note_expr(config, e, go_side));

        match stmt {
            Statement::Declare(vars) if nested => {
                self.hoisted.extend(vars.iter().map(|v| v.name.clone()));
            }
            Statement::DeclareCursor { query, .. } => {
                if let Some(from) = &query.from {
                    self.note_table(config, from);
                }
            }
            Statement::Select(select) => {
                if let Some(from) = &select.from {
                    self.needs_err = true;
                    self.note_table(config, from);
                    for target in select.assigned_variables() {
                        self.read.insert(fold(target));
                    }
                }
            }
            Statement::Insert(i) => {
                self.needs_err = true;
                self.note_table(config, &i.table);
            }
            Statement::Update(u) => {
                self.needs_err = true;
                self.note_table(config, &u.table);
            }
            Statement::Delete(d) => {
                self.needs_err = true;
                self.note_table(config, &d.table);
            }
            Statement::Exec(_) => {
                self.needs_err = true;
                match config.backend {
                    BackendKind::Sql => self.uses_db = true,
                    BackendKind::Mock => self.uses_store = true,
                    BackendKind::Rpc => self.note_client(rpc::exec_client_ref(config)),
                }
            }
            Statement::Open(name) => {
                self.needs_err = true;
                if nested {
                    self.nested_opens.insert(name.to_lowercase());
                }
                if self.closure_depth > 0 {
                    self.closure_opens.insert(name.to_lowercase());
                }
            }
            Statement::Fetch(fetch) => {
                for target in &fetch.into {
                    self.read.insert(fold(target));
                }
            }
            Statement::BeginTransaction(_)
            | Statement::CommitTransaction(_)
            | Statement::RollbackTransaction(_) => self.has_transaction = true,
            Statement::Return(Some(_)) => self.has_status = true,
            Statement::Raiserror { severity, .. } => {
                if !is_informational(severity) {
                    self.needs_err = true;
                }
            }
            Statement::Throw(_) => self.needs_err = true,
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.walk(config, then_branch, true);
                if let Some(else_branch) = else_branch {
                    self.walk(config, else_branch, true);
                }
            }
            Statement::While { body, .. } => self.walk(config, body, true),
            // BEGIN…END adds no Go block.
            Statement::Block(body) => self.walk(config, body, nested),
            Statement::TryCatch {
                try_body,
                catch_body,
            } => {
                self.closure_depth += 1;
                self.walk(config, try_body, true);
                self.walk(config, catch_body, true);
                self.closure_depth -= 1;
            }
            _ => {}
        }
    }
}

/// Statements whose expressions are evaluated in Go rather than in query
/// text.
fn go_side_exprs(stmt: &Statement) -> bool {
    match stmt {
        Statement::Select(select) => select.from.is_none(),
        Statement::Insert(_)
        | Statement::Update(_)
        | Statement::Delete(_)
        | Statement::Exec(_)
        | Statement::DeclareCursor { .. } => false,
        _ => true,
    }
}

/// RAISERROR with a literal severity of 10 or less only prints.
pub fn is_informational(severity: &Expr) -> bool {
    matches!(severity, Expr::Literal(Literal::Int(n)) if *n <= 10)
}

pub fn scan(procedure: &Procedure, config: &LowerConfig) -> Prescan {
    let mut scan = Prescan::default();
    for param in &procedure.params {
        if let Some(default) = &param.default {
            scan.note_expr(config, default, true);
        }
    }
    scan.walk(config, &procedure.body, false);
    if scan.has_transaction && config.backend == BackendKind::Sql {
        scan.uses_db = true;
    }
    if scan.has_transaction && scan.uses_db {
        scan.needs_err = true;
    }
    tracing::debug!(
        "prescan {}: err={} status={} db={} clients={} store={}",
        procedure.name,
        scan.needs_err,
        scan.has_status,
        scan.uses_db,
        scan.clients.len(),
        scan.uses_store
    );
    scan
}
