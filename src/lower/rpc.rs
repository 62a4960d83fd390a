//! RPC and mock-store call shapes.
//!
//! Both backends take a `<Method>Request` message built from the literal
//! fields of a DML statement and return `(<Method>Response, error)`; they
//! differ only in the receiver (`<entity>Client` vs `store`) and the package
//! the message types live in.

use crate::ast::{BinaryOp, Exec, Expr, GlobalVar, Insert, InsertSource, Literal, Select, TableRef, UnaryOp, Update, Delete};
use crate::config::{BackendKind, LowerConfig};
use crate::diagnostics::WarningKind;
use crate::error::{LowerError, LowerResult};
use crate::naming;
use crate::transpiler::is_single_row;

use super::context::LowerContext;
use super::expr::lower_expr;

/// A service client the generated function takes as a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRef {
    pub var: String,
    pub service: String,
}

impl ClientRef {
    /// Parameter declaration (`customerClient pb.CustomerServiceClient`).
    pub fn param(&self, package: &str) -> String {
        format!("{} {}.{}Client", self.var, package, self.service)
    }
}

pub fn service_name(config: &LowerConfig, table: &TableRef) -> String {
    match config.service_override(&table.name) {
        Some(service) => service.to_string(),
        None => format!("{}Service", naming::entity_name(table.base_name())),
    }
}

fn client_var(service: &str) -> String {
    let stem = service.strip_suffix("Service").unwrap_or(service);
    format!("{}Client", naming::to_camel_case(stem))
}

pub fn client_ref(config: &LowerConfig, table: &TableRef) -> ClientRef {
    let service = service_name(config, table);
    let var = match config.client_override(&table.name) {
        Some(client) => client.to_string(),
        None => client_var(&service),
    };
    ClientRef { var, service }
}

/// Client that serves EXEC calls.
pub fn exec_client_ref(config: &LowerConfig) -> ClientRef {
    ClientRef {
        var: client_var(&config.exec_service),
        service: config.exec_service.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlKind {
    Select,
    Insert,
    Update,
    Delete,
    Exists,
}

/// Remote method name from the procedure's leading verb, falling back to the
/// CRUD verb of the statement kind.
pub fn method_name(procedure: &str, kind: DmlKind, entity: &str, single: bool) -> String {
    let verb = naming::leading_verb(procedure);
    let plural = naming::pluralize(entity);
    match kind {
        DmlKind::Select => match verb {
            Some(v @ ("Search" | "Find" | "Count")) => format!("{}{}", v, plural),
            _ if single => format!("Get{}", entity),
            _ => format!("List{}", plural),
        },
        DmlKind::Insert => format!("Create{}", entity),
        DmlKind::Update => match verb {
            Some(v) if !matches!(v, "Search" | "Find" | "Count") => format!("{}{}", v, entity),
            _ => format!("Update{}", entity),
        },
        DmlKind::Delete => format!("Delete{}", entity),
        DmlKind::Exists => format!("Exists{}", entity),
    }
}

/// One `Field: value` entry of a request literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestField {
    pub name: String,
    pub value: String,
}

enum FieldSource {
    Value(String),
    Null,
    Complex,
}

/// Variables, literals, negated literals and clock intrinsics map onto a
/// request field; anything else is too complex.
fn field_source(ctx: &mut LowerContext<'_>, expr: &Expr) -> LowerResult<FieldSource> {
    let simple = match expr {
        Expr::Literal(Literal::Null) => return Ok(FieldSource::Null),
        Expr::Variable(_) | Expr::Literal(_) => true,
        Expr::Global(GlobalVar::RowCount | GlobalVar::Identity) => true,
        Expr::Unary {
            op: UnaryOp::Neg,
            expr,
        } => matches!(expr.as_ref(), Expr::Literal(_)),
        Expr::Function { name, args } => {
            args.is_empty()
                && matches!(
                    name.to_uppercase().as_str(),
                    "GETDATE" | "GETUTCDATE" | "SYSDATETIME" | "SYSUTCDATETIME" | "CURRENT_TIMESTAMP"
                )
        }
        _ => false,
    };
    if !simple {
        return Ok(FieldSource::Complex);
    }
    Ok(FieldSource::Value(lower_expr(ctx, expr, None)?.code))
}

struct Fields<'r> {
    fields: Vec<RequestField>,
    what: &'r str,
}

impl Fields<'_> {
    fn push(&mut self, ctx: &mut LowerContext<'_>, column: &str, expr: &Expr) -> LowerResult<()> {
        let name = naming::proto_field_name(column);
        match field_source(ctx, expr)? {
            FieldSource::Value(value) => {
                if self.fields.iter().any(|f| f.name == name) {
                    ctx.warn(
                        WarningKind::SkippedField,
                        format!("duplicate remote field {} dropped", name),
                    );
                } else {
                    self.fields.push(RequestField { name, value });
                }
            }
            FieldSource::Null => ctx.warn(
                WarningKind::SkippedField,
                format!("NULL {} value left unset in remote request: {}", self.what, column),
            ),
            FieldSource::Complex => ctx.warn(
                WarningKind::SkippedField,
                format!("{} expression too complex for remote field: {}", self.what, column),
            ),
        }
        Ok(())
    }
}

fn where_fields(ctx: &mut LowerContext<'_>, where_clause: Option<&Expr>) -> LowerResult<Vec<RequestField>> {
    let mut out = Fields {
        fields: Vec::new(),
        what: "WHERE",
    };
    let Some(cond) = where_clause else {
        return Ok(out.fields);
    };
    for part in cond.conjuncts() {
        match part {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(c), value) | (value, Expr::Column(c))
                    if !matches!(value, Expr::Column(_)) =>
                {
                    out.push(ctx, &c.name, value)?
                }
                _ => warn_predicate(ctx, part),
            },
            _ => warn_predicate(ctx, part),
        }
    }
    Ok(out.fields)
}

fn warn_predicate(ctx: &mut LowerContext<'_>, part: &Expr) {
    let mut column = None;
    part.walk(&mut |e| {
        if let Expr::Column(c) = e {
            column.get_or_insert_with(|| c.name.clone());
        }
    });
    ctx.warn(
        WarningKind::SkippedField,
        format!(
            "WHERE expression too complex for remote field: {}",
            column.as_deref().unwrap_or("predicate")
        ),
    );
}

fn entity(table: &TableRef) -> String {
    naming::entity_name(table.base_name())
}

/// Receiver, message package and call text.
fn call(
    ctx: &mut LowerContext<'_>,
    backend: BackendKind,
    client: &ClientRef,
    method: &str,
    fields: &[RequestField],
) -> (String, String) {
    let (receiver, package) = match backend {
        BackendKind::Mock => ("store".to_string(), ctx.mock_package()),
        _ => (client.var.clone(), ctx.rpc_package()),
    };
    let body = fields
        .iter()
        .map(|f| format!("{}: {}", f.name, f.value))
        .collect::<Vec<_>>()
        .join(", ");
    let text = format!(
        "{}.{}(ctx, &{}.{}Request{{{}}})",
        receiver, method, package, method, body
    );
    (text, package)
}

/// Emit the call and hand the bound response variable to `on_response`.
fn emit_call_with<'a, F>(
    ctx: &mut LowerContext<'a>,
    backend: BackendKind,
    client: &ClientRef,
    method: &str,
    fields: &[RequestField],
    on_response: F,
) -> LowerResult<()>
where
    F: FnOnce(&mut LowerContext<'a>, &str) -> LowerResult<()>,
{
    let (text, package) = call(ctx, backend, client, method, fields);
    let resp = ctx.local_name(&format!("{}Resp", naming::to_camel_case(method)));
    let ty = format!("*{}.{}Response", package, method);
    let op = ctx.bind_local(&resp, &ty);
    ctx.out.line(format!("{}, err {} {}", resp, op, text));
    ctx.emit_checked(|ctx| on_response(ctx, &resp))
}

/// Emit a call whose response is discarded.
fn emit_call(
    ctx: &mut LowerContext<'_>,
    backend: BackendKind,
    client: &ClientRef,
    method: &str,
    fields: &[RequestField],
) -> LowerResult<()> {
    let (text, _) = call(ctx, backend, client, method, fields);
    if ctx.scan.tracks_rowcount {
        ctx.out.line(format!("_, err = {}", text));
        ctx.emit_checked(|ctx| {
            ctx.out.line("rowCount = 1");
            Ok(())
        })
    } else {
        ctx.emit_guarded(&format!("_, err = {}", text));
        Ok(())
    }
}

fn client_for(ctx: &LowerContext<'_>, table: &TableRef) -> ClientRef {
    client_ref(ctx.config, table)
}

pub fn lower_select(ctx: &mut LowerContext<'_>, select: &Select, backend: BackendKind) -> LowerResult<()> {
    let Some(table) = &select.from else {
        return Err(LowerError::unsupported("SELECT", "remote query without FROM"));
    };
    for join in &select.joins {
        ctx.warn(
            WarningKind::SkippedField,
            format!("JOIN on {} cannot be expressed as remote fields", join.table.name),
        );
    }
    let single = select.assigns_variables() || is_single_row(select);
    let method = method_name(&ctx.procedure.name, DmlKind::Select, &entity(table), single);
    let fields = where_fields(ctx, select.where_clause.as_ref())?;
    let client = client_for(ctx, table);

    if select.assigns_variables() {
        let mut reads = Vec::new();
        for item in &select.items {
            let Some(target) = &item.assign_to else { continue };
            let go_name = ctx.symbols.lookup(target)?.go_name.clone();
            match &item.expr {
                Expr::Column(c) => reads.push((go_name, naming::proto_field_name(&c.name))),
                _ => ctx.warn(
                    WarningKind::SkippedField,
                    format!("select item too complex for remote field: {}", target),
                ),
            }
        }
        let track = ctx.scan.tracks_rowcount;
        emit_call_with(ctx, backend, &client, &method, &fields, move |ctx, resp| {
            for (var, field) in &reads {
                ctx.out.line(format!("{} = {}.Get{}()", var, resp, field));
            }
            if track {
                ctx.out.line("rowCount = 1");
            }
            Ok(())
        })
    } else {
        emit_call_with(ctx, backend, &client, &method, &fields, |ctx, resp| {
            let rt = ctx.runtime();
            ctx.out.line(format!("{}.EmitMessage(ctx, {})", rt, resp));
            Ok(())
        })
    }
}

pub fn lower_insert(ctx: &mut LowerContext<'_>, insert: &Insert, backend: BackendKind) -> LowerResult<()> {
    if insert.columns.is_empty() {
        return Err(LowerError::unmappable(
            format!("INSERT INTO {}", insert.table.name),
            "no column list to name the request fields",
        ));
    }
    let rows = match &insert.source {
        InsertSource::Values(rows) => rows,
        InsertSource::Select(_) => {
            return Err(LowerError::unmappable(
                format!("INSERT INTO {}", insert.table.name),
                "INSERT … SELECT has no literal field values",
            ))
        }
    };
    let method = method_name(&ctx.procedure.name, DmlKind::Insert, &entity(&insert.table), true);
    let client = client_for(ctx, &insert.table);
    for row in rows {
        let mut fields = Fields {
            fields: Vec::new(),
            what: "VALUES",
        };
        for (column, value) in insert.columns.iter().zip(row) {
            fields.push(ctx, column, value)?;
        }
        emit_call(ctx, backend, &client, &method, &fields.fields)?;
    }
    Ok(())
}

pub fn lower_update(ctx: &mut LowerContext<'_>, update: &Update, backend: BackendKind) -> LowerResult<()> {
    let method = method_name(&ctx.procedure.name, DmlKind::Update, &entity(&update.table), true);
    let mut fields = Fields {
        fields: where_fields(ctx, update.where_clause.as_ref())?,
        what: "SET",
    };
    for assignment in &update.assignments {
        fields.push(ctx, &assignment.column, &assignment.value)?;
    }
    let client = client_for(ctx, &update.table);
    emit_call(ctx, backend, &client, &method, &fields.fields)
}

pub fn lower_delete(ctx: &mut LowerContext<'_>, delete: &Delete, backend: BackendKind) -> LowerResult<()> {
    let method = method_name(&ctx.procedure.name, DmlKind::Delete, &entity(&delete.table), true);
    let fields = where_fields(ctx, delete.where_clause.as_ref())?;
    let client = client_for(ctx, &delete.table);
    emit_call(ctx, backend, &client, &method, &fields)
}

/// EXEC becomes a call named after the callee; OUTPUT arguments and the
/// return status are read back from the response.
pub fn lower_exec(ctx: &mut LowerContext<'_>, exec: &Exec, backend: BackendKind) -> LowerResult<()> {
    let method = naming::function_name(&exec.procedure);
    let mut fields = Fields {
        fields: Vec::new(),
        what: "argument",
    };
    let mut reads = Vec::new();
    for (i, arg) in exec.args.iter().enumerate() {
        let field = match &arg.name {
            Some(name) => name.clone(),
            None => {
                let positional = format!("Arg{}", i + 1);
                ctx.warn(
                    WarningKind::Approximation,
                    format!(
                        "positional argument {} of {} mapped to field {}",
                        i + 1,
                        exec.base_name(),
                        positional
                    ),
                );
                positional
            }
        };
        fields.push(ctx, &field, &arg.value)?;
        if arg.output {
            let Expr::Variable(var) = &arg.value else {
                return Err(LowerError::unsupported("EXEC", "OUTPUT argument must be a variable"));
            };
            let go_name = ctx.symbols.lookup(var)?.go_name.clone();
            let source = arg.name.as_deref().unwrap_or(var);
            reads.push((go_name, naming::proto_field_name(source)));
        }
    }
    if let Some(status) = &exec.return_status {
        let go_name = ctx.symbols.lookup(status)?.go_name.clone();
        reads.push((go_name, "ReturnCode".to_string()));
    }

    let client = exec_client_ref(ctx.config);
    if reads.is_empty() {
        return emit_call(ctx, backend, &client, &method, &fields.fields);
    }
    emit_call_with(ctx, backend, &client, &method, &fields.fields, move |ctx, resp| {
        for (var, field) in &reads {
            ctx.out.line(format!("{} = {}.Get{}()", var, resp, field));
        }
        Ok(())
    })
}

/// `EXISTS (…)` against a remote or mock backend, bound to `target`.
pub fn lower_exists(
    ctx: &mut LowerContext<'_>,
    select: &Select,
    backend: BackendKind,
    target: &str,
) -> LowerResult<()> {
    let Some(table) = &select.from else {
        return Err(LowerError::unsupported("EXISTS", "subquery without FROM"));
    };
    let method = method_name(&ctx.procedure.name, DmlKind::Exists, &entity(table), true);
    let fields = where_fields(ctx, select.where_clause.as_ref())?;
    let client = client_for(ctx, table);
    if backend == BackendKind::Mock {
        let (text, _) = call(ctx, backend, &client, &method, &fields);
        ctx.emit_guarded(&format!("{}, err = {}", target, text));
        return Ok(());
    }
    let target = target.to_string();
    emit_call_with(ctx, backend, &client, &method, &fields, move |ctx, resp| {
        ctx.out.line(format!("{} = {}.GetExists()", target, resp));
        Ok(())
    })
}

/// Mock-store cursor source: `store.List<Entities>(ctx, req)`.
pub fn cursor_call(ctx: &mut LowerContext<'_>, select: &Select) -> LowerResult<String> {
    let Some(table) = &select.from else {
        return Err(LowerError::unsupported("cursor", "query without FROM"));
    };
    let method = format!("List{}", naming::pluralize(&entity(table)));
    let fields = where_fields(ctx, select.where_clause.as_ref())?;
    let client = client_for(ctx, table);
    Ok(call(ctx, BackendKind::Mock, &client, &method, &fields).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(method_name("usp_GetCustomer", DmlKind::Select, "Customer", true), "GetCustomer");
        assert_eq!(method_name("usp_GetOrders", DmlKind::Select, "Order", false), "ListOrders");
        assert_eq!(method_name("usp_SearchOrders", DmlKind::Select, "Order", true), "SearchOrders");
        assert_eq!(method_name("usp_CountOrders", DmlKind::Select, "Order", false), "CountOrders");
        assert_eq!(method_name("usp_ApproveOrder", DmlKind::Update, "Order", true), "ApproveOrder");
        assert_eq!(method_name("usp_SearchOrders", DmlKind::Update, "Order", true), "UpdateOrder");
        assert_eq!(method_name("usp_ApproveOrder", DmlKind::Insert, "AuditLog", true), "CreateAuditLog");
        assert_eq!(method_name("p", DmlKind::Delete, "Order", true), "DeleteOrder");
    }

    #[test]
    fn test_client_naming() {
        let config = LowerConfig::builder()
            .service("Accounts", "LedgerService")
            .client("Invoices", "billing")
            .build();
        let c = client_ref(&config, &TableRef::new("dbo.Customers"));
        assert_eq!(c, ClientRef { var: "customerClient".into(), service: "CustomerService".into() });
        assert_eq!(c.param("pb"), "customerClient pb.CustomerServiceClient");
        assert_eq!(client_ref(&config, &TableRef::new("Accounts")).var, "ledgerClient");
        assert_eq!(client_ref(&config, &TableRef::new("Invoices")).var, "billing");
        assert_eq!(exec_client_ref(&config).var, "procedureClient");
    }
}
