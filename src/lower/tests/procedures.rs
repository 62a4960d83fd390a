//! Signature shape, locals, control flow and statement paths.

use pretty_assertions::assert_eq;

use super::{assert_contains, error_path, lower, lower_err};
use crate::ast::builders::*;
use crate::ast::{Parameter, Procedure, Statement};
use crate::error::LowerError;
use crate::lower::render_file;

#[test]
fn test_outputs_and_status_become_named_results() {
    let proc = Procedure::new("dbo.usp_Bump")
        .param(Parameter::input("@Count", "INT"))
        .param(Parameter::output("@Total", "INT"))
        .body([
            set("@Total", add(var("@Count"), int(1))),
            if_then(gt(var("@Total"), int(10)), [ret_value(int(1))]),
        ]);
    let lowered = lower(&proc);
    assert_eq!(lowered.name, "Bump");
    assert_eq!(
        lowered.source,
        "// Bump is generated from the T-SQL procedure dbo.usp_Bump.
func Bump(ctx context.Context, count int32) (total int32, returnCode int32) {
\ttotal = count + 1
\tif total > 10 {
\t\treturn total, 1
\t}
\treturn total, 0
}
"
    );
    assert!(lowered.warnings.is_empty());
}

#[test]
fn test_delete_takes_db_handle_and_returns_err() {
    let proc = Procedure::new("usp_DeleteOrder")
        .param(Parameter::input("@OrderID", "INT"))
        .body([delete("Orders")
            .filter(eq(col("Id"), var("@OrderID")))
            .into_statement()]);
    let lowered = lower(&proc);
    assert_eq!(
        lowered.source,
        "// DeleteOrder is generated from the T-SQL procedure usp_DeleteOrder.
func DeleteOrder(ctx context.Context, db *sql.DB, orderID int32) (err error) {
\tif _, err = db.ExecContext(ctx, `DELETE FROM Orders WHERE Id = $1`, orderID); err != nil {
\t\treturn err
\t}
\treturn nil
}
"
    );
    assert!(lowered.imports.contains("database/sql"));
    assert!(lowered.imports.contains("context"));
}

#[test]
fn test_nested_declares_are_hoisted_to_entry() {
    let proc = Procedure::new("usp_Loop").body([
        declare_init("@i", "INT", int(0)),
        while_loop(
            lt(var("@i"), int(3)),
            [
                declare("@sq", "INT"),
                set("@sq", mul(var("@i"), var("@i"))),
                set("@i", add(var("@i"), int(1))),
            ],
        ),
    ]);
    assert_eq!(
        lower(&proc).source,
        "// Loop is generated from the T-SQL procedure usp_Loop.
func Loop(ctx context.Context) {
\tvar sq int32
\t_ = sq
\tvar i int32 = 0
\tfor i < 3 {
\t\tsq = i * i
\t\ti = i + 1
\t}
}
"
    );
}

#[test]
fn test_unread_local_is_blanked() {
    let proc = Procedure::new("usp_Noop").body([declare("@unused", "INT")]);
    assert_contains(&lower(&proc).source, "\tvar unused int32\n\t_ = unused\n");
}

#[test]
fn test_input_defaults_are_documented() {
    let proc = Procedure::new("usp_ListRecent")
        .param(Parameter::input("@Limit", "INT").with_default(int(10)))
        .param(Parameter::input("@Label", "VARCHAR(20)").with_default(text("none")))
        .body([print(var("@Label"))]);
    let source = lower(&proc).source;
    assert_contains(&source, "// Callers must pass every argument explicitly:\n");
    assert_contains(&source, "//   - limit defaults to 10\n");
    assert_contains(&source, "//   - label defaults to 'none'\n");
    assert_contains(&source, "func ListRecent(ctx context.Context, limit int32, label string) {");
}

#[test]
fn test_else_if_chain_collapses() {
    let proc = Procedure::new("usp_Classify")
        .param(Parameter::input("@n", "INT"))
        .body([if_else(
            eq(var("@n"), int(1)),
            [print(text("one"))],
            [if_else(
                eq(var("@n"), int(2)),
                [print(text("two"))],
                [print(text("many"))],
            )],
        )]);
    let lowered = lower(&proc);
    assert_contains(&lowered.source, "\tif n == 1 {\n\t\tlog.Println(\"one\")\n");
    assert_contains(&lowered.source, "\t} else if n == 2 {\n\t\tlog.Println(\"two\")\n");
    assert_contains(&lowered.source, "\t} else {\n\t\tlog.Println(\"many\")\n\t}\n");
    assert!(lowered.imports.contains("log"));
}

#[test]
fn test_print_uses_slog_with_log_hook() {
    let config = crate::config::LowerConfig::builder().log_hook(true).build();
    let proc = Procedure::new("usp_Hello")
        .param(Parameter::input("@Who", "NVARCHAR(50)"))
        .body([print(add(text("hello "), var("@Who")))]);
    let lowered = super::lower_with(&proc, &config);
    assert_contains(&lowered.source, "\tslog.DebugContext(ctx, \"Hello: enter\", \"who\", who)\n");
    assert_contains(&lowered.source, "\tslog.InfoContext(ctx, \"hello \" + who)\n");
    assert!(lowered.imports.contains("log/slog"));
}

#[test]
fn test_undeclared_variable_is_located() {
    let proc = Procedure::new("usp_Broken").body([
        declare("@n", "INT"),
        if_then(
            gt(var("@n"), int(0)),
            [print(text("positive")), set("@missing", int(1))],
        ),
    ]);
    let err = lower_err(&proc);
    assert_eq!(error_path(&err), "1.0.1");
    assert!(matches!(err.root(), LowerError::UndeclaredVariable(n) if n == "@missing"));
}

#[test]
fn test_break_outside_loop_is_rejected() {
    let proc = Procedure::new("usp_Break").body([print(text("x")), Statement::Break]);
    let err = lower_err(&proc);
    assert_eq!(error_path(&err), "1");
}

#[test]
fn test_dynamic_sql_is_rejected() {
    let proc = Procedure::new("usp_Dyn").body([Statement::ExecDynamic(text("SELECT 1"))]);
    let err = lower_err(&proc);
    assert!(matches!(err.root(), LowerError::Unsupported { construct, .. } if construct == "dynamic SQL"));
}

#[test]
fn test_render_file_merges_imports() {
    let a = lower(&Procedure::new("usp_A").body([print(text("a"))]));
    let b = lower(
        &Procedure::new("usp_B").body([delete("Logs").into_statement()]),
    );
    let file = render_file("procedures", &[a, b]);
    assert!(file.starts_with("// Code generated by tsql2go. DO NOT EDIT.\n\npackage procedures\n\nimport (\n"));
    assert_contains(&file, "\t\"context\"\n\t\"database/sql\"\n\t\"log\"\n)\n");
    assert_contains(&file, "\n// A is generated from the T-SQL procedure usp_A.\n");
    assert_contains(&file, "\n// B is generated from the T-SQL procedure usp_B.\n");
}

#[test]
fn test_null_initializer_is_zero_value() {
    let proc = Procedure::new("usp_Count").body([
        declare_init("@n", "INT", null()),
        declare_init("@total", "DECIMAL(18,2)", null()),
        print(var("@n")),
        print(var("@total")),
    ]);
    let source = lower(&proc).source;
    assert_contains(&source, "\tvar n int32 = 0\n");
    assert_contains(&source, "\tvar total decimal.Decimal = decimal.Zero\n");
    assert!(!source.contains("nil"));
}

#[test]
fn test_integer_literals_adapt_to_decimal_and_bit() {
    let proc = Procedure::new("usp_Price").body([
        declare_init("@price", "DECIMAL(10,2)", int(5)),
        declare_init("@active", "BIT", int(1)),
        set("@price", add(var("@price"), int(1))),
        set("@active", int(0)),
    ]);
    let lowered = lower(&proc);
    assert_contains(&lowered.source, "\tvar price decimal.Decimal = decimal.NewFromInt(5)\n");
    assert_contains(&lowered.source, "\tvar active bool = true\n\t_ = active\n");
    assert_contains(&lowered.source, "\tprice = price.Add(decimal.NewFromInt(1))\n");
    assert_contains(&lowered.source, "\tactive = false\n");
    assert!(lowered.imports.contains("github.com/shopspring/decimal"));
}

#[test]
fn test_euclid_swaps_once_then_loops() {
    let proc = Procedure::new("usp_Gcd")
        .param(Parameter::input("@a", "INT"))
        .param(Parameter::input("@b", "INT"))
        .param(Parameter::output("@result", "INT"))
        .body([
            declare("@t", "INT"),
            if_then(
                lt(var("@a"), var("@b")),
                [set("@t", var("@a")), set("@a", var("@b")), set("@b", var("@t"))],
            ),
            while_loop(
                ne(var("@b"), int(0)),
                [
                    set("@t", var("@b")),
                    set("@b", modulo(var("@a"), var("@b"))),
                    set("@a", var("@t")),
                ],
            ),
            set("@result", var("@a")),
        ]);
    let source = lower(&proc).source;
    assert_contains(
        &source,
        "\tvar t int32
\tif a < b {
\t\tt = a
\t\ta = b
\t\tb = t
\t}
\tfor b != 0 {
\t\tt = b
\t\tb = a % b
\t\ta = t
\t}
\tresult = a
",
    );
    assert_eq!(source.matches("\tif ").count(), 1);
    assert_eq!(source.matches("\tfor ").count(), 1);
}

#[test]
fn test_else_if_with_query_condition_nests_in_else() {
    let proc = Procedure::new("usp_Route")
        .param(Parameter::input("@n", "INT"))
        .body([if_else(
            eq(var("@n"), int(1)),
            [print(text("one"))],
            [if_else(
                exists(select([int(1)]).from("Orders").filter(eq(col("CustomerID"), var("@n")))),
                [print(text("ordered"))],
                [print(text("none"))],
            )],
        )]);
    let source = lower(&proc).source;
    // The EXISTS query only runs once the first condition has failed.
    assert_contains(&source, "\tif n == 1 {\n\t\tlog.Println(\"one\")\n\t} else {\n\t\tvar exists1 bool\n");
    assert_contains(
        &source,
        "\t\tif exists1 {\n\t\t\tlog.Println(\"ordered\")\n\t\t} else {\n\t\t\tlog.Println(\"none\")\n\t\t}\n\t}\n",
    );
    assert!(!source.contains("else if"));
}
