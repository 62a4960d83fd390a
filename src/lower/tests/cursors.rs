//! Cursor loops over `database/sql` rows and the mock store.

use pretty_assertions::assert_eq;

use super::{assert_contains, error_path, lower, lower_err, lower_with};
use crate::ast::builders::*;
use crate::ast::{FetchDirection, Procedure};
use crate::config::{BackendKind, LowerConfig};
use crate::error::LowerError;

fn order_cursor() -> Vec<crate::ast::Statement> {
    vec![
        declare("@id", "INT"),
        declare_cursor("c", select([col("Id")]).from("Orders")),
        open("c"),
    ]
}

#[test]
fn test_fetch_status_loop_becomes_range_over_rows() {
    let mut body = order_cursor();
    body.extend([
        fetch_next("c", ["@id"]),
        while_loop(
            eq(fetch_status(), int(0)),
            [print(text("row")), fetch_next("c", ["@id"])],
        ),
        close("c"),
        deallocate("c"),
    ]);
    let proc = Procedure::new("usp_ScanOrders").body(body);
    assert_eq!(
        lower(&proc).source,
        "// ScanOrders is generated from the T-SQL procedure usp_ScanOrders.
func ScanOrders(ctx context.Context, db *sql.DB) (err error) {
\tvar id int32
\tcRows, err := db.QueryContext(ctx, `SELECT Id FROM Orders`)
\tif err != nil {
\t\treturn err
\t}
\tdefer cRows.Close()
\tfor cRows.Next() {
\t\tif err = cRows.Scan(&id); err != nil {
\t\t\treturn err
\t\t}
\t\tlog.Println(\"row\")
\t}
\tif err = cRows.Err(); err != nil {
\t\treturn err
\t}
\treturn nil
}
"
    );
}

#[test]
fn test_compound_loop_condition_breaks_early() {
    let mut body = order_cursor();
    body.extend([
        declare_init("@seen", "INT", int(0)),
        fetch_next("c", ["@id"]),
        while_loop(
            and(eq(fetch_status(), int(0)), lt(var("@seen"), int(5))),
            [
                set("@seen", add(var("@seen"), int(1))),
                fetch_next("c", ["@id"]),
            ],
        ),
    ]);
    let source = lower(&Procedure::new("usp_FirstFive").body(body)).source;
    assert_contains(
        &source,
        "\tfor cRows.Next() {\n\t\tif err = cRows.Scan(&id); err != nil {\n\t\t\treturn err\n\t\t}\n\t\tif !(seen < 5) {\n\t\t\tbreak\n\t\t}\n\t\tseen = seen + 1\n\t}\n",
    );
}

#[test]
fn test_loop_without_priming_fetch_uses_body_fetch() {
    let mut body = order_cursor();
    body.push(while_loop(
        eq(fetch_status(), int(0)),
        [fetch_next("c", ["@id"]), print(text("row"))],
    ));
    let source = lower(&Procedure::new("usp_Drain").body(body)).source;
    assert_contains(&source, "\tfor cRows.Next() {\n\t\tif err = cRows.Scan(&id); err != nil {\n");
    assert_eq!(source.matches(".Scan(").count(), 1);
}

#[test]
fn test_standalone_fetch_reads_one_row() {
    let mut body = order_cursor();
    body.push(fetch_next("c", ["@id"]));
    let source = lower(&Procedure::new("usp_First").body(body)).source;
    assert_contains(
        &source,
        "\tif cRows.Next() {\n\t\tif err = cRows.Scan(&id); err != nil {\n\t\t\treturn err\n\t\t}\n\t}\n",
    );
}

#[test]
fn test_mock_cursor_lists_from_store() {
    let config = LowerConfig::builder().backend(BackendKind::Mock).build();
    let mut body = order_cursor();
    body.extend([
        fetch_next("c", ["@id"]),
        while_loop(eq(fetch_status(), int(0)), [fetch_next("c", ["@id"])]),
    ]);
    let lowered = lower_with(&Procedure::new("usp_Walk").body(body), &config);
    assert_contains(&lowered.source, "func Walk(ctx context.Context, store *mockstore.Store) (err error) {");
    assert_contains(
        &lowered.source,
        "\tcRows, err := store.ListOrders(ctx, &mockstore.ListOrdersRequest{})\n",
    );
    assert!(lowered.imports.contains("example.com/app/internal/mockstore"));
}

#[test]
fn test_fetch_on_unopened_cursor_is_rejected() {
    let proc = Procedure::new("usp_Early").body([
        declare("@id", "INT"),
        declare_cursor("c", select([col("Id")]).from("Orders")),
        fetch_next("c", ["@id"]),
    ]);
    let err = lower_err(&proc);
    assert_eq!(error_path(&err), "2");
    assert!(matches!(err.root(), LowerError::Cursor { cursor, .. } if cursor == "c"));
}

#[test]
fn test_non_next_fetch_is_rejected() {
    let mut body = order_cursor();
    body.push(fetch("c", FetchDirection::Prior, ["@id"]));
    let err = lower_err(&Procedure::new("usp_Back").body(body));
    assert!(matches!(err.root(), LowerError::Unsupported { construct, .. } if construct == "FETCH PRIOR"));
}

#[test]
fn test_double_close_is_rejected() {
    let mut body = order_cursor();
    body.extend([close("c"), close("c")]);
    let err = lower_err(&Procedure::new("usp_Twice").body(body));
    assert_eq!(error_path(&err), "4");
}

#[test]
fn test_rpc_cursor_is_rejected() {
    let config = LowerConfig::builder().backend(BackendKind::Rpc).build();
    let proc = Procedure::new("usp_Remote").body(order_cursor());
    let err = crate::lower::lower_procedure(&proc, &config).unwrap_err();
    assert_eq!(error_path(&err), "1");
}

#[test]
fn test_priming_fetch_is_held_across_unrelated_statements() {
    let mut body = order_cursor();
    body.extend([
        declare("@n", "INT"),
        fetch_next("c", ["@id"]),
        set("@n", int(0)),
        while_loop(
            eq(fetch_status(), int(0)),
            [set("@n", add(var("@n"), int(1))), fetch_next("c", ["@id"])],
        ),
    ]);
    let source = lower(&Procedure::new("usp_CountRows").body(body)).source;
    assert_contains(&source, "\tn = 0\n\tfor cRows.Next() {\n\t\tif err = cRows.Scan(&id); err != nil {\n");
    assert!(!source.contains("if cRows.Next() {"));
    assert_eq!(source.matches(".Scan(").count(), 1);
}

#[test]
fn test_reading_fetched_row_before_loop_is_rejected() {
    let mut body = order_cursor();
    body.extend([
        declare("@n", "INT"),
        fetch_next("c", ["@id"]),
        set("@n", var("@id")),
        while_loop(eq(fetch_status(), int(0)), [fetch_next("c", ["@id"])]),
    ]);
    let err = lower_err(&Procedure::new("usp_Peek").body(body));
    assert_eq!(error_path(&err), "4");
    assert!(matches!(err.root(), LowerError::Cursor { cursor, .. } if cursor == "c"));
}

#[test]
fn test_cursor_opened_in_try_is_iterated_after_it() {
    let proc = Procedure::new("usp_GuardedScan").body([
        declare("@id", "INT"),
        declare_cursor("c", select([col("Id")]).from("Orders")),
        try_catch([open("c")], [print(text("open failed"))]),
        fetch_next("c", ["@id"]),
        while_loop(
            eq(fetch_status(), int(0)),
            [print(text("row")), fetch_next("c", ["@id"])],
        ),
    ]);
    let source = lower(&proc).source;
    assert_contains(
        &source,
        "\tvar cRows *sql.Rows
\tdefer func() {
\t\tif cRows != nil {
\t\t\t_ = cRows.Close()
\t\t}
\t}()
\tvar id int32
",
    );
    assert_contains(
        &source,
        "\t\tcRows, err = db.QueryContext(ctx, `SELECT Id FROM Orders`)\n\t\tif err != nil {\n\t\t\tpanic(err)\n\t\t}\n\t}()\n\tfor cRows.Next() {\n",
    );
    assert!(!source.contains("defer cRows.Close()"));
    assert!(!source.contains("cRows, err :="));
}

#[test]
fn test_cursor_opened_in_branch_is_declared_at_entry() {
    let proc = Procedure::new("usp_MaybeScan")
        .param(crate::ast::Parameter::input("@mode", "INT"))
        .body([
            declare("@id", "INT"),
            declare_cursor("c", select([col("Id")]).from("Orders")),
            if_then(eq(var("@mode"), int(1)), [open("c")]),
            fetch_next("c", ["@id"]),
        ]);
    let source = lower(&proc).source;
    assert_contains(&source, "\tvar cRows *sql.Rows\n\tvar id int32\n");
    assert_contains(
        &source,
        "\tif mode == 1 {\n\t\tcRows, err = db.QueryContext(ctx, `SELECT Id FROM Orders`)\n",
    );
    assert_contains(&source, "\t\tdefer cRows.Close()\n\t}\n\tif cRows.Next() {\n");
}
