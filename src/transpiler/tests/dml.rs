//! Statement shape tests.

use super::TestResolver;
use crate::ast::builders::*;
use crate::ast::JoinKind;
use crate::ast::TableRef;
use crate::transpiler::{build_exec, build_exists_probe, is_single_row, Dialect, ToQuery};

#[test]
fn test_select_with_join_group_and_order() {
    let q = select([qcol("c", "Name"), func("SUM", [qcol("o", "Total")])])
        .from_as("Customers", "c")
        .join(
            JoinKind::Left,
            TableRef::new("Orders").alias("o"),
            eq(qcol("o", "CustomerID"), qcol("c", "CustomerID")),
        )
        .filter(gte(qcol("o", "Total"), var("MinTotal")))
        .group_by(qcol("c", "Name"))
        .order_by(qcol("c", "Name"), true);
    let r = q.to_query(Dialect::Postgres, &TestResolver).unwrap();
    assert_eq!(
        r.sql,
        "SELECT c.Name, SUM(o.Total) FROM Customers c LEFT JOIN Orders o \
         ON o.CustomerID = c.CustomerID WHERE o.Total >= $1 GROUP BY c.Name ORDER BY c.Name DESC"
    );
    assert_eq!(r.args, vec!["mintotal"]);
}

#[test]
fn test_precedence_parenthesizes_or_under_and() {
    let q = delete("Orders").filter(and(
        or(eq(col("Status"), int(1)), eq(col("Status"), int(2))),
        lt(col("Total"), var("Limit")),
    ));
    assert_eq!(
        q.to_query(Dialect::Sqlite, &TestResolver).unwrap().sql,
        "DELETE FROM Orders WHERE (Status = 1 OR Status = 2) AND Total < ?"
    );
}

#[test]
fn test_insert_select_and_in_list() {
    let q = insert("Archive").columns(["Id", "Total"]).from_select(
        select([col("Id"), col("Total")])
            .from("Orders")
            .filter(in_list(col("Status"), [int(3), var("Extra")]))
            .filter(between(col("Total"), int(0), var("Cap"))),
    );
    let r = q.to_query(Dialect::Postgres, &TestResolver).unwrap();
    assert_eq!(
        r.sql,
        "INSERT INTO Archive (Id, Total) SELECT Id, Total FROM Orders \
         WHERE Status IN (3, $1) AND Total BETWEEN 0 AND $2"
    );
    assert_eq!(r.args, vec!["extra", "cap"]);
}

#[test]
fn test_placeholder_count_matches_args() {
    let q = insert("Orders")
        .columns(["A", "B", "C"])
        .values([var("A"), var("B"), int(1)])
        .values([var("A"), text("x"), var("C")]);
    for dialect in Dialect::ALL {
        let r = q.to_query(dialect, &TestResolver).unwrap();
        assert_eq!(r.args.len(), 4, "{}", dialect);
        let bound = match dialect {
            Dialect::MySql | Dialect::Sqlite => r.sql.matches('?').count(),
            Dialect::Postgres => r.sql.matches('$').count(),
            Dialect::SqlServer => r.sql.matches("@p").count(),
            Dialect::Oracle => r.sql.matches(":p").count(),
        };
        assert_eq!(bound, r.args.len(), "{}", dialect);
    }
}

#[test]
fn test_scope_identity_binds_go_value() {
    let q = insert("OrderLines")
        .columns(["OrderID"])
        .values([func("SCOPE_IDENTITY", [])]);
    // No intrinsic resolver: falls through as a plain SQL function.
    let r = q.to_query(Dialect::Postgres, &TestResolver).unwrap();
    assert_eq!(r.sql, "INSERT INTO OrderLines (OrderID) VALUES (SCOPE_IDENTITY())");

    let q = insert("OrderLines")
        .columns(["OrderID"])
        .values([global(crate::ast::GlobalVar::Identity)]);
    let r = q.to_query(Dialect::Postgres, &TestResolver).unwrap();
    assert_eq!(r.sql, "INSERT INTO OrderLines (OrderID) VALUES ($1)");
    assert_eq!(r.args, vec!["lastInsertID"]);
}

#[test]
fn test_exec_call_syntax() {
    let e = exec("dbo.usp_Recalc").arg(var("Id")).output_arg("Total");
    let generator = Dialect::Postgres.generator();
    let r = build_exec(&e, generator.as_ref(), &TestResolver).unwrap();
    assert_eq!(r.sql, "CALL dbo.usp_Recalc($1, $2)");
    assert_eq!(r.args, vec!["id", "total"]);

    let e = exec("usp_Recalc").named_arg("@OrderID", var("Id"));
    let generator = Dialect::SqlServer.generator();
    let r = build_exec(&e, generator.as_ref(), &TestResolver).unwrap();
    assert_eq!(r.sql, "EXEC usp_Recalc @OrderID = @p1");
}

#[test]
fn test_exists_probe() {
    let inner = select([int(1)])
        .from("Orders")
        .filter(eq(col("CustomerID"), var("Id")));
    let pg = Dialect::Postgres.generator();
    let r = build_exists_probe(&inner, pg.as_ref(), &TestResolver).unwrap();
    assert_eq!(r.sql, "SELECT EXISTS (SELECT 1 FROM Orders WHERE CustomerID = $1)");
    let ora = Dialect::Oracle.generator();
    let r = build_exists_probe(&inner, ora.as_ref(), &TestResolver).unwrap();
    assert_eq!(
        r.sql,
        "SELECT CASE WHEN EXISTS (SELECT 1 FROM Orders WHERE CustomerID = :p1) THEN 1 ELSE 0 END FROM DUAL"
    );
}

#[test]
fn test_single_row_heuristic() {
    assert!(is_single_row(&select([star()]).from("Orders").top(1)));
    assert!(is_single_row(
        &select([star()]).from("Orders").filter(eq(col("OrderID"), var("Id")))
    ));
    assert!(is_single_row(
        &select([star()]).from("Orders").filter(eq(col("id"), int(3)))
    ));
    // Join-style equality between two columns is not a key lookup.
    assert!(!is_single_row(
        &select([star()]).from("Orders").filter(eq(col("CustomerID"), col("OwnerID")))
    ));
    assert!(!is_single_row(
        &select([star()]).from("Orders").filter(eq(col("Status"), int(1)))
    ));
    assert!(!is_single_row(
        &select([star()])
            .from("Orders")
            .filter(eq(col("OrderID"), var("Id")))
            .filter(eq(col("Status"), int(1)))
    ));
}
