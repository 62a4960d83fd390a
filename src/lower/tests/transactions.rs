//! Transaction scope and `@@TRANCOUNT`.

use pretty_assertions::assert_eq;

use super::{assert_contains, error_path, lower, lower_err};
use crate::ast::builders::*;
use crate::ast::{GlobalVar, Procedure, Statement};
use crate::error::LowerError;

#[test]
fn test_begin_commit_routes_dml_through_tx() {
    let proc = Procedure::new("usp_Settle").body([
        begin_tran(),
        update("Orders").set("Status", int(2)).into_statement(),
        commit(),
    ]);
    assert_eq!(
        lower(&proc).source,
        "// Settle is generated from the T-SQL procedure usp_Settle.
func Settle(ctx context.Context, db *sql.DB) (err error) {
\tvar tx *sql.Tx
\tif tx, err = db.BeginTx(ctx, nil); err != nil {
\t\treturn err
\t}
\tdefer func() {
\t\tif err != nil && tx != nil {
\t\t\t_ = tx.Rollback()
\t\t\ttx = nil
\t\t}
\t}()
\tif _, err = tx.ExecContext(ctx, `UPDATE Orders SET Status = 2`); err != nil {
\t\treturn err
\t}
\tif err = tx.Commit(); err != nil {
\t\treturn err
\t}
\ttx = nil
\treturn nil
}
"
    );
}

#[test]
fn test_dml_after_commit_uses_db_again() {
    let proc = Procedure::new("usp_Split").body([
        begin_tran(),
        delete("Staging").into_statement(),
        commit(),
        delete("Archive").into_statement(),
    ]);
    let source = lower(&proc).source;
    assert_contains(&source, "tx.ExecContext(ctx, `DELETE FROM Staging`)");
    assert_contains(&source, "db.ExecContext(ctx, `DELETE FROM Archive`)");
}

#[test]
fn test_trancount_inside_and_outside() {
    let proc = Procedure::new("usp_Count").body([
        declare("@n", "INT"),
        set("@n", global(GlobalVar::TranCount)),
        begin_tran(),
        set("@n", global(GlobalVar::TranCount)),
        rollback(),
        print(cast(var("@n"), "VARCHAR(10)")),
    ]);
    let source = lower(&proc).source;
    assert_contains(&source, "\tn = 0\n");
    assert_contains(&source, "\tn = 1\n");
    assert_contains(&source, "\tif err = tx.Rollback(); err != nil {\n");
}

#[test]
fn test_catch_after_transactional_try_checks_tx() {
    let proc = Procedure::new("usp_Guarded").body([try_catch(
        [
            begin_tran(),
            delete("Orders").into_statement(),
            commit(),
        ],
        [rollback()],
    )]);
    let source = lower(&proc).source;
    assert_contains(
        &source,
        "\t\t\t\tif tx != nil {\n\t\t\t\t\tif err = tx.Rollback(); err != nil {\n",
    );
}

#[test]
fn test_commit_without_begin_is_rejected() {
    let err = lower_err(&Procedure::new("usp_Stray").body([print(text("x")), commit()]));
    assert_eq!(error_path(&err), "1");
    assert!(matches!(err.root(), LowerError::Transaction(_)));
}

#[test]
fn test_nested_begin_is_rejected() {
    let err = lower_err(&Procedure::new("usp_Nested").body([begin_tran(), begin_tran()]));
    assert_eq!(error_path(&err), "1");
    assert!(matches!(err.root(), LowerError::Transaction(_)));
}

#[test]
fn test_savepoint_is_rejected() {
    let err = lower_err(&Procedure::new("usp_Save").body([
        begin_tran(),
        Statement::SaveTransaction("sp1".to_string()),
    ]));
    assert!(matches!(err.root(), LowerError::Transaction(m) if m.contains("sp1")));
}
