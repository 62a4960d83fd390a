//! TRY/CATCH, THROW and RAISERROR.

use pretty_assertions::assert_eq;

use super::{assert_contains, error_path, lower, lower_err};
use crate::ast::builders::*;
use crate::ast::Procedure;
use crate::diagnostics::WarningKind;
use crate::error::LowerError;

#[test]
fn test_try_catch_recovers_into_handler() {
    let proc = Procedure::new("usp_SafeDelete").body([try_catch(
        [delete("Orders").into_statement()],
        [print(func("ERROR_MESSAGE", []))],
    )]);
    let lowered = lower(&proc);
    assert_eq!(
        lowered.source,
        "// SafeDelete is generated from the T-SQL procedure usp_SafeDelete.
func SafeDelete(ctx context.Context, db *sql.DB) (err error) {
\tfunc() {
\t\tdefer func() {
\t\t\tif r := recover(); r != nil {
\t\t\t\tcaught, ok := r.(error)
\t\t\t\tif !ok {
\t\t\t\t\tcaught = fmt.Errorf(\"%v\", r)
\t\t\t\t}
\t\t\t\terr = nil
\t\t\t\tlog.Println(caught.Error())
\t\t\t}
\t\t}()
\t\tif _, err = db.ExecContext(ctx, `DELETE FROM Orders`); err != nil {
\t\t\tpanic(err)
\t\t}
\t}()
\treturn nil
}
"
    );
    assert!(lowered.imports.contains("fmt"));
}

#[test]
fn test_rethrow_from_catch_surfaces_after_block() {
    let proc = Procedure::new("usp_Strict").body([try_catch(
        [delete("Orders").into_statement()],
        [rethrow()],
    )]);
    let source = lower(&proc).source;
    assert_contains(&source, "\t\t\t\terr = caught\n\t\t\t\treturn\n");
    assert_contains(&source, "\t}()\n\tif err != nil {\n\t\treturn err\n\t}\n\treturn nil\n}\n");
}

#[test]
fn test_return_inside_try_leaves_the_procedure() {
    let proc = Procedure::new("usp_Early").body([
        try_catch([ret_value(int(5))], [print(text("failed"))]),
        print(text("after")),
    ]);
    let source = lower(&proc).source;
    assert_contains(&source, "\tvar returned bool\n\tfunc() {\n");
    assert_contains(&source, "\t\treturnCode = 5\n\t\treturned = true\n\t\treturn\n\t}()\n");
    assert_contains(&source, "\tif returned {\n\t\treturn returnCode\n\t}\n\tlog.Println(\"after\")\n");
    assert!(!source.contains("err = nil"));
    assert!(!source.contains("caught"));
}

#[test]
fn test_throw_with_arguments_returns_error() {
    let proc = Procedure::new("usp_Reject").body([throw(int(50001), text("rejected"), int(1))]);
    let source = lower(&proc).source;
    assert_contains(&source, "\treturn fmt.Errorf(\"%d: %s\", 50001, \"rejected\")\n}\n");
}

#[test]
fn test_raiserror_by_severity() {
    let proc = Procedure::new("usp_Raise").body([
        raiserror(text("note"), int(10), int(1)),
        raiserror(text("bad"), int(16), int(1)),
    ]);
    let lowered = lower(&proc);
    assert_contains(&lowered.source, "\tlog.Println(\"note\")\n\treturn errors.New(\"bad\")\n");
    assert!(lowered.imports.contains("errors"));
}

#[test]
fn test_bare_throw_outside_catch_is_rejected() {
    let err = lower_err(&Procedure::new("usp_Throw").body([rethrow()]));
    assert_eq!(error_path(&err), "0");
    assert!(matches!(err.root(), LowerError::Unsupported { construct, .. } if construct == "THROW"));
}

#[test]
fn test_return_inside_catch_warns() {
    let proc = Procedure::new("usp_Swallow").body([try_catch(
        [delete("Orders").into_statement()],
        [ret()],
    )]);
    let lowered = lower(&proc);
    assert_eq!(lowered.warnings.len(), 1);
    assert_eq!(lowered.warnings[0].kind, WarningKind::Approximation);
    assert_eq!(lowered.warnings[0].path, "0.1.0");
    assert_contains(&lowered.source, "log.Print(\"Swallow: RETURN inside CATCH ignored\")");
}

#[test]
fn test_failed_statement_in_catch_is_logged_not_returned() {
    let proc = Procedure::new("usp_Audit").body([try_catch(
        [delete("Orders").into_statement()],
        [delete("AuditQueue").into_statement(), print(text("handled"))],
    )]);
    let source = lower(&proc).source;
    assert_contains(
        &source,
        "\t\t\t\tif _, err = db.ExecContext(ctx, `DELETE FROM AuditQueue`); err != nil {
\t\t\t\t\tlog.Printf(\"Audit: error ignored in CATCH block: %v\", err)
\t\t\t\t\terr = nil
\t\t\t\t}
\t\t\t\tlog.Println(\"handled\")
",
    );
    assert!(!source.contains("\t\t\t\t\treturn"));
}
