use pretty_assertions::assert_eq;
use tsql2go::prelude::*;

const DELETE_ORDER: &str = r#"{
    "name": "usp_DeleteOrder",
    "params": [{ "name": "@OrderID", "type": "INT" }],
    "body": [{
        "delete": {
            "table": { "name": "Orders" },
            "where": {
                "binary": {
                    "op": "eq",
                    "left": { "column": { "name": "Id" } },
                    "right": { "variable": "@OrderID" }
                }
            }
        }
    }]
}"#;

const BUMP: &str = r#"{
    "name": "dbo.usp_Bump",
    "params": [
        { "name": "@Count", "type": "INT" },
        { "name": "@Total", "type": "INT", "direction": "out" }
    ],
    "body": [
        { "set": {
            "variable": "@Total",
            "value": { "binary": {
                "op": "add",
                "left": { "variable": "@Count" },
                "right": { "literal": { "int": 1 } }
            } }
        } },
        { "if": {
            "condition": { "binary": {
                "op": "gt",
                "left": { "variable": "@Total" },
                "right": { "literal": { "int": 10 } }
            } },
            "then_branch": [{ "return": { "literal": { "int": 1 } } }]
        } }
    ]
}"#;

fn parse(json: &str) -> Procedure {
    serde_json::from_str(json).expect("procedure JSON")
}

#[test]
fn test_json_procedure_lowers_like_builder_form() {
    let from_json = parse(DELETE_ORDER);
    let built = Procedure::new("usp_DeleteOrder")
        .param(Parameter::input("@OrderID", "INT"))
        .body([delete("Orders")
            .filter(eq(col("Id"), var("@OrderID")))
            .into_statement()]);
    assert_eq!(from_json, built);

    let lowered = lower_procedure(&from_json, &LowerConfig::default()).unwrap();
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
}

#[test]
fn test_lower_file_renders_package_and_imports() {
    let procs = [parse(BUMP), parse(DELETE_ORDER)];
    let (file, warnings) = tsql2go::lower_file(&procs, &LowerConfig::default()).unwrap();
    assert!(warnings.is_empty());
    assert!(file.starts_with("// Code generated by tsql2go. DO NOT EDIT.\n\npackage procedures\n"));
    assert!(file.contains("\t\"context\"\n\t\"database/sql\"\n)\n"));
    assert!(file.contains(
        "func Bump(ctx context.Context, count int32) (total int32, returnCode int32) {\n"
    ));
    assert!(file.contains("func DeleteOrder("));
    assert!(file.find("func Bump(").unwrap() < file.find("func DeleteOrder(").unwrap());
}

#[test]
fn test_toml_config_selects_backend() {
    let config = LowerConfig::from_toml_str(
        r#"
        backend = "rpc"
        package = "orders"
        "#,
    )
    .unwrap();
    assert_eq!(config.backend, BackendKind::Rpc);

    let (file, _) = tsql2go::lower_file(&[parse(DELETE_ORDER)], &config).unwrap();
    assert!(file.contains("package orders\n"));
    assert!(file.contains("orderClient pb.OrderServiceClient"));
    assert!(file.contains("orderClient.DeleteOrder(ctx, &pb.DeleteOrderRequest{"));
    assert!(!file.contains("database/sql"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = LowerConfig::from_toml_str(r#"fallback_backend = "rpc""#).unwrap_err();
    assert!(matches!(err, LowerError::InvalidConfig(_)));

    let err = LowerConfig::from_toml_str(r#"backend = "grpc""#).unwrap_err();
    assert!(matches!(err, LowerError::Toml(_)));
}

#[test]
fn test_error_names_procedure_and_statement() {
    let json = r#"{
        "name": "usp_Bad",
        "body": [{ "print": { "variable": "@missing" } }]
    }"#;
    let err = lower_procedure(&parse(json), &LowerConfig::default()).unwrap_err();
    assert!(matches!(err.root(), LowerError::UndeclaredVariable(v) if v == "@missing"));
    assert!(err.to_string().starts_with("usp_Bad: statement 0: "));
}
