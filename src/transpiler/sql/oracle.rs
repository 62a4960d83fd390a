use super::super::traits::{escape_identifier_with, SqlGenerator};

pub struct OracleGenerator;

impl SqlGenerator for OracleGenerator {
    fn quote_identifier(&self, id: &str) -> String {
        // Oracle standardly uses double quotes for case-sensitive identifiers
        escape_identifier_with(id, &|part| format!("\"{}\"", part.replace('"', "\"\"")))
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":p{}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        // Oracle has no BOOLEAN type in SQL (only PL/SQL).
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" || ")
    }

    fn limit_suffix(&self, n: &str) -> String {
        // Oracle 12c+ syntax
        format!(" FETCH FIRST {} ROWS ONLY", n)
    }

    fn current_timestamp(&self) -> &str {
        "SYSTIMESTAMP"
    }

    fn exists_probe(&self, inner: &str) -> String {
        format!("SELECT CASE WHEN EXISTS ({}) THEN 1 ELSE 0 END FROM DUAL", inner)
    }

    fn cast_type(&self, tsql_type: &str) -> String {
        let upper = tsql_type.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "BIT" => "NUMBER".to_string(),
            "VARCHAR" | "NVARCHAR" => upper.replacen(base, "VARCHAR2", 1),
            "DATETIME" | "DATETIME2" | "SMALLDATETIME" => "TIMESTAMP".to_string(),
            _ => upper,
        }
    }
}
