use crate::transpiler::escape_identifier;
use crate::transpiler::traits::SqlGenerator;

pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" || ")
    }

    fn cast_type(&self, tsql_type: &str) -> String {
        let upper = tsql_type.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "INT" | "BIGINT" | "SMALLINT" | "TINYINT" | "BIT" => "INTEGER".to_string(),
            "DECIMAL" | "NUMERIC" | "MONEY" => "NUMERIC".to_string(),
            "FLOAT" | "REAL" => "REAL".to_string(),
            _ => "TEXT".to_string(),
        }
    }
}
