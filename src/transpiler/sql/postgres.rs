use crate::transpiler::escape_identifier;
use crate::transpiler::traits::SqlGenerator;

pub struct PostgresGenerator;

impl Default for PostgresGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for PostgresGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier(name)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val {
            "true".to_string()
        } else {
            "false".to_string()
        }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" || ")
    }

    fn current_timestamp(&self) -> &str {
        "NOW()"
    }

    fn cast_type(&self, tsql_type: &str) -> String {
        let upper = tsql_type.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "NVARCHAR" | "NCHAR" | "VARCHAR" if upper.contains("MAX") => "TEXT".to_string(),
            "NVARCHAR" => upper.replacen("NVARCHAR", "VARCHAR", 1),
            "NCHAR" => upper.replacen("NCHAR", "CHAR", 1),
            "DATETIME" | "DATETIME2" | "SMALLDATETIME" => "TIMESTAMP".to_string(),
            "BIT" => "BOOLEAN".to_string(),
            "TINYINT" => "SMALLINT".to_string(),
            "UNIQUEIDENTIFIER" => "UUID".to_string(),
            "MONEY" => "NUMERIC(19, 4)".to_string(),
            _ => tsql_type.to_string(),
        }
    }
}
