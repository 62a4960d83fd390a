use crate::transpiler::traits::{escape_identifier_with, SqlGenerator};

/// MySQL Generator.
pub struct MysqlGenerator;

impl MysqlGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for MysqlGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier_with(name, &|part| format!("`{}`", part.replace('`', "``")))
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn current_timestamp(&self) -> &str {
        "NOW()"
    }

    fn length_function(&self) -> &str {
        // LENGTH counts bytes in MySQL; LEN counts characters.
        "CHAR_LENGTH"
    }

    fn cast_type(&self, tsql_type: &str) -> String {
        // MySQL CAST only accepts a narrow set of target names.
        let upper = tsql_type.to_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();
        match base {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" => "SIGNED".to_string(),
            "VARCHAR" | "NVARCHAR" | "NCHAR" | "TEXT" => "CHAR".to_string(),
            "DATETIME2" | "SMALLDATETIME" => "DATETIME".to_string(),
            "MONEY" => "DECIMAL(19, 4)".to_string(),
            _ => upper,
        }
    }
}
