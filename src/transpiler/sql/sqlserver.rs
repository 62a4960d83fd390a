use crate::transpiler::traits::{escape_identifier_with, SqlGenerator};

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn quote_identifier(&self, name: &str) -> String {
        escape_identifier_with(name, &|part| format!("[{}]", part.replace(']', "]]")))
    }

    fn placeholder(&self, index: usize) -> String {
        // go-mssqldb binds positional args as @p1, @p2, ...
        format!("@p{}", index)
    }

    fn bool_literal(&self, val: bool) -> String {
        if val { "1".to_string() } else { "0".to_string() }
    }

    fn string_concat(&self, parts: &[String]) -> String {
        parts.join(" + ")
    }

    fn leading_top(&self) -> bool {
        true
    }

    fn top_prefix(&self, n: &str) -> Option<String> {
        Some(format!("TOP ({}) ", n))
    }

    fn limit_suffix(&self, _n: &str) -> String {
        String::new()
    }

    fn current_timestamp(&self) -> &str {
        "GETDATE()"
    }

    fn length_function(&self) -> &str {
        "LEN"
    }

    fn call_procedure(&self, name: &str, args: &[String]) -> String {
        if args.is_empty() {
            format!("EXEC {}", self.quote_identifier(name))
        } else {
            format!("EXEC {} {}", self.quote_identifier(name), args.join(", "))
        }
    }

    fn named_argument(&self, name: &str, value: &str) -> String {
        format!("{} = {}", name, value)
    }

    fn temp_table_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn exists_probe(&self, inner: &str) -> String {
        format!("SELECT CASE WHEN EXISTS ({}) THEN 1 ELSE 0 END", inner)
    }
}
