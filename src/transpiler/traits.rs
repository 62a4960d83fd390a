//! Transpiler traits and utilities.

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "order",
    "group",
    "user",
    "table",
    "select",
    "from",
    "where",
    "join",
    "left",
    "right",
    "inner",
    "outer",
    "on",
    "and",
    "or",
    "not",
    "null",
    "true",
    "false",
    "limit",
    "offset",
    "as",
    "in",
    "is",
    "like",
    "between",
    "having",
    "union",
    "all",
    "distinct",
    "case",
    "when",
    "then",
    "else",
    "end",
    "create",
    "alter",
    "drop",
    "insert",
    "update",
    "delete",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
];

/// Whether an identifier part must be quoted in query text.
pub fn needs_quoting(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(false)
}

/// Strip T-SQL bracket quoting (`[Order Details]` → `Order Details`).
pub fn unbracket(name: &str) -> &str {
    name.strip_prefix('[')
        .and_then(|n| n.strip_suffix(']'))
        .unwrap_or(name)
}

/// Escape an identifier with `quote` when it is a reserved word or contains
/// special chars. Handles dotted identifiers (e.g., `dbo.Orders`) by quoting
/// each part.
pub fn escape_identifier_with(name: &str, quote: &dyn Fn(&str) -> String) -> String {
    name.split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let part = unbracket(part);
            if needs_quoting(part) {
                quote(part)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// ANSI double-quote escaping.
pub fn escape_identifier(name: &str) -> String {
    escape_identifier_with(name, &|part| format!("\"{}\"", part.replace('"', "\"\"")))
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator {
    /// Quote an identifier (table or column name) when needed.
    fn quote_identifier(&self, name: &str) -> String;
    /// Generate the parameter placeholder (e.g., $1, ?, @p1) for a 1-based index.
    fn placeholder(&self, index: usize) -> String;
    /// Get the boolean literal (true/false vs 1/0).
    fn bool_literal(&self, val: bool) -> String;
    /// Generate string concatenation expression (e.g. 'a' || 'b' vs CONCAT('a', 'b')).
    fn string_concat(&self, parts: &[String]) -> String;

    /// Whether the row limit precedes the select list (`TOP n`) instead of
    /// trailing the query.
    fn leading_top(&self) -> bool {
        false
    }

    /// `TOP n` spelled before the select list, if the dialect uses that form.
    fn top_prefix(&self, _n: &str) -> Option<String> {
        None
    }

    /// Row limit spelled after ORDER BY.
    fn limit_suffix(&self, n: &str) -> String {
        format!(" LIMIT {}", n)
    }

    /// Current timestamp function (`GETDATE()` replacement).
    fn current_timestamp(&self) -> &str {
        "CURRENT_TIMESTAMP"
    }

    /// String length function (`LEN` replacement).
    fn length_function(&self) -> &str {
        "LENGTH"
    }

    /// Stored procedure invocation with already-rendered arguments.
    fn call_procedure(&self, name: &str, args: &[String]) -> String {
        format!("CALL {}({})", self.quote_identifier(name), args.join(", "))
    }

    /// Spelling of a named procedure argument. Positional by default.
    fn named_argument(&self, _name: &str, value: &str) -> String {
        value.to_string()
    }

    /// Name used for a transient table (`#staging`, `@pending`).
    fn temp_table_name(&self, name: &str) -> String {
        let bare = name.trim_start_matches(['#', '@']);
        format!("tmp_{}", bare)
    }

    /// Wrap a subquery so that it yields one boolean row.
    fn exists_probe(&self, inner: &str) -> String {
        format!("SELECT EXISTS ({})", inner)
    }

    /// Map a T-SQL type name used in CAST onto the dialect.
    fn cast_type(&self, tsql_type: &str) -> String {
        tsql_type.to_string()
    }
}
