//! Naming Normalizer.
//!
//! Converts T-SQL identifiers (`@CUSTOMER_ID`, `usp_GetOrders`, `[Order Details]`)
//! into Go naming conventions, including Go's all-caps initialisms.

/// Initialisms Go code spells in a single case (`customerID`, `apiURL`).
const INITIALISMS: &[&str] = &[
    "ACL", "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS", "ID",
    "IP", "JSON", "QPS", "RAM", "RPC", "SKU", "SLA", "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL",
    "UDP", "UI", "UID", "URI", "URL", "UTC", "UUID", "VAT", "VM", "XML", "XSRF", "XSS",
];

/// Go keywords and predeclared identifiers.
pub const GO_RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "any", "append", "bool", "byte",
    "cap", "clear", "close", "complex", "copy", "delete", "error", "false", "float32",
    "float64", "imag", "int", "int16", "int32", "int64", "int8", "iota", "len", "make", "max",
    "min", "new", "nil", "panic", "print", "println", "real", "recover", "rune", "string",
    "true", "uint", "uint16", "uint32", "uint64", "uint8",
];

/// Action verbs recognized at the front of a procedure name.
pub const ACTION_VERBS: &[&str] = &[
    "Approve", "Cancel", "Activate", "Deactivate", "Archive", "Reject", "Submit", "Complete",
    "Assign", "Transfer", "Register", "Verify", "Validate", "Process", "Publish", "Lock",
    "Unlock", "Reset", "Search", "Find", "Count",
];

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | ' ' | '.' | '@' | '#' | '[' | ']' | '$')
}

/// Split an identifier into words on separators and case boundaries.
/// `HTTPServerID` → `HTTP`, `Server`, `ID`.
pub fn split_words(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if is_separator(c) || !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn initialism(word: &str) -> Option<&'static str> {
    let upper = word.to_uppercase();
    INITIALISMS.iter().copied().find(|i| *i == upper)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// `@CUSTOMER_ID`, `@CustomerID` and `@customer_id` all become `customerID`.
pub fn to_camel_case(ident: &str) -> String {
    let mut out = String::new();
    for (i, word) in split_words(ident).iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else if let Some(init) = initialism(word) {
            out.push_str(init);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

pub fn to_pascal_case(ident: &str) -> String {
    split_words(ident)
        .iter()
        .map(|word| match initialism(word) {
            Some(init) => init.to_string(),
            None => capitalize(word),
        })
        .collect()
}

/// Local variable name for a T-SQL variable or parameter.
pub fn variable_name(ident: &str) -> String {
    let name = to_camel_case(ident);
    if name.is_empty() {
        return "v".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("v{}", name);
    }
    name
}

pub fn is_go_reserved(name: &str) -> bool {
    GO_RESERVED.contains(&name)
}

/// Bare procedure name: schema qualifier, brackets and `usp_`/`sp_` removed.
pub fn strip_procedure_prefix(name: &str) -> &str {
    let base = name.rsplit('.').next().unwrap_or(name);
    let base = base.trim_start_matches('[').trim_end_matches(']');
    for prefix in ["usp_", "sp_"] {
        if base.len() > prefix.len() && base[..prefix.len()].eq_ignore_ascii_case(prefix) {
            return &base[prefix.len()..];
        }
    }
    base
}

/// Exported Go function name for a procedure (`dbo.usp_get_order` → `GetOrder`).
pub fn function_name(procedure: &str) -> String {
    let name = to_pascal_case(strip_procedure_prefix(procedure));
    if name.is_empty() {
        "Procedure".to_string()
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Proc{}", name)
    } else {
        name
    }
}

/// Leading action verb of a procedure name, if any (`usp_ApproveOrder` → `Approve`).
pub fn leading_verb(procedure: &str) -> Option<&'static str> {
    let words = split_words(strip_procedure_prefix(procedure));
    let first = words.first()?;
    ACTION_VERBS
        .iter()
        .copied()
        .find(|v| v.eq_ignore_ascii_case(first))
}

/// protoc-gen-go field name for a column (`customer_id`, `CustomerID` → `CustomerId`).
pub fn proto_field_name(column: &str) -> String {
    split_words(column)
        .iter()
        .map(|w| capitalize(w))
        .collect()
}

pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if lower.ends_with("sses")
        || lower.ends_with("xes")
        || lower.ends_with("ches")
        || lower.ends_with("shes")
    {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        word.to_string()
    } else if lower.ends_with('s') && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    let before_y = lower.chars().rev().nth(1);
    if lower.ends_with('y') && !before_y.is_some_and(|c| "aeiou".contains(c)) {
        format!("{}ies", &word[..word.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Entity name for a table (`dbo.OrderLines`, `#staging` → `OrderLine`, `Staging`).
pub fn entity_name(table: &str) -> String {
    let base = table.rsplit('.').next().unwrap_or(table);
    let pascal = to_pascal_case(base);
    // Singularize only the last word so `OrderLines` keeps its prefix.
    let words = split_words(&pascal);
    match words.split_last() {
        Some((last, head)) => {
            let mut out: String = head.concat();
            out.push_str(&singularize(last));
            out
        }
        None => "Record".to_string(),
    }
}

/// Double-quoted Go string literal.
pub fn go_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Query text as a Go literal: a raw string when possible, so quoted
/// identifiers stay readable.
pub fn go_query_literal(sql: &str) -> String {
    if sql.contains('`') || sql.contains('\r') {
        go_string_literal(sql)
    } else {
        format!("`{}`", sql)
    }
}
