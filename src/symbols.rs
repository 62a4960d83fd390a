//! Symbol Table and generated-name tracking.

use std::collections::{HashMap, HashSet};

use crate::error::{LowerError, LowerResult};
use crate::naming::{is_go_reserved, variable_name};
use crate::types::{classify, TypeInfo};

/// Names the generated code uses for its own locals and imports.
pub const GENERATED_NAMES: &[&str] = &[
    "ctx", "db", "tx", "err", "store", "returnCode", "rowCount", "lastInsertID", "caught",
    "returned", "r", "ok", "res", "context", "sql", "decimal", "errors", "fmt", "log", "slog",
    "math", "strings", "time", "utf8", "tsqlrt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Input,
    Output,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Source spelling, with `@`.
    pub source: String,
    pub go_name: String,
    pub ty: TypeInfo,
    pub kind: SymbolKind,
}

/// Flat per-procedure variable scope. T-SQL identifiers are case-insensitive,
/// so keys are folded.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
    taken: HashSet<String>,
    reserved: HashSet<String>,
}

fn key(name: &str) -> String {
    name.trim_start_matches('@').to_lowercase()
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::with_reserved(GENERATED_NAMES.iter().copied())
    }

    pub fn with_reserved<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            reserved: reserved.into_iter().map(str::to_string).collect(),
            ..Default::default()
        }
    }

    /// Reserve an additional Go name (client handles, package aliases).
    pub fn reserve(&mut self, name: &str) {
        self.reserved.insert(name.to_string());
    }

    pub fn declare(
        &mut self,
        name: &str,
        type_name: &str,
        kind: SymbolKind,
    ) -> LowerResult<&Symbol> {
        let k = key(name);
        if self.symbols.contains_key(&k) {
            return Err(LowerError::DuplicateVariable(name.to_string()));
        }
        let ty = classify(type_name)?;
        let go_name = self.unique_go_name(name);
        self.taken.insert(go_name.clone());
        self.order.push(k.clone());
        let symbol = Symbol {
            source: name.to_string(),
            go_name,
            ty,
            kind,
        };
        Ok(self.symbols.entry(k).or_insert(symbol))
    }

    fn unique_go_name(&self, name: &str) -> String {
        let mut base = variable_name(name);
        if is_go_reserved(&base) || self.reserved.contains(&base) {
            base.push_str("Var");
        }
        if !self.taken.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or(base)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(&key(name))
    }

    pub fn lookup(&self, name: &str) -> LowerResult<&Symbol> {
        self.get(name)
            .ok_or_else(|| LowerError::UndeclaredVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(&key(name))
    }

    /// Whether a Go identifier is already used by a symbol.
    pub fn is_taken(&self, go_name: &str) -> bool {
        self.taken.contains(go_name)
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|k| self.symbols.get(k))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Whether a generated assignment introduces its left-hand name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// First binding in the visible scope chain.
    Define,
    /// The name is already bound; plain assignment.
    Assign,
}

/// Tracks which generated locals (`res`, `ordersRows`, `exists1`) are bound
/// in each Go block, so the first statement uses a definition and later ones
/// re-assign.
#[derive(Debug)]
pub struct GeneratedNames {
    scopes: Vec<HashSet<String>>,
    counters: HashMap<String, usize>,
}

impl Default for GeneratedNames {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratedNames {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashSet::new()],
            counters: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Nesting depth; 0 is the function body's outermost block.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    pub fn bind(&mut self, name: &str) -> Binding {
        if self.is_bound(name) {
            return Binding::Assign;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
        Binding::Define
    }

    /// A function-unique name (`exists1`, `exists2`).
    pub fn fresh(&mut self, base: &str) -> String {
        let n = self.counters.entry(base.to_string()).or_insert(0);
        *n += 1;
        format!("{}{}", base, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut table = SymbolTable::new();
        table
            .declare("@CustomerID", "INT", SymbolKind::Input)
            .unwrap();
        assert_eq!(table.lookup("@customerid").unwrap().go_name, "customerID");
        assert!(matches!(
            table.declare("@CUSTOMERID", "INT", SymbolKind::Local),
            Err(LowerError::DuplicateVariable(_))
        ));
        assert!(matches!(
            table.lookup("@Missing"),
            Err(LowerError::UndeclaredVariable(n)) if n == "@Missing"
        ));
    }

    #[test]
    fn test_go_name_collisions() {
        let mut table = SymbolTable::new();
        let a = table.declare("@type", "INT", SymbolKind::Local).unwrap().go_name.clone();
        let b = table.declare("@err", "INT", SymbolKind::Local).unwrap().go_name.clone();
        let c = table.declare("@Customer_ID", "INT", SymbolKind::Local).unwrap().go_name.clone();
        let d = table.declare("@CustomerID", "INT", SymbolKind::Local).unwrap().go_name.clone();
        assert_eq!(a, "typeVar");
        assert_eq!(b, "errVar");
        assert_eq!(c, "customerID");
        assert_eq!(d, "customerID2");
    }

    #[test]
    fn test_generated_names_follow_scopes() {
        let mut names = GeneratedNames::new();
        assert_eq!(names.bind("res"), Binding::Define);
        assert_eq!(names.bind("res"), Binding::Assign);
        names.push_scope();
        assert_eq!(names.bind("res"), Binding::Assign);
        assert_eq!(names.bind("rows"), Binding::Define);
        names.pop_scope();
        assert_eq!(names.bind("rows"), Binding::Define);
        assert_eq!(names.fresh("exists"), "exists1");
        assert_eq!(names.fresh("exists"), "exists2");
    }
}
