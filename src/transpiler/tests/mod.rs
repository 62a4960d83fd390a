mod dml;

use crate::ast::GlobalVar;
use crate::error::LowerResult;
use crate::transpiler::ParamResolver;

/// Resolves `@Name` to `name` and treats `@msg*` variables as strings.
pub(super) struct TestResolver;

impl ParamResolver for TestResolver {
    fn resolve_variable(&self, name: &str) -> LowerResult<String> {
        Ok(name.trim_start_matches('@').to_lowercase())
    }

    fn resolve_global(&self, global: GlobalVar) -> LowerResult<String> {
        Ok(match global {
            GlobalVar::Identity => "lastInsertID".to_string(),
            _ => "rowCount".to_string(),
        })
    }

    fn is_string_variable(&self, name: &str) -> bool {
        name.to_lowercase().starts_with("@msg")
    }
}
