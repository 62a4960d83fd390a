//! Type Classifier.
//!
//! Maps T-SQL type names onto Go types and a semantic category. The category
//! drives zero values and the coercion applied to right-hand sides.

pub mod parse;

use std::fmt;

use serde::Serialize;

use crate::error::{LowerError, LowerResult};
pub use parse::{parse_type_name, SqlType, TypeArg};

/// Import path of the decimal package used by generated code.
pub const DECIMAL_IMPORT: &str = "github.com/shopspring/decimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Numeric,
    Decimal,
    String,
    DateTime,
    Boolean,
}

/// Go representation of a T-SQL value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoType {
    Bool,
    Uint8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    Time,
}

impl GoType {
    pub fn name(&self) -> &'static str {
        match self {
            GoType::Bool => "bool",
            GoType::Uint8 => "uint8",
            GoType::Int16 => "int16",
            GoType::Int32 => "int32",
            GoType::Int64 => "int64",
            GoType::Float32 => "float32",
            GoType::Float64 => "float64",
            GoType::Decimal => "decimal.Decimal",
            GoType::String => "string",
            GoType::Bytes => "[]byte",
            GoType::Time => "time.Time",
        }
    }

    /// Value a freshly declared variable holds; also the lowering of NULL.
    pub fn zero_value(&self) -> &'static str {
        match self {
            GoType::Bool => "false",
            GoType::Uint8
            | GoType::Int16
            | GoType::Int32
            | GoType::Int64
            | GoType::Float32
            | GoType::Float64 => "0",
            GoType::Decimal => "decimal.Zero",
            GoType::String => "\"\"",
            GoType::Bytes => "nil",
            GoType::Time => "time.Time{}",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            GoType::Bool => Category::Boolean,
            GoType::Uint8
            | GoType::Int16
            | GoType::Int32
            | GoType::Int64
            | GoType::Float32
            | GoType::Float64 => Category::Numeric,
            GoType::Decimal => Category::Decimal,
            GoType::String | GoType::Bytes => Category::String,
            GoType::Time => Category::DateTime,
        }
    }

    /// Package a reference to this type pulls in.
    pub fn import(&self) -> Option<&'static str> {
        match self {
            GoType::Decimal => Some(DECIMAL_IMPORT),
            GoType::Time => Some("time"),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            GoType::Uint8 | GoType::Int16 | GoType::Int32 | GoType::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, GoType::Float32 | GoType::Float64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Widening order for mixed arithmetic.
    pub fn rank(&self) -> u8 {
        match self {
            GoType::Uint8 => 1,
            GoType::Int16 => 2,
            GoType::Int32 => 3,
            GoType::Int64 => 4,
            GoType::Float32 => 5,
            GoType::Float64 => 6,
            _ => 0,
        }
    }

    /// The wider of two numeric types.
    pub fn widen(self, other: GoType) -> GoType {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification result for one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub go: GoType,
    pub category: Category,
    /// Source spelling, upper-cased (`DECIMAL(18, 2)`).
    pub sql: String,
}

impl TypeInfo {
    pub fn zero_value(&self) -> &'static str {
        self.go.zero_value()
    }
}

/// Classify a T-SQL type name.
pub fn classify(type_name: &str) -> LowerResult<TypeInfo> {
    let parsed = parse_type_name(type_name)?;
    let go = match parsed.name.as_str() {
        "BIT" => GoType::Bool,
        "TINYINT" => GoType::Uint8,
        "SMALLINT" => GoType::Int16,
        "INT" | "INTEGER" => GoType::Int32,
        "BIGINT" => GoType::Int64,
        "REAL" => GoType::Float32,
        "FLOAT" => GoType::Float64,
        "DECIMAL" | "NUMERIC" | "DEC" | "MONEY" | "SMALLMONEY" => GoType::Decimal,
        "CHAR" | "VARCHAR" | "NCHAR" | "NVARCHAR" | "TEXT" | "NTEXT" | "UNIQUEIDENTIFIER"
        | "XML" | "SYSNAME" => GoType::String,
        "BINARY" | "VARBINARY" | "IMAGE" | "ROWVERSION" | "TIMESTAMP" => GoType::Bytes,
        "DATE" | "TIME" | "DATETIME" | "DATETIME2" | "SMALLDATETIME" | "DATETIMEOFFSET" => {
            GoType::Time
        }
        _ => return Err(LowerError::UnknownType(type_name.trim().to_string())),
    };
    Ok(TypeInfo {
        go,
        category: go.category(),
        sql: type_name.trim().to_uppercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_categories() {
        let cases = [
            ("INT", GoType::Int32, Category::Numeric),
            ("bigint", GoType::Int64, Category::Numeric),
            ("DECIMAL(18,2)", GoType::Decimal, Category::Decimal),
            ("money", GoType::Decimal, Category::Decimal),
            ("NVARCHAR(MAX)", GoType::String, Category::String),
            ("VARBINARY(16)", GoType::Bytes, Category::String),
            ("DATETIME2", GoType::Time, Category::DateTime),
            ("BIT", GoType::Bool, Category::Boolean),
        ];
        for (name, go, category) in cases {
            let info = classify(name).unwrap();
            assert_eq!(info.go, go, "{}", name);
            assert_eq!(info.category, category, "{}", name);
        }
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(classify("INT").unwrap().zero_value(), "0");
        assert_eq!(classify("DECIMAL(10,2)").unwrap().zero_value(), "decimal.Zero");
        assert_eq!(classify("VARBINARY(MAX)").unwrap().zero_value(), "nil");
        assert_eq!(classify("DATE").unwrap().zero_value(), "time.Time{}");
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(
            classify("GEOGRAPHY"),
            Err(LowerError::UnknownType(t)) if t == "GEOGRAPHY"
        ));
    }

    #[test]
    fn test_widen() {
        assert_eq!(GoType::Int32.widen(GoType::Int64), GoType::Int64);
        assert_eq!(GoType::Float32.widen(GoType::Int16), GoType::Float32);
    }
}
