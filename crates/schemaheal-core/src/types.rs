//! Logical type system shared by inference, introspection and DDL synthesis

use serde::{Deserialize, Serialize};

/// Portable logical type
///
/// Inferred column types, live PostgreSQL column types and the types
/// rendered into synthesized DDL all map onto this one representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogicalType {
    /// Boolean type
    Bool,

    /// Integer type (any precision)
    Int,

    /// Floating point (any precision)
    Float,

    /// Decimal with precision and scale
    Decimal {
        precision: Option<u16>,
        scale: Option<u16>,
    },

    /// Bounded-length text
    #[serde(rename = "varchar")]
    VarChar {
        length: Option<u32>,
    },

    /// Unbounded text
    String,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// JSON document
    Json,

    /// UUID
    Uuid,

    /// Array type
    Array {
        element_type: Box<LogicalType>,
    },

    /// Unknown type (cannot infer)
    Unknown,
}

/// Coarse grouping used to decide whether two types can hold the same values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFamily {
    Boolean,
    Numeric,
    Text,
    Temporal,
    Json,
    Uuid,
    Array,
    Unknown,
}

impl LogicalType {
    /// How much a type says about a column.
    ///
    /// `Unknown` says nothing, unbounded text is the weakest real signal,
    /// bounded text is slightly stronger and every other type is specific.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::String => 1,
            Self::VarChar { .. } => 2,
            _ => 3,
        }
    }

    /// True for every type outside the text family and `Unknown`
    pub fn is_specific(&self) -> bool {
        self.specificity() == 3
    }

    /// True for bounded and unbounded text
    pub fn is_text(&self) -> bool {
        matches!(self, Self::String | Self::VarChar { .. })
    }

    fn family(&self) -> TypeFamily {
        match self {
            Self::Bool => TypeFamily::Boolean,
            Self::Int | Self::Float | Self::Decimal { .. } => TypeFamily::Numeric,
            Self::VarChar { .. } | Self::String => TypeFamily::Text,
            Self::Date | Self::Timestamp => TypeFamily::Temporal,
            Self::Json => TypeFamily::Json,
            Self::Uuid => TypeFamily::Uuid,
            Self::Array { .. } => TypeFamily::Array,
            Self::Unknown => TypeFamily::Unknown,
        }
    }

    /// Whether values of `self` can be stored in a column of type `other`
    /// without changing the column's type.
    ///
    /// `Unknown` is compatible with everything since there is nothing to compare.
    pub fn is_compatible_with(&self, other: &LogicalType) -> bool {
        let (a, b) = (self.family(), other.family());
        a == TypeFamily::Unknown || b == TypeFamily::Unknown || a == b
    }

    /// Strictly more specific than `other`, which itself must be a known type
    pub fn is_more_specific_than(&self, other: &LogicalType) -> bool {
        other.specificity() > 0 && self.specificity() > other.specificity()
    }

    /// Widen two types of the same family into one that holds both.
    ///
    /// Returns `None` when the families differ.
    pub fn widen(&self, other: &LogicalType) -> Option<LogicalType> {
        if self == other {
            return Some(self.clone());
        }

        match (self, other) {
            (Self::VarChar { length: a }, Self::VarChar { length: b }) => Some(Self::VarChar {
                length: match (a, b) {
                    (Some(a), Some(b)) => Some((*a).max(*b)),
                    _ => None,
                },
            }),
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Some(Self::Float),
            (Self::Decimal { .. }, Self::Int) => Some(self.clone()),
            (Self::Int, Self::Decimal { .. }) => Some(other.clone()),
            (Self::Decimal { .. }, Self::Float) | (Self::Float, Self::Decimal { .. }) => {
                Some(Self::Float)
            }
            (Self::Date, Self::Timestamp) | (Self::Timestamp, Self::Date) => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Render as a PostgreSQL column type for DDL
    pub fn to_postgres_ddl(&self) -> String {
        match self {
            Self::Bool => "BOOLEAN".to_string(),
            Self::Int => "INTEGER".to_string(),
            Self::Float => "DOUBLE PRECISION".to_string(),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("NUMERIC({}, {})", p, s),
                (Some(p), None) => format!("NUMERIC({})", p),
                _ => "NUMERIC".to_string(),
            },
            Self::VarChar { length: Some(n) } => format!("VARCHAR({})", n),
            Self::VarChar { length: None } => "VARCHAR".to_string(),
            Self::String | Self::Unknown => "TEXT".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Timestamp => "TIMESTAMPTZ".to_string(),
            Self::Json => "JSONB".to_string(),
            Self::Uuid => "UUID".to_string(),
            Self::Array { element_type } => format!("{}[]", element_type.to_postgres_ddl()),
        }
    }

    /// Convert a PostgreSQL type name to a LogicalType
    ///
    /// Accepts `information_schema` spellings (`character varying`,
    /// `timestamp with time zone`), internal names (`int4`, `_text`) and the
    /// rendering of parsed SQL data types (`VARCHAR(255)`, `INT[]`).
    pub fn from_postgres(pg_type: &str) -> LogicalType {
        let pg_type = pg_type.trim();
        let lowered = pg_type.to_lowercase();

        if let Some(element) = lowered.strip_suffix("[]") {
            return Self::Array {
                element_type: Box::new(Self::from_postgres(element)),
            };
        }

        let base_type = lowered
            .split('(')
            .next()
            .unwrap_or(&lowered)
            .trim()
            .to_string();

        match base_type.as_str() {
            "boolean" | "bool" => Self::Bool,

            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => Self::Int,
            "serial" | "serial4" | "bigserial" | "serial8" | "smallserial" | "serial2" => Self::Int,
            "oid" => Self::Int,

            "real" | "float4" | "double precision" | "float8" | "float" | "double" => Self::Float,

            "numeric" | "decimal" => parse_numeric_type(&lowered),
            "money" => Self::Decimal {
                precision: Some(19),
                scale: Some(2),
            },

            "character varying" | "varchar" | "character" | "char" | "bpchar" => Self::VarChar {
                length: parse_length(&lowered),
            },
            "text" | "citext" | "name" | "string" => Self::String,

            "date" => Self::Date,
            "timestamp" | "timestamptz" | "datetime" => Self::Timestamp,
            "time" | "timetz" => Self::Timestamp,

            "json" | "jsonb" => Self::Json,
            "uuid" => Self::Uuid,

            "array" => Self::Array {
                element_type: Box::new(Self::Unknown),
            },

            _ => {
                if base_type.starts_with("timestamp") {
                    Self::Timestamp
                } else if base_type.starts_with("time ") {
                    Self::Timestamp
                } else if let Some(element) = base_type.strip_prefix('_') {
                    // Internal array notation, e.g. _int4 for int4[]
                    Self::Array {
                        element_type: Box::new(Self::from_postgres(element)),
                    }
                } else {
                    Self::Unknown
                }
            }
        }
    }
}

/// Parse `numeric(p, s)` / `numeric(p)` / `numeric`
fn parse_numeric_type(type_str: &str) -> LogicalType {
    if let Some(params) = type_str.split('(').nth(1) {
        if let Some(params) = params.split(')').next() {
            let parts: Vec<&str> = params.split(',').collect();
            if parts.len() == 2 {
                let precision = parts[0].trim().parse().ok();
                let scale = parts[1].trim().parse().ok();
                return LogicalType::Decimal { precision, scale };
            } else if parts.len() == 1 {
                let precision = parts[0].trim().parse().ok();
                return LogicalType::Decimal { precision, scale: Some(0) };
            }
        }
    }

    LogicalType::Decimal {
        precision: None,
        scale: None,
    }
}

/// Parse the length out of `varchar(n)`
fn parse_length(type_str: &str) -> Option<u32> {
    type_str
        .split('(')
        .nth(1)
        .and_then(|rest| rest.split(')').next())
        .and_then(|n| n.trim().parse().ok())
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOLEAN"),
            Self::Int => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                (Some(p), None) => write!(f, "DECIMAL({})", p),
                _ => write!(f, "DECIMAL"),
            },
            Self::VarChar { length: Some(n) } => write!(f, "VARCHAR({})", n),
            Self::VarChar { length: None } => write!(f, "VARCHAR"),
            Self::String => write!(f, "TEXT"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Uuid => write!(f, "UUID"),
            Self::Array { element_type } => write!(f, "{}[]", element_type),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Int.to_string(), "INTEGER");
        assert_eq!(LogicalType::String.to_string(), "TEXT");
        assert_eq!(LogicalType::VarChar { length: Some(255) }.to_string(), "VARCHAR(255)");
        assert_eq!(
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }.to_string(),
            "DECIMAL(10, 2)"
        );
    }

    #[test]
    fn postgres_ddl_rendering() {
        assert_eq!(LogicalType::Timestamp.to_postgres_ddl(), "TIMESTAMPTZ");
        assert_eq!(LogicalType::Json.to_postgres_ddl(), "JSONB");
        assert_eq!(LogicalType::Unknown.to_postgres_ddl(), "TEXT");
        assert_eq!(
            LogicalType::Array { element_type: Box::new(LogicalType::Int) }.to_postgres_ddl(),
            "INTEGER[]"
        );
    }

    #[test]
    fn basic_type_mapping() {
        assert_eq!(LogicalType::from_postgres("boolean"), LogicalType::Bool);
        assert_eq!(LogicalType::from_postgres("integer"), LogicalType::Int);
        assert_eq!(LogicalType::from_postgres("BIGSERIAL"), LogicalType::Int);
        assert_eq!(LogicalType::from_postgres("double precision"), LogicalType::Float);
        assert_eq!(LogicalType::from_postgres("text"), LogicalType::String);
        assert_eq!(LogicalType::from_postgres("jsonb"), LogicalType::Json);
        assert_eq!(LogicalType::from_postgres("uuid"), LogicalType::Uuid);
        assert_eq!(LogicalType::from_postgres("custom_type"), LogicalType::Unknown);
    }

    #[test]
    fn text_and_temporal_mapping() {
        assert_eq!(
            LogicalType::from_postgres("character varying(120)"),
            LogicalType::VarChar { length: Some(120) }
        );
        assert_eq!(
            LogicalType::from_postgres("VARCHAR"),
            LogicalType::VarChar { length: None }
        );
        assert_eq!(LogicalType::from_postgres("timestamp with time zone"), LogicalType::Timestamp);
        assert_eq!(LogicalType::from_postgres("TIMESTAMP(6) WITHOUT TIME ZONE"), LogicalType::Timestamp);
        assert_eq!(LogicalType::from_postgres("date"), LogicalType::Date);
    }

    #[test]
    fn numeric_type_parsing() {
        assert_eq!(
            LogicalType::from_postgres("numeric(10,2)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }
        );
        assert_eq!(
            LogicalType::from_postgres("NUMERIC(10)"),
            LogicalType::Decimal { precision: Some(10), scale: Some(0) }
        );
        assert_eq!(
            LogicalType::from_postgres("numeric"),
            LogicalType::Decimal { precision: None, scale: None }
        );
    }

    #[test]
    fn array_type_mapping() {
        assert_eq!(
            LogicalType::from_postgres("_int4"),
            LogicalType::Array { element_type: Box::new(LogicalType::Int) }
        );
        assert_eq!(
            LogicalType::from_postgres("text[]"),
            LogicalType::Array { element_type: Box::new(LogicalType::String) }
        );
    }

    #[test]
    fn specificity_ordering() {
        assert!(LogicalType::Int.is_more_specific_than(&LogicalType::String));
        assert!(LogicalType::Int.is_more_specific_than(&LogicalType::VarChar { length: Some(10) }));
        assert!(LogicalType::VarChar { length: None }.is_more_specific_than(&LogicalType::String));
        assert!(!LogicalType::Int.is_more_specific_than(&LogicalType::Unknown));
        assert!(!LogicalType::String.is_more_specific_than(&LogicalType::Int));
    }

    #[test]
    fn compatibility_by_family() {
        assert!(LogicalType::Int.is_compatible_with(&LogicalType::Decimal { precision: None, scale: None }));
        assert!(LogicalType::Timestamp.is_compatible_with(&LogicalType::Date));
        assert!(!LogicalType::Int.is_compatible_with(&LogicalType::String));
        assert!(LogicalType::Json.is_compatible_with(&LogicalType::Unknown));
    }

    #[test]
    fn widening_within_family() {
        assert_eq!(LogicalType::Int.widen(&LogicalType::Float), Some(LogicalType::Float));
        assert_eq!(
            LogicalType::VarChar { length: Some(10) }.widen(&LogicalType::VarChar { length: Some(300) }),
            Some(LogicalType::VarChar { length: Some(300) })
        );
        assert_eq!(LogicalType::Int.widen(&LogicalType::Bool), None);
    }
}
