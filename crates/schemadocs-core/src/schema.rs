//! Column metadata returned by connectors and rendered by accessors

use serde::{Deserialize, Serialize};

/// Portable logical type system
///
/// Maps backend-specific column types to a common representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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

    /// String/text type
    String,

    /// Binary data
    Bytes,

    /// Date (no time component)
    Date,

    /// Timestamp (with time component)
    Timestamp,

    /// JSON/Variant type
    Json,

    /// Structured type with named fields
    Struct {
        fields: Vec<Column>,
    },

    /// Array type
    Array {
        element_type: Box<LogicalType>,
    },

    /// Type the connector could not map; keeps the native name
    Other(String),
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "BOOL"),
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Decimal { precision, scale } => {
                match (precision, scale) {
                    (Some(p), Some(s)) => write!(f, "DECIMAL({}, {})", p, s),
                    (Some(p), None) => write!(f, "DECIMAL({})", p),
                    _ => write!(f, "DECIMAL"),
                }
            }
            Self::String => write!(f, "STRING"),
            Self::Bytes => write!(f, "BYTES"),
            Self::Date => write!(f, "DATE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Struct { .. } => write!(f, "STRUCT"),
            Self::Array { element_type } => write!(f, "ARRAY<{}>", element_type),
            Self::Other(native) => write!(f, "{}", native.to_uppercase()),
        }
    }
}

/// Nullability state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nullability {
    /// Definitely nullable
    Yes,

    /// Definitely not nullable
    No,

    /// Cannot determine nullability
    Unknown,
}

impl Nullability {
    /// Parse an `IS_NULLABLE` value as reported by information_schema views
    pub fn from_is_nullable(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "YES" | "TRUE" => Self::Yes,
            "NO" | "FALSE" => Self::No,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Nullability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A column in a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,

    /// Logical type
    pub logical_type: LogicalType,

    /// Nullability
    pub nullable: Nullability,

    /// Column comment, when the backend exposes one
    pub description: Option<String>,
}

impl Column {
    /// Create a new column with unknown nullability
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: Nullability::Unknown,
            description: None,
        }
    }

    /// Set nullability
    pub fn with_nullability(mut self, nullable: Nullability) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the column comment
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }
}

/// An ordered collection of columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of columns
    pub columns: Vec<Column>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Create a schema from columns
    pub fn from_columns(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_type_display() {
        assert_eq!(LogicalType::Bool.to_string(), "BOOL");
        assert_eq!(
            LogicalType::Decimal { precision: Some(10), scale: Some(2) }.to_string(),
            "DECIMAL(10, 2)"
        );
        assert_eq!(
            LogicalType::Array { element_type: Box::new(LogicalType::String) }.to_string(),
            "ARRAY<STRING>"
        );
        assert_eq!(LogicalType::Other("geography".to_string()).to_string(), "GEOGRAPHY");
    }

    #[test]
    fn nullability_parsing() {
        assert_eq!(Nullability::from_is_nullable("YES"), Nullability::Yes);
        assert_eq!(Nullability::from_is_nullable("no"), Nullability::No);
        assert_eq!(Nullability::from_is_nullable(""), Nullability::Unknown);
    }

    #[test]
    fn blank_description_is_dropped() {
        let column = Column::new("id", LogicalType::Int).with_description("  ");
        assert!(column.description.is_none());

        let column = Column::new("id", LogicalType::Int).with_description("Primary key");
        assert_eq!(column.description.as_deref(), Some("Primary key"));
    }

    #[test]
    fn schema_operations() {
        let schema = Schema::from_columns(vec![
            Column::new("id", LogicalType::Int),
            Column::new("name", LogicalType::String),
        ]);

        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert!(schema.find_column("id").is_some());
        assert!(schema.find_column("nonexistent").is_none());
    }
}
