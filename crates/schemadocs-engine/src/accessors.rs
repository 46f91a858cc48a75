//! Accessors: per-table markdown generators
//!
//! An accessor renders one file per table from the metadata a connector
//! returns. Output is a pure function of that metadata, so unchanged tables
//! regenerate byte-identical files.

use schemadocs_catalog::{Connector, FetchError};
use schemadocs_core::{ConfigError, DatabaseConfig, Schema};

/// Accessors used when a database configures none
pub const DEFAULT_ACCESSORS: [&str; 2] = [ColumnsAccessor::NAME, DescriptionAccessor::NAME];

/// Generates one documentation file for a table
#[async_trait::async_trait]
pub trait Accessor: Send + Sync {
    /// Name used in the `accessors` configuration list
    fn name(&self) -> &'static str;

    /// File written inside the table directory
    fn filename(&self) -> &'static str;

    /// Render the file content for one table
    async fn generate(
        &self,
        connector: &dyn Connector,
        schema: &str,
        table: &str,
    ) -> Result<String, FetchError>;
}

/// Column listing as a markdown table
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnsAccessor;

impl ColumnsAccessor {
    pub const NAME: &'static str = "columns";

    fn render(table: &str, columns: &Schema) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", table));
        out.push_str(&format!("**Columns:** {}\n\n", columns.columns.len()));
        out.push_str("| # | Name | Type | Nullable |\n");
        out.push_str("|---|------|------|----------|\n");

        for (i, column) in columns.columns.iter().enumerate() {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                i + 1,
                escape_cell(&column.name),
                escape_cell(&column.logical_type.to_string()),
                column.nullable
            ));
        }

        out
    }
}

#[async_trait::async_trait]
impl Accessor for ColumnsAccessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filename(&self) -> &'static str {
        "columns.md"
    }

    async fn generate(
        &self,
        connector: &dyn Connector,
        schema: &str,
        table: &str,
    ) -> Result<String, FetchError> {
        let columns = connector.fetch_schema(schema, table).await?;
        Ok(Self::render(table, &columns))
    }
}

/// Table overview with column comments
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptionAccessor;

impl DescriptionAccessor {
    pub const NAME: &'static str = "description";

    fn render(connector: &dyn Connector, schema: &str, table: &str, columns: &Schema) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", table));
        out.push_str(&format!(
            "- **Table:** `{}`\n",
            connector.table_identifier(schema, table).fqn()
        ));
        out.push_str(&format!("- **Backend:** {}\n", connector.name()));
        out.push_str(&format!("- **Columns:** {}\n", columns.columns.len()));

        if !columns.columns.is_empty() {
            out.push_str("\n## Columns\n\n");
            for column in &columns.columns {
                match &column.description {
                    Some(text) => out.push_str(&format!(
                        "- `{}` ({}): {}\n",
                        column.name,
                        column.logical_type,
                        text.trim()
                    )),
                    None => out.push_str(&format!("- `{}` ({})\n", column.name, column.logical_type)),
                }
            }
        }

        out
    }
}

#[async_trait::async_trait]
impl Accessor for DescriptionAccessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn filename(&self) -> &'static str {
        "description.md"
    }

    async fn generate(
        &self,
        connector: &dyn Connector,
        schema: &str,
        table: &str,
    ) -> Result<String, FetchError> {
        let columns = connector.fetch_schema(schema, table).await?;
        Ok(Self::render(connector, schema, table, &columns))
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Look up a built-in accessor by name
pub fn accessor_by_name(name: &str) -> Option<Box<dyn Accessor>> {
    match name {
        ColumnsAccessor::NAME => Some(Box::new(ColumnsAccessor)),
        DescriptionAccessor::NAME => Some(Box::new(DescriptionAccessor)),
        _ => None,
    }
}

/// Resolve the configured accessor list of a database, in order
///
/// An empty list selects [`DEFAULT_ACCESSORS`].
pub fn resolve_accessors(config: &DatabaseConfig) -> Result<Vec<Box<dyn Accessor>>, ConfigError> {
    if config.accessors.is_empty() {
        return Ok(DEFAULT_ACCESSORS
            .iter()
            .filter_map(|name| accessor_by_name(name))
            .collect());
    }

    config
        .accessors
        .iter()
        .map(|name| {
            accessor_by_name(name).ok_or_else(|| ConfigError::UnknownAccessor {
                database: config.name.clone(),
                accessor: name.clone(),
            })
        })
        .collect()
}
