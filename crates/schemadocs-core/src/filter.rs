//! Include/exclude table filtering
//!
//! Patterns are globs (`*`, `?`, `[...]`) matched case-sensitively against
//! the fully qualified `schema.table` name. Exclude patterns always win; with
//! no include patterns every table is included.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::{ConfigError, DatabaseConfig};

/// Compiled include/exclude rules for one database
#[derive(Debug, Clone)]
pub struct TableFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl TableFilter {
    /// Compile the rules of a database entry
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        Self::new(&config.name, &config.include, &config.exclude)
    }

    /// Compile include/exclude patterns; `database` only labels errors
    pub fn new(database: &str, include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            include: compile(database, include)?,
            exclude: compile(database, exclude)?,
        })
    }

    /// Decide whether `schema.table` is included
    pub fn matches(&self, schema: &str, table: &str) -> bool {
        let qualified = format!("{}.{}", schema, table);

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&qualified) {
                return false;
            }
        }

        match &self.include {
            Some(include) => include.is_match(&qualified),
            None => true,
        }
    }

    /// Keep the tables that pass the filter, preserving order
    pub fn filter_tables(&self, schema: &str, tables: Vec<String>) -> Vec<String> {
        tables
            .into_iter()
            .filter(|table| self.matches(schema, table))
            .collect()
    }
}

fn compile(database: &str, patterns: &[String]) -> Result<Option<GlobSet>, ConfigError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(false)
            .literal_separator(false)
            .build()
            .map_err(|e| ConfigError::InvalidPattern {
                database: database.to_string(),
                pattern: pattern.clone(),
                message: e.kind().to_string(),
            })?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidPattern {
            database: database.to_string(),
            pattern: patterns.join(", "),
            message: e.to_string(),
        })
}
