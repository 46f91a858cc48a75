//! Test fixtures for connector integration tests
//!
//! Reusable table definitions and a small multi-schema catalog modelled on
//! a typical analytics warehouse.

use schemadocs_catalog::{MockConnector, MockConnectorBuilder};
use schemadocs_core::{Column, LogicalType, Nullability, Schema};

/// Users table with a described key column
pub fn users_schema() -> Schema {
    Schema::from_columns(vec![
        Column::new("id", LogicalType::Int)
            .with_nullability(Nullability::No)
            .with_description("Surrogate key"),
        Column::new("email", LogicalType::String).with_nullability(Nullability::No),
        Column::new("name", LogicalType::String).with_nullability(Nullability::Yes),
        Column::new("created_at", LogicalType::Timestamp).with_nullability(Nullability::No),
    ])
}

/// Orders table with a decimal amount
pub fn orders_schema() -> Schema {
    Schema::from_columns(vec![
        Column::new("id", LogicalType::Int).with_nullability(Nullability::No),
        Column::new("user_id", LogicalType::Int).with_nullability(Nullability::No),
        Column::new(
            "total_amount",
            LogicalType::Decimal {
                precision: Some(10),
                scale: Some(2),
            },
        )
        .with_nullability(Nullability::No),
        Column::new("status", LogicalType::String).with_nullability(Nullability::Unknown),
    ])
}

/// Event payloads with nested and backend-specific types
pub fn events_schema() -> Schema {
    Schema::from_columns(vec![
        Column::new("event_id", LogicalType::String).with_nullability(Nullability::No),
        Column::new("payload", LogicalType::Json),
        Column::new(
            "tags",
            LogicalType::Array {
                element_type: Box::new(LogicalType::String),
            },
        ),
        Column::new("geo", LogicalType::Other("GEOGRAPHY".to_string())),
    ])
}

/// `public.users`, `public.orders`, `raw.events` and an empty `staging`
pub fn warehouse(database: &str) -> MockConnector {
    MockConnectorBuilder::new(database)
        .with_table("public", "users", users_schema())
        .with_table("public", "orders", orders_schema())
        .with_table("raw", "events", events_schema())
        .with_empty_schema("staging")
        .build()
}
