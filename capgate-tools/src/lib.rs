//! Tool catalog and runtime registry for the capgate capability layer.
//!
//! A [`ToolDefinition`] is the static description classifiers read (name,
//! description, parameters, risk level); the [`ToolRegistry`] pairs each
//! definition with its implementation and is the single source of truth
//! consulted by both classification and enforcement.

#![warn(missing_docs, clippy::pedantic)]

mod definition;
mod registry;

/// Catalog entity types and the definition builder.
pub use definition::{
    ParameterKind, RiskLevel, ToolDefinition, ToolDefinitionBuilder, ToolParameter,
};
/// Registry, execution trait, and tool errors.
pub use registry::{Tool, ToolArguments, ToolError, ToolHandle, ToolRegistry, ToolResult};
