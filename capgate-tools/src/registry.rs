//! Runtime registry pairing tool definitions with implementations.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::definition::ToolDefinition;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Keyword-style arguments supplied to a tool invocation.
///
/// Keys correspond to [`ToolParameter`](crate::ToolParameter) names.
pub type ToolArguments = Map<String, Value>;

/// Trait implemented by tool executors.
///
/// The registry stores implementations behind this trait; the enforcer is
/// the only component expected to invoke them.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with keyword-style JSON arguments.
    async fn invoke(&self, arguments: ToolArguments) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(ToolArguments) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, arguments: ToolArguments) -> ToolResult<Value> {
        (self)(arguments).await
    }
}

/// Handle pairing a stored definition with its implementation.
#[derive(Clone)]
pub struct ToolHandle {
    definition: ToolDefinition,
    executor: Arc<dyn Tool>,
}

impl ToolHandle {
    /// Returns the stored definition.
    #[must_use]
    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Executes the underlying implementation.
    ///
    /// # Errors
    ///
    /// Propagates any [`ToolError::Execution`] returned by the
    /// implementation.
    pub async fn invoke(&self, arguments: ToolArguments) -> ToolResult<Value> {
        self.executor.invoke(arguments).await
    }
}

/// Registry mapping tool names to (definition, implementation) pairs.
///
/// The single source of truth for the catalog: classifiers read it to learn
/// what exists, the enforcer reads it to resolve a call. Registration
/// mutations are serialized behind the lock; nothing is ever removed
/// implicitly.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<HashMap<String, ToolHandle>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().expect("tool registry poisoned");
        let names: Vec<_> = inner.keys().cloned().collect();
        f.debug_struct("ToolRegistry")
            .field("registered", &names)
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, refusing to replace an existing name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the name is already present;
    /// the original registration is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register<T>(&self, definition: ToolDefinition, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let name = definition.name().to_owned();
        if inner.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }

        debug!(tool = %name, risk = %definition.risk_level(), "tool registered");
        inner.insert(
            name,
            ToolHandle {
                definition,
                executor: Arc::new(tool),
            },
        );

        Ok(())
    }

    /// Registers a tool, replacing any existing registration of the name.
    ///
    /// This is the explicit overwrite path; [`ToolRegistry::register`] is
    /// the default and refuses duplicates.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn replace<T>(&self, definition: ToolDefinition, tool: T)
    where
        T: Tool + 'static,
    {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        let name = definition.name().to_owned();
        debug!(tool = %name, "tool replaced");
        inner.insert(
            name,
            ToolHandle {
                definition,
                executor: Arc::new(tool),
            },
        );
    }

    /// Removes a registration.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if the name is absent.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn unregister(&self, name: &str) -> ToolResult<()> {
        let mut inner = self.inner.write().expect("tool registry poisoned");
        if inner.remove(name).is_none() {
            return Err(ToolError::UnknownTool {
                name: name.to_owned(),
            });
        }
        debug!(tool = %name, "tool unregistered");
        Ok(())
    }

    /// Returns a handle for the named tool.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        let inner = self.inner.read().ok()?;
        inner.get(name).cloned()
    }

    /// Returns the stored definition for the named tool.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.get(name).map(|handle| handle.definition.clone())
    }

    /// Returns the registered tool names in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        let inner = self.inner.read().expect("tool registry poisoned");
        let mut names: Vec<_> = inner.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the full catalog in name order, for classifiers to read.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let inner = self.inner.read().expect("tool registry poisoned");
        let mut definitions: Vec<_> = inner
            .values()
            .map(|handle| handle.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name().cmp(b.name()));
        definitions
    }

    /// Returns the number of registered tools.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("tool registry poisoned").len()
    }

    /// Returns true when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors produced by tool registration and invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool or parameter metadata failed validation.
    #[error("invalid tool definition: {reason}")]
    InvalidDefinition {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool name collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Name of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Name of the missing tool.
        name: String,
    },

    /// Tool implementation failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the implementation.
        reason: String,
    },
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::definition::{ParameterKind, RiskLevel, ToolParameter};
    use serde_json::json;

    fn definition(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description(description)
            .and_then(|b| {
                b.parameter(
                    ToolParameter::new("url", ParameterKind::String, "URL to fetch")
                        .unwrap()
                        .required(),
                )
            })
            .map(|b| b.risk_level(RiskLevel::new(2).unwrap()))
            .and_then(crate::definition::ToolDefinitionBuilder::build)
            .expect("definition")
    }

    fn echo(arguments: ToolArguments) -> impl Future<Output = ToolResult<Value>> {
        async move { Ok(Value::Object(arguments)) }
    }

    #[tokio::test]
    async fn register_and_invoke() {
        let registry = ToolRegistry::new();
        registry
            .register(definition("read_website", "Fetch a page"), echo)
            .unwrap();

        let handle = registry.get("read_website").expect("handle");
        let mut arguments = ToolArguments::new();
        arguments.insert("url".to_owned(), json!("http://x.com"));

        let output = handle.invoke(arguments.clone()).await.unwrap();
        assert_eq!(output, Value::Object(arguments));
    }

    #[tokio::test]
    async fn duplicate_registration_errors_and_keeps_original() {
        let registry = ToolRegistry::new();
        registry
            .register(definition("read_website", "Original"), echo)
            .unwrap();

        let err = registry
            .register(definition("read_website", "Imposter"), echo)
            .expect_err("duplicate should fail");
        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "read_website"));

        let stored = registry.definition("read_website").expect("definition");
        assert_eq!(stored.description(), "Original");
    }

    #[tokio::test]
    async fn replace_overwrites() {
        let registry = ToolRegistry::new();
        registry
            .register(definition("read_website", "Original"), echo)
            .unwrap();
        registry.replace(definition("read_website", "Updated"), echo);

        let stored = registry.definition("read_website").expect("definition");
        assert_eq!(stored.description(), "Updated");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_missing_errors() {
        let registry = ToolRegistry::new();
        let err = registry.unregister("ghost").expect_err("should fail");
        assert!(matches!(err, ToolError::UnknownTool { name } if name == "ghost"));
    }

    #[test]
    fn unregister_removes() {
        let registry = ToolRegistry::new();
        registry
            .register(definition("read_website", "Fetch a page"), echo)
            .unwrap();
        registry.unregister("read_website").unwrap();
        assert!(registry.is_empty());
        assert!(registry.get("read_website").is_none());
    }

    #[test]
    fn catalog_is_sorted() {
        let registry = ToolRegistry::new();
        registry
            .register(definition("send_email", "Send mail"), echo)
            .unwrap();
        registry
            .register(definition("read_website", "Fetch a page"), echo)
            .unwrap();

        assert_eq!(registry.tool_names(), vec!["read_website", "send_email"]);
        let names: Vec<_> = registry
            .definitions()
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, vec!["read_website", "send_email"]);
    }
}
