//! Tool registry and declarative parameter schemas.
//!
//! A tool maps a unique name to a parameter schema and an async handler.
//! Schemas are declared explicitly with [`ParamSpec`] entries rather than
//! derived from handler signatures; each entry carries a name, a type tag,
//! a required flag, and an optional description.

use parking_lot::RwLock;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{SessionError, SessionResult};
use crate::events::ToolDef;

/// JSON type tag for a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// JSON string
    String,
    /// JSON integer
    Integer,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl ParamType {
    /// The JSON-Schema type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// A single declared tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,
    /// JSON type tag
    pub param_type: ParamType,
    /// Whether the parameter must be supplied
    pub required: bool,
    /// Optional description
    pub description: Option<String>,
}

impl ParamSpec {
    /// Declare an optional parameter.
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            description: None,
        }
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered parameter schema for a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// An empty schema (a tool taking no arguments).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Render as a JSON-Schema object.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.params {
            let mut entry = Map::new();
            entry.insert("type".to_string(), json!(spec.param_type.as_str()));
            if let Some(desc) = &spec.description {
                entry.insert("description".to_string(), json!(desc));
            }
            properties.insert(spec.name.clone(), Value::Object(entry));
            if spec.required {
                required.push(json!(spec.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Async tool handler: takes parsed arguments, returns a result value or an
/// error message.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync>;

/// Wrap an async closure as a [`ToolHandler`].
pub fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// A registered tool: unique name, parameter schema, and handler.
#[derive(Clone)]
pub struct Tool {
    /// Unique name within a registry
    pub name: String,
    /// Description surfaced to the remote peer
    pub description: Option<String>,
    /// Declared parameter schema
    pub schema: ToolSchema,
    /// Invocation handler
    pub handler: ToolHandler,
}

impl Tool {
    /// Create a tool with an empty schema.
    pub fn new(name: impl Into<String>, handler: ToolHandler) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema: ToolSchema::new(),
            handler,
        }
    }

    /// Attach a description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an explicit parameter schema.
    pub fn schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Wire-format definition for `session.update`.
    pub fn definition(&self) -> ToolDef {
        ToolDef {
            tool_type: "function".to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.to_json(),
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Registry of tools, keyed by unique name in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with [`SessionError::DuplicateTool`] when the
    /// name is already taken, leaving the first registration in place.
    pub fn register(&self, tool: Tool) -> SessionResult<()> {
        let mut tools = self.tools.write();
        if tools.iter().any(|t| t.name == tool.name) {
            return Err(SessionError::DuplicateTool(tool.name));
        }
        tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Tool> {
        self.tools.read().iter().find(|t| t.name == name).cloned()
    }

    /// Wire-format definitions for all registered tools, in registration
    /// order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.read().iter().map(Tool::definition).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_tool(name: &str) -> Tool {
        Tool::new(name, handler(|_args| async { Ok(json!(null)) }))
    }

    #[test]
    fn test_schema_to_json() {
        let schema = ToolSchema::new()
            .param(
                ParamSpec::new("city", ParamType::String)
                    .required()
                    .description("City name"),
            )
            .param(ParamSpec::new("days", ParamType::Integer));

        let value = schema.to_json();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["city"]["type"], "string");
        assert_eq!(value["properties"]["city"]["description"], "City name");
        assert_eq!(value["properties"]["days"]["type"], "integer");
        assert_eq!(value["required"], json!(["city"]));
    }

    #[test]
    fn test_empty_schema() {
        let value = ToolSchema::new().to_json();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"], json!({}));
        assert_eq!(value["required"], json!([]));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = ToolRegistry::new();
        registry.register(noop_tool("get_time")).unwrap();

        let second = Tool::new(
            "get_time",
            handler(|_args| async { Ok(json!({"other": true})) }),
        );
        match registry.register(second) {
            Err(SessionError::DuplicateTool(name)) => assert_eq!(name, "get_time"),
            other => panic!("expected DuplicateTool, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_first_registration_retained() {
        let registry = ToolRegistry::new();
        registry
            .register(Tool::new(
                "pick",
                handler(|_args| async { Ok(json!("first")) }),
            ))
            .unwrap();
        let _ = registry.register(Tool::new(
            "pick",
            handler(|_args| async { Ok(json!("second")) }),
        ));

        let tool = registry.get("pick").unwrap();
        let result = (tool.handler)(json!({})).await.unwrap();
        assert_eq!(result, json!("first"));
    }

    #[test]
    fn test_definitions_order_and_shape() {
        let registry = ToolRegistry::new();
        registry
            .register(noop_tool("b_tool").description("second letter"))
            .unwrap();
        registry.register(noop_tool("a_tool")).unwrap();

        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "b_tool");
        assert_eq!(defs[0].tool_type, "function");
        assert_eq!(defs[0].description.as_deref(), Some("second letter"));
        assert_eq!(defs[1].name, "a_tool");
    }

    #[test]
    fn test_get_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
