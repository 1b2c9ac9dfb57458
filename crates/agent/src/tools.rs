use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use farmlink_core::domain::session::{Session, UserId};

/// Who is calling a tool, and the session state as of the start of the turn.
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub user_id: UserId,
    pub session: Session,
}

impl ToolContext {
    pub fn new(session: Session) -> Self {
        Self { user_id: session.user_id.clone(), session }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, context: &ToolContext, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Runs a tool and folds any failure into an `{"error": ...}` payload, the
    /// shape every tool uses for problems the user should hear about.
    pub async fn invoke(&self, name: &str, context: &ToolContext, input: Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            return json!({ "error": format!("Unknown tool '{name}'.") });
        };

        match tool.execute(context, input).await {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = name,
                    user_id = %context.user_id.0,
                    error = %error,
                    "tool execution failed"
                );
                json!({ "error": error.to_string() })
            }
        }
    }
}

pub(crate) fn optional_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}
