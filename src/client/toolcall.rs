//! Tool-call orchestrator (C7): aggregates streamed OpenAI-style tool-call
//! deltas by index, grounded directly on the teacher's `ToolCallAssembler`
//! (`llm/provider.rs`) and `ToolRegistry` (`llm/registry.rs`), generalized
//! from LLM-chunk deltas to [`ToolCallDefinitionDelta`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::protocol::{ToolCallDefinition, ToolCallDefinitionDelta, ToolCallFunction, ToolResultDefinition};

#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: Option<String>,
    tool_type: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates [`ToolCallDefinitionDelta`] fragments keyed by `index` into
/// complete [`ToolCallDefinition`]s.
///
/// A chunk that introduces a new index must carry `id`, `type`, and
/// `function.name` to seed the entry; chunks missing those on a first
/// sighting are discarded, matching the spec's aggregation rule.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    by_index: HashMap<u32, PartialToolCall>,
    order: Vec<u32>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_delta(&mut self, delta: &ToolCallDefinitionDelta) {
        if !self.by_index.contains_key(&delta.index) {
            let Some(id) = delta.id.clone() else { return };
            let Some(function) = &delta.function else { return };
            let Some(name) = function.name.clone() else { return };
            let tool_type = delta.tool_type.clone().unwrap_or_else(|| "function".to_string());
            self.order.push(delta.index);
            self.by_index.insert(
                delta.index,
                PartialToolCall {
                    id: Some(id),
                    tool_type: Some(tool_type),
                    name: Some(name),
                    arguments: function.arguments.clone(),
                },
            );
            return;
        }

        if let Some(function) = &delta.function {
            if let Some(entry) = self.by_index.get_mut(&delta.index) {
                entry.arguments.push_str(&function.arguments);
            }
        }
    }

    /// Finalize into complete tool calls, in the order their index was
    /// first seen.
    pub fn into_tool_calls(self) -> Vec<ToolCallDefinition> {
        self.order
            .into_iter()
            .filter_map(|index| self.by_index.get(&index).cloned())
            .map(|partial| ToolCallDefinition {
                id: partial.id.unwrap_or_default(),
                tool_type: partial.tool_type.unwrap_or_else(|| "function".to_string()),
                function: ToolCallFunction {
                    name: partial.name.unwrap_or_default(),
                    arguments: partial.arguments,
                },
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<String, String>> + Send>>;
type ToolFn = dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync;

/// A registry of locally-executable tools, generalizing the teacher's
/// `ToolRegistry` (`llm/registry.rs`) from agent-shell tools to arbitrary
/// named callbacks invoked from aggregated tool calls.
#[derive(Clone, Default)]
pub struct ToolExecutables {
    tools: HashMap<String, Arc<ToolFn>>,
}

impl ToolExecutables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, executable: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        self.tools.insert(
            name.into(),
            Arc::new(move |args| Box::pin(executable(args))),
        );
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute every aggregated tool call in order, packaging results as
    /// [`ToolResultDefinition`]s ready to resend. A call to an unknown tool
    /// yields an error string as its result content rather than aborting
    /// the whole batch.
    pub async fn execute_all(&self, calls: &[ToolCallDefinition]) -> Vec<ToolResultDefinition> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let content = self.execute_one(call).await;
            results.push(ToolResultDefinition::new(
                call.id.clone(),
                call.function.name.clone(),
                content,
            ));
        }
        results
    }

    async fn execute_one(&self, call: &ToolCallDefinition) -> String {
        let Some(executable) = self.tools.get(&call.function.name) else {
            return format!("error: no local tool registered named '{}'", call.function.name);
        };
        let args: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(err) => return format!("error: invalid arguments JSON: {err}"),
        };
        match executable(args).await {
            Ok(output) => output,
            Err(err) => format!("error: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolCallFunctionDelta;

    fn delta(index: u32, id: Option<&str>, name: Option<&str>, arguments: &str) -> ToolCallDefinitionDelta {
        ToolCallDefinitionDelta {
            index,
            id: id.map(str::to_string),
            tool_type: id.map(|_| "function".to_string()),
            function: Some(ToolCallFunctionDelta {
                name: name.map(str::to_string),
                arguments: arguments.to_string(),
            }),
        }
    }

    #[test]
    fn aggregates_arguments_across_chunks_for_same_index() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta(&delta(0, Some("call_123"), Some("get_weather"), "{\""));
        assembler.process_delta(&delta(0, None, None, "location\":\"SF"));
        assembler.process_delta(&delta(0, None, None, "\"}"));
        let calls = assembler.into_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_123");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"location\":\"SF\"}");
    }

    #[test]
    fn chunk_missing_seed_fields_on_first_sighting_is_discarded() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta(&delta(0, None, None, "{}"));
        assert!(assembler.is_empty());
    }

    #[test]
    fn preserves_first_seen_index_order() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta(&delta(1, Some("call_b"), Some("b"), "{}"));
        assembler.process_delta(&delta(0, Some("call_a"), Some("a"), "{}"));
        let calls = assembler.into_tool_calls();
        assert_eq!(calls[0].id, "call_b");
        assert_eq!(calls[1].id, "call_a");
    }

    #[tokio::test]
    async fn execute_all_runs_registered_tool() {
        let mut executables = ToolExecutables::new();
        executables.register("get_weather", |args| async move {
            Ok(format!("sunny in {}", args["location"]))
        });
        let calls = vec![ToolCallDefinition {
            id: "call_123".into(),
            tool_type: "function".into(),
            function: ToolCallFunction {
                name: "get_weather".into(),
                arguments: "{\"location\":\"SF\"}".into(),
            },
        }];
        let results = executables.execute_all(&calls).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("sunny in \"SF\""));
        assert_eq!(results[0].tool_call_id, "call_123");
    }

    #[tokio::test]
    async fn execute_all_reports_unknown_tool_without_aborting() {
        let executables = ToolExecutables::new();
        let calls = vec![ToolCallDefinition {
            id: "call_1".into(),
            tool_type: "function".into(),
            function: ToolCallFunction {
                name: "missing".into(),
                arguments: "{}".into(),
            },
        }];
        let results = executables.execute_all(&calls).await;
        assert!(results[0].content.contains("no local tool registered"));
    }
}
