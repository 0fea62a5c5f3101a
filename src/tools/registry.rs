//! Central registry of available tools, plus composable filtered views.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::ai::types::ToolSchema;
use crate::errors::AgentError;

use super::presets::ToolPreset;
use super::traits::{schema_of, Tool};

// ─── LookupError ─────────────────────────────────────────────────────────────

/// Why a tool lookup failed.  Both cases surface to the LLM as non-fatal
/// observations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown tool: {0}")]
    NotFound(String),

    #[error("tool not allowed: {0}")]
    NotAllowed(String),
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Name-keyed catalog of tool executors.
///
/// Registration must be complete before any task executes; after that the
/// registry is shared immutably behind an `Arc`.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.  Duplicate names are an error.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::Configuration(format!(
                "tool '{name}' registered twice"
            )));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.  O(1).
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, LookupError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }

    /// Schemas of all registered tools, sorted by name for a stable LLM
    /// payload.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.tools.values().map(|t| schema_of(t.as_ref())).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over all registered tools (unfiltered).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Tool>)> {
        self.tools.iter()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RegistryView ────────────────────────────────────────────────────────────

/// Read-only, preset-filtered view over a shared registry.
///
/// Cheap to clone; never mutates the base registry.  Denied tools are
/// invisible in [`schemas`](Self::schemas) and rejected by
/// [`get`](Self::get).
#[derive(Clone)]
pub struct RegistryView {
    base: Arc<ToolRegistry>,
    preset: ToolPreset,
}

impl RegistryView {
    pub fn new(base: Arc<ToolRegistry>, preset: ToolPreset) -> Self {
        Self { base, preset }
    }

    pub fn preset(&self) -> ToolPreset {
        self.preset
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, LookupError> {
        if !self.preset.is_tool_allowed(name) {
            // Hide existence checks behind the policy: denied names are
            // rejected whether or not they are registered.
            return Err(LookupError::NotAllowed(name.to_string()));
        }
        self.base.get(name)
    }

    /// Schemas of allowed tools only.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.base
            .schemas()
            .into_iter()
            .filter(|s| self.preset.is_tool_allowed(&s.name))
            .collect()
    }
}

/// Convenience: produce a filtered view from a shared registry.
pub fn view_of(base: &Arc<ToolRegistry>, preset: ToolPreset) -> RegistryView {
    RegistryView::new(Arc::clone(base), preset)
}
