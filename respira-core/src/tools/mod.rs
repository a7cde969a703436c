// respira-core/src/tools/mod.rs

//! The closed set of tools the model may call.
//!
//! Each [`ToolId`] maps to exactly one typed [`Handler`]. A [`ToolRegistry`]
//! holds the handlers enabled for a run and is validated when built, so a
//! duplicate or unknown tool is a startup error rather than a surprise in the
//! middle of a conversation. [`AnalyticsToolbox`] binds a registry to an
//! [`Analytics`] instance and exposes it to the agent as a [`ToolProvider`].

pub mod args;
mod handlers;

pub use handlers::Handler;

use crate::ToolProvider;
use crate::analytics::Analytics;
use crate::errors::{AgentError, ToolError};
use crate::models::tools::{ToolDefinition, ToolInput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Identifier of a tool, with a stable wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolId {
    GetTopAges,
    GetMaxAge,
    GetAdmissionAgeGroups,
    GetTopAdmissionAgeGroup,
    GetTopCities,
    TotalHospitalizations,
    AvgCost,
    MortalityRate,
    TopDiagnoses,
    ListDatasets,
}

impl ToolId {
    pub const ALL: [ToolId; 10] = [
        ToolId::GetTopAges,
        ToolId::GetMaxAge,
        ToolId::GetAdmissionAgeGroups,
        ToolId::GetTopAdmissionAgeGroup,
        ToolId::GetTopCities,
        ToolId::TotalHospitalizations,
        ToolId::AvgCost,
        ToolId::MortalityRate,
        ToolId::TopDiagnoses,
        ToolId::ListDatasets,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolId::GetTopAges => "get_top_ages",
            ToolId::GetMaxAge => "get_max_age",
            ToolId::GetAdmissionAgeGroups => "get_admission_age_groups",
            ToolId::GetTopAdmissionAgeGroup => "get_top_admission_age_group",
            ToolId::GetTopCities => "get_top_cities",
            ToolId::TotalHospitalizations => "total_hospitalizations",
            ToolId::AvgCost => "avg_cost",
            ToolId::MortalityRate => "mortality_rate",
            ToolId::TopDiagnoses => "top_diagnoses",
            ToolId::ListDatasets => "list_datasets",
        }
    }

    pub fn handler(self) -> Handler {
        handlers::handler_for(self)
    }

    pub fn definition(self) -> ToolDefinition {
        handlers::definition_for(self)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tool '{}'", self.0)
    }
}

impl std::error::Error for UnknownTool {}

impl FromStr for ToolId {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Enabled tools and their handlers.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    handlers: BTreeMap<ToolId, Handler>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every tool enabled.
    ///
    /// # Panics
    /// Only if `ToolId::ALL` lists a tool twice.
    pub fn builtin() -> Self {
        Self::with_tools(&ToolId::ALL).expect("ToolId::ALL lists every tool exactly once")
    }

    /// Registry with the given subset enabled. Listing a tool twice is an error.
    pub fn with_tools(ids: &[ToolId]) -> Result<Self, AgentError> {
        let mut registry = Self::new();
        for &id in ids {
            registry.register(id, id.handler())?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: ToolId, handler: Handler) -> Result<(), AgentError> {
        if self.handlers.contains_key(&id) {
            return Err(AgentError::config(format!(
                "Tool '{}' is registered more than once.",
                id
            )));
        }
        self.handlers.insert(id, handler);
        Ok(())
    }

    /// Looks up a model-supplied tool name. Unknown or disabled tools yield `None`.
    pub fn resolve(&self, name: &str) -> Option<(ToolId, Handler)> {
        let id = ToolId::from_str(name.trim()).ok()?;
        self.handlers.get(&id).map(|handler| (id, *handler))
    }

    pub fn ids(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Schemas advertised to the model, in [`ToolId`] order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.ids().map(ToolId::definition).collect()
    }
}

/// The analytics tools, ready to hand to an [`crate::agent::Agent`].
#[derive(Debug, Clone)]
pub struct AnalyticsToolbox {
    registry: ToolRegistry,
    analytics: Analytics,
}

impl AnalyticsToolbox {
    pub fn new(registry: ToolRegistry, analytics: Analytics) -> Self {
        Self {
            registry,
            analytics,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs a tool synchronously; `None` if the name does not resolve.
    pub fn invoke(&self, tool_name: &str, input: &ToolInput) -> Option<Result<Value, ToolError>> {
        let (id, handler) = self.registry.resolve(tool_name)?;
        debug!(tool_id = %id, args = ?input.arguments, "Invoking analytics tool");
        let result = handler(&self.analytics, input);
        if let Err(e) = &result {
            warn!(tool_id = %id, kind = e.kind(), error = %e, "Analytics tool returned an error");
        }
        Some(result)
    }
}

#[async_trait]
impl ToolProvider for AnalyticsToolbox {
    fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    async fn execute_tool(&self, tool_name: &str, input: ToolInput) -> Option<Result<Value, ToolError>> {
        self.invoke(tool_name, &input)
    }
}
