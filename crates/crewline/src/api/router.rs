//! Complexity-tier model routing.
//!
//! Each agent role declares a [`ComplexityTier`]. The [`ModelRouter`] looks the
//! tier up in a policy table and returns the [`ModelBinding`] the agent runs
//! with: a capable model at low temperature for planning-heavy roles, a cheap
//! fast model for everything else. New tiers are new table rows.

use std::fmt;

use tracing::info;

/// Default model for [`ComplexityTier::High`].
pub const DEFAULT_HIGH_MODEL: &str = "openai/gpt-4o";
/// Default model for [`ComplexityTier::Low`].
pub const DEFAULT_LOW_MODEL: &str = "openai/gpt-4o-mini";
/// Retries per completion call for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// How capable (and expensive) a role's model needs to be.
///
/// Parsing is lenient: only the exact label `high` selects [`High`](Self::High);
/// anything else, including a missing field, is [`Low`](Self::Low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComplexityTier {
    #[default]
    Low,
    High,
}

impl ComplexityTier {
    pub fn from_label(label: &str) -> Self {
        match label {
            "high" => ComplexityTier::High,
            _ => ComplexityTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "low",
            ComplexityTier::High => "high",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model an agent is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBinding {
    pub model: String,
    pub temperature: f32,
    /// Retries for transient completion failures (honored by the runner).
    pub max_retries: u32,
}

/// One row of the routing table.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRoute {
    pub tier: ComplexityTier,
    pub model: String,
    pub temperature: f32,
}

impl ModelRoute {
    pub fn new(tier: ComplexityTier, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            tier,
            model: model.into(),
            temperature,
        }
    }
}

/// Tier → model policy table.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    routes: Vec<ModelRoute>,
    /// Tier used when the requested tier has no row.
    fallback: ComplexityTier,
    max_retries: u32,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self {
            routes: vec![
                ModelRoute::new(ComplexityTier::High, DEFAULT_HIGH_MODEL, 0.1),
                ModelRoute::new(ComplexityTier::Low, DEFAULT_LOW_MODEL, 0.3),
            ],
            fallback: ComplexityTier::Low,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ModelRouter {
    /// An empty table. Every [`select_model`](Self::select_model) call needs a
    /// row for the requested tier or for `fallback`.
    pub fn empty(fallback: ComplexityTier) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Insert or replace the row for `route.tier`.
    pub fn with_route(mut self, route: ModelRoute) -> Self {
        match self.routes.iter_mut().find(|r| r.tier == route.tier) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
        self
    }

    /// Replace the model for an existing tier, keeping its temperature.
    pub fn with_model(mut self, tier: ComplexityTier, model: impl Into<String>) -> Self {
        if let Some(route) = self.routes.iter_mut().find(|r| r.tier == tier) {
            route.model = model.into();
        }
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn routes(&self) -> &[ModelRoute] {
        &self.routes
    }

    fn route_for(&self, tier: ComplexityTier) -> Option<&ModelRoute> {
        self.routes
            .iter()
            .find(|r| r.tier == tier)
            .or_else(|| self.routes.iter().find(|r| r.tier == self.fallback))
    }

    /// Pick the model binding for a tier.
    ///
    /// Logs the decision at INFO. A table with no row for either `tier` or the
    /// fallback tier yields the built-in low-tier defaults.
    pub fn select_model(&self, tier: ComplexityTier) -> ModelBinding {
        self.bind(tier, tier.as_str())
    }

    /// Pick the model binding for a complexity label as written in the role
    /// table. The log line shows the label upper-cased, so `medium` logs
    /// `MEDIUM` while routing like `low`.
    pub fn select_model_for_label(&self, label: &str) -> ModelBinding {
        self.bind(ComplexityTier::from_label(label), label)
    }

    fn bind(&self, tier: ComplexityTier, label: &str) -> ModelBinding {
        let (model, temperature) = match self.route_for(tier) {
            Some(route) => (route.model.clone(), route.temperature),
            None => (DEFAULT_LOW_MODEL.to_string(), 0.3),
        };

        info!(
            "[Router] Initializing {} agent with {}",
            label.to_uppercase(),
            model
        );

        ModelBinding {
            model,
            temperature,
            max_retries: self.max_retries,
        }
    }
}
