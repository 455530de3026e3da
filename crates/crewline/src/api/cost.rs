//! Pricing and session cost tracking.
//!
//! Every completion the runner receives is reported to the [`CostTracker`]
//! through [`HarnessEvent::Completion`]. The tracker prices it with a
//! [`CompletionPricer`] and adds it to the session total. Pricing is
//! best-effort: a completion that cannot be priced is skipped and never
//! interrupts the pipeline.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use crate::ChatCompletion;
use crate::agent::events::{EventHandler, EventResponse, HarnessEvent};

/// Per-model pricing (USD per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (f64::from(prompt_tokens) / 1_000_000.0) * self.input_per_million
            + (f64::from(completion_tokens) / 1_000_000.0) * self.output_per_million
    }
}

/// Approximate list pricing for a model, matched on the name after the last
/// `/` (`"openai/gpt-4o-mini"` → `"gpt-4o-mini"`). `None` for unknown models.
pub fn pricing_for_model(model: &str) -> Option<ModelPricing> {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    // More specific names first: "gpt-4o-mini" also contains "gpt-4o".
    let pricing = if name.contains("4o-mini") {
        ModelPricing::new(0.15, 0.60)
    } else if name.contains("gpt-4o") {
        ModelPricing::new(2.50, 10.0)
    } else if name.contains("gpt-4") {
        ModelPricing::new(10.0, 30.0)
    } else if name.contains("opus") {
        ModelPricing::new(15.0, 75.0)
    } else if name.contains("sonnet") {
        ModelPricing::new(3.0, 15.0)
    } else if name.contains("haiku") {
        ModelPricing::new(0.25, 1.25)
    } else if name.starts_with("o1") || name.starts_with("o3") {
        ModelPricing::new(15.0, 60.0)
    } else if name.contains("gemini") && name.contains("flash") {
        ModelPricing::new(0.075, 0.30)
    } else if name.contains("gemini") {
        ModelPricing::new(1.25, 5.0)
    } else if name.contains("deepseek") {
        ModelPricing::new(0.27, 1.10)
    } else {
        return None;
    };
    Some(pricing)
}

// ── Pricing seam ───────────────────────────────────────────────────

/// Why a completion could not be priced.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("completion carries no usage data")]
    NoUsage,
    #[error("no pricing for model '{0}'")]
    UnknownModel(String),
    #[error("invalid cost {0}")]
    InvalidCost(f64),
}

/// Maps a completion to a monetary cost in USD.
pub trait CompletionPricer: Send + Sync {
    fn completion_cost(&self, model: &str, completion: &ChatCompletion)
    -> Result<f64, PricingError>;
}

/// Default pricer: the provider-reported `usage.cost` when present, otherwise
/// token usage priced with [`pricing_for_model`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TablePricer;

impl CompletionPricer for TablePricer {
    fn completion_cost(
        &self,
        model: &str,
        completion: &ChatCompletion,
    ) -> Result<f64, PricingError> {
        let usage = completion.usage.as_ref().ok_or(PricingError::NoUsage)?;
        if let Some(cost) = usage.cost {
            return if cost.is_finite() && cost >= 0.0 {
                Ok(cost)
            } else {
                Err(PricingError::InvalidCost(cost))
            };
        }
        // Prefer the model that actually served the call.
        let served = completion.model.as_deref().unwrap_or(model);
        let pricing = pricing_for_model(served)
            .or_else(|| pricing_for_model(model))
            .ok_or_else(|| PricingError::UnknownModel(served.to_string()))?;
        Ok(pricing.estimate_cost(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
        ))
    }
}

// ── Tracker ────────────────────────────────────────────────────────

/// Snapshot of the running session totals.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CostTotals {
    pub total_cost_usd: f64,
    pub priced_calls: u32,
    pub unpriced_calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl CostTotals {
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion, calls: {} priced / {} unpriced, cost: ${:.6}",
            self.prompt_tokens,
            self.completion_tokens,
            self.priced_calls,
            self.unpriced_calls,
            self.total_cost_usd,
        )
    }
}

/// Session cost accumulator.
///
/// One tracker per pipeline run; pass it by reference to the
/// [`Pipeline`](crate::pipeline::Pipeline). Totals sit behind a mutex so the
/// tracker stays correct when shared across tasks.
pub struct CostTracker {
    pricer: Box<dyn CompletionPricer>,
    totals: Mutex<CostTotals>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("totals", &self.totals())
            .finish()
    }
}

impl CostTracker {
    pub fn new() -> Self {
        Self::with_pricer(TablePricer)
    }

    pub fn with_pricer(pricer: impl CompletionPricer + 'static) -> Self {
        Self {
            pricer: Box::new(pricer),
            totals: Mutex::new(CostTotals::default()),
        }
    }

    /// Record one completion. Returns the cost added, or `None` when the
    /// completion could not be priced (the totals are left untouched).
    pub fn observe(&self, model: &str, completion: &ChatCompletion) -> Option<f64> {
        let cost = match self.pricer.completion_cost(model, completion) {
            Ok(c) => c,
            Err(e) => {
                debug!("Cost tracking skipped for {model}: {e}");
                if let Ok(mut t) = self.totals.lock() {
                    t.unpriced_calls += 1;
                }
                return None;
            }
        };

        let Ok(mut totals) = self.totals.lock() else {
            return None;
        };
        totals.total_cost_usd += cost;
        totals.priced_calls += 1;
        if let Some(ref usage) = completion.usage {
            totals.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
            totals.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
        }
        if cost > 0.0 {
            info!(
                "[$$] Cost: ${cost:.6} | Session Total: ${:.6}",
                totals.total_cost_usd
            );
        }
        Some(cost)
    }

    /// Session total in USD.
    pub fn total(&self) -> f64 {
        self.totals().total_cost_usd
    }

    pub fn totals(&self) -> CostTotals {
        self.totals
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Final session total line, shown once at the end of a run.
    ///
    /// Returned rather than logged so callers can show it whatever the log
    /// filter is.
    pub fn final_report(&self) -> String {
        let totals = self.totals();
        format!(
            "[DONE] Final Session Cost: ${:.6} ({})",
            totals.total_cost_usd,
            totals.summary()
        )
    }
}

impl EventHandler for CostTracker {
    fn on_event(&self, event: &HarnessEvent<'_>) -> Option<EventResponse> {
        if let HarnessEvent::Completion {
            model, completion, ..
        } = event
        {
            self.observe(model, completion);
        }
        None
    }
}
