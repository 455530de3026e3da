//! API interaction layer: HTTP client, retry, model routing, and cost tracking.
//!
//! - [`client`]: [`OpenRouterClient`] and the [`ChatBackend`] seam the
//!   runner talks to. Tests swap in scripted backends.
//! - [`retry`]: transient error detection (429, 5xx, network timeouts) with
//!   exponential backoff. Never retries 400/401 errors.
//! - [`router`]: [`ModelRouter`], the tier → model policy table.
//! - [`cost`]: per-model pricing, the [`CompletionPricer`] seam, and the
//!   session [`CostTracker`].

pub mod client;
pub mod cost;
pub mod retry;
pub mod router;

pub use client::{ChatBackend, ChatFuture, OpenRouterClient};
pub use cost::{CompletionPricer, CostTracker, PricingError, TablePricer, pricing_for_model};
pub use retry::RetryConfig;
pub use router::{ComplexityTier, ModelBinding, ModelRoute, ModelRouter};
