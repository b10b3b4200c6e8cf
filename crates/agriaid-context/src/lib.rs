//! Turn a farmer's message into a block of real-time context.
//!
//! ```text
//! text ──classify──▶ TopicSet ──ProviderRegistry::gather──▶ ContextBag ──format_context──▶ String
//! ```
//!
//! Everything here is synchronous; provider calls run one after another.

pub mod aggregator;
pub mod crops;
pub mod format;
pub mod topics;

pub use aggregator::{GatherReport, ProviderOutcome, ProviderRegistry};
pub use crops::{crop_hint, detect_crop};
pub use format::{format_context, truncate, CONTEXT_FOOTER, CONTEXT_HEADER};
pub use topics::{classify, TopicSet, TopicTag, UnknownTopic};

use agriaid_providers::{ContextBag, FetchRequest};

/// Result of running the whole pipeline for one message.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    pub topics: TopicSet,
    pub bag: ContextBag,
    pub report: GatherReport,
    /// Rendered block, header and footer included.
    pub text: String,
}

/// Classify `message`, gather from the routed providers, and render.
pub fn prepare_context(
    registry: &ProviderRegistry,
    message: &str,
    request: &FetchRequest,
) -> PreparedContext {
    let topics = classify(message);
    tracing::info!(%topics, crop = ?request.crop, place = %request.place, "gathering context");
    let (bag, report) = registry.gather_with_report(&topics, request);
    let text = format_context(&bag);
    PreparedContext {
        topics,
        bag,
        report,
        text,
    }
}
