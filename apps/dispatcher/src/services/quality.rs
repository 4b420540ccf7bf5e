//! Quality advisory port.
//!
//! Media-manager quality lookups live outside the routing core. An advisor
//! can be injected to flag better-quality alternatives; its verdict is
//! advisory only and never alters routing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A suggested quality upgrade for a submitted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySuggestion {
    pub current_quality: String,
    pub suggested_quality: String,
    pub reason: String,
}

/// Port consulted before admission when quality checks are enabled.
#[async_trait]
pub trait QualityAdvisor: Send + Sync {
    async fn review(
        &self,
        name: &str,
        category: &str,
        size_estimate_gb: f64,
    ) -> Option<QualitySuggestion>;
}
