//! Human-readable interpretation of a result.
//!
//! An optional [`TextGenerator`] is tried first. Any error, timeout or
//! blank output falls back to a deterministic template, so interpretation
//! never fails a computation.

use std::time::Duration;

use async_trait::async_trait;
use risk_index_models::{Band, ComponentScore, Driver, FamilyId};
use serde::Serialize;
use thiserror::Error;

/// Default budget for an external generator call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors a [`TextGenerator`] can report.
#[derive(Debug, Error)]
pub enum InterpretationError {
    /// Generator-specific failure.
    #[error("Text generation failed: {message}")]
    Generation {
        /// Error message.
        message: String,
    },

    /// The generator did not answer in time.
    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),

    /// The generator answered with blank text.
    #[error("Text generator returned empty text")]
    Empty,
}

/// Everything a generator may use to describe a result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretationRequest {
    pub family_id: FamilyId,
    pub family_name: String,
    pub value: u8,
    pub band: Band,
    pub trend_1d: Option<f64>,
    pub trend_7d: Option<f64>,
    pub insufficient_history: bool,
    pub components: Vec<ComponentScore>,
    pub drivers: Vec<Driver>,
}

/// External natural-language generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces interpretation text for a result.
    ///
    /// # Errors
    ///
    /// Returns [`InterpretationError`] if generation fails.
    async fn generate(
        &self,
        request: &InterpretationRequest,
    ) -> Result<String, InterpretationError>;
}

fn describe_trend(trend: Option<f64>, period: &str) -> Option<String> {
    let t = trend?;
    Some(if t.abs() < 0.005 {
        format!("unchanged {period}")
    } else if t > 0.0 {
        format!("up {t:.1} points {period}")
    } else {
        format!("down {:.1} points {period}", t.abs())
    })
}

/// Deterministic fallback text.
#[must_use]
pub fn template(request: &InterpretationRequest) -> String {
    let mut text = format!(
        "{} stands at {} ({})",
        request.family_name,
        request.value,
        request.band.label()
    );

    let trends: Vec<String> = [
        describe_trend(request.trend_1d, "on the day"),
        describe_trend(request.trend_7d, "against the weekly average"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !trends.is_empty() {
        text.push_str(", ");
        text.push_str(&trends.join(" and "));
    }
    text.push('.');

    let leading = request
        .components
        .iter()
        .filter(|c| c.contribution > 0.0)
        .max_by(|a, b| a.contribution.total_cmp(&b.contribution));
    if let Some(component) = leading {
        text.push_str(&format!(" Largest contribution: {}.", component.kind.label()));
    }

    match request.drivers.first() {
        Some(driver) => text.push_str(&format!(
            " Top driver: {}.",
            driver.headline.trim_end_matches('.')
        )),
        None => text.push_str(" No qualifying alerts were recorded."),
    }

    if request.insufficient_history {
        text.push_str(" Baselines are still warming up; treat the level as provisional.");
    }

    text
}

/// Interpretation text for `request`, from `generator` when it answers in
/// time with non-blank text, otherwise from [`template`].
pub async fn interpret(
    generator: Option<&dyn TextGenerator>,
    request: &InterpretationRequest,
    timeout: Duration,
) -> String {
    let Some(generator) = generator else {
        return template(request);
    };

    let outcome = match tokio::time::timeout(timeout, generator.generate(request)).await {
        Ok(Ok(text)) if text.trim().is_empty() => Err(InterpretationError::Empty),
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(InterpretationError::Timeout(timeout)),
    };

    outcome.unwrap_or_else(|e| {
        log::warn!(
            "{}: interpretation fell back to template: {e}",
            request.family_id
        );
        template(request)
    })
}
