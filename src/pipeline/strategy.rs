//! Model selection and the segmentation fallback chain

use std::fmt;

use crate::error::{AppError, Result};
use crate::segmentation::models::{self, GENERAL_MODEL, HUMAN_MODEL, OBJECT_MODEL};

/// Name reported when no model produced the cut-out
pub const PASSTHROUGH: &str = "passthrough";

/// Caller preference for the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelHint {
    /// Let the content classifier decide
    #[default]
    Auto,
    Model(&'static str),
}

impl ModelHint {
    /// Parse a form value. Empty and missing values mean `Auto`.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let value = match value.map(str::trim) {
            None | Some("") => return Ok(ModelHint::Auto),
            Some(v) => v.to_ascii_lowercase(),
        };

        match value.as_str() {
            "auto" => Ok(ModelHint::Auto),
            "human" => Ok(ModelHint::Model(HUMAN_MODEL)),
            "object" => Ok(ModelHint::Model(OBJECT_MODEL)),
            "general" => Ok(ModelHint::Model(GENERAL_MODEL)),
            other => models::lookup(other)
                .map(|spec| ModelHint::Model(spec.name))
                .ok_or_else(|| {
                    AppError::InvalidRequest(format!(
                        "Unknown model_hint '{}'. Use auto, human, object, general or one of: {}",
                        other,
                        models::names().join(", ")
                    ))
                }),
        }
    }
}

/// One step of the fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// A specific model, chosen by hint, classifier or as the baseline
    Model(String),
    /// Whatever model the session cache settles on as its default
    Default,
    /// Fully opaque copy of the input
    Passthrough,
}

impl Strategy {
    /// Ordered chain: chosen model, cache default, baseline, then optional passthrough
    pub fn plan(chosen: &str, baseline: &str, passthrough: bool) -> Vec<Strategy> {
        let mut plan = vec![Strategy::Model(chosen.to_string()), Strategy::Default];
        if baseline != chosen {
            plan.push(Strategy::Model(baseline.to_string()));
        }
        if passthrough {
            plan.push(Strategy::Passthrough);
        }
        plan
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Model(name) => name,
            Strategy::Default => "default",
            Strategy::Passthrough => PASSTHROUGH,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
