//! Non-fatal conditions recorded while fitting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a requested seasonality was left out of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    /// The history is shorter than one full period.
    SpanShorterThanPeriod,
    /// Observations are too sparse to resolve the period.
    IntervalTooCoarse,
}

/// A fit-time adjustment the caller may want to surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitWarning {
    SeasonalityDisabled {
        name: String,
        reason: DisabledReason,
    },
    FourierOrderReduced {
        name: String,
        requested: usize,
        used: usize,
    },
    ChangepointsReduced {
        requested: usize,
        used: usize,
    },
    BackfitNotConverged {
        rounds: usize,
    },
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::SeasonalityDisabled { name, reason } => {
                let why = match reason {
                    DisabledReason::SpanShorterThanPeriod => "history shorter than one period",
                    DisabledReason::IntervalTooCoarse => "observations too sparse for the period",
                };
                write!(f, "seasonality '{name}' disabled: {why}")
            }
            FitWarning::FourierOrderReduced {
                name,
                requested,
                used,
            } => write!(
                f,
                "seasonality '{name}' fourier order reduced from {requested} to {used}"
            ),
            FitWarning::ChangepointsReduced { requested, used } => {
                write!(f, "changepoint count reduced from {requested} to {used}")
            }
            FitWarning::BackfitNotConverged { rounds } => {
                write!(f, "trend/seasonality backfitting stopped after {rounds} rounds")
            }
        }
    }
}
