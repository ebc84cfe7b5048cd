use serde::{Deserialize, Serialize};
use std::fmt;

/// How much trust to put in a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of notification raised through the alert collaborator.
///
/// A forecast cycle raises exactly one of `FetchFailed`, `PersistFailed`,
/// `CycleFailed` or `ForecastUpdated`. `ThresholdBreached` is only raised by
/// the threshold rules evaluated outside the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    FetchFailed,
    PersistFailed,
    CycleFailed,
    ForecastUpdated,
    ThresholdBreached,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::FetchFailed => "FetchFailed",
            AlertKind::PersistFailed => "PersistFailed",
            AlertKind::CycleFailed => "CycleFailed",
            AlertKind::ForecastUpdated => "ForecastUpdated",
            AlertKind::ThresholdBreached => "ThresholdBreached",
        }
    }

    /// Returns true for the kinds that report something went wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AlertKind::FetchFailed | AlertKind::PersistFailed | AlertKind::CycleFailed
        )
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
