use api_client::error::ApiError;
use core_types::{AlertKind, CoreError};
use forecast_store::StoreError;
use thiserror::Error;

/// A snapshot that cannot be turned into a forecast.
#[derive(Error, Debug, PartialEq)]
pub enum DeriveError {
    #[error("Series '{series}' holds a non-finite value: {value}")]
    NonFinite { series: &'static str, value: f64 },

    #[error("Forecast could not be built: {0}")]
    Forecast(#[from] CoreError),
}

/// Why a forecast cycle failed. Each variant maps to exactly one alert kind.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Fetching analytics failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: ApiError,
    },

    #[error("Deriving the forecast failed: {0}")]
    Derive(#[from] DeriveError),

    #[error("Persisting the forecast failed: {0}")]
    Persist(#[source] StoreError),
}

impl CycleError {
    pub fn alert_kind(&self) -> AlertKind {
        match self {
            CycleError::Fetch { .. } => AlertKind::FetchFailed,
            CycleError::Persist(_) => AlertKind::PersistFailed,
            CycleError::Derive(_) => AlertKind::CycleFailed,
        }
    }
}

