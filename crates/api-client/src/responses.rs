use crate::error::ApiError;
use core_types::{MetricRow, MetricSeries};
use serde::Deserialize;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The response of a successful `runReport` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunReportResponse {
    pub dimension_headers: Vec<Header>,
    pub metric_headers: Vec<Header>,
    /// Absent entirely when the report matched no rows.
    pub rows: Vec<Row>,
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default)]
    pub dimension_values: Vec<Value>,
    #[serde(default)]
    pub metric_values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Value {
    pub value: String,
}

/// The error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub status: String,
}

impl RunReportResponse {
    /// Converts the report into a series, renaming metrics through `aliases`.
    ///
    /// A metric value that is not a number fails the whole conversion so a
    /// partially parsed report never reaches the pipeline.
    pub fn into_series(self, aliases: &[(&str, &str)]) -> Result<MetricSeries, ApiError> {
        let metric_names: Vec<String> = self
            .metric_headers
            .iter()
            .map(|h| {
                aliases
                    .iter()
                    .find(|(api, _)| *api == h.name)
                    .map(|(_, local)| local.to_string())
                    .unwrap_or_else(|| h.name.clone())
            })
            .collect();

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            if row.dimension_values.len() != self.dimension_headers.len()
                || row.metric_values.len() != metric_names.len()
            {
                return Err(ApiError::InvalidData(format!(
                    "row has {} dimensions and {} metrics, headers declare {} and {}",
                    row.dimension_values.len(),
                    row.metric_values.len(),
                    self.dimension_headers.len(),
                    metric_names.len()
                )));
            }

            let mut metric_row = MetricRow::new();
            for (header, value) in self.dimension_headers.iter().zip(row.dimension_values) {
                metric_row = metric_row.with_dimension(header.name.clone(), value.value);
            }
            for (name, value) in metric_names.iter().zip(row.metric_values) {
                let parsed = value.value.parse::<f64>().map_err(|e| {
                    ApiError::InvalidData(format!("metric {} = '{}': {}", name, value.value, e))
                })?;
                metric_row = metric_row.with_metric(name.clone(), parsed);
            }
            rows.push(metric_row);
        }

        Ok(MetricSeries::new(rows))
    }
}
