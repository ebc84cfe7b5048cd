use crate::error::ApiError;
use serde::Serialize;
use std::str::FromStr;

// The Data API speaks camelCase JSON; `rename_all` maps our snake_case fields.

/// The body of a `POST /properties/{id}:runReport` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<DateRange>,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_filter: Option<FilterExpression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    /// The trailing window ending today, in the property's own timezone.
    pub fn trailing_days(days_back: u32) -> Self {
        Self {
            start_date: format!("{}daysAgo", days_back),
            end_date: "today".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dimension {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterExpression {
    pub filter: Filter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_name: String,
    pub string_filter: StringFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFilter {
    pub match_type: &'static str,
    pub value: String,
}

impl FilterExpression {
    /// An exact string match on a single dimension.
    pub fn exact(field_name: &str, value: &str) -> Self {
        Self {
            filter: Filter {
                field_name: field_name.to_string(),
                string_filter: StringFilter {
                    match_type: "EXACT",
                    value: value.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBy {
    pub metric: MetricOrderBy,
    pub desc: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricOrderBy {
    pub metric_name: String,
}

/// An audience restriction for the segments report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    All,
    HighValueLeads,
    MobileUsers,
    LocalTraffic,
}

impl Segment {
    /// The filter for this segment; `conversion_event` identifies high-value leads.
    pub fn filter(&self, conversion_event: &str) -> Option<FilterExpression> {
        match self {
            Segment::All => None,
            Segment::HighValueLeads => Some(FilterExpression::exact("eventName", conversion_event)),
            Segment::MobileUsers => Some(FilterExpression::exact("deviceCategory", "mobile")),
            Segment::LocalTraffic => Some(FilterExpression::exact("country", "Italy")),
        }
    }
}

impl FromStr for Segment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(Segment::All),
            "high_value_leads" => Ok(Segment::HighValueLeads),
            "mobile_users" => Ok(Segment::MobileUsers),
            "local_traffic" => Ok(Segment::LocalTraffic),
            other => Err(ApiError::NotConfigured(format!("unknown segment '{}'", other))),
        }
    }
}

/// One report the client runs per fetch, and how its metrics are renamed
/// into the snapshot vocabulary.
#[derive(Debug, Clone)]
pub struct ReportDefinition {
    /// Name of the snapshot series this report fills.
    pub series: &'static str,
    pub request: RunReportRequest,
    /// `(api metric name, snapshot metric name)` pairs.
    pub metric_aliases: Vec<(&'static str, &'static str)>,
}

impl ReportDefinition {
    /// The snapshot names of the metrics this report produces.
    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metric_aliases.iter().map(|(_, local)| *local).collect()
    }
}

fn dimensions(names: &[&str]) -> Vec<Dimension> {
    names.iter().map(|n| Dimension { name: n.to_string() }).collect()
}

fn metrics(names: &[&str]) -> Vec<Metric> {
    names.iter().map(|n| Metric { name: n.to_string() }).collect()
}

/// Daily count of the conversion event over the window.
pub fn conversion_report(days_back: u32, conversion_event: &str) -> ReportDefinition {
    ReportDefinition {
        series: core_types::series::CONVERSIONS,
        request: RunReportRequest {
            date_ranges: vec![DateRange::trailing_days(days_back)],
            dimensions: dimensions(&[core_types::DATE_DIMENSION]),
            metrics: metrics(&["eventCount", "totalUsers"]),
            dimension_filter: Some(FilterExpression::exact("eventName", conversion_event)),
            order_bys: Vec::new(),
        },
        metric_aliases: vec![
            ("eventCount", core_types::metrics::CONVERSIONS),
            ("totalUsers", core_types::metrics::USERS),
        ],
    }
}

/// Sessions and bounce rate per day. GA4 reports `bounceRate` as a fraction.
pub fn daily_report(days_back: u32) -> ReportDefinition {
    ReportDefinition {
        series: core_types::series::DAILY,
        request: RunReportRequest {
            date_ranges: vec![DateRange::trailing_days(days_back)],
            dimensions: dimensions(&[core_types::DATE_DIMENSION]),
            metrics: metrics(&["sessions", "bounceRate"]),
            dimension_filter: None,
            order_bys: Vec::new(),
        },
        metric_aliases: vec![
            ("sessions", core_types::metrics::SESSIONS),
            ("bounceRate", core_types::metrics::BOUNCE_RATE),
        ],
    }
}

/// Sessions and users grouped by source and medium, busiest first.
pub fn traffic_report(days_back: u32) -> ReportDefinition {
    ReportDefinition {
        series: core_types::series::TRAFFIC,
        request: RunReportRequest {
            date_ranges: vec![DateRange::trailing_days(days_back)],
            dimensions: dimensions(&["sessionSource", "sessionMedium"]),
            metrics: metrics(&["sessions", "totalUsers"]),
            dimension_filter: None,
            order_bys: vec![OrderBy {
                metric: MetricOrderBy {
                    metric_name: "sessions".to_string(),
                },
                desc: true,
            }],
        },
        metric_aliases: vec![
            ("sessions", core_types::metrics::SESSIONS),
            ("totalUsers", core_types::metrics::USERS),
        ],
    }
}

/// Users and sessions by location, restricted to `segment`.
pub fn segments_report(days_back: u32, segment: &Segment, conversion_event: &str) -> ReportDefinition {
    ReportDefinition {
        series: core_types::series::SEGMENTS,
        request: RunReportRequest {
            date_ranges: vec![DateRange::trailing_days(days_back)],
            dimensions: dimensions(&["country", "city"]),
            metrics: metrics(&["totalUsers", "sessions"]),
            dimension_filter: segment.filter(conversion_event),
            order_bys: Vec::new(),
        },
        metric_aliases: vec![
            ("totalUsers", core_types::metrics::USERS),
            ("sessions", core_types::metrics::SESSIONS),
        ],
    }
}
