use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{DomainError, Entity, RecordId, StoreId};

use crate::dashboard::DashboardSummary;
use crate::metrics::DailyMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Daily => "daily",
            ReportType::Weekly => "weekly",
            ReportType::Monthly => "monthly",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ReportType::Daily => "Daily",
            ReportType::Weekly => "Weekly",
            ReportType::Monthly => "Monthly",
        }
    }

    /// Days of metrics a report covers.
    pub fn days(&self) -> i64 {
        match self {
            ReportType::Weekly => 7,
            ReportType::Daily | ReportType::Monthly => 30,
        }
    }
}

impl core::str::FromStr for ReportType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ReportType::Daily),
            "weekly" => Ok(ReportType::Weekly),
            "monthly" => Ok(ReportType::Monthly),
            other => Err(DomainError::validation(format!("unknown report type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub time_period: String,
    pub metrics: DashboardSummary,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: RecordId,
    pub store_id: StoreId,
    pub name: String,
    pub report_type: ReportType,
    pub data: ReportData,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Summarise the store's daily metrics over the report's period.
    pub fn generate(store_id: StoreId, report_type: ReportType, metrics: &[DailyMetrics], now: DateTime<Utc>) -> Self {
        let days = report_type.days();
        let since = (now - Duration::days(days)).date_naive();
        let summary =
            DashboardSummary::over(metrics.iter().filter(|m| m.store_id == store_id && m.date >= since));

        Self {
            id: RecordId::new(),
            store_id,
            name: format!("{} Report - {}", report_type.title(), now.date_naive()),
            report_type,
            data: ReportData {
                time_period: format!("Last {days} days"),
                metrics: summary,
                generated_at: now,
            },
            created_at: now,
        }
    }
}

impl Entity for Report {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
