//! Daily metrics, dashboard and stored reports.

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::info;

use storerec_analytics::{DailyMetrics, Dashboard, Report, ReportType, dashboard};
use storerec_core::{RecordId, StoreId};

use super::{AppServices, RecordRepo, ServiceResult};

const DASHBOARD_DAYS: usize = 7;
const INTERACTION_RETENTION_DAYS: i64 = 730;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub days: Option<usize>,
}

impl AppServices {
    /// Stored daily metrics, newest first.
    pub fn list_daily_metrics(&self, store_id: StoreId) -> ServiceResult<Vec<DailyMetrics>> {
        let mut metrics = self.repos.daily_metrics.list(store_id)?;
        metrics.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(metrics)
    }

    pub fn dashboard(&self, store_id: StoreId, query: &DashboardQuery) -> ServiceResult<Dashboard> {
        let days = query.days.unwrap_or(DASHBOARD_DAYS).max(1);
        Ok(dashboard(self.repos.daily_metrics.list(store_id)?, days))
    }

    /// Compute (or recompute) the metrics row of `date`.
    pub fn compute_daily_metrics(&self, store_id: StoreId, date: NaiveDate) -> ServiceResult<DailyMetrics> {
        let existing = self
            .repos
            .daily_metrics
            .list(store_id)?
            .into_iter()
            .find(|m| m.date == date)
            .map(|m| m.id);
        let metrics = DailyMetrics::compute(
            store_id,
            date,
            &self.repos.customers.list(store_id)?,
            &self.repos.interactions.list(store_id)?,
            &self.repos.recommendations.list(store_id)?,
            existing,
            self.now(),
        );
        self.repos.daily_metrics.save(store_id, &metrics)?;
        info!(store = %store_id, %date, interactions = metrics.total_interactions, "daily metrics computed");
        Ok(metrics)
    }

    pub fn generate_report(&self, store_id: StoreId, report_type: Option<&str>) -> ServiceResult<Report> {
        let report_type: ReportType = match report_type.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.parse()?,
            None => ReportType::default(),
        };
        let metrics = self.repos.daily_metrics.list(store_id)?;
        let report = Report::generate(store_id, report_type, &metrics, self.now());
        self.repos.reports.save(store_id, &report)?;
        Ok(report)
    }

    pub fn list_reports(&self, store_id: StoreId) -> ServiceResult<Vec<Report>> {
        let mut reports = self.repos.reports.list(store_id)?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    pub fn get_report(&self, store_id: StoreId, id: RecordId) -> ServiceResult<Report> {
        self.repos.reports.require(store_id, &id, "report")
    }

    /// Drop interactions past the retention window; returns how many went.
    pub fn cleanup_interactions(&self, store_id: StoreId) -> ServiceResult<usize> {
        let cutoff = self.now() - Duration::days(INTERACTION_RETENTION_DAYS);
        let mut removed = 0;
        for interaction in self.repos.interactions.list(store_id)? {
            if interaction.created_at < cutoff && self.repos.interactions.remove(store_id, &interaction.id)? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(store = %store_id, removed, "old interactions removed");
        }
        Ok(removed)
    }
}
