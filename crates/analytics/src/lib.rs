//! `storerec-analytics`: store-level reporting over tracked behaviour and
//! recommendation outcomes.

pub mod dashboard;
pub mod metrics;
pub mod performance;
pub mod report;

pub use dashboard::{Dashboard, DashboardSummary, dashboard};
pub use metrics::DailyMetrics;
pub use performance::{AlgorithmPerformance, OverallPerformance, RecommendationPerformance, performance};
pub use report::{Report, ReportData, ReportType};
