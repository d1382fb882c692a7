//! `storerec-tracking`: shopper behaviour: interactions, sessions, raw events
//! and the aggregates derived from them.
//!
//! Everything here is pure: callers load the relevant records, these functions
//! compute new state, and the caller persists it.

pub mod ab_test;
pub mod analytics;
pub mod behavior;
pub mod event;
pub mod interaction;
pub mod product_view;
pub mod session;

pub use ab_test::{AbTest, AbTestResults, NewAbTest, TestStatus, TestType, VariantResult};
pub use analytics::{
    ActivitySummary, DateRange, GroupBy, InteractionAnalytics, ProductPopularity, UserActivity,
    interaction_analytics, popular_products, user_activity,
};
pub use behavior::{BehaviorProfile, BrowsingPattern, PricePreference, PurchaseFrequency};
pub use event::{InteractionEvent, NewEvent};
pub use interaction::{
    Interaction, InteractionContext, InteractionFilter, InteractionType, NewInteraction,
    engagement_totals,
};
pub use product_view::DailyProductView;
pub use session::{DailySessions, NewSession, SessionAnalytics, TrackingSession, session_analytics};
