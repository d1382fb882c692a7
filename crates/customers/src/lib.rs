//! `storerec-customers`: a store's shoppers, their engagement and stated or
//! inferred preferences.

pub mod customer;
pub mod preference;
pub mod stats;

pub use customer::{
    Customer, CustomerFilter, CustomerPatch, EngagementLevel, EngagementTotals, NewCustomer,
    Segment,
};
pub use preference::{
    CategoryPopularity, NewPreference, PreferenceSource, UserPreference, popular_categories,
};
pub use stats::{CustomerStats, SegmentBreakdown, SegmentStats, customer_stats, segment_breakdown};
