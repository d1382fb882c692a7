//! Browsing sessions and their conversion metrics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storerec_core::{CustomerId, DomainError, DomainResult, Entity, SessionId, StoreId, percent};

use crate::{Interaction, InteractionType};

/// Explicit session creation payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: Option<String>,
    pub landing_page: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// A storefront browsing session, keyed by the store's session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    pub id: SessionId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub session_key: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub page_views: u64,
    pub products_viewed: u64,
    pub unique_products_viewed: u64,
    pub total_interactions: u64,
    pub landing_page: Option<String>,
    pub exit_page: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub referrer: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub operating_system: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub added_to_cart: bool,
    pub purchased: bool,
    pub total_value_cents: u64,
}

impl TrackingSession {
    pub fn start(
        store_id: StoreId,
        customer_id: Option<CustomerId>,
        input: NewSession,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let key = input.session_id.trim();
        if key.is_empty() {
            return Err(DomainError::validation("session_id cannot be empty"));
        }
        Ok(Self {
            id: SessionId::new(),
            store_id,
            customer_id,
            session_key: key.to_string(),
            start_time: now,
            end_time: None,
            duration_seconds: 0,
            page_views: 0,
            products_viewed: 0,
            unique_products_viewed: 0,
            total_interactions: 0,
            landing_page: input.landing_page,
            exit_page: None,
            user_agent: input.user_agent,
            ip_address: input.ip_address,
            referrer: input.referrer,
            device_type: input.device_type,
            browser: input.browser,
            operating_system: input.operating_system,
            country: input.country,
            region: input.region,
            city: input.city,
            added_to_cart: false,
            purchased: false,
            total_value_cents: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Viewed products per page view, as a percentage.
    pub fn conversion_rate(&self) -> f64 {
        percent(self.products_viewed as f64, self.page_views as f64)
    }

    /// Close the session; a second call keeps the first end time.
    pub fn end(&mut self, now: DateTime<Utc>) {
        if self.end_time.is_some() {
            return;
        }
        let end = now.max(self.start_time);
        self.end_time = Some(end);
        self.duration_seconds = (end - self.start_time).num_seconds().max(0) as u64;
    }

    pub fn increment_page_views(&mut self) {
        self.page_views += 1;
    }

    pub fn adopt_customer(&mut self, customer_id: CustomerId) {
        if self.customer_id.is_none() {
            self.customer_id = Some(customer_id);
        }
    }

    /// Recompute interaction-derived metrics from all of the session's interactions.
    pub fn refresh_metrics<'a>(&mut self, interactions: impl IntoIterator<Item = &'a Interaction>) {
        let mut total = 0;
        let mut views = 0;
        let mut unique = BTreeSet::new();
        let mut added_to_cart = false;
        let mut purchased = false;
        let mut value = 0;
        let mut latest: Option<&Interaction> = None;

        for i in interactions {
            total += 1;
            match i.interaction_type {
                InteractionType::View => {
                    views += 1;
                    if let Some(p) = i.product_id {
                        unique.insert(p);
                    }
                }
                InteractionType::CartAdd => added_to_cart = true,
                InteractionType::Purchase => {
                    purchased = true;
                    value += i.value_cents;
                }
                _ => {}
            }
            if latest.is_none_or(|l| i.created_at >= l.created_at) {
                latest = Some(i);
            }
        }

        self.total_interactions = total;
        self.products_viewed = views;
        self.unique_products_viewed = unique.len() as u64;
        self.added_to_cart = added_to_cart;
        self.purchased = purchased;
        self.total_value_cents = value;
        if let Some(url) = latest.and_then(|l| l.context.page_url.clone()) {
            self.exit_page = Some(url);
        }
    }
}

impl Entity for TrackingSession {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySessions {
    pub date: NaiveDate,
    pub sessions: usize,
    pub avg_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalytics {
    pub days: i64,
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub avg_duration_seconds: f64,
    pub avg_page_views: f64,
    pub conversion_rate: f64,
    pub daily: Vec<DailySessions>,
}

/// Sessions started within the last `days` days.
pub fn session_analytics(sessions: &[TrackingSession], now: DateTime<Utc>, days: i64) -> SessionAnalytics {
    let since = now - Duration::days(days);
    let window: Vec<&TrackingSession> = sessions.iter().filter(|s| s.start_time >= since).collect();
    let total = window.len();

    let ended: Vec<&&TrackingSession> = window.iter().filter(|s| !s.is_active()).collect();
    let avg_duration = mean(ended.iter().map(|s| s.duration_seconds as f64));

    let mut daily: BTreeMap<NaiveDate, (usize, Vec<f64>)> = BTreeMap::new();
    for s in &window {
        let e = daily.entry(s.start_time.date_naive()).or_default();
        e.0 += 1;
        if !s.is_active() {
            e.1.push(s.duration_seconds as f64);
        }
    }

    SessionAnalytics {
        days,
        total_sessions: total,
        active_sessions: window.iter().filter(|s| s.is_active()).count(),
        avg_duration_seconds: avg_duration,
        avg_page_views: mean(window.iter().map(|s| s.page_views as f64)),
        conversion_rate: percent(
            window.iter().filter(|s| s.purchased).count() as f64,
            total as f64,
        ),
        daily: daily
            .into_iter()
            .map(|(date, (sessions, durations))| DailySessions {
                date,
                sessions,
                avg_duration_seconds: mean(durations.into_iter()),
            })
            .collect(),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
