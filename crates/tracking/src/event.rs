//! Raw storefront events, stored before interpretation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use storerec_core::{DomainError, DomainResult, Entity, RecordId, StoreId};

use crate::{InteractionContext, InteractionType, NewInteraction};

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: RecordId,
    pub store_id: StoreId,
    pub event_type: String,
    pub event_data: Value,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub product_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
}

impl InteractionEvent {
    pub fn receive(store_id: StoreId, input: NewEvent, now: DateTime<Utc>) -> DomainResult<Self> {
        let event_type = input.event_type.trim();
        if event_type.is_empty() {
            return Err(DomainError::validation("event_type cannot be empty"));
        }
        Ok(Self {
            id: RecordId::new(),
            store_id,
            event_type: event_type.to_string(),
            event_data: input.event_data,
            user_id: input.user_id,
            session_id: input.session_id,
            product_id: input.product_id,
            created_at: now,
            processed: false,
        })
    }

    /// Interpret the event as an interaction when its type names one.
    ///
    /// Context fields and `value_cents` are read from `event_data` when
    /// present; malformed context is ignored rather than rejected.
    pub fn as_interaction(&self) -> Option<NewInteraction> {
        let kind: InteractionType = self.event_type.parse().ok()?;
        let context: InteractionContext =
            serde_json::from_value(self.event_data.clone()).unwrap_or_default();
        Some(NewInteraction {
            interaction_type: kind.as_str().to_string(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            product_id: self.product_id.clone(),
            recommendation_id: self
                .event_data
                .get("recommendation_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok()),
            value_cents: self.event_data.get("value_cents").and_then(Value::as_u64),
            context,
            metadata: Some(self.event_data.clone()),
        })
    }

    pub fn mark_processed(&mut self) {
        self.processed = true;
    }
}

impl Entity for InteractionEvent {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str, data: Value) -> InteractionEvent {
        InteractionEvent::receive(
            StoreId::new(),
            NewEvent {
                event_type: kind.into(),
                event_data: data,
                user_id: Some("u1".into()),
                session_id: Some("s1".into()),
                product_id: Some("p1".into()),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn known_types_become_interactions() {
        let e = event("purchase", json!({"value_cents": 2500, "page_url": "/checkout"}));
        let i = e.as_interaction().unwrap();
        assert_eq!(i.interaction_type, "purchase");
        assert_eq!(i.value_cents, Some(2_500));
        assert_eq!(i.context.page_url.as_deref(), Some("/checkout"));
        assert_eq!(i.product_id.as_deref(), Some("p1"));
    }

    #[test]
    fn unknown_types_and_odd_payloads() {
        assert!(event("page_heartbeat", json!({})).as_interaction().is_none());
        let i = event("view", json!({"time_on_page": "soon"})).as_interaction().unwrap();
        assert_eq!(i.context.time_on_page, None);
    }

    #[test]
    fn blank_type_is_rejected() {
        let input = NewEvent {
            event_type: " ".into(),
            event_data: Value::Null,
            user_id: None,
            session_id: None,
            product_id: None,
        };
        assert!(InteractionEvent::receive(StoreId::new(), input, Utc::now()).is_err());
    }
}
