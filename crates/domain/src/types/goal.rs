//! Savings goals

use serde::{Deserialize, Serialize};

use super::record::{CacheRecord, RecordId, ServerEntity};
use crate::constants::ENTITY_GOAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Cancelled,
}

/// Goal as returned by the goals endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct GoalResponse {
    pub id: RecordId,
    pub account_id: i64,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: GoalStatus,
    #[serde(default)]
    pub target_date: Option<String>,
}

/// Partial goal update; unset fields are left unchanged by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
}

impl From<GoalResponse> for Goal {
    fn from(response: GoalResponse) -> Self {
        Self {
            id: response.id,
            account_id: response.account_id,
            name: response.name,
            target_amount: response.target_amount,
            current_amount: response.current_amount,
            currency: response.currency.unwrap_or_else(|| "USD".to_string()),
            status: response.status,
            target_date: response.target_date,
        }
    }
}

/// Cached goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: RecordId,
    pub account_id: i64,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub currency: String,
    pub status: GoalStatus,
    pub target_date: Option<String>,
}

impl Goal {
    /// Fraction of the target reached, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 1.0;
        }
        (self.current_amount / self.target_amount).clamp(0.0, 1.0)
    }
}

impl ServerEntity for GoalResponse {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl ServerEntity for Goal {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for Goal {
    const ENTITY: &'static str = ENTITY_GOAL;

    fn id(&self) -> RecordId {
        self.id
    }

    fn account_id(&self) -> Option<i64> {
        Some(self.account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_only_set_fields() {
        let update = GoalUpdate { current_amount: Some(300.0), ..GoalUpdate::default() };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"current_amount":300.0}"#);
        assert_eq!(serde_json::to_string(&GoalUpdate::default()).unwrap(), "{}");
    }

    #[test]
    fn response_maps_to_record_with_default_currency() {
        let response: GoalResponse = serde_json::from_str(
            r#"{"id":3,"account_id":200,"name":"Trip","target_amount":1000.0,"current_amount":250.0,"status":"active"}"#,
        )
        .unwrap();
        let goal = Goal::from(response);
        assert_eq!(goal.currency, "USD");
        assert_eq!(goal.account_id(), Some(200));
        assert!((goal.progress() - 0.25).abs() < f64::EPSILON);
    }
}
