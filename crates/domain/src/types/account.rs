//! Aggregated financial accounts

use serde::{Deserialize, Serialize};

use super::record::{CacheRecord, RecordId, ServerEntity};
use crate::constants::ENTITY_ACCOUNT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub amount: f64,
    pub currency: String,
}

/// Account as returned by the accounts endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub id: RecordId,
    pub account_name: String,
    pub account_type: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub current_balance: Option<Balance>,
    #[serde(default)]
    pub hidden: bool,
}

impl From<AccountResponse> for Account {
    fn from(response: AccountResponse) -> Self {
        Self {
            id: response.id,
            name: response.account_name,
            account_type: response.account_type,
            provider_name: response.provider_name,
            balance: response.current_balance,
            hidden: response.hidden,
        }
    }
}

/// Cached account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: RecordId,
    pub name: String,
    pub account_type: String,
    pub provider_name: Option<String>,
    pub balance: Option<Balance>,
    pub hidden: bool,
}

impl ServerEntity for AccountResponse {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl ServerEntity for Account {
    fn server_id(&self) -> RecordId {
        self.id
    }
}

impl CacheRecord for Account {
    const ENTITY: &'static str = ENTITY_ACCOUNT;

    fn id(&self) -> RecordId {
        self.id
    }
}
