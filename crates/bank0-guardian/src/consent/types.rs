//! Consent records as returned by the consent service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form authorization detail object (RFC 9396 style).
pub type AuthorizationDetail = Map<String, Value>;

/// Field set on the first authorization detail when a payment is approved.
pub const SOURCE_ACCOUNT_FIELD: &str = "source_bank_account";

/// A consent awaiting the user's decision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsentEntity {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub authorization_details: Vec<AuthorizationDetail>,
}

impl ConsentEntity {
    /// Payment summary from the first authorization detail, if it has one.
    pub fn payment_details(&self) -> Option<PaymentDetails> {
        let first = self.authorization_details.first()?;
        Some(PaymentDetails {
            description: first.get("description")?.as_str()?.to_string(),
            amount: first.get("amount")?.as_f64()?,
        })
    }

    /// Copy of the authorization details with the chosen source account set
    /// on the first entry.
    pub fn with_source_account(&self, source_account: &str) -> Option<Vec<AuthorizationDetail>> {
        let mut details = self.authorization_details.clone();
        details
            .first_mut()?
            .insert(SOURCE_ACCOUNT_FIELD.into(), Value::String(source_account.into()));
        Some(details)
    }
}

/// What the user is asked to approve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub description: String,
    pub amount: f64,
}

impl PaymentDetails {
    /// e.g. `"$12.5"`
    pub fn formatted_amount(&self) -> String {
        format!("${}", self.amount)
    }
}
