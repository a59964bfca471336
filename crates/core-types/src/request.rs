use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::card::CardCode;
use crate::error::BridgeError;
use crate::ids::RequestId;

/// Request as delivered by the update source, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCardRequest {
    #[serde(
        default,
        deserialize_with = "opaque_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(
        default,
        alias = "user_id",
        alias = "woo_id",
        deserialize_with = "opaque_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_user_id: Option<String>,
    #[serde(
        default,
        alias = "card",
        alias = "card_num",
        deserialize_with = "opaque_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub card_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OpaqueId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Upstream sends ids and card numbers as either JSON strings or integers.
fn opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OpaqueId>::deserialize(deserializer)?;
    Ok(value.map(|id| match id {
        OpaqueId::Text(text) => text,
        OpaqueId::Signed(num) => num.to_string(),
        OpaqueId::Unsigned(num) => num.to_string(),
    }))
}

impl RawCardRequest {
    /// The id, if present and non-blank. Requests without one cannot be reported.
    pub fn request_id(&self) -> Option<RequestId> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(RequestId::new)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMethod {
    Enable,
    Disable,
}

impl FromStr for RequestMethod {
    type Err = BridgeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "enable" => Ok(RequestMethod::Enable),
            "disable" => Ok(RequestMethod::Disable),
            other => Err(BridgeError::invalid(format!(
                "unknown request method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Enable => f.write_str("enable"),
            RequestMethod::Disable => f.write_str("disable"),
        }
    }
}

/// Who should hold the card, and which card.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Enrollment {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub external_user_id: String,
    pub card: CardCode,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum CardAction {
    Enable(Enrollment),
    Disable { card: CardCode },
}

/// Validated request; only constructed through `TryFrom<RawCardRequest>`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CardRequest {
    pub id: RequestId,
    pub action: CardAction,
}

impl CardRequest {
    pub fn method(&self) -> RequestMethod {
        match self.action {
            CardAction::Enable(_) => RequestMethod::Enable,
            CardAction::Disable { .. } => RequestMethod::Disable,
        }
    }

    pub fn card(&self) -> &CardCode {
        match &self.action {
            CardAction::Enable(enrollment) => &enrollment.card,
            CardAction::Disable { card } => card,
        }
    }
}

impl TryFrom<RawCardRequest> for CardRequest {
    type Error = BridgeError;

    fn try_from(raw: RawCardRequest) -> Result<Self, Self::Error> {
        let id = raw
            .request_id()
            .ok_or_else(|| BridgeError::invalid("request is missing an id"))?;
        let method: RequestMethod = required(&raw.method, "method")?.parse()?;
        let card = CardCode::parse(&required(&raw.card_code, "card_code")?)?;

        let action = match method {
            RequestMethod::Enable => CardAction::Enable(Enrollment {
                first_name: required(&raw.first_name, "first_name")?,
                last_name: required(&raw.last_name, "last_name")?,
                company: required(&raw.company, "company")?,
                external_user_id: required(&raw.external_user_id, "external_user_id")?,
                card,
            }),
            RequestMethod::Disable => CardAction::Disable { card },
        };

        Ok(CardRequest { id, action })
    }
}

fn required(field: &Option<String>, name: &str) -> Result<String, BridgeError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::invalid(format!("request is missing '{name}'")))
}

/// Terminal outcome reported upstream, exactly once per request id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Success,
    NotDone,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::NotDone => "not_done",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
