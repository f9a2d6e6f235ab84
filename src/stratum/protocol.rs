//! Stratum protocol message definitions
//!
//! Line-delimited JSON-RPC as spoken by ECCPoW miners. Errors travel in the
//! classic `[code, message, null]` array form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stratum protocol methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StratumMethod {
    /// Client subscribes to mining notifications
    Subscribe,
    /// Client authorizes with credentials
    Authorize,
    /// Client submits a share
    Submit,
    /// Server notifies client of new work
    Notify,
    /// Server sets the share difficulty
    SetDifficulty,
    /// Unknown method
    Unknown(String),
}

impl StratumMethod {
    /// Parse method from string
    pub fn parse_method(s: &str) -> Self {
        match s {
            "mining.subscribe" => Self::Subscribe,
            "mining.authorize" => Self::Authorize,
            "mining.submit" => Self::Submit,
            "mining.notify" => Self::Notify,
            "mining.set_difficulty" => Self::SetDifficulty,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscribe => "mining.subscribe",
            Self::Authorize => "mining.authorize",
            Self::Submit => "mining.submit",
            Self::Notify => "mining.notify",
            Self::SetDifficulty => "mining.set_difficulty",
            Self::Unknown(s) => s,
        }
    }
}

/// Error codes sent back to miners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StratumErrorCode {
    /// Generic failure, including bad parameters
    Other,
    /// Method not found
    MethodNotFound,
    /// Connection has not authorized
    Unauthorized,
    /// Job id unknown or evicted
    JobNotFound,
    /// Share already submitted for this job
    DuplicateShare,
    /// Supplied codeword or mix digest failed structural checks
    MalformedEccpowData,
    /// Line was not valid JSON
    ParseError,
}

impl StratumErrorCode {
    /// Numeric code on the wire
    pub fn code(self) -> i32 {
        match self {
            Self::Other => -1,
            Self::MethodNotFound => -3,
            Self::Unauthorized => -10,
            Self::JobNotFound => -21,
            Self::DuplicateShare => -22,
            Self::MalformedEccpowData => -23,
            Self::ParseError => -32700,
        }
    }

    /// Default message for the code
    pub fn message(self) -> &'static str {
        match self {
            Self::Other => "Other/Unknown",
            Self::MethodNotFound => "Method not found",
            Self::Unauthorized => "Unauthorized worker",
            Self::JobNotFound => "Job not found",
            Self::DuplicateShare => "Duplicate share",
            Self::MalformedEccpowData => "Malformed ECCPoW data",
            Self::ParseError => "Parse error",
        }
    }
}

/// Stratum request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumRequest {
    /// Request ID
    pub id: Value,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Vec<Value>,
}

impl StratumRequest {
    /// Create a new request
    pub fn new(id: impl Into<Value>, method: &str, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    /// Get the method as enum
    pub fn method_enum(&self) -> StratumMethod {
        StratumMethod::parse_method(&self.method)
    }
}

/// Stratum response message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumResponse {
    /// Request ID this responds to
    pub id: Value,
    /// Result if successful
    pub result: Option<Value>,
    /// Error if failed
    pub error: Option<Value>,
}

impl StratumResponse {
    /// Create a successful response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, code: i32, message: &str) -> Self {
        Self {
            id,
            result: None,
            error: Some(Value::Array(vec![
                Value::Number(code.into()),
                Value::String(message.to_string()),
                Value::Null,
            ])),
        }
    }

    /// Create an error response with the code's default message
    pub fn error_with_code(id: Value, code: StratumErrorCode) -> Self {
        Self::error(id, code.code(), code.message())
    }

    /// Create an error response with a custom message
    pub fn error_with_code_and_message(id: Value, code: StratumErrorCode, message: &str) -> Self {
        Self::error(id, code.code(), message)
    }

    /// Numeric error code, if this is an error response
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref()?.get(0)?.as_i64()
    }
}

/// Stratum notification (no ID)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumNotification {
    /// Method name
    pub method: String,
    /// Method parameters
    pub params: Vec<Value>,
    /// Always null for notifications
    pub id: Value,
}

impl StratumNotification {
    /// Create a new notification
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            params,
            id: Value::Null,
        }
    }

    /// `mining.set_difficulty`
    pub fn set_difficulty(difficulty: f64) -> Self {
        Self::new(
            StratumMethod::SetDifficulty.as_str(),
            vec![serde_json::json!(difficulty)],
        )
    }
}

/// Generic Stratum message
#[derive(Debug, Clone)]
pub enum StratumMessage {
    /// Request from client
    Request(StratumRequest),
    /// Response to request
    Response(StratumResponse),
    /// Notification (no response expected)
    Notification(StratumNotification),
}

impl StratumMessage {
    /// Parse a JSON string into a Stratum message
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(json)?;

        if value.get("method").is_some() {
            if value.get("id").is_none_or(Value::is_null) {
                let notification: StratumNotification = serde_json::from_value(value)?;
                Ok(StratumMessage::Notification(notification))
            } else {
                let request: StratumRequest = serde_json::from_value(value)?;
                Ok(StratumMessage::Request(request))
            }
        } else {
            let response: StratumResponse = serde_json::from_value(value)?;
            Ok(StratumMessage::Response(response))
        }
    }
}

/// Job parameters for mining.notify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyParams {
    /// Job ID
    pub job_id: String,
    /// Previous block hash, also the header the nonce is searched against
    pub prevhash: String,
    /// Coinbase part 1
    pub coinb1: String,
    /// Coinbase part 2
    pub coinb2: String,
    /// Merkle branches
    pub merkle_branch: Vec<String>,
    /// Block version
    pub version: String,
    /// Network difficulty as `0x` hex
    pub nbits: String,
    /// nTime
    pub ntime: String,
    /// Clean jobs flag
    pub clean_jobs: bool,
}

impl NotifyParams {
    /// Convert to params array for notification
    pub fn to_params(&self) -> Vec<Value> {
        vec![
            Value::String(self.job_id.clone()),
            Value::String(self.prevhash.clone()),
            Value::String(self.coinb1.clone()),
            Value::String(self.coinb2.clone()),
            Value::Array(
                self.merkle_branch
                    .iter()
                    .map(|s| Value::String(s.clone()))
                    .collect(),
            ),
            Value::String(self.version.clone()),
            Value::String(self.nbits.clone()),
            Value::String(self.ntime.clone()),
            Value::Bool(self.clean_jobs),
        ]
    }

    /// Wrap as a `mining.notify` notification
    pub fn into_notification(self) -> StratumNotification {
        StratumNotification::new(StratumMethod::Notify.as_str(), self.to_params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stratum_method() {
        assert_eq!(
            StratumMethod::parse_method("mining.subscribe"),
            StratumMethod::Subscribe
        );
        assert_eq!(StratumMethod::SetDifficulty.as_str(), "mining.set_difficulty");

        let unknown = StratumMethod::parse_method("mining.extranonce.subscribe");
        assert!(matches!(unknown, StratumMethod::Unknown(_)));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StratumErrorCode::Unauthorized.code(), -10);
        assert_eq!(StratumErrorCode::JobNotFound.code(), -21);
        assert_eq!(StratumErrorCode::DuplicateShare.code(), -22);
        assert_eq!(StratumErrorCode::MalformedEccpowData.code(), -23);
        assert_eq!(StratumErrorCode::MethodNotFound.code(), -3);
        assert_eq!(StratumErrorCode::ParseError.code(), -32700);
        assert_eq!(StratumErrorCode::Other.code(), -1);
    }

    #[test]
    fn test_stratum_response() {
        let success = StratumResponse::success(json!(1), Value::Bool(true));
        assert!(success.result.is_some());
        assert!(success.error.is_none());
        assert_eq!(success.error_code(), None);

        let error = StratumResponse::error_with_code(json!(2), StratumErrorCode::DuplicateShare);
        assert!(error.result.is_none());
        assert_eq!(error.error, Some(json!([-22, "Duplicate share", null])));
        assert_eq!(error.error_code(), Some(-22));
    }

    #[test]
    fn test_stratum_message_parsing() {
        let req_json = r#"{"id":1,"method":"mining.subscribe","params":[]}"#;
        let msg = StratumMessage::from_json(req_json).unwrap();
        assert!(matches!(msg, StratumMessage::Request(_)));

        let no_params = r#"{"id":1,"method":"mining.subscribe"}"#;
        assert!(matches!(
            StratumMessage::from_json(no_params).unwrap(),
            StratumMessage::Request(_)
        ));

        let resp_json = r#"{"id":1,"result":true,"error":null}"#;
        let msg = StratumMessage::from_json(resp_json).unwrap();
        assert!(matches!(msg, StratumMessage::Response(_)));

        let notif_json = r#"{"id":null,"method":"mining.notify","params":[]}"#;
        let msg = StratumMessage::from_json(notif_json).unwrap();
        assert!(matches!(msg, StratumMessage::Notification(_)));

        assert!(StratumMessage::from_json("{broken").is_err());
    }

    #[test]
    fn test_notify_params() {
        let notify = NotifyParams {
            job_id: "1a".to_string(),
            prevhash: format!("0x{}", "00".repeat(32)),
            coinb1: String::new(),
            coinb2: String::new(),
            merkle_branch: vec![],
            version: "0x20000000".to_string(),
            nbits: "0x3e8".to_string(),
            ntime: "65f0a1b2".to_string(),
            clean_jobs: true,
        };

        let params = notify.to_params();
        assert_eq!(params.len(), 9);
        assert_eq!(params[0], json!("1a"));
        assert_eq!(params[4], json!([]));
        assert_eq!(params[8], json!(true));

        let line = serde_json::to_value(notify.into_notification()).unwrap();
        assert_eq!(line["method"], "mining.notify");
        assert_eq!(line["id"], Value::Null);
    }

    #[test]
    fn test_set_difficulty() {
        let notif = StratumNotification::set_difficulty(1100.0);
        assert_eq!(notif.method, "mining.set_difficulty");
        assert_eq!(notif.params, vec![json!(1100.0)]);
    }
}
