use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// One request line. The caller's session layer supplies `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Auth {
        password: String,
    },
    AddItem {
        /// Generated when absent.
        #[serde(default)]
        id: Option<Ulid>,
        name: String,
        rate_per_day: Decimal,
        #[serde(default)]
        under_maintenance: bool,
    },
    SetMaintenance {
        item_id: Ulid,
        under_maintenance: bool,
    },
    GetItem {
        item_id: Ulid,
    },
    Quote {
        item_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Reserve {
        user_id: Ulid,
        item_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    Cancel {
        user_id: Ulid,
        reservation_id: Ulid,
    },
    GetReservation {
        reservation_id: Ulid,
    },
    ListReservations {
        user_id: Ulid,
    },
    LatestReservation {
        user_id: Ulid,
    },
    GetPayment {
        user_id: Ulid,
        reservation_id: Ulid,
    },
}

/// One response line: `{"ok": ...}` or `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(serde_json::Value),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error(ErrorBody {
            code: code.to_string(),
            message: message.into(),
            retryable: false,
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}

impl From<&EngineError> for Response {
    fn from(e: &EngineError) -> Self {
        Response::Error(ErrorBody {
            code: e.code().to_string(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        })
    }
}

impl From<&ProtocolError> for Response {
    fn from(e: &ProtocolError) -> Self {
        Response::error(e.code(), e.to_string())
    }
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    serde_json::from_str(trimmed).map_err(|e| ProtocolError::Parse(e.to_string()))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ProtocolError {
    Parse(String),
    Empty,
    LineTooLong,
    Unauthenticated,
    AuthFailed,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Parse(_) | ProtocolError::Empty => "ParseError",
            ProtocolError::LineTooLong => "LineTooLong",
            ProtocolError::Unauthenticated => "Unauthenticated",
            ProtocolError::AuthFailed => "AuthFailed",
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Parse(s) => write!(f, "parse error: {s}"),
            ProtocolError::Empty => write!(f, "empty request"),
            ProtocolError::LineTooLong => write!(f, "request line too long"),
            ProtocolError::Unauthenticated => write!(f, "authenticate first"),
            ProtocolError::AuthFailed => write!(f, "password authentication failed"),
        }
    }
}

impl std::error::Error for ProtocolError {}
