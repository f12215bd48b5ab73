//! HTTP Protocol
//!
//! Endpoint paths, query parameters and the response envelope. Every
//! endpoint is a GET and always answers HTTP 200; success or failure is
//! carried in the envelope's `status` field (`EDFS200`, `EDFS204`, `EDFS400`).

use crate::error::{EdfsError, STATUS_NO_CONTENT, STATUS_OK};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

pub const ENDPOINT_MKDIR: &str = "/mkdir";
pub const ENDPOINT_LS: &str = "/ls";
pub const ENDPOINT_RM: &str = "/rm";
pub const ENDPOINT_CAT: &str = "/cat";
pub const ENDPOINT_PUT: &str = "/put";
pub const ENDPOINT_PARTITION_LOCATIONS: &str = "/getPartitionLocations";
pub const ENDPOINT_READ_PARTITION: &str = "/readPartition";
pub const ENDPOINT_AVG: &str = "/getAvg";
pub const ENDPOINT_MAX: &str = "/getMax";
pub const ENDPOINT_MIN: &str = "/getMin";
pub const ENDPOINT_DATANODES: &str = "/datanodes";

// --- Query Parameters ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PathParams {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutParams {
    /// Local CSV file to ingest.
    pub source: String,
    pub destination: String,
    pub partitions: u32,
    pub hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationParams {
    pub path: String,
    pub hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadPartitionParams {
    pub path: String,
    /// 1-based.
    pub partition: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AggregateParams {
    pub path: String,
    pub col: String,
    pub hash: Option<String>,
    /// Accepts `true`/`false` in any case, or `1`/`0`.
    pub debug: Option<String>,
}

impl AggregateParams {
    pub fn debug_enabled(&self) -> bool {
        self.debug
            .as_deref()
            .is_some_and(|d| d.eq_ignore_ascii_case("true") || d == "1")
    }
}

// --- Envelope ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub response: serde_json::Value,
    pub status: String,
}

impl Envelope {
    pub fn ok(response: impl Into<serde_json::Value>) -> Self {
        Self {
            response: response.into(),
            status: STATUS_OK.to_string(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            response: serde_json::Value::String(String::new()),
            status: STATUS_NO_CONTENT.to_string(),
        }
    }

    pub fn error(command: &str, err: &EdfsError) -> Self {
        Self {
            response: serde_json::Value::String(format!("{}: {}", command, err)),
            status: err.status().to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}
