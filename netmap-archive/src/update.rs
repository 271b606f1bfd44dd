use serde::{Deserialize, Serialize};

/// One fact learned from a single archive record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Fact {
    /// Request headers; only used to resolve relative via URLs
    #[serde(rename_all = "camelCase")]
    Request {
        referrer: Option<String>,
        host: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        status_code: i32,
        content_type: Option<String>,
        content_length: i64,
    },
    #[serde(rename_all = "camelCase")]
    Metadata { via_url: Option<String>, seed: bool },
    /// A complete ARC exchange: request, response and capture metadata at once
    #[serde(rename_all = "camelCase")]
    Exchange {
        status_code: i32,
        content_type: Option<String>,
        content_length: i64,
    },
}

/// Partial update for the node identified by `session_key`.
///
/// Records of the same logical exchange share a session key, so the graph
/// builder can merge their facts into one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    pub session_key: String,
    pub url: String,
    pub offset: u64,
    pub fact: Fact,
}

impl NodeUpdate {
    pub fn new(session_key: impl Into<String>, url: impl Into<String>, offset: u64, fact: Fact) -> Self {
        Self {
            session_key: session_key.into(),
            url: url.into(),
            offset,
            fact,
        }
    }
}
