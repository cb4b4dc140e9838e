//! One concrete request/response pair per workflow operation.
//!
//! These are the shapes the endpoint layer speaks. The HTTP adapter decodes
//! them straight from JSON (an empty body yields `Default`), the gRPC adapter
//! converts to them from the generated protobuf messages. Field names on the
//! JSON side are part of the public interface.

use crate::types::{Document, TicketStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceStatusRequest {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatusResponse {
    pub code: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatusRequest {
    #[serde(rename = "ticketID")]
    pub ticket_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TicketStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddDocumentRequest {
    pub content: String,
    pub title: String,
    pub author: String,
    pub topic: String,
}

impl From<AddDocumentRequest> for Document {
    fn from(req: AddDocumentRequest) -> Self {
        Self {
            content: req.content,
            title: req.title,
            author: req.author,
            topic: req.topic,
        }
    }
}

impl From<Document> for AddDocumentRequest {
    fn from(doc: Document) -> Self {
        Self {
            content: doc.content,
            title: doc.title,
            author: doc.author,
            topic: doc.topic,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDocumentResponse {
    #[serde(rename = "ticketID")]
    pub ticket_id: String,
}

/// Filter keys are validated by the endpoint, not here, so both transports
/// reject unknown keys the same way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GetRequest {
    pub filters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub documents: Vec<Document>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkRequest {
    #[serde(rename = "ticketID")]
    pub ticket_id: String,
    pub mark: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkResponse {
    pub result: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_use_ticket_id_casing() {
        let req: WatermarkRequest =
            serde_json::from_str(r#"{"ticketID":"abc","mark":"m"}"#).unwrap();
        assert_eq!(req.ticket_id, "abc");
        assert_eq!(req.mark, "m");

        let body = serde_json::to_value(AddDocumentResponse {
            ticket_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "ticketID": "abc" }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<StatusRequest>(r#"{"ticket":"abc"}"#).is_err());
        assert!(serde_json::from_str::<ServiceStatusRequest>(r#"{"x":1}"#).is_err());
        assert!(serde_json::from_str::<ServiceStatusRequest>("{}").is_ok());
    }

    #[test]
    fn partial_documents_decode_with_defaults() {
        let req: AddDocumentRequest =
            serde_json::from_str(r#"{"title":"T","author":"A"}"#).unwrap();
        let doc = Document::from(req);
        assert_eq!(doc.title, "T");
        assert!(doc.content.is_empty());
    }
}
