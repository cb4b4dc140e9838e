//! Conversions between the generated protobuf messages and the typed API.

use crate::api;
use crate::proto;
use crate::types::{Document, TicketStatus};

impl From<TicketStatus> for proto::TicketStatus {
    fn from(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Created => Self::Created,
            TicketStatus::InProgress => Self::InProgress,
            TicketStatus::Started => Self::Started,
            TicketStatus::Finished => Self::Finished,
        }
    }
}

impl TryFrom<proto::TicketStatus> for TicketStatus {
    type Error = crate::Error;

    fn try_from(status: proto::TicketStatus) -> Result<Self, Self::Error> {
        match status {
            proto::TicketStatus::Created => Ok(Self::Created),
            proto::TicketStatus::InProgress => Ok(Self::InProgress),
            proto::TicketStatus::Started => Ok(Self::Started),
            proto::TicketStatus::Finished => Ok(Self::Finished),
            proto::TicketStatus::Unspecified => {
                Err(crate::Error::invalid_argument("ticket status is unspecified"))
            }
        }
    }
}

impl From<Document> for proto::Document {
    fn from(doc: Document) -> Self {
        Self {
            content: doc.content,
            title: doc.title,
            author: doc.author,
            topic: doc.topic,
        }
    }
}

impl From<proto::Document> for Document {
    fn from(doc: proto::Document) -> Self {
        Self {
            content: doc.content,
            title: doc.title,
            author: doc.author,
            topic: doc.topic,
        }
    }
}

impl From<proto::ServiceStatusRequest> for api::ServiceStatusRequest {
    fn from(_: proto::ServiceStatusRequest) -> Self {
        Self {}
    }
}

impl From<api::ServiceStatusResponse> for proto::ServiceStatusReply {
    fn from(resp: api::ServiceStatusResponse) -> Self {
        Self { code: resp.code }
    }
}

impl From<proto::StatusRequest> for api::StatusRequest {
    fn from(req: proto::StatusRequest) -> Self {
        Self {
            ticket_id: req.ticket_id,
        }
    }
}

impl From<api::StatusResponse> for proto::StatusReply {
    fn from(resp: api::StatusResponse) -> Self {
        Self {
            status: proto::TicketStatus::from(resp.status).into(),
        }
    }
}

// A missing document decodes like an empty JSON body: every field defaults.
impl From<proto::AddDocumentRequest> for api::AddDocumentRequest {
    fn from(req: proto::AddDocumentRequest) -> Self {
        Document::from(req.document.unwrap_or_default()).into()
    }
}

impl From<api::AddDocumentResponse> for proto::AddDocumentReply {
    fn from(resp: api::AddDocumentResponse) -> Self {
        Self {
            ticket_id: resp.ticket_id,
        }
    }
}

impl From<proto::GetRequest> for api::GetRequest {
    fn from(req: proto::GetRequest) -> Self {
        Self {
            filters: req.filters.into_iter().collect(),
        }
    }
}

impl From<api::GetResponse> for proto::GetReply {
    fn from(resp: api::GetResponse) -> Self {
        Self {
            documents: resp.documents.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<proto::WatermarkRequest> for api::WatermarkRequest {
    fn from(req: proto::WatermarkRequest) -> Self {
        Self {
            ticket_id: req.ticket_id,
            mark: req.mark,
        }
    }
}

impl From<api::WatermarkResponse> for proto::WatermarkReply {
    fn from(resp: api::WatermarkResponse) -> Self {
        Self {
            result: resp.result,
        }
    }
}
