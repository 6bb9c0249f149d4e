use async_trait::async_trait;
use chrono::NaiveDateTime;
use eyre::{Result, eyre};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Subject used for `/send-email` when the caller does not supply one.
pub const DEFAULT_EMAIL_SUBJECT: &str = "Información de Tolkien de Elendur";

/// Layout of the `timestamp` field returned by `/chat`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Failure of a single round trip to the backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent, or the response could not be read.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The backend answered with a non-success status.
    #[error("server rejected the request with status {status}")]
    ServerRejected { status: u16, detail: Option<String> },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::ConnectionFailure(err.to_string())
    }
}

impl TransportError {
    /// The server-supplied detail text, if the backend sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TransportError::ServerRejected { detail, .. } => detail.as_deref(),
            TransportError::ConnectionFailure(_) => None,
        }
    }
}

/// A successful answer from `/chat`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub email_capable: bool,
    pub offer_download: bool,
    pub assistant_name: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Acknowledgement from `/send-email`. Both fields are informational.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmailAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// Opaque document body returned by `/generate-pdf`.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfDocument {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    response: String,
    #[serde(default)]
    email_available: bool,
    #[serde(default)]
    ask_for_download: bool,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    assistant_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// The three calls the chat front end makes against its backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ask_question(&self, message: &str) -> Result<ChatReply, TransportError>;

    async fn send_email(
        &self,
        recipient: &str,
        body: &str,
        subject: Option<&str>,
    ) -> Result<EmailAck, TransportError>;

    async fn request_pdf(&self, question: &str, answer: &str) -> Result<PdfDocument, TransportError>;
}

pub struct ElendurClient {
    client: reqwest::Client,
    chat_url: Url,
    email_url: Url,
    pdf_url: Url,
}

impl ElendurClient {
    /// Builds a client whose endpoints live directly beneath `base_url`.
    pub fn new(base_url: &Url) -> Result<Self> {
        let endpoint = |path: &str| {
            base_url
                .join(path)
                .map_err(|e| eyre!("Invalid endpoint {} for base URL {}: {}", path, base_url, e))
        };

        Ok(Self {
            client: reqwest::Client::new(),
            chat_url: endpoint("chat")?,
            email_url: endpoint("send-email")?,
            pdf_url: endpoint("generate-pdf")?,
        })
    }

    async fn post(&self, url: &Url, body: &Value) -> Result<reqwest::Response, TransportError> {
        debug!("POST {}", url);

        let response = self.client.post(url.clone()).json(body).send().await.map_err(|e| {
            debug!("Request to {} failed: {}", url, e);
            TransportError::from(e)
        })?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Backend for ElendurClient {
    async fn ask_question(&self, message: &str) -> Result<ChatReply, TransportError> {
        let response = self.post(&self.chat_url, &json!({ "message": message })).await?;
        let body: ChatResponseBody = response.json().await?;

        debug!(
            email_available = body.email_available,
            ask_for_download = body.ask_for_download,
            "Received chat reply"
        );

        Ok(ChatReply {
            timestamp: body.timestamp.as_deref().and_then(parse_timestamp),
            reply: body.response,
            email_capable: body.email_available,
            offer_download: body.ask_for_download,
            assistant_name: body.assistant_name,
        })
    }

    async fn send_email(
        &self,
        recipient: &str,
        body: &str,
        subject: Option<&str>,
    ) -> Result<EmailAck, TransportError> {
        let request_body = json!({
            "recipient_email": recipient,
            "subject": subject.unwrap_or(DEFAULT_EMAIL_SUBJECT),
            "body": body,
        });

        let response = self.post(&self.email_url, &request_body).await?;
        let text = response.text().await?;

        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    async fn request_pdf(&self, question: &str, answer: &str) -> Result<PdfDocument, TransportError> {
        let request_body = json!({ "question": question, "answer": answer });

        let response = self.post(&self.pdf_url, &request_body).await?;
        let bytes = response.bytes().await?;

        debug!("Received PDF document of {} bytes", bytes.len());

        Ok(PdfDocument { bytes: bytes.to_vec() })
    }
}

async fn rejection(response: reqwest::Response) -> TransportError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    debug!("Backend rejected request with status {}: {}", status, text);

    TransportError::ServerRejected {
        status: status.as_u16(),
        detail: extract_detail(&text),
    }
}

fn extract_detail(text: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(text).ok()?;

    match body.detail? {
        Value::String(detail) => Some(detail),
        other => Some(other.to_string()),
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}
