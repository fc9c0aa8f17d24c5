use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::Snafu;

/// Frappe whitelisted method the widget posts to when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "/api/method/chatbot.api.chatbot_api.receive_user_input";
/// Header carrying the host page's anti-forgery token.
pub const DEFAULT_CSRF_HEADER: &str = "X-Frappe-CSRF-Token";
pub const HTTP_RESPONDER_ID: &str = "http";
pub const ECHO_RESPONDER_ID: &str = "echo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_responder_id")]
    pub responder_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Opaque credential supplied by the host page. Never refreshed here.
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            responder_id: default_responder_id(),
            endpoint: default_endpoint(),
            csrf_token: String::new(),
            csrf_header: default_csrf_header(),
        }
    }
}

impl ResponderConfig {
    pub fn new(endpoint: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            csrf_token: csrf_token.into().trim().to_string(),
            ..Self::default()
        }
    }

    pub fn echo() -> Self {
        Self {
            responder_id: ECHO_RESPONDER_ID.to_string(),
            ..Self::default()
        }
    }

    pub fn with_csrf_header(mut self, header: impl Into<String>) -> Self {
        self.csrf_header = header.into().trim().to_string();
        self
    }

    pub fn normalized(mut self) -> Self {
        self.responder_id = if self.responder_id.trim().is_empty() {
            default_responder_id()
        } else {
            self.responder_id.trim().to_ascii_lowercase()
        };
        self.endpoint = self.endpoint.trim().to_string();
        self.csrf_token = self.csrf_token.trim().to_string();
        self.csrf_header = if self.csrf_header.trim().is_empty() {
            default_csrf_header()
        } else {
            self.csrf_header.trim().to_string()
        };
        self
    }
}

/// One user message bound for the responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyRequest {
    pub message: String,
}

impl ReplyRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Reply payload as returned by the responder.
///
/// `message` keeps the raw JSON value: a plain string, `null`/absent, or structured
/// content the widget serializes for display.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub message: Option<Value>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: Some(Value::String(text.into())),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            message: Some(value),
        }
    }

    pub fn empty() -> Self {
        Self { message: None }
    }

    /// Returns the reply value unless it is absent, `null`, or an empty string.
    pub fn into_content(self) -> Option<Value> {
        match self.message {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) if text.is_empty() => None,
            Some(value) => Some(value),
        }
    }
}

pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = ResponderResult<Reply>> + 'a>>;
pub type ResponderResult<T> = Result<T, ResponderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResponderError {
    #[snafu(display("responder '{responder_id}' has no endpoint configured"))]
    MissingEndpoint {
        stage: &'static str,
        responder_id: String,
    },
    #[snafu(display("responder '{responder_id}' requires an anti-forgery token"))]
    MissingCsrfToken {
        stage: &'static str,
        responder_id: String,
    },
    #[snafu(display("invalid request header '{header}' on `{stage}`: {details}"))]
    InvalidHeader {
        stage: &'static str,
        header: String,
        details: String,
    },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("transport failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("responder returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to parse responder payload on `{stage}`: {source}"))]
    PayloadParse {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("responder payload is a JSON {kind}, expected an object on `{stage}`"))]
    PayloadShape {
        stage: &'static str,
        kind: &'static str,
    },
    #[snafu(display("responder '{responder_id}' is not supported"))]
    UnsupportedResponder {
        stage: &'static str,
        responder_id: String,
    },
}

/// Maps free text to a reply.
///
/// Futures are not required to be `Send`: the widget drives exchanges on a
/// single-threaded event loop, which is also what the browser fetch API allows.
pub trait Responder {
    fn id(&self) -> &str;
    fn reply<'a>(&'a self, request: ReplyRequest) -> ReplyFuture<'a>;
}

fn default_responder_id() -> String {
    HTTP_RESPONDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_csrf_header() -> String {
    DEFAULT_CSRF_HEADER.to_string()
}
