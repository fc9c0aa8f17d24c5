use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use snafu::{ResultExt, ensure};

use super::responder::{
    BuildClientSnafu, InvalidHeaderSnafu, MissingCsrfTokenSnafu, MissingEndpointSnafu,
    PayloadParseSnafu, PayloadShapeSnafu, Reply, ReplyFuture, ReplyRequest, Responder,
    ResponderConfig, ResponderResult, StatusSnafu, TransportSnafu,
};

/// Posts `{ "message": ... }` to a single JSON endpoint.
///
/// The anti-forgery token is captured at construction and attached to every request.
/// No timeout is set here; requests run until the transport gives up.
pub struct HttpResponder {
    config: ResponderConfig,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpResponder {
    pub fn new(config: ResponderConfig) -> ResponderResult<Self> {
        let config = config.normalized();

        ensure!(
            !config.endpoint.is_empty(),
            MissingEndpointSnafu {
                stage: "http-responder-new",
                responder_id: config.responder_id.clone(),
            }
        );
        ensure!(
            !config.csrf_token.is_empty(),
            MissingCsrfTokenSnafu {
                stage: "http-responder-new",
                responder_id: config.responder_id.clone(),
            }
        );

        let headers = Self::build_headers(&config)?;
        let client = reqwest::Client::builder().build().context(BuildClientSnafu {
            stage: "build-client",
        })?;

        Ok(Self {
            config,
            client,
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn build_headers(config: &ResponderConfig) -> ResponderResult<HeaderMap> {
        let name = HeaderName::from_bytes(config.csrf_header.as_bytes()).map_err(|source| {
            InvalidHeaderSnafu {
                stage: "parse-csrf-header-name",
                header: config.csrf_header.clone(),
                details: source.to_string(),
            }
            .build()
        })?;
        let mut value = HeaderValue::from_str(&config.csrf_token).map_err(|source| {
            InvalidHeaderSnafu {
                stage: "parse-csrf-header-value",
                header: config.csrf_header.clone(),
                details: source.to_string(),
            }
            .build()
        })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(name, value);
        Ok(headers)
    }

    async fn post_message(&self, request: ReplyRequest) -> ResponderResult<Reply> {
        tracing::debug!(
            responder_id = %self.config.responder_id,
            endpoint = %self.config.endpoint,
            message_len = request.message.len(),
            "posting message to responder"
        );

        let response = self
            .client
            .post(self.config.endpoint.as_str())
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-reply-request",
            })?;

        let status = response.status();
        let body = response.text().await.context(TransportSnafu {
            stage: "read-reply-response",
        })?;

        if !status.is_success() {
            return StatusSnafu {
                stage: "reply-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let payload = serde_json::from_str::<Value>(&body).context(PayloadParseSnafu {
            stage: "parse-reply-payload",
        })?;
        ensure!(
            payload.is_object(),
            PayloadShapeSnafu {
                stage: "check-reply-payload",
                kind: json_kind(&payload),
            }
        );

        serde_json::from_value::<Reply>(payload).context(PayloadParseSnafu {
            stage: "decode-reply-payload",
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Responder for HttpResponder {
    fn id(&self) -> &str {
        &self.config.responder_id
    }

    fn reply<'a>(&'a self, request: ReplyRequest) -> ReplyFuture<'a> {
        Box::pin(self.post_message(request))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::ResponderError;

    const METHOD_PATH: &str = "/api/method/chatbot.api.chatbot_api.receive_user_input";

    fn responder_for(server: &MockServer) -> HttpResponder {
        let config = ResponderConfig::new(format!("{}{METHOD_PATH}", server.uri()), "csrf-123");
        HttpResponder::new(config).unwrap()
    }

    #[tokio::test]
    async fn posts_message_with_token_header_and_reads_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(METHOD_PATH))
            .and(header("X-Frappe-CSRF-Token", "csrf-123"))
            .and(body_json(json!({"message": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "hi there"})))
            .expect(1)
            .mount(&server)
            .await;

        let reply = responder_for(&server)
            .reply(ReplyRequest::new("hello"))
            .await
            .unwrap();

        assert_eq!(reply.into_content(), Some(json!("hi there")));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(METHOD_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let error = responder_for(&server)
            .reply(ReplyRequest::new("hello"))
            .await
            .unwrap_err();

        match error {
            ResponderError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(METHOD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let error = responder_for(&server)
            .reply(ReplyRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(error, ResponderError::PayloadParse { .. }));
    }

    #[tokio::test]
    async fn non_object_payloads_are_errors() {
        for (body, kind) in [
            (json!([]), "array"),
            (json!(["hi there"]), "array"),
            (json!("hi there"), "string"),
            (json!(null), "null"),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(METHOD_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;

            let error = responder_for(&server)
                .reply(ReplyRequest::new("hello"))
                .await
                .unwrap_err();

            assert!(
                matches!(error, ResponderError::PayloadShape { kind: found, .. } if found == kind),
                "body {body} should be rejected, got {error:?}"
            );
        }
    }

    #[tokio::test]
    async fn missing_reply_field_yields_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(METHOD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let reply = responder_for(&server)
            .reply(ReplyRequest::new("ping"))
            .await
            .unwrap();

        assert_eq!(reply.into_content(), None);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let responder =
            HttpResponder::new(ResponderConfig::new("http://127.0.0.1:1/chat", "csrf-123"))
                .unwrap();
        let error = responder
            .reply(ReplyRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(error, ResponderError::Transport { .. }));
    }

    #[test]
    fn construction_requires_endpoint_and_token() {
        let missing_token = HttpResponder::new(ResponderConfig::new("http://localhost/chat", " "));
        assert!(matches!(
            missing_token,
            Err(ResponderError::MissingCsrfToken { .. })
        ));

        let missing_endpoint = HttpResponder::new(ResponderConfig::new("", "token"));
        assert!(matches!(
            missing_endpoint,
            Err(ResponderError::MissingEndpoint { .. })
        ));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let config =
            ResponderConfig::new("http://localhost/chat", "token").with_csrf_header("bad header");
        assert!(matches!(
            HttpResponder::new(config),
            Err(ResponderError::InvalidHeader { .. })
        ));
    }
}
