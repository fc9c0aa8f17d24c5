use std::rc::Rc;

mod echo;
mod http;
mod responder;

pub use echo::{
    DEFAULT_ECHO_USER, EchoResponder, extract_product_candidate, looks_like_injection,
    looks_like_inventory_question, normalize_query,
};
pub use http::HttpResponder;
pub use responder::{
    DEFAULT_CSRF_HEADER, DEFAULT_ENDPOINT, ECHO_RESPONDER_ID, HTTP_RESPONDER_ID, Reply,
    ReplyFuture, ReplyRequest, Responder, ResponderConfig, ResponderError, ResponderResult,
};

pub fn create_responder(config: ResponderConfig) -> ResponderResult<Rc<dyn Responder>> {
    let config = config.normalized();

    match config.responder_id.as_str() {
        HTTP_RESPONDER_ID => Ok(Rc::new(HttpResponder::new(config)?)),
        ECHO_RESPONDER_ID => Ok(Rc::new(EchoResponder::default())),
        _ => Err(ResponderError::UnsupportedResponder {
            stage: "create-responder",
            responder_id: config.responder_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_responder_selects_by_id() {
        let echo = create_responder(ResponderConfig::echo()).unwrap();
        assert_eq!(echo.id(), ECHO_RESPONDER_ID);

        let http =
            create_responder(ResponderConfig::new("https://erp.example.com/chat", "token")).unwrap();
        assert_eq!(http.id(), HTTP_RESPONDER_ID);

        let unknown = create_responder(ResponderConfig {
            responder_id: "carrier-pigeon".to_string(),
            ..ResponderConfig::default()
        });
        assert!(matches!(
            unknown,
            Err(ResponderError::UnsupportedResponder { .. })
        ));
    }
}
