use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;

use super::responder::{ECHO_RESPONDER_ID, Reply, ReplyFuture, ReplyRequest, Responder};

pub const DEFAULT_ECHO_USER: &str = "Guest";

const INVENTORY_PHRASES: &[&str] = &["do you have", "is there", "available", "in stock", "have any"];
const INVENTORY_STOP_WORDS: &[&str] = &["do", "you", "have", "any", "is", "there", "in", "stock"];
/// SQL keywords, then comment and quote markers. `<`, `>`, `&` and `"` count as markers
/// because the backend escapes input before screening and every entity ends in `;`.
const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|EXEC|UNION|GRANT|TRUNCATE)\b",
    r#"--|;|'|[<>&"]"#,
];

/// In-process stand-in for the chatbot backend method.
///
/// Screens input the way the server method does and answers with the same mix of
/// plain and structured replies. Markup is left alone; the widget escapes on render.
pub struct EchoResponder {
    user: String,
}

impl EchoResponder {
    pub fn new(user: impl Into<String>) -> Self {
        let user = user.into().trim().to_string();
        Self {
            user: if user.is_empty() {
                DEFAULT_ECHO_USER.to_string()
            } else {
                user
            },
        }
    }

    pub fn answer(&self, message: &str) -> Reply {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Reply::structured(json!({ "message": "Please enter text" }));
        }

        if looks_like_injection(trimmed) {
            tracing::debug!(responder_id = ECHO_RESPONDER_ID, "echo responder screened input");
            return Reply::structured(json!({ "message": "Invalid input" }));
        }

        let normalized = normalize_query(trimmed);
        if looks_like_inventory_question(&normalized) {
            return match extract_product_candidate(&normalized) {
                Some(product) => Reply::text(format!(
                    "Hello {}, let me check whether we have {product} in stock.",
                    self.user
                )),
                None => Reply::text(format!(
                    "Hello {}, which product are you looking for?",
                    self.user
                )),
            };
        }

        Reply::text(format!("Hello {}, you asked: {trimmed}", self.user))
    }
}

impl Default for EchoResponder {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_USER)
    }
}

impl Responder for EchoResponder {
    fn id(&self) -> &str {
        ECHO_RESPONDER_ID
    }

    fn reply<'a>(&'a self, request: ReplyRequest) -> ReplyFuture<'a> {
        let reply = self.answer(&request.message);
        Box::pin(async move { Ok(reply) })
    }
}

fn injection_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INJECTION_PATTERNS
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(error) => {
                    tracing::error!(
                        pattern = %pattern,
                        error = %error,
                        "failed to compile screening pattern"
                    );
                    None
                }
            })
            .collect()
    })
}

pub fn looks_like_injection(text: &str) -> bool {
    injection_patterns()
        .iter()
        .any(|pattern| pattern.is_match(text))
}

/// Lowercases and keeps only ASCII letters, digits and whitespace.
pub fn normalize_query(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn looks_like_inventory_question(text: &str) -> bool {
    INVENTORY_PHRASES.iter().any(|phrase| text.contains(phrase))
}

pub fn extract_product_candidate(text: &str) -> Option<String> {
    let normalized = normalize_query(text);
    let candidates = normalized
        .split_whitespace()
        .filter(|word| !INVENTORY_STOP_WORDS.contains(word))
        .collect::<Vec<_>>();

    if candidates.is_empty() {
        None
    } else {
        Some(candidates.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_gets_structured_prompt() {
        let reply = EchoResponder::default().answer("   ");
        assert_eq!(
            reply.into_content(),
            Some(json!({ "message": "Please enter text" }))
        );
    }

    #[test]
    fn sql_keywords_and_comment_markers_are_screened() {
        let responder = EchoResponder::default();
        for input in [
            "select * from tabUser",
            "hello -- world",
            "a; b",
            "a < b",
            "fish & chips",
            r#"say "hi""#,
        ] {
            assert_eq!(
                responder.answer(input).into_content(),
                Some(json!({ "message": "Invalid input" })),
                "input {input:?} should be screened"
            );
        }
    }

    #[test]
    fn keywords_inside_words_are_not_screened() {
        let reply = EchoResponder::new("Ada").answer("please reselect the dropdown");
        assert_eq!(
            reply.into_content(),
            Some(json!("Hello Ada, you asked: please reselect the dropdown"))
        );
    }

    #[test]
    fn inventory_questions_name_the_product() {
        let reply = EchoResponder::new("Ada").answer("Do you have blue pens in stock?");
        assert_eq!(
            reply.into_content(),
            Some(json!("Hello Ada, let me check whether we have blue pens in stock."))
        );
    }

    #[test]
    fn punctuation_is_stripped_from_product_candidates() {
        assert_eq!(
            extract_product_candidate("Do you have pens, pencils?"),
            Some("pens pencils".to_string())
        );
        assert_eq!(normalize_query("  Is THERE Coffee?! "), "is there coffee");

        let reply = EchoResponder::new("Ada").answer("Any notebooks AVAILABLE?");
        assert_eq!(
            reply.into_content(),
            Some(json!(
                "Hello Ada, let me check whether we have notebooks available in stock."
            ))
        );
    }

    #[test]
    fn every_screening_pattern_compiles() {
        assert_eq!(injection_patterns().len(), INJECTION_PATTERNS.len());
    }

    #[test]
    fn product_candidate_is_none_when_only_stop_words_remain() {
        assert_eq!(extract_product_candidate("do you have any"), None);
        assert_eq!(
            extract_product_candidate("is there coffee"),
            Some("coffee".to_string())
        );
    }
}
