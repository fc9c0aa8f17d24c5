use serde_json::Value;

/// Stable identifier for one transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one submit/settle cycle.
///
/// A settle must carry the id of the exchange that began, so a late release can never
/// free a newer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

impl ExchangeId {
    /// Creates a typed exchange identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

/// Content accepted by the transcript before it is turned into display text.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl MessageContent {
    /// Maps a responder reply value into content. Strings stay text; other JSON values
    /// are kept structured and serialized for display.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }

    pub fn into_display_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(id: MessageId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
        }
    }
}

/// Send lifecycle of the widget. At most one exchange is pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    #[default]
    Idle,
    Pending(ExchangeId),
}

/// State transition input for the send lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTransition {
    Begin(ExchangeId),
    Settle(ExchangeId),
}

/// Rejection reason for illegal send transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTransitionRejection {
    AlreadyPending {
        active: ExchangeId,
        attempted: ExchangeId,
    },
    NotPending,
    ExchangeMismatch {
        active: ExchangeId,
        attempted: ExchangeId,
    },
}

pub type SendTransitionResult = Result<SendState, SendTransitionRejection>;

impl SendState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns the pending exchange if and only if state is `Pending`.
    pub fn pending_exchange(&self) -> Option<ExchangeId> {
        match self {
            Self::Pending(exchange) => Some(*exchange),
            Self::Idle => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// `Begin` is only legal from `Idle`; `Settle` must name the pending exchange.
    pub fn apply(&self, transition: SendTransition) -> SendTransitionResult {
        match (self, transition) {
            (Self::Idle, SendTransition::Begin(exchange)) => Ok(Self::Pending(exchange)),
            (Self::Pending(active), SendTransition::Begin(attempted)) => {
                Err(SendTransitionRejection::AlreadyPending {
                    active: *active,
                    attempted,
                })
            }
            (Self::Pending(active), SendTransition::Settle(exchange)) if *active == exchange => {
                Ok(Self::Idle)
            }
            (Self::Pending(active), SendTransition::Settle(attempted)) => {
                Err(SendTransitionRejection::ExchangeMismatch {
                    active: *active,
                    attempted,
                })
            }
            (Self::Idle, SendTransition::Settle(_)) => Err(SendTransitionRejection::NotPending),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn begin_is_rejected_while_pending() {
        let pending = SendState::Idle
            .apply(SendTransition::Begin(ExchangeId::new(1)))
            .unwrap();
        assert_eq!(pending.pending_exchange(), Some(ExchangeId::new(1)));

        assert_eq!(
            pending.apply(SendTransition::Begin(ExchangeId::new(2))),
            Err(SendTransitionRejection::AlreadyPending {
                active: ExchangeId::new(1),
                attempted: ExchangeId::new(2),
            })
        );
    }

    #[test]
    fn settle_must_match_the_pending_exchange() {
        let pending = SendState::Pending(ExchangeId::new(3));

        assert_eq!(
            pending.apply(SendTransition::Settle(ExchangeId::new(2))),
            Err(SendTransitionRejection::ExchangeMismatch {
                active: ExchangeId::new(3),
                attempted: ExchangeId::new(2),
            })
        );
        assert_eq!(
            pending.apply(SendTransition::Settle(ExchangeId::new(3))),
            Ok(SendState::Idle)
        );
        assert_eq!(
            SendState::Idle.apply(SendTransition::Settle(ExchangeId::new(3))),
            Err(SendTransitionRejection::NotPending)
        );
    }

    #[test]
    fn structured_content_serializes_compactly() {
        let content = MessageContent::from_value(json!({"message": "Invalid input"}));
        assert_eq!(content.into_display_text(), r#"{"message":"Invalid input"}"#);

        let content = MessageContent::from_value(json!(42));
        assert_eq!(content.into_display_text(), "42");

        let content = MessageContent::from_value(json!("plain"));
        assert_eq!(content, MessageContent::Text("plain".to_string()));
    }
}
