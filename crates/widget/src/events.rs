use crate::message::ExchangeId;

/// Raised by the widget's element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Floating button activated.
    Toggle,
    /// Close control in the panel header activated.
    Close,
    /// Submit control activated; the text comes from the input field.
    Send,
    /// Key pressed while the text input has focus.
    KeyDown(String),
    /// Programmatic submission of the given text.
    Submit(Submit),
}

/// Submission routed into the exchange controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// How one exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Replied,
    /// The responder succeeded without a usable reply; the fallback text was shown.
    EmptyReply,
    /// The responder failed; carries the diagnostic detail that was logged.
    Failed(String),
    /// The exchange was dropped before it settled.
    Abandoned,
}

/// Emitted by the exchange controller to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    Submitted {
        exchange: ExchangeId,
        content: String,
    },
    Settled {
        exchange: ExchangeId,
        outcome: ExchangeOutcome,
    },
}

impl ExchangeEvent {
    pub fn exchange(&self) -> ExchangeId {
        match self {
            Self::Submitted { exchange, .. } | Self::Settled { exchange, .. } => *exchange,
        }
    }
}
