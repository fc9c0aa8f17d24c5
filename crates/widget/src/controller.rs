use std::cell::RefCell;
use std::rc::Rc;

use chatbot_responder::{Reply, ReplyRequest, Responder, ResponderResult};
use futures::channel::mpsc;

use crate::document::WidgetSurface;
use crate::events::{ExchangeEvent, ExchangeOutcome};
use crate::message::{
    ExchangeId, Message, MessageContent, Role, SendState, SendTransition, SendTransitionRejection,
};
use crate::settings::WidgetSettings;
use crate::transcript::{Transcript, TranscriptView};

/// Why a submission was ignored. Neither case touches the transcript or the send state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    ExchangePending(SendTransitionRejection),
}

struct ControllerState {
    transcript: Transcript,
    send_state: SendState,
    next_exchange_id: u64,
    listeners: Vec<mpsc::UnboundedSender<ExchangeEvent>>,
}

struct ControllerShared {
    responder: Rc<dyn Responder>,
    surface: Option<Rc<dyn WidgetSurface>>,
    fallback_reply: String,
    error_reply: String,
}

/// Routes transcript rendering through the widget surface.
struct SurfaceView(Rc<dyn WidgetSurface>);

impl TranscriptView for SurfaceView {
    fn render_message(&self, message: &Message, markup: &str) {
        self.0.render_message(message, markup);
    }
}

/// Owns the transcript and the send state machine.
///
/// Cheap to clone; clones share state. Everything runs on one thread, and no `RefCell`
/// borrow is held across an await.
#[derive(Clone)]
pub struct ExchangeController {
    state: Rc<RefCell<ControllerState>>,
    shared: Rc<ControllerShared>,
}

impl ExchangeController {
    /// Creates a controller without a surface. Transcript and state are still tracked.
    pub fn new(responder: Rc<dyn Responder>, settings: &WidgetSettings) -> Self {
        Self::build(responder, settings, None)
    }

    /// Creates a controller that renders into and drives the given surface.
    pub fn with_surface(
        responder: Rc<dyn Responder>,
        settings: &WidgetSettings,
        surface: Rc<dyn WidgetSurface>,
    ) -> Self {
        Self::build(responder, settings, Some(surface))
    }

    fn build(
        responder: Rc<dyn Responder>,
        settings: &WidgetSettings,
        surface: Option<Rc<dyn WidgetSurface>>,
    ) -> Self {
        let transcript = match &surface {
            Some(surface) => Transcript::with_view(Rc::new(SurfaceView(surface.clone()))),
            None => Transcript::new(),
        };

        if let Some(surface) = &surface {
            surface.set_submit_enabled(true);
        }

        Self {
            state: Rc::new(RefCell::new(ControllerState {
                transcript,
                send_state: SendState::Idle,
                next_exchange_id: 1,
                listeners: Vec::new(),
            })),
            shared: Rc::new(ControllerShared {
                responder,
                surface,
                fallback_reply: settings.fallback_reply.clone(),
                error_reply: settings.error_reply.clone(),
            }),
        }
    }

    pub fn send_state(&self) -> SendState {
        self.state.borrow().send_state
    }

    pub fn is_pending(&self) -> bool {
        !self.send_state().is_idle()
    }

    /// Snapshot of the transcript in append order.
    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().transcript.messages().to_vec()
    }

    pub fn transcript_len(&self) -> usize {
        self.state.borrow().transcript.len()
    }

    /// Registers a listener for submit/settle events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExchangeEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.state.borrow_mut().listeners.push(tx);
        rx
    }

    /// Accepts one submission.
    ///
    /// On success the user message is already in the transcript, the input is cleared and
    /// submit is disabled. The returned exchange issues the request when settled and
    /// returns the controller to `Idle` when dropped.
    pub fn submit(&self, raw: &str) -> Result<Exchange, SubmitRejection> {
        let content = raw.trim();
        if content.is_empty() {
            tracing::debug!("ignoring blank submission");
            return Err(SubmitRejection::EmptyInput);
        }

        let exchange = {
            let mut state = self.state.borrow_mut();
            let exchange = ExchangeId::new(state.next_exchange_id);

            state.send_state = match state.send_state.apply(SendTransition::Begin(exchange)) {
                Ok(next) => next,
                Err(rejection) => {
                    tracing::debug!(
                        rejection = ?rejection,
                        "ignoring submission while an exchange is pending"
                    );
                    return Err(SubmitRejection::ExchangePending(rejection));
                }
            };

            state.next_exchange_id = state.next_exchange_id.saturating_add(1);
            state.transcript.append(content, Role::User);
            exchange
        };

        if let Some(surface) = &self.shared.surface {
            surface.clear_input();
            surface.set_submit_enabled(false);
        }

        tracing::info!(
            exchange = ?exchange,
            responder_id = %self.shared.responder.id(),
            "submitted message"
        );
        self.emit(ExchangeEvent::Submitted {
            exchange,
            content: content.to_string(),
        });

        Ok(Exchange {
            id: exchange,
            content: content.to_string(),
            controller: self.clone(),
            outcome: None,
        })
    }

    fn complete(&self, exchange: ExchangeId, result: ResponderResult<Reply>) -> ExchangeOutcome {
        let (content, outcome) = match result {
            Ok(reply) => match reply.into_content() {
                Some(value) => (MessageContent::from_value(value), ExchangeOutcome::Replied),
                None => {
                    tracing::debug!(exchange = ?exchange, "responder returned an empty reply");
                    (
                        MessageContent::Text(self.shared.fallback_reply.clone()),
                        ExchangeOutcome::EmptyReply,
                    )
                }
            },
            Err(error) => {
                tracing::error!(
                    exchange = ?exchange,
                    responder_id = %self.shared.responder.id(),
                    error = %error,
                    "responder exchange failed"
                );
                (
                    MessageContent::Text(self.shared.error_reply.clone()),
                    ExchangeOutcome::Failed(error.to_string()),
                )
            }
        };

        self.state
            .borrow_mut()
            .transcript
            .append(content, Role::Bot);
        outcome
    }

    fn release(&self, exchange: ExchangeId, outcome: ExchangeOutcome) {
        // Runs from `Drop`, so never panic on a busy borrow.
        let Ok(mut state) = self.state.try_borrow_mut() else {
            tracing::error!(exchange = ?exchange, "controller state busy during release");
            return;
        };

        match state.send_state.apply(SendTransition::Settle(exchange)) {
            Ok(next) => state.send_state = next,
            Err(rejection) => {
                tracing::warn!(
                    exchange = ?exchange,
                    rejection = ?rejection,
                    "release does not match the pending exchange"
                );
                return;
            }
        }
        drop(state);

        if let Some(surface) = &self.shared.surface {
            surface.set_submit_enabled(true);
        }

        if outcome == ExchangeOutcome::Abandoned {
            tracing::warn!(exchange = ?exchange, "exchange dropped before it settled");
        }

        self.emit(ExchangeEvent::Settled { exchange, outcome });
    }

    fn emit(&self, event: ExchangeEvent) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        state
            .listeners
            .retain(|listener| listener.unbounded_send(event.clone()).is_ok());
    }
}

/// One accepted submission waiting for its reply.
///
/// Dropping it, settled or not, returns the controller to `Idle`.
#[must_use = "an exchange only contacts the responder when settled"]
pub struct Exchange {
    id: ExchangeId,
    content: String,
    controller: ExchangeController,
    outcome: Option<ExchangeOutcome>,
}

impl Exchange {
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Trimmed text that will be sent.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Sends the message, appends the bot reply, and releases the pending state.
    pub async fn settle(mut self) -> ExchangeOutcome {
        let responder = self.controller.shared.responder.clone();
        let result = responder
            .reply(ReplyRequest::new(self.content.clone()))
            .await;

        let outcome = self.controller.complete(self.id, result);
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(ExchangeOutcome::Abandoned);
        self.controller.release(self.id, outcome);
    }
}
