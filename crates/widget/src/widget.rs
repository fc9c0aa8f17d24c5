use std::cell::Cell;
use std::rc::Rc;

use chatbot_responder::Responder;

use crate::controller::{Exchange, ExchangeController};
use crate::document::{HostDocument, WidgetLayout, WidgetSurface};
use crate::error::WidgetResult;
use crate::events::{Submit, WidgetEvent};
use crate::settings::WidgetSettings;

/// Visibility of the chat panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Closed,
    Open,
}

impl PanelState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Closed => Self::Open,
            Self::Open => Self::Closed,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

struct WidgetInner {
    controller: ExchangeController,
    surface: Rc<dyn WidgetSurface>,
    layout: WidgetLayout,
    commit_key: String,
    panel: Cell<PanelState>,
    disposed: Cell<bool>,
}

/// Handle to one mounted widget. Clones refer to the same widget.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Rc<WidgetInner>,
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget").finish_non_exhaustive()
    }
}

/// Builds the widget inside `document` and wires it to `responder`.
///
/// Returns `Ok(None)` when the document already hosts a widget root, leaving the
/// existing widget untouched.
pub fn mount<D>(
    document: &D,
    responder: Rc<dyn Responder>,
    settings: &WidgetSettings,
) -> WidgetResult<Option<ChatWidget>>
where
    D: HostDocument + ?Sized,
{
    let settings = settings.clone().normalized();
    let layout = WidgetLayout::from_settings(&settings);

    if document.has_widget_root(&layout.root_id) {
        tracing::debug!(root_id = %layout.root_id, "widget already mounted");
        return Ok(None);
    }

    let surface = document.attach_widget(&layout)?;
    surface.set_panel_open(false);

    let controller =
        ExchangeController::with_surface(responder.clone(), &settings, surface.clone());

    tracing::info!(
        root_id = %layout.root_id,
        responder_id = %responder.id(),
        "mounted chat widget"
    );

    Ok(Some(ChatWidget {
        inner: Rc::new(WidgetInner {
            controller,
            surface,
            layout,
            commit_key: settings.commit_key,
            panel: Cell::new(PanelState::Closed),
            disposed: Cell::new(false),
        }),
    }))
}

impl ChatWidget {
    /// Dispatches one inbound event.
    ///
    /// Returns the accepted exchange when the event submitted a message; the caller
    /// drives it to completion with [`Exchange::settle`].
    pub fn handle_event(&self, event: WidgetEvent) -> Option<Exchange> {
        if self.is_disposed() {
            tracing::debug!(event = ?event, "ignoring event for disposed widget");
            return None;
        }

        match event {
            WidgetEvent::Toggle => {
                self.toggle();
                None
            }
            WidgetEvent::Close => {
                self.close();
                None
            }
            WidgetEvent::Send => self.submit_input(),
            WidgetEvent::KeyDown(key) if key == self.inner.commit_key => self.submit_input(),
            WidgetEvent::KeyDown(_) => None,
            WidgetEvent::Submit(Submit { content }) => self.submit(&content),
        }
    }

    pub fn toggle(&self) -> PanelState {
        let next = self.inner.panel.get().toggled();
        self.set_panel(next);
        next
    }

    /// Hides the panel. Closing a closed panel is a no-op.
    pub fn close(&self) {
        self.set_panel(PanelState::Closed);
    }

    /// Submits `raw` as if typed. Rejected submissions are logged and dropped.
    pub fn submit(&self, raw: &str) -> Option<Exchange> {
        if self.is_disposed() {
            return None;
        }

        match self.inner.controller.submit(raw) {
            Ok(exchange) => Some(exchange),
            Err(rejection) => {
                tracing::debug!(rejection = ?rejection, "submission ignored");
                None
            }
        }
    }

    pub fn panel_state(&self) -> PanelState {
        self.inner.panel.get()
    }

    pub fn controller(&self) -> &ExchangeController {
        &self.inner.controller
    }

    pub fn layout(&self) -> &WidgetLayout {
        &self.inner.layout
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Removes the widget from its document. Later events are ignored and the document
    /// can mount a new widget.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.surface.detach();
        tracing::info!(root_id = %self.inner.layout.root_id, "disposed chat widget");
    }

    fn submit_input(&self) -> Option<Exchange> {
        let raw = self.inner.surface.input_value();
        self.submit(&raw)
    }

    fn set_panel(&self, next: PanelState) {
        if self.inner.panel.replace(next) != next {
            self.inner.surface.set_panel_open(next.is_open());
            tracing::debug!(panel = ?next, "panel visibility changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chatbot_responder::{EchoResponder, Reply, ReplyFuture, ReplyRequest};

    use super::*;
    use crate::document::ROOT_ID;
    use crate::error::WidgetError;
    use crate::memory::MemoryDocument;
    use crate::message::Role;

    struct FixedResponder(&'static str);

    impl Responder for FixedResponder {
        fn id(&self) -> &str {
            "fixed"
        }

        fn reply<'a>(&'a self, _request: ReplyRequest) -> ReplyFuture<'a> {
            let text = self.0;
            Box::pin(async move { Ok(Reply::text(text)) })
        }
    }

    fn mount_fixed(document: &MemoryDocument, reply: &'static str) -> ChatWidget {
        mount(
            document,
            Rc::new(FixedResponder(reply)),
            &WidgetSettings::default(),
        )
        .unwrap()
        .unwrap()
    }

    #[test]
    fn second_mount_is_a_no_op() {
        let document = MemoryDocument::new();
        let _widget = mount_fixed(&document, "hi");

        let again = mount(
            &document,
            Rc::new(EchoResponder::default()),
            &WidgetSettings::default(),
        )
        .unwrap();

        assert!(again.is_none());
        assert_eq!(document.root_count(), 1);
        assert!(document.has_widget_root(ROOT_ID));
    }

    #[test]
    fn mount_without_body_reports_surface_error() {
        let document = MemoryDocument::without_body();
        let result = mount(
            &document,
            Rc::new(EchoResponder::default()),
            &WidgetSettings::default(),
        );

        assert!(matches!(
            result,
            Err(WidgetError::SurfaceUnavailable { ref element, .. }) if element == "body"
        ));
        assert_eq!(document.root_count(), 0);
    }

    #[test]
    fn toggle_and_close_drive_panel_visibility() {
        let document = MemoryDocument::new();
        let widget = mount_fixed(&document, "hi");
        assert_eq!(widget.panel_state(), PanelState::Closed);

        widget.handle_event(WidgetEvent::Toggle);
        assert_eq!(widget.panel_state(), PanelState::Open);
        assert!(document.snapshot().unwrap().panel_open);

        widget.handle_event(WidgetEvent::Close);
        widget.handle_event(WidgetEvent::Close);
        assert_eq!(widget.panel_state(), PanelState::Closed);
        assert!(!document.snapshot().unwrap().panel_open);

        widget.handle_event(WidgetEvent::Toggle);
        widget.handle_event(WidgetEvent::Toggle);
        assert_eq!(widget.panel_state(), PanelState::Closed);
    }

    #[tokio::test]
    async fn enter_key_submits_and_other_keys_do_not() {
        let document = MemoryDocument::new();
        let widget = mount_fixed(&document, "hi there");
        document.type_text("hello");

        assert!(
            widget
                .handle_event(WidgetEvent::KeyDown("a".to_string()))
                .is_none()
        );
        assert_eq!(widget.controller().transcript_len(), 0);

        let exchange = widget
            .handle_event(WidgetEvent::KeyDown("Enter".to_string()))
            .unwrap();
        assert_eq!(document.snapshot().unwrap().input_value, "");
        exchange.settle().await;

        let snapshot = document.snapshot().unwrap();
        let rendered = snapshot
            .rendered
            .iter()
            .map(|message| (message.role, message.markup.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(rendered, vec![(Role::User, "hello"), (Role::Bot, "hi there")]);
        assert!(snapshot.submit_enabled);
    }

    #[tokio::test]
    async fn send_while_pending_is_ignored() {
        let document = MemoryDocument::new();
        let widget = mount_fixed(&document, "hi there");

        document.type_text("hello");
        let exchange = widget.handle_event(WidgetEvent::Send).unwrap();

        document.type_text("hello again");
        assert!(widget.handle_event(WidgetEvent::Send).is_none());
        assert_eq!(document.snapshot().unwrap().input_value, "hello again");

        exchange.settle().await;
        assert_eq!(widget.controller().transcript_len(), 2);
    }

    #[test]
    fn markup_is_escaped_when_rendered() {
        let document = MemoryDocument::new();
        let widget = mount_fixed(&document, "hi");

        let exchange = widget
            .handle_event(WidgetEvent::Submit(Submit::new("<b>bold</b>\nnext")))
            .unwrap();
        drop(exchange);

        let snapshot = document.snapshot().unwrap();
        assert_eq!(
            snapshot.rendered[0].markup,
            "&lt;b&gt;bold&lt;/b&gt;<br>next"
        );
        assert_eq!(
            widget.controller().messages()[0].text,
            "<b>bold</b>\nnext"
        );
    }

    #[test]
    fn dispose_detaches_and_allows_remount() {
        let document = MemoryDocument::new();
        let widget = mount_fixed(&document, "hi");

        widget.dispose();
        widget.dispose();
        assert!(widget.is_disposed());
        assert_eq!(document.root_count(), 0);
        assert!(widget.handle_event(WidgetEvent::Send).is_none());
        assert!(widget.handle_event(WidgetEvent::Toggle).is_none());
        assert_eq!(widget.panel_state(), PanelState::Closed);

        let remounted = mount(
            &document,
            Rc::new(EchoResponder::default()),
            &WidgetSettings::default(),
        )
        .unwrap();
        assert!(remounted.is_some());
        assert_eq!(document.root_count(), 1);
    }

    #[test]
    fn custom_commit_key_replaces_enter() {
        let document = MemoryDocument::new();
        let settings = WidgetSettings {
            commit_key: "F2".to_string(),
            ..WidgetSettings::default()
        };
        let widget = mount(&document, Rc::new(FixedResponder("hi")), &settings)
            .unwrap()
            .unwrap();
        document.type_text("hello");

        assert!(
            widget
                .handle_event(WidgetEvent::KeyDown("Enter".to_string()))
                .is_none()
        );
        assert!(
            widget
                .handle_event(WidgetEvent::KeyDown("F2".to_string()))
                .is_some()
        );
    }
}
