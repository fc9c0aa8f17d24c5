use std::cell::RefCell;
use std::rc::Rc;

use snafu::ensure;

use crate::document::{HostDocument, WidgetLayout, WidgetSurface};
use crate::error::{SurfaceUnavailableSnafu, WidgetResult};
use crate::message::{Message, MessageId, Role};
use crate::transcript::TranscriptView;

/// One message node as it was inserted into the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: MessageId,
    pub role: Role,
    pub markup: String,
}

/// Observable state of one attached widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceSnapshot {
    pub layout: Option<WidgetLayout>,
    pub rendered: Vec<RenderedMessage>,
    pub scrolled_to: Option<MessageId>,
    pub input_value: String,
    pub submit_enabled: bool,
    pub panel_open: bool,
}

struct MountedRoot {
    root_id: String,
    state: Rc<RefCell<SurfaceSnapshot>>,
}

struct MemoryDom {
    body_available: bool,
    roots: Vec<MountedRoot>,
}

/// In-memory host document.
///
/// Clones share the same element tree, so a test can keep one handle for inspection and
/// hand another to `mount`.
#[derive(Clone)]
pub struct MemoryDocument {
    dom: Rc<RefCell<MemoryDom>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            dom: Rc::new(RefCell::new(MemoryDom {
                body_available: true,
                roots: Vec::new(),
            })),
        }
    }

    /// A document whose body is not ready yet; every attach fails.
    pub fn without_body() -> Self {
        let document = Self::new();
        document.dom.borrow_mut().body_available = false;
        document
    }

    pub fn root_count(&self) -> usize {
        self.dom.borrow().roots.len()
    }

    /// Replaces the text input value of the first mounted widget, as typing would.
    pub fn type_text(&self, text: &str) {
        if let Some(root) = self.dom.borrow().roots.first() {
            root.state.borrow_mut().input_value = text.to_string();
        }
    }

    /// Returns the state of the first mounted widget.
    pub fn snapshot(&self) -> Option<SurfaceSnapshot> {
        self.dom
            .borrow()
            .roots
            .first()
            .map(|root| root.state.borrow().clone())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDocument for MemoryDocument {
    fn has_widget_root(&self, root_id: &str) -> bool {
        self.dom
            .borrow()
            .roots
            .iter()
            .any(|root| root.root_id == root_id)
    }

    fn attach_widget(&self, layout: &WidgetLayout) -> WidgetResult<Rc<dyn WidgetSurface>> {
        let mut dom = self.dom.borrow_mut();
        ensure!(
            dom.body_available,
            SurfaceUnavailableSnafu {
                stage: "attach-widget",
                element: "body".to_string(),
                details: "document has no body".to_string(),
            }
        );

        let state = Rc::new(RefCell::new(SurfaceSnapshot {
            layout: Some(layout.clone()),
            submit_enabled: true,
            ..SurfaceSnapshot::default()
        }));
        dom.roots.push(MountedRoot {
            root_id: layout.root_id.clone(),
            state: state.clone(),
        });

        Ok(Rc::new(MemorySurface {
            root_id: layout.root_id.clone(),
            dom: self.dom.clone(),
            state,
        }))
    }
}

pub struct MemorySurface {
    root_id: String,
    dom: Rc<RefCell<MemoryDom>>,
    state: Rc<RefCell<SurfaceSnapshot>>,
}

impl TranscriptView for MemorySurface {
    fn render_message(&self, message: &Message, markup: &str) {
        let mut state = self.state.borrow_mut();
        state.rendered.push(RenderedMessage {
            id: message.id,
            role: message.role,
            markup: markup.to_string(),
        });
        state.scrolled_to = Some(message.id);
    }
}

impl WidgetSurface for MemorySurface {
    fn input_value(&self) -> String {
        self.state.borrow().input_value.clone()
    }

    fn clear_input(&self) {
        self.state.borrow_mut().input_value.clear();
    }

    fn set_submit_enabled(&self, enabled: bool) {
        self.state.borrow_mut().submit_enabled = enabled;
    }

    fn set_panel_open(&self, open: bool) {
        self.state.borrow_mut().panel_open = open;
    }

    fn detach(&self) {
        self.dom
            .borrow_mut()
            .roots
            .retain(|root| root.root_id != self.root_id);
    }
}
