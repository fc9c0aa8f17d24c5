use std::rc::Rc;

use chatbot_widget::document::PANEL_OPEN_CLASS;
use chatbot_widget::{
    HostDocument, Message, TranscriptView, WidgetError, WidgetLayout, WidgetResult, WidgetSurface,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlButtonElement, HtmlInputElement};

fn surface_error(stage: &'static str, element: &str, error: &JsValue) -> WidgetError {
    WidgetError::SurfaceUnavailable {
        stage,
        element: element.to_string(),
        details: format!("{error:?}"),
    }
}

fn append(parent: &Element, child: &Element) -> WidgetResult<()> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|error| surface_error("append-child", &child.id(), &error))
}

/// Host document backed by the page's `document`.
pub struct BrowserDocument {
    document: Document,
}

impl BrowserDocument {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn create(&self, tag: &'static str, id: &str) -> WidgetResult<Element> {
        let element = self
            .document
            .create_element(tag)
            .map_err(|error| surface_error("create-element", tag, &error))?;
        if !id.is_empty() {
            element.set_id(id);
        }
        Ok(element)
    }

    fn labelled(&self, tag: &'static str, id: &str, label: &str) -> WidgetResult<Element> {
        let element = self.create(tag, id)?;
        element.set_text_content(Some(label));
        Ok(element)
    }
}

impl HostDocument for BrowserDocument {
    fn has_widget_root(&self, root_id: &str) -> bool {
        self.document.get_element_by_id(root_id).is_some()
    }

    fn attach_widget(&self, layout: &WidgetLayout) -> WidgetResult<Rc<dyn WidgetSurface>> {
        let body = self
            .document
            .body()
            .ok_or_else(|| WidgetError::SurfaceUnavailable {
                stage: "attach-widget",
                element: "body".to_string(),
                details: "document has no body".to_string(),
            })?;

        let root = self.create("div", &layout.root_id)?;
        let toggle = self.labelled("button", &layout.toggle_id, &layout.toggle_label)?;

        let panel = self.create("div", &layout.panel_id)?;
        let header = self.create("div", &layout.header_id)?;
        let title = self.labelled("span", "", &layout.title)?;
        let close = self.labelled("span", &layout.close_id, &layout.close_label)?;

        let messages = self.create("div", &layout.messages_id)?;
        let input_row = self.create("div", &layout.input_row_id)?;
        let attach = self.labelled("button", &layout.attach_id, &layout.attach_label)?;
        let input = self
            .create("input", &layout.text_input_id)?
            .dyn_into::<HtmlInputElement>()
            .map_err(|element| {
                surface_error("cast-text-input", &layout.text_input_id, &element.into())
            })?;
        input.set_type("text");
        input.set_placeholder(&layout.placeholder);
        let send = self
            .labelled("button", &layout.send_id, &layout.send_label)?
            .dyn_into::<HtmlButtonElement>()
            .map_err(|element| surface_error("cast-send", &layout.send_id, &element.into()))?;

        append(&header, &title)?;
        append(&header, &close)?;
        append(&input_row, &attach)?;
        append(&input_row, &input)?;
        append(&input_row, &send)?;
        append(&panel, &header)?;
        append(&panel, &messages)?;
        append(&panel, &input_row)?;
        append(&root, &toggle)?;
        append(&root, &panel)?;
        append(&body, &root)?;

        Ok(Rc::new(BrowserSurface {
            document: self.document.clone(),
            root,
            panel,
            messages,
            input,
            send,
        }))
    }
}

/// Elements created by [`BrowserDocument::attach_widget`].
pub struct BrowserSurface {
    document: Document,
    root: Element,
    panel: Element,
    messages: Element,
    input: HtmlInputElement,
    send: HtmlButtonElement,
}

impl TranscriptView for BrowserSurface {
    fn render_message(&self, message: &Message, markup: &str) {
        let node = match self.document.create_element("div") {
            Ok(node) => node,
            Err(error) => {
                tracing::warn!(error = ?error, "failed to create message node");
                return;
            }
        };
        node.set_class_name(&format!(
            "chatbot-message chatbot-{}",
            message.role.as_str()
        ));
        // `markup` is already escaped.
        node.set_inner_html(markup);

        if let Err(error) = self.messages.append_child(&node) {
            tracing::warn!(error = ?error, "failed to append message node");
            return;
        }
        node.scroll_into_view();
    }
}

impl WidgetSurface for BrowserSurface {
    fn input_value(&self) -> String {
        self.input.value()
    }

    fn clear_input(&self) {
        self.input.set_value("");
    }

    fn set_submit_enabled(&self, enabled: bool) {
        self.send.set_disabled(!enabled);
    }

    fn set_panel_open(&self, open: bool) {
        if let Err(error) = self
            .panel
            .class_list()
            .toggle_with_force(PANEL_OPEN_CLASS, open)
        {
            tracing::warn!(error = ?error, "failed to toggle panel class");
        }
    }

    fn detach(&self) {
        self.root.remove();
    }
}
