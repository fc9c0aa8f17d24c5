mod dom;

use chatbot_responder::{DEFAULT_ENDPOINT, ResponderConfig, create_responder};
use chatbot_widget::document::ROOT_ID;
use chatbot_widget::{ChatWidget, HostDocument, Submit, WidgetEvent, WidgetSettings};
use reqwest::Url;
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Event, EventTarget, KeyboardEvent};

pub use dom::{BrowserDocument, BrowserSurface};

/// Options accepted by [`mount`].
#[derive(Debug, Deserialize)]
pub struct MountOptions {
    /// Absolute URL or a path relative to the page origin.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub csrf_token: String,
    #[serde(default)]
    pub csrf_header: Option<String>,
    #[serde(default)]
    pub widget: WidgetSettings,
}

/// Initialize WASM module
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("chatbot widget module initialized");
}

/// Mounts the widget into the current page.
///
/// Resolves to `null` when the page already hosts a widget, whatever the options.
#[wasm_bindgen(js_name = mount)]
pub fn mount_widget(options: JsValue) -> Result<JsValue, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("window has no document"))?;
    let origin = window.location().origin()?;

    let host = BrowserDocument::new(document);
    let widget = mount_into(&host, &origin, || {
        serde_wasm_bindgen::from_value::<MountOptions>(options).map_err(|error| error.to_string())
    })
    .map_err(|error| JsValue::from_str(&error))?;

    match widget {
        Some(widget) => Ok(ChatWidgetHandle::wire(host.document(), widget)?.into()),
        None => Ok(JsValue::NULL),
    }
}

/// Checks the presence guard before options are read or a responder is built.
fn mount_into<D>(
    host: &D,
    origin: &str,
    options: impl FnOnce() -> Result<MountOptions, String>,
) -> Result<Option<ChatWidget>, String>
where
    D: HostDocument + ?Sized,
{
    if host.has_widget_root(ROOT_ID) {
        tracing::debug!(root_id = ROOT_ID, "widget already mounted");
        return Ok(None);
    }

    let options = options()?;
    let endpoint = resolve_endpoint(
        origin,
        options.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT),
    )?;

    let config = ResponderConfig::new(endpoint, options.csrf_token);
    let config = match options.csrf_header {
        Some(header) => config.with_csrf_header(header),
        None => config,
    };
    let responder = create_responder(config).map_err(|error| error.to_string())?;

    chatbot_widget::mount(host, responder, &options.widget).map_err(|error| error.to_string())
}

/// Handle returned to the page. Dropping or disposing it unregisters every listener.
#[wasm_bindgen]
pub struct ChatWidgetHandle {
    widget: ChatWidget,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl ChatWidgetHandle {
    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.widget.panel_state().is_open()
    }

    /// Returns whether the panel is open afterwards.
    pub fn toggle(&self) -> bool {
        self.widget.toggle().is_open()
    }

    pub fn close(&self) {
        self.widget.close();
    }

    /// Submits `text` as if typed; returns whether an exchange started.
    pub fn submit(&self, text: String) -> bool {
        match self
            .widget
            .handle_event(WidgetEvent::Submit(Submit::new(text)))
        {
            Some(exchange) => {
                spawn_local(async move {
                    exchange.settle().await;
                });
                true
            }
            None => false,
        }
    }

    pub fn dispose(&mut self) {
        self.listeners.clear();
        self.widget.dispose();
    }
}

impl ChatWidgetHandle {
    fn wire(document: &Document, widget: ChatWidget) -> Result<Self, JsValue> {
        let layout = widget.layout().clone();
        let listeners = vec![
            Listener::attach(
                find(document, &layout.toggle_id)?,
                "click",
                event_callback(&widget, |_| Some(WidgetEvent::Toggle)),
            )?,
            Listener::attach(
                find(document, &layout.close_id)?,
                "click",
                event_callback(&widget, |_| Some(WidgetEvent::Close)),
            )?,
            Listener::attach(
                find(document, &layout.send_id)?,
                "click",
                event_callback(&widget, |_| Some(WidgetEvent::Send)),
            )?,
            Listener::attach(
                find(document, &layout.text_input_id)?,
                "keydown",
                event_callback(&widget, |event| {
                    event
                        .dyn_ref::<KeyboardEvent>()
                        .map(|key| WidgetEvent::KeyDown(key.key()))
                }),
            )?,
        ];

        Ok(Self { widget, listeners })
    }
}

struct Listener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(
        target: EventTarget,
        kind: &'static str,
        callback: Closure<dyn FnMut(Event)>,
    ) -> Result<Self, JsValue> {
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target,
            kind,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(error) = self
            .target
            .remove_event_listener_with_callback(self.kind, self.callback.as_ref().unchecked_ref())
        {
            tracing::warn!(kind = self.kind, error = ?error, "failed to remove listener");
        }
    }
}

fn find(document: &Document, id: &str) -> Result<EventTarget, JsValue> {
    document
        .get_element_by_id(id)
        .map(EventTarget::from)
        .ok_or_else(|| JsValue::from_str(&format!("widget element '#{id}' not found")))
}

/// Translates a DOM event and starts any exchange it produces.
fn event_callback(
    widget: &ChatWidget,
    translate: impl Fn(&Event) -> Option<WidgetEvent> + 'static,
) -> Closure<dyn FnMut(Event)> {
    let widget = widget.clone();
    Closure::new(move |event: Event| {
        let Some(widget_event) = translate(&event) else {
            return;
        };
        if let Some(exchange) = widget.handle_event(widget_event) {
            event.prevent_default();
            spawn_local(async move {
                exchange.settle().await;
            });
        }
    })
}

fn resolve_endpoint(origin: &str, endpoint: &str) -> Result<String, String> {
    if let Ok(url) = Url::parse(endpoint) {
        return Ok(url.into());
    }

    Url::parse(origin)
        .and_then(|base| base.join(endpoint))
        .map(String::from)
        .map_err(|error| format!("invalid endpoint '{endpoint}' for origin '{origin}': {error}"))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chatbot_widget::MemoryDocument;

    use super::*;

    const ORIGIN: &str = "https://erp.example.com";

    fn options(csrf_token: &str) -> MountOptions {
        MountOptions {
            endpoint: None,
            csrf_token: csrf_token.to_string(),
            csrf_header: None,
            widget: WidgetSettings::default(),
        }
    }

    #[test]
    fn remount_is_null_even_with_unusable_options() {
        let document = MemoryDocument::new();
        let first = mount_into(&document, ORIGIN, || Ok(options("csrf-123"))).unwrap();
        assert!(first.is_some());

        let read = Cell::new(false);
        let second = mount_into(&document, ORIGIN, || {
            read.set(true);
            Err("missing field `csrf_token`".to_string())
        })
        .unwrap();

        assert!(second.is_none());
        assert!(!read.get());
        assert_eq!(document.root_count(), 1);

        let third = mount_into(&document, ORIGIN, || Ok(options(""))).unwrap();
        assert!(third.is_none());
    }

    #[test]
    fn first_mount_reports_missing_token() {
        let document = MemoryDocument::new();
        let error = mount_into(&document, ORIGIN, || Ok(options("  "))).unwrap_err();

        assert!(error.contains("anti-forgery token"));
        assert_eq!(document.root_count(), 0);
    }

    #[test]
    fn relative_endpoint_joins_page_origin() {
        assert_eq!(
            resolve_endpoint("https://erp.example.com", DEFAULT_ENDPOINT).unwrap(),
            "https://erp.example.com/api/method/chatbot.api.chatbot_api.receive_user_input"
        );
    }

    #[test]
    fn absolute_endpoint_is_kept() {
        assert_eq!(
            resolve_endpoint("https://erp.example.com", "https://bot.example.org/chat").unwrap(),
            "https://bot.example.org/chat"
        );
    }

    #[test]
    fn unusable_origin_is_reported() {
        let error = resolve_endpoint("null", "/chat").unwrap_err();
        assert!(error.contains("/chat"));
    }
}
