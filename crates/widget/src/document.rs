use std::rc::Rc;

use crate::error::WidgetResult;
use crate::settings::WidgetSettings;
use crate::transcript::TranscriptView;

pub const ROOT_ID: &str = "chatbot-root";
pub const TOGGLE_ID: &str = "chatbot-fab";
pub const PANEL_ID: &str = "chatbot-window";
pub const HEADER_ID: &str = "chatbot-header";
pub const CLOSE_ID: &str = "chatbot-close";
pub const MESSAGES_ID: &str = "chatbot-messages";
pub const INPUT_ROW_ID: &str = "chatbot-input";
pub const TEXT_INPUT_ID: &str = "chatbot-text";
pub const ATTACH_ID: &str = "chatbot-attach";
pub const SEND_ID: &str = "chatbot-send";
/// Class toggled on the panel while it is visible.
pub const PANEL_OPEN_CLASS: &str = "open";

/// Element ids and copy for the widget's element tree.
///
/// The root container holds everything the widget creates, so removing it removes the
/// widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetLayout {
    pub root_id: String,
    pub toggle_id: String,
    pub panel_id: String,
    pub header_id: String,
    pub close_id: String,
    pub messages_id: String,
    pub input_row_id: String,
    pub text_input_id: String,
    pub attach_id: String,
    pub send_id: String,
    pub title: String,
    pub toggle_label: String,
    pub close_label: String,
    pub placeholder: String,
    pub attach_label: String,
    pub send_label: String,
}

impl WidgetLayout {
    pub fn from_settings(settings: &WidgetSettings) -> Self {
        Self {
            root_id: ROOT_ID.to_string(),
            toggle_id: TOGGLE_ID.to_string(),
            panel_id: PANEL_ID.to_string(),
            header_id: HEADER_ID.to_string(),
            close_id: CLOSE_ID.to_string(),
            messages_id: MESSAGES_ID.to_string(),
            input_row_id: INPUT_ROW_ID.to_string(),
            text_input_id: TEXT_INPUT_ID.to_string(),
            attach_id: ATTACH_ID.to_string(),
            send_id: SEND_ID.to_string(),
            title: settings.title.clone(),
            toggle_label: settings.toggle_label.clone(),
            close_label: settings.close_label.clone(),
            placeholder: settings.placeholder.clone(),
            attach_label: settings.attach_label.clone(),
            send_label: settings.send_label.clone(),
        }
    }
}

impl Default for WidgetLayout {
    fn default() -> Self {
        Self::from_settings(&WidgetSettings::default())
    }
}

/// Elements the widget owns after it is attached to a host document.
pub trait WidgetSurface: TranscriptView {
    fn input_value(&self) -> String;
    fn clear_input(&self);
    fn set_submit_enabled(&self, enabled: bool);
    fn set_panel_open(&self, open: bool);
    /// Removes the root container and everything under it.
    fn detach(&self);
}

/// Host page the widget is mounted into.
pub trait HostDocument {
    fn has_widget_root(&self, root_id: &str) -> bool;
    fn attach_widget(&self, layout: &WidgetLayout) -> WidgetResult<Rc<dyn WidgetSurface>>;
}
