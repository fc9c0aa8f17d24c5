use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{SettingsLoadSnafu, WidgetResult};

pub const DEFAULT_TITLE: &str = "Chatbot";
pub const DEFAULT_TOGGLE_LABEL: &str = "💬";
pub const DEFAULT_CLOSE_LABEL: &str = "✖";
pub const DEFAULT_PLACEHOLDER: &str = "Type a message...";
pub const DEFAULT_SEND_LABEL: &str = "Send";
pub const DEFAULT_ATTACH_LABEL: &str = "📎";
pub const DEFAULT_COMMIT_KEY: &str = "Enter";
pub const DEFAULT_FALLBACK_REPLY: &str = "No response from AI";
pub const DEFAULT_ERROR_REPLY: &str = "Error: could not reach the AI server. Please try again.";

/// Copy and key bindings for one widget instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettings {
    pub title: String,
    pub toggle_label: String,
    pub close_label: String,
    pub placeholder: String,
    pub send_label: String,
    /// Label of the attachment control. The control is rendered but inert.
    pub attach_label: String,
    /// Key that submits while the text input has focus.
    pub commit_key: String,
    /// Shown when the responder answers with an empty or missing reply.
    pub fallback_reply: String,
    /// Shown for any responder failure; details only go to the log.
    pub error_reply: String,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            toggle_label: DEFAULT_TOGGLE_LABEL.to_string(),
            close_label: DEFAULT_CLOSE_LABEL.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            send_label: DEFAULT_SEND_LABEL.to_string(),
            attach_label: DEFAULT_ATTACH_LABEL.to_string(),
            commit_key: DEFAULT_COMMIT_KEY.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            error_reply: DEFAULT_ERROR_REPLY.to_string(),
        }
    }
}

impl WidgetSettings {
    /// Loads settings from a JSON file layered over defaults.
    pub fn load(path: impl AsRef<Path>) -> WidgetResult<Self> {
        let path = path.as_ref();
        let settings = Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .extract::<Self>()
            .context(SettingsLoadSnafu {
                stage: "extract-settings-file",
                origin: path.display().to_string(),
            })?;

        tracing::info!("loaded widget settings from {:?}", path);
        Ok(settings.normalized())
    }

    /// Parses settings from a JSON document layered over defaults.
    pub fn from_json_str(raw: &str) -> WidgetResult<Self> {
        let settings = Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::string(raw))
            .extract::<Self>()
            .context(SettingsLoadSnafu {
                stage: "extract-settings-string",
                origin: "inline json".to_string(),
            })?;

        Ok(settings.normalized())
    }

    /// Replaces blank fields with defaults. Copy is trimmed; nothing else is touched.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            title: non_blank(self.title, defaults.title),
            toggle_label: non_blank(self.toggle_label, defaults.toggle_label),
            close_label: non_blank(self.close_label, defaults.close_label),
            placeholder: non_blank(self.placeholder, defaults.placeholder),
            send_label: non_blank(self.send_label, defaults.send_label),
            attach_label: non_blank(self.attach_label, defaults.attach_label),
            commit_key: non_blank(self.commit_key, defaults.commit_key),
            fallback_reply: non_blank(self.fallback_reply, defaults.fallback_reply),
            error_reply: non_blank(self.error_reply, defaults.error_reply),
        }
    }
}

fn non_blank(value: String, default: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetError;

    #[test]
    fn partial_json_is_layered_over_defaults() {
        let settings =
            WidgetSettings::from_json_str(r#"{"title": "Support", "fallback_reply": "  "}"#)
                .unwrap();

        assert_eq!(settings.title, "Support");
        assert_eq!(settings.fallback_reply, DEFAULT_FALLBACK_REPLY);
        assert_eq!(settings.commit_key, DEFAULT_COMMIT_KEY);
    }

    #[test]
    fn malformed_json_is_a_settings_error() {
        let error = WidgetSettings::from_json_str(r#"{"title": 7"#).unwrap_err();
        assert!(matches!(error, WidgetError::SettingsLoad { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = WidgetSettings::load("/nonexistent/chatbot-widget/settings.json").unwrap();
        assert_eq!(settings, WidgetSettings::default());
    }
}
