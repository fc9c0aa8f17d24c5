#![deny(unsafe_code)]

pub mod controller;
pub mod document;
pub mod error;
pub mod events;
pub mod memory;
pub mod message;
pub mod settings;
pub mod transcript;
pub mod widget;

pub use controller::{Exchange, ExchangeController, SubmitRejection};
pub use document::{HostDocument, WidgetLayout, WidgetSurface};
pub use error::{WidgetError, WidgetResult};
pub use events::{ExchangeEvent, ExchangeOutcome, Submit, WidgetEvent};
pub use memory::{MemoryDocument, RenderedMessage, SurfaceSnapshot};
pub use message::{
    ExchangeId, Message, MessageContent, MessageId, Role, SendState, SendTransition,
    SendTransitionRejection,
};
pub use settings::WidgetSettings;
pub use transcript::{Transcript, TranscriptView, render_markup};
pub use widget::{ChatWidget, PanelState, mount};
