use std::rc::Rc;

use crate::message::{Message, MessageContent, MessageId, Role};

/// Receives every appended message together with its escaped markup.
///
/// Implementations append one node to the message list and scroll it into view.
pub trait TranscriptView {
    fn render_message(&self, message: &Message, markup: &str);
}

/// Append-only message log for one widget lifetime.
pub struct Transcript {
    messages: Vec<Message>,
    next_message_id: u64,
    view: Option<Rc<dyn TranscriptView>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_message_id: 1,
            view: None,
        }
    }

    pub fn with_view(view: Rc<dyn TranscriptView>) -> Self {
        Self {
            view: Some(view),
            ..Self::new()
        }
    }

    /// Appends one message and renders it when a view is attached.
    pub fn append(&mut self, content: impl Into<MessageContent>, role: Role) -> &Message {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = id.0.saturating_add(1);

        let message = Message::new(id, role, content.into().into_display_text());
        if let Some(view) = &self.view {
            view.render_message(&message, &render_markup(&message.text));
        }

        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes message text for insertion as markup. Line breaks are the only formatting
/// carried over.
pub fn render_markup(text: &str) -> String {
    let mut markup = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '&' => markup.push_str("&amp;"),
            '<' => markup.push_str("&lt;"),
            '>' => markup.push_str("&gt;"),
            '"' => markup.push_str("&quot;"),
            '\'' => markup.push_str("&#39;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                markup.push_str("<br>");
            }
            '\n' => markup.push_str("<br>"),
            _ => markup.push(ch),
        }
    }

    markup
}
