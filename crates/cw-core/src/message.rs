use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// A committed transcript message. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    #[serde(default)]
    pub offers_signup_follow_up: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            offers_signup_follow_up: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            offers_signup_follow_up: false,
        }
    }

    pub fn signup_offer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            offers_signup_follow_up: true,
        }
    }
}

/// Identifies one submission for the lifetime of a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the transcript: either a committed message or the
/// placeholder for a request that has not settled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(Message),
    Typing(RequestId),
}

impl Entry {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Entry::Message(m) => Some(m),
            Entry::Typing(_) => None,
        }
    }

    pub fn is_typing(&self) -> bool {
        matches!(self, Entry::Typing(_))
    }
}

/// Ordered, append-only log of messages plus in-flight placeholders.
///
/// Placeholders are the only entries ever removed, and only through
/// [`Transcript::settle`], which swaps a placeholder for its resolution in
/// one step.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(Entry::Message(message));
    }

    pub fn show_typing(&mut self, id: RequestId) {
        self.entries.push(Entry::Typing(id));
    }

    /// Remove the placeholder for `id` and append `resolution`.
    ///
    /// Returns false (and appends nothing) if no placeholder for `id` exists,
    /// which means the request was already settled.
    pub fn settle(&mut self, id: RequestId, resolution: Message) -> bool {
        let Some(pos) = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Typing(t) if *t == id))
        else {
            return false;
        };
        self.entries.remove(pos);
        self.entries.push(Entry::Message(resolution));
        true
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(Entry::as_message)
    }

    pub fn message_count(&self) -> usize {
        self.messages().count()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, Entry::Typing(t) if *t == id))
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_typing()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
