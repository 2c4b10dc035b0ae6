//! In-memory conversation history.
//!
//! The store is append-only within a session. Readers always receive an owned
//! copy via [`ConversationStore::snapshot`], so a request built from a
//! snapshot cannot observe messages appended after it was taken.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<Role> for llm::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::User => llm::Role::User,
            Role::Assistant => llm::Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Zero-based position in the conversation
    pub ordinal: usize,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its ordinal.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> usize {
        let ordinal = self.messages.len();
        self.messages.push(Message {
            role,
            text: text.into(),
            ordinal,
        });
        ordinal
    }

    /// Owned copy of the history as it is right now.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Start a transaction on top of the current history.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.snapshot())
    }

    /// Append every pending message of `tx`, in order. Returns how many were added.
    pub fn commit(&mut self, tx: Transaction) -> usize {
        let pending = tx.commit();
        let count = pending.len();
        for (role, text) in pending {
            self.append(role, text);
        }
        count
    }
}

/// Messages produced by a pipeline job that are not yet part of the history.
///
/// A job adds the user's prompt and later the model's reply, then commits
/// both together. If generation fails the transaction is rolled back and the
/// history is left exactly as it was, so resubmitting does not duplicate the
/// prompt.
pub struct Transaction {
    base: Vec<Message>,
    pending: Vec<(Role, String)>,
    finalized: bool,
}

impl Transaction {
    fn new(base: Vec<Message>) -> Self {
        Self {
            base,
            pending: Vec::new(),
            finalized: false,
        }
    }

    /// # Panics
    /// Panics if the transaction has already been committed or rolled back
    pub fn add(&mut self, role: Role, text: impl Into<String>) {
        assert!(!self.finalized, "Cannot add to finalized transaction");
        self.pending.push((role, text.into()));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Committed history followed by the pending messages, with the ordinals
    /// they would receive on commit.
    pub fn history(&self) -> Vec<Message> {
        let mut messages = self.base.clone();
        let offset = messages.len();
        messages.extend(
            self.pending
                .iter()
                .enumerate()
                .map(|(i, (role, text))| Message {
                    role: *role,
                    text: text.clone(),
                    ordinal: offset + i,
                }),
        );
        messages
    }

    fn commit(mut self) -> Vec<(Role, String)> {
        self.finalized = true;
        std::mem::take(&mut self.pending)
    }

    /// Discard all pending messages.
    pub fn rollback(mut self) {
        self.finalized = true;
        self.pending.clear();
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finalized && !self.pending.is_empty() {
            tracing::warn!(
                "Transaction dropped without commit/rollback ({} messages lost)",
                self.pending.len()
            );
        }
    }
}
