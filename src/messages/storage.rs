use super::types::{ConversationMessage, Message};
use parking_lot::RwLock;
use std::sync::Arc;

/// Append-only message sequence shared between the orchestrator and the UI.
#[derive(Debug, Clone, Default)]
pub struct MessageStorage {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl MessageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: Message) {
        self.messages.write().push(message);
    }

    pub fn get_all(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    /// Wire projection of the full sequence, in insertion order.
    pub fn project(&self) -> Vec<ConversationMessage> {
        self.messages.read().iter().map(Message::to_wire).collect()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::types::{Role, Sender};

    #[test]
    fn test_append_preserves_order() {
        let storage = MessageStorage::new();
        storage.append(Message::user("one"));
        storage.append(Message::assistant("two", None));

        let all = storage.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "one");
        assert_eq!(all[1].content, "two");
        assert_eq!(all[1].sender, Sender::Assistant);
    }

    #[test]
    fn test_projection_matches_sequence() {
        let storage = MessageStorage::new();
        storage.append(Message::user("I dreamt of a library"));
        storage.append(Message::assistant("Libraries often stand for memory.", Some("a1".into())));

        let wire = storage.project();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].role, Role::User);
        assert!(wire[0].id.is_none());
        assert_eq!(wire[1].id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_clear_empties_sequence() {
        let storage = MessageStorage::new();
        storage.append(Message::user("gone"));
        storage.clear();
        assert!(storage.is_empty());
        assert_eq!(storage.len(), 0);
    }
}
