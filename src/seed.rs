//! Development fixtures: wipes the board and posts a fixed conversation.

use crate::store::{clear_messages, insert_message, new_message, Store, StoreError};

pub const SAMPLE_MESSAGES: [(&str, &str); 10] = [
    ("Hello everyone! Welcome to Chatterbox!", "admin"),
    ("This is my first message in the chat!", "alice"),
    ("Great to see everyone here. How's everyone doing?", "bob"),
    ("I love this new chat app! Very clean interface.", "charlie"),
    ("Anyone want to grab coffee later?", "dana"),
    ("The weather is beautiful today!", "eve"),
    ("Just finished a great workout. Feeling energized!", "frank"),
    ("Working on some exciting new projects. Can't wait to share!", "grace"),
    ("Thanks for all the warm welcomes everyone!", "alice"),
    ("Looking forward to chatting with you all!", "admin"),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedReport {
    pub cleared: usize,
    pub added: usize,
}

/// Replaces every message with [`SAMPLE_MESSAGES`] in a single transaction.
pub fn seed(store: &Store) -> Result<SeedReport, StoreError> {
    store.transaction(|conn| {
        let cleared = clear_messages(conn)?;
        for (body, username) in SAMPLE_MESSAGES.iter() {
            insert_message(conn, &new_message(body, username)?)?;
        }
        Ok(SeedReport {
            cleared,
            added: SAMPLE_MESSAGES.len(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_messages() {
        let store = Store::in_memory().unwrap();
        store.create("stale", "nobody").unwrap();
        store.create("older", "nobody").unwrap();

        let report = seed(&store).unwrap();
        assert_eq!(report, SeedReport { cleared: 2, added: 10 });

        let messages = store.list_all().unwrap();
        let listed: Vec<(&str, &str)> = messages
            .iter()
            .map(|message| (message.body.as_str(), message.username.as_str()))
            .collect();
        assert_eq!(listed, SAMPLE_MESSAGES.to_vec());
    }

    #[test]
    fn reseeding_keeps_ten_messages() {
        let store = Store::in_memory().unwrap();
        seed(&store).unwrap();
        let report = seed(&store).unwrap();
        assert_eq!(report.cleared, 10);
        assert_eq!(store.list_all().unwrap().len(), 10);
    }
}
