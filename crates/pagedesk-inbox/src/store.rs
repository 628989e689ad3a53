use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use pagedesk_types::models::{ChatId, Conversation, Message};

pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Sequence number handed out before each fetch. Snapshots carrying a tick
/// older than the last applied state are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(u64);

impl Tick {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Selection view untouched: content identical, or selection absent
    /// from the snapshot (sticky).
    Unchanged,
    /// Nothing was selected; the first conversation now is.
    Defaulted,
    /// The selected conversation's content differed and was replaced.
    Refreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Snapshot older than the current state; nothing changed.
    Discarded,
    Applied {
        list_changed: bool,
        selection: SelectionChange,
    },
}

/// Canonical conversation list plus the selected conversation.
///
/// The selection view is a separate copy: it follows the list while the
/// selected id is present in snapshots, and keeps its last content when the
/// id disappears. A selected id is only ever taken from a snapshot.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    selected_id: Option<ChatId>,
    selected: Option<Conversation>,
    next_seq: u64,
    /// Lowest tick still accepted.
    floor: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn selected_id(&self) -> Option<&ChatId> {
        self.selected_id.as_ref()
    }

    /// Selection view. May be stale if the id vanished from the last snapshot.
    pub fn selected(&self) -> Option<&Conversation> {
        self.selected.as_ref()
    }

    /// True when a selection exists but the latest snapshot did not contain it.
    pub fn is_selection_stale(&self) -> bool {
        self.selected_id
            .as_ref()
            .is_some_and(|id| self.find(id).is_none())
    }

    pub fn find(&self, id: &ChatId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn begin_tick(&mut self) -> Tick {
        Tick(self.next_sequence())
    }

    /// Reconcile a full snapshot from the backend, which is authoritative.
    pub fn apply_snapshot(&mut self, tick: Tick, snapshot: Vec<Conversation>) -> ApplyOutcome {
        if tick.0 < self.floor {
            debug!(tick = tick.0, floor = self.floor, "Discarding stale snapshot");
            return ApplyOutcome::Discarded;
        }
        self.floor = tick.0;

        let list_changed = self.conversations != snapshot;
        self.conversations = snapshot;

        let selection = match self.selected_id.clone() {
            None => match self.conversations.first() {
                Some(first) => {
                    self.selected_id = Some(first.id.clone());
                    self.selected = Some(first.clone());
                    SelectionChange::Defaulted
                }
                None => SelectionChange::Unchanged,
            },
            Some(id) => match self.conversations.iter().find(|c| c.id == id) {
                Some(fresh) if self.selected.as_ref() != Some(fresh) => {
                    self.selected = Some(fresh.clone());
                    SelectionChange::Refreshed
                }
                Some(_) => SelectionChange::Unchanged,
                None => {
                    trace!(chat_id = %id, "Selected conversation absent from snapshot");
                    SelectionChange::Unchanged
                }
            },
        };

        ApplyOutcome::Applied {
            list_changed,
            selection,
        }
    }

    /// Select a conversation from the current list. Unknown ids are ignored.
    pub fn select(&mut self, id: &ChatId) -> bool {
        let Some(conversation) = self.find(id).cloned() else {
            return false;
        };
        self.selected_id = Some(conversation.id.clone());
        self.selected = Some(conversation);
        true
    }

    /// Record a message the backend just accepted. Polls started before this
    /// call are discarded so they cannot drop the message again. Returns
    /// whether the message was added anywhere.
    pub fn append_outgoing(&mut self, chat_id: &ChatId, message: Message) -> bool {
        self.floor = self.next_sequence();

        let mut appended = false;

        if let Some(conversation) = self.conversations.iter_mut().find(|c| &c.id == chat_id) {
            if !conversation.contains_message(&message.id) {
                conversation.messages.push(message.clone());
                appended = true;
            }
        }

        if self.selected_id.as_ref() == Some(chat_id) {
            if let Some(selected) = self.selected.as_mut() {
                if !selected.contains_message(&message.id) {
                    selected.messages.push(message);
                    appended = true;
                }
            }
        }

        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pagedesk_types::models::{Direction, MessageId};

    fn msg(id: i64, direction: Direction, content: &str) -> Message {
        Message {
            id: MessageId::from(id),
            direction,
            content: content.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, id as u32 % 60).unwrap(),
        }
    }

    fn conv(id: i64, name: &str, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: ChatId::from(id),
            counterpart_name: name.into(),
            messages,
        }
    }

    fn two_chats() -> Vec<Conversation> {
        vec![
            conv(1, "Jane", vec![msg(10, Direction::Incoming, "hi")]),
            conv(2, "John", vec![]),
        ]
    }

    fn apply(store: &mut ConversationStore, snapshot: Vec<Conversation>) -> ApplyOutcome {
        let tick = store.begin_tick();
        store.apply_snapshot(tick, snapshot)
    }

    #[test]
    fn first_snapshot_selects_first_conversation() {
        let mut store = ConversationStore::new();
        let outcome = apply(&mut store, two_chats());

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: true,
                selection: SelectionChange::Defaulted
            }
        );
        assert_eq!(store.selected_id(), Some(&ChatId::from(1)));
        assert_eq!(store.selected().unwrap().counterpart_name, "Jane");
    }

    #[test]
    fn empty_snapshot_selects_nothing() {
        let mut store = ConversationStore::new();
        let outcome = apply(&mut store, vec![]);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: false,
                selection: SelectionChange::Unchanged
            }
        );
        assert!(store.selected_id().is_none());
    }

    #[test]
    fn same_snapshot_twice_is_idempotent() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());
        let selected_before = store.selected().cloned();

        let outcome = apply(&mut store, two_chats());
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: false,
                selection: SelectionChange::Unchanged
            }
        );
        assert_eq!(store.conversations(), two_chats().as_slice());
        assert_eq!(store.selected().cloned(), selected_before);
    }

    #[test]
    fn changed_selected_content_refreshes_view() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());

        let mut next = two_chats();
        next[0].messages.push(msg(11, Direction::Incoming, "anyone there?"));
        let outcome = apply(&mut store, next);

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: true,
                selection: SelectionChange::Refreshed
            }
        );
        assert_eq!(store.selected().unwrap().messages.len(), 2);
    }

    #[test]
    fn change_in_other_conversation_leaves_selection_alone() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());

        let mut next = two_chats();
        next[1].messages.push(msg(20, Direction::Incoming, "hello?"));
        let outcome = apply(&mut store, next);

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: true,
                selection: SelectionChange::Unchanged
            }
        );
    }

    #[test]
    fn older_tick_is_discarded() {
        let mut store = ConversationStore::new();
        let slow = store.begin_tick();
        let fast = store.begin_tick();

        let mut newer = two_chats();
        newer[0].messages.push(msg(11, Direction::Incoming, "newer"));
        store.apply_snapshot(fast, newer.clone());

        assert_eq!(store.apply_snapshot(slow, two_chats()), ApplyOutcome::Discarded);
        assert_eq!(store.conversations(), newer.as_slice());
        assert_eq!(store.selected().unwrap().messages.len(), 2);
    }

    #[test]
    fn selection_is_sticky_when_conversation_vanishes() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());
        assert!(store.select(&ChatId::from(2)));

        let outcome = apply(&mut store, vec![conv(1, "Jane", vec![])]);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: true,
                selection: SelectionChange::Unchanged
            }
        );
        assert_eq!(store.selected_id(), Some(&ChatId::from(2)));
        assert_eq!(store.selected().unwrap().counterpart_name, "John");
        assert!(store.is_selection_stale());

        // Reappearing with new content refreshes it
        let outcome = apply(
            &mut store,
            vec![conv(2, "John", vec![msg(30, Direction::Incoming, "back")])],
        );
        assert!(matches!(
            outcome,
            ApplyOutcome::Applied {
                selection: SelectionChange::Refreshed,
                ..
            }
        ));
        assert!(!store.is_selection_stale());
    }

    #[test]
    fn selecting_unknown_id_is_noop() {
        let mut store = ConversationStore::new();
        assert!(!store.select(&ChatId::from(1)));
        assert!(store.selected_id().is_none());

        apply(&mut store, two_chats());
        assert!(!store.select(&ChatId::from(99)));
        assert_eq!(store.selected_id(), Some(&ChatId::from(1)));
        assert_eq!(store.selected().unwrap().id, ChatId::from(1));
    }

    #[test]
    fn append_outgoing_updates_list_and_selection() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());

        let sent = msg(500, Direction::Outgoing, "hello");
        assert!(store.append_outgoing(&ChatId::from(1), sent.clone()));

        assert_eq!(store.find(&ChatId::from(1)).unwrap().messages.last(), Some(&sent));
        assert_eq!(store.selected().unwrap().messages.last(), Some(&sent));

        // Appending the same message again does nothing
        assert!(!store.append_outgoing(&ChatId::from(1), sent));
        assert_eq!(store.selected().unwrap().messages.len(), 2);
    }

    #[test]
    fn append_to_unselected_conversation_skips_selection() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());

        let sent = msg(501, Direction::Outgoing, "hi John");
        assert!(store.append_outgoing(&ChatId::from(2), sent));
        assert_eq!(store.find(&ChatId::from(2)).unwrap().messages.len(), 1);
        assert_eq!(store.selected().unwrap().messages.len(), 1);
    }

    #[test]
    fn poll_started_before_append_cannot_clobber_it() {
        let mut store = ConversationStore::new();
        apply(&mut store, two_chats());

        let in_flight = store.begin_tick();
        let sent = msg(500, Direction::Outgoing, "hello");
        store.append_outgoing(&ChatId::from(1), sent.clone());

        // The in-flight poll was taken before the send and lacks the message
        assert_eq!(store.apply_snapshot(in_flight, two_chats()), ApplyOutcome::Discarded);
        assert_eq!(store.selected().unwrap().messages.last(), Some(&sent));

        // A later poll that includes the message does not duplicate it
        let mut with_sent = two_chats();
        with_sent[0].messages.push(sent.clone());
        let outcome = apply(&mut store, with_sent);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                list_changed: false,
                selection: SelectionChange::Unchanged
            }
        );
        let messages = &store.selected().unwrap().messages;
        assert_eq!(messages.iter().filter(|m| m.id == sent.id).count(), 1);
    }
}
