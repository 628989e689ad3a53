//! Near-real-time Messenger inbox: a conversation store fed by a poller,
//! and the chat view that renders it.

pub mod dispatcher;
pub mod expiry;
pub mod format;
pub mod poller;
pub mod store;
pub mod view;

pub use dispatcher::Dispatcher;
pub use poller::{PollHandle, Poller, PollerConfig};
pub use store::{ConversationStore, SharedStore};
pub use view::ChatView;
