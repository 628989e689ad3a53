use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use pagedesk_api::ApiClient;
use pagedesk_inbox::ChatView;
use pagedesk_inbox::view::{Key, KeyAction, SubmitOutcome};
use pagedesk_session::SessionStore;
use pagedesk_types::events::InboxEvent;
use pagedesk_types::models::{ChatId, Session};

use crate::config::Config;
use crate::render;

enum Command {
    Select(ChatId),
    ToggleSidebar,
    ToggleProfile,
    Quit,
    Text { text: String, more: bool },
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if let Some(id) = trimmed.strip_prefix("/select ") {
        return Command::Select(ChatId::new(id.trim()));
    }
    match trimmed {
        "/sidebar" => Command::ToggleSidebar,
        "/profile" => Command::ToggleProfile,
        "/quit" => Command::Quit,
        _ => match line.strip_suffix('\\') {
            Some(text) => Command::Text {
                text: text.to_string(),
                more: true,
            },
            None => Command::Text {
                text: line.to_string(),
                more: false,
            },
        },
    }
}

/// A new line after a failed send starts a fresh message; an empty line
/// resends the kept text.
fn replaces_kept_text(retry_pending: bool, text: &str) -> bool {
    retry_pending && !text.is_empty()
}

/// Interactive inbox. Returns when the agent quits, stdin closes, or the
/// session expires.
pub async fn run(
    config: &Config,
    sessions: Arc<SessionStore>,
    session: Session,
) -> Result<()> {
    let backend = Arc::new(ApiClient::new(&config.backend_url));
    let mut view = ChatView::new(backend, sessions, session, config.poller());
    let mut events = view.subscribe();

    if let Err(e) = view.mount().await {
        if view.session_expired() {
            println!("Session expired. Run `pagedesk login` to sign in again.");
            return Ok(());
        }
        warn!("Chat opened without integration status: {}", e);
    }
    print!("{}", render::chat_frame(&view.render().await));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Text of a failed send, still in the compose buffer.
    let mut retry_pending = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(InboxEvent::SessionExpired) => {
                    println!("Session expired. Run `pagedesk login` to sign in again.");
                    break;
                }
                Ok(InboxEvent::TransientError { message }) => {
                    println!("! {}", message);
                }
                Ok(event) if event.needs_render() => {
                    print!("{}", render::chat_frame(&view.render().await));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event receiver lagged, redrawing");
                    print!("{}", render::chat_frame(&view.render().await));
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Select(id) => {
                        if !view.select(&id).await {
                            println!("No conversation with id {}", id);
                        }
                    }
                    Command::ToggleSidebar => {
                        view.toggle_sidebar();
                        print!("{}", render::chat_frame(&view.render().await));
                    }
                    Command::ToggleProfile => {
                        view.toggle_profile();
                        print!("{}", render::chat_frame(&view.render().await));
                    }
                    Command::Text { text, more } => {
                        if replaces_kept_text(retry_pending, &text) {
                            view.set_compose("");
                        }
                        retry_pending = false;
                        for c in text.chars() {
                            view.handle_key(Key::Char(c));
                        }
                        let action = view.handle_key(Key::Enter { shift: more });
                        if action == KeyAction::Submit {
                            match view.submit().await {
                                SubmitOutcome::Failed(_) if view.session_expired() => {
                                    println!("Session expired. Run `pagedesk login` to sign in again.");
                                    break;
                                }
                                SubmitOutcome::Failed(_) => {
                                    retry_pending = true;
                                    print!("{}", render::chat_frame(&view.render().await));
                                    println!("Press Enter on an empty line to retry, or type a new message.");
                                }
                                // A successful send redraws through SelectionUpdated.
                                SubmitOutcome::Sent(_) | SubmitOutcome::Ignored => {}
                            }
                        }
                    }
                }
            }
        }
    }

    view.unmount();
    Ok(())
}
