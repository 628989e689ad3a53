use std::fmt::Write;

use pagedesk_api::home::HomePage;
use pagedesk_inbox::view::ChatFrame;
use pagedesk_types::models::Direction;

pub fn chat_frame(frame: &ChatFrame) -> String {
    let mut out = String::new();

    if frame.loading {
        out.push_str("Loading...\n");
        return out;
    }
    if !frame.connected {
        out.push_str("No Facebook page connected. Run `pagedesk home` to connect one.\n");
        return out;
    }

    if !frame.sidebar_collapsed {
        out.push_str("== Conversations ==\n");
        if frame.rows.is_empty() {
            out.push_str("  (none yet)\n");
        }
        for row in &frame.rows {
            let marker = if row.selected { '>' } else { ' ' };
            let _ = writeln!(out, "{} [{}] {:<20} {:>4}", marker, row.id, row.name, row.age);
            let _ = writeln!(out, "      {}", row.first_incoming);
            if row.last_incoming != row.first_incoming {
                let _ = writeln!(out, "      {}", row.last_incoming);
            }
        }
        out.push('\n');
    }

    match &frame.thread {
        Some(thread) => {
            let _ = writeln!(out, "== {} ==", thread.name);
            if thread.stale {
                out.push_str("  (no longer in the inbox)\n");
            }
            for line in &thread.lines {
                let (indent, arrow) = match line.direction {
                    Direction::Incoming => ("", "<"),
                    Direction::Outgoing => ("                ", ">"),
                };
                for (i, text) in line.content.lines().enumerate() {
                    let lead = if i == 0 { arrow } else { " " };
                    let _ = writeln!(out, "{}{} {}", indent, lead, text);
                }
                if let Some(meta) = &line.meta {
                    let _ = writeln!(out, "{}  {}", indent, meta);
                }
            }
        }
        None => out.push_str("No conversation selected.\n"),
    }

    if let Some(name) = &frame.profile {
        let _ = writeln!(out, "\n[profile] {}", name);
    }
    if let Some(error) = &frame.error {
        let _ = writeln!(out, "\n! {}", error);
    }

    if frame.compose.is_empty() {
        let _ = write!(out, "\n({}) ", frame.placeholder);
    } else {
        let _ = write!(out, "\n{} ", frame.compose);
    }
    if frame.show_send {
        out.push_str("[Enter to send]");
    }
    out.push('\n');
    out
}

pub fn home(page: &HomePage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Signed in as {}", page.user.display_name());

    match &page.status {
        Some(status) if status.connected => {
            let name = status.page.as_ref().map_or("unknown page", |p| p.name.as_str());
            let _ = writeln!(out, "Connected page: {}", name);
            out.push_str("Run `pagedesk chat` to open the inbox, `pagedesk disconnect` to remove it.\n");
        }
        Some(_) => {
            out.push_str("No Facebook page connected.\n");
            match &page.auth_url {
                Some(url) => {
                    let _ = writeln!(out, "Connect one by opening:\n  {}", url);
                }
                None => out.push_str("Authorize URL unavailable, try again later.\n"),
            }
        }
        None => out.push_str("Connection status unavailable, try again later.\n"),
    }

    if let Some(error) = &page.error {
        let _ = writeln!(out, "! {}", error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagedesk_inbox::view::{ConversationRow, ThreadLine, ThreadView};
    use pagedesk_types::models::ChatId;

    fn frame() -> ChatFrame {
        ChatFrame {
            loading: false,
            connected: true,
            sidebar_collapsed: false,
            rows: vec![ConversationRow {
                id: ChatId::from(7),
                name: "Jane".into(),
                age: "5m".into(),
                first_incoming: "hi".into(),
                last_incoming: "hi".into(),
                selected: true,
            }],
            thread: Some(ThreadView {
                id: ChatId::from(7),
                name: "Jane".into(),
                stale: false,
                lines: vec![ThreadLine {
                    direction: Direction::Incoming,
                    content: "hi".into(),
                    meta: Some("Jane - May 1, 3:07 PM".into()),
                }],
            }),
            profile: Some("Jane".into()),
            compose: String::new(),
            placeholder: "Message Jane".into(),
            show_send: false,
            error: None,
        }
    }

    #[test]
    fn renders_rows_thread_and_placeholder() {
        let text = chat_frame(&frame());
        assert!(text.contains("> [7] Jane"));
        assert!(text.contains("< hi"));
        assert!(text.contains("Jane - May 1, 3:07 PM"));
        assert!(text.contains("(Message Jane)"));
        assert!(!text.contains("[Enter to send]"));
    }

    #[test]
    fn collapsed_sidebar_hides_rows() {
        let mut f = frame();
        f.sidebar_collapsed = true;
        f.compose = "hello".into();
        f.show_send = true;
        let text = chat_frame(&f);
        assert!(!text.contains("== Conversations =="));
        assert!(text.contains("hello [Enter to send]"));
    }
}
