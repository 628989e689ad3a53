use chrono::{DateTime, Utc};

/// Compact age of a timestamp for the conversation list: `now`, `5m`, `3h`, `2d`.
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d", days)
    } else if hours > 0 {
        format!("{}h", hours)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "now".into()
    }
}

/// Label shown under the last message of each direction, e.g. `Jane - May 1, 3:07 PM`.
pub fn message_meta(name: &str, timestamp: DateTime<Utc>) -> String {
    format!("{} - {}", name, timestamp.format("%b %-d, %-I:%M %p"))
}
