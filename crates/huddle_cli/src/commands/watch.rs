//! Watch command implementation.
//!
//! Mounts a chat session and prints every message not printed before. Exits
//! on Ctrl-C, or with an error once the session is invalidated.

use super::{format_message, CliResult, Connection, NOT_SIGNED_IN, SESSION_EXPIRED};
use huddle_client::{CredentialStore, FeedState, SyncState};
use huddle_protocol::MessageId;
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

/// Runs the watch command.
pub async fn run(connection: &Connection, interval_secs: u64) -> CliResult {
    let config = connection
        .config()
        .with_poll_interval(Duration::from_secs(interval_secs.max(1)));
    let context = connection.context_with(config)?;
    if !context.credentials().is_authenticated() {
        return Err(NOT_SIGNED_IN.into());
    }

    let session = context.chat_session();
    let mut feed = session.subscribe();
    let mut route = context.navigator().subscribe();
    route.borrow_and_update();

    if session.mount() != SyncState::Active {
        return Err(SESSION_EXPIRED.into());
    }
    info!(server = %context.config().base_url, "Watching feed, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printer = FeedPrinter::default();
    let result = loop {
        printer.print(&feed.borrow_and_update());

        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            changed = feed.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
            changed = route.changed() => {
                if changed.is_err() || route.borrow().is_authentication() {
                    break Err(SESSION_EXPIRED.into());
                }
            }
        }
    };

    session.unmount();
    result
}

/// Tracks what has already been written to the terminal.
#[derive(Default)]
struct FeedPrinter {
    printed: HashSet<MessageId>,
    last_error: Option<String>,
}

impl FeedPrinter {
    fn print(&mut self, state: &FeedState) {
        for line in self.new_lines(state) {
            println!("{line}");
        }
        if state.error != self.last_error {
            if let Some(error) = &state.error {
                eprintln!("! {error}");
            }
            self.last_error = state.error.clone();
        }
    }

    fn new_lines(&mut self, state: &FeedState) -> Vec<String> {
        state
            .feed
            .iter()
            .filter(|message| self.printed.insert(message.id))
            .map(format_message)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use huddle_protocol::Message;

    fn state(ids: &[MessageId]) -> FeedState {
        FeedState {
            feed: ids
                .iter()
                .map(|&id| {
                    Message::new(
                        id,
                        "alice",
                        format!("m{id}"),
                        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                    )
                })
                .collect(),
            ..FeedState::default()
        }
    }

    #[test]
    fn prints_each_message_once() {
        let mut printer = FeedPrinter::default();

        assert_eq!(printer.new_lines(&state(&[1, 2])).len(), 2);
        assert_eq!(printer.new_lines(&state(&[1, 2])).len(), 0);

        let lines = printer.new_lines(&state(&[2, 3]));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("alice: m3"));
    }
}
