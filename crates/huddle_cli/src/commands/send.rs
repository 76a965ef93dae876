//! Send command implementation.

use super::{format_message, CliResult, Connection, NOT_SIGNED_IN, SESSION_EXPIRED};
use huddle_client::{CredentialStore, SendOutcome};

/// Runs the send command.
pub async fn run(connection: &Connection, text: &str) -> CliResult {
    let context = connection.context()?;
    if !context.credentials().is_authenticated() {
        return Err(NOT_SIGNED_IN.into());
    }

    let session = context.chat_session();
    match session.submit_message(text).await {
        SendOutcome::Sent(message) => {
            println!("{}", format_message(&message));
            Ok(())
        }
        SendOutcome::Empty => Err("Message is empty.".into()),
        SendOutcome::Failed(error) => Err(error.into()),
        SendOutcome::SignedOut => Err(SESSION_EXPIRED.into()),
    }
}
