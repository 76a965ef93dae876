//! Account commands: register, login, logout, whoami.

use super::{CliResult, Connection, NOT_SIGNED_IN, SESSION_EXPIRED};
use huddle_client::{ClientError, CredentialStore};

/// Runs the register command.
pub async fn register(connection: &Connection, username: &str, password: &str) -> CliResult {
    let context = connection.context()?;
    let member = context
        .auth()
        .register(username, password)
        .await
        .map_err(|e| e.user_message())?;
    println!("Registered and signed in as {}", member.username);
    Ok(())
}

/// Runs the login command.
pub async fn login(connection: &Connection, username: &str, password: &str) -> CliResult {
    let context = connection.context()?;
    let member = context
        .auth()
        .login(username, password)
        .await
        .map_err(|e| e.user_message())?;
    println!("Signed in as {}", member.username);
    Ok(())
}

/// Runs the logout command.
pub fn logout(connection: &Connection) -> CliResult {
    let context = connection.context()?;
    context.auth().logout()?;
    println!("Signed out");
    Ok(())
}

/// Runs the whoami command.
pub async fn whoami(connection: &Connection, format: &str) -> CliResult {
    let context = connection.context()?;
    let was_signed_in = context.credentials().is_authenticated();
    let member = match context.auth().current_member().await {
        Ok(member) => member,
        Err(ClientError::NotAuthenticated) if was_signed_in => {
            return Err(SESSION_EXPIRED.into())
        }
        Err(ClientError::NotAuthenticated) => return Err(NOT_SIGNED_IN.into()),
        Err(e) => return Err(e.user_message().into()),
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&member)?);
    } else {
        println!("{} (member #{})", member.username, member.id);
        println!(
            "Joined: {}",
            member.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
