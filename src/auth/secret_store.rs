use anyhow::{Context, Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "grademail";
const PASSWORD_ENV: &str = "GRADEMAIL_SMTP_PASSWORD";

/// Keyring entry holding the SMTP password of `username`.
fn smtp_entry(username: &str) -> Result<Entry> {
    Entry::new(SERVICE, username)
        .with_context(|| format!("opening keyring entry for {username}"))
}

pub fn save_smtp_password(username: &str, password: &str) -> Result<()> {
    smtp_entry(username)?
        .set_password(password)
        .with_context(|| format!("storing SMTP password for {username}"))
}

/// Password used to log in to the SMTP server as `username`: the keyring
/// entry, else `GRADEMAIL_SMTP_PASSWORD`.
pub fn smtp_password(username: &str) -> Result<String> {
    let stored = match smtp_entry(username)?.get_password() {
        Ok(v) => Some(v),
        Err(KeyringError::NoEntry) => None,
        Err(e) => return Err(e).with_context(|| format!("reading SMTP password for {username}")),
    };
    pick_password(username, stored, std::env::var(PASSWORD_ENV).ok())
}

fn pick_password(username: &str, stored: Option<String>, env: Option<String>) -> Result<String> {
    stored
        .or(env)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            anyhow!("no SMTP password stored for {username}, run `grademail set-password` or set {PASSWORD_ENV}")
        })
}
