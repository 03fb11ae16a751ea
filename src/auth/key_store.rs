use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "inbox_agent";
const API_KEY_USER: &str = "groq_api_key";

/// Environment variable consulted when the keyring has no key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Save the inference API key into the OS keyring
pub fn save_api_key(api_key: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, API_KEY_USER);
    entry?
        .set_password(api_key)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load the inference API key from the keyring
pub fn load_api_key() -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, API_KEY_USER);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Keyring first, then `GROQ_API_KEY`. Keyring failures are not fatal:
/// headless machines often have no secret service at all.
pub fn resolve_api_key() -> Option<String> {
    let from_keyring = match load_api_key() {
        Ok(k) => k,
        Err(e) => {
            log::debug!("keyring unavailable: {e}");
            None
        }
    };
    pick_api_key(from_keyring, std::env::var(API_KEY_ENV).ok())
}

fn pick_api_key(keyring: Option<String>, env: Option<String>) -> Option<String> {
    keyring
        .or(env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
