//! Entry commands: `capsec set|get|keys|remove|clear|platform`.

use std::io::{self, BufRead, Write};

use capsec_core::Config;
use capsec_storage::{SecureStorage, SecureStoragePlugin};

/// Open storage as configured and wrap it in the text API.
fn open(config: &Config) -> anyhow::Result<SecureStoragePlugin> {
    let storage = SecureStorage::open(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize secure storage: {}", e))?;
    Ok(SecureStoragePlugin::new(storage))
}

/// Store a value, prompting for hidden input when none is given.
pub async fn set(config: &Config, key: &str, value: Option<String>) -> anyhow::Result<()> {
    let value = match value {
        Some(v) => v,
        None => {
            let prompt = format!("Enter value for '{key}': ");
            rpassword::prompt_password(prompt)
                .map_err(|e| anyhow::anyhow!("Failed to read value: {}", e))?
        }
    };

    open(config)?
        .set(key, &value)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("Stored '{}'.", key);
    Ok(())
}

/// Print a stored value.
pub async fn get(config: &Config, key: &str) -> anyhow::Result<()> {
    let value = open(config)?
        .get(key)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("{}", value.expose_secret());
    Ok(())
}

/// List stored keys.
pub async fn keys(config: &Config) -> anyhow::Result<()> {
    let keys = open(config)?
        .keys()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if keys.is_empty() {
        println!("No entries stored.");
    } else {
        for key in &keys {
            println!("{key}");
        }
        println!("\n{} entr{} total.", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
    }
    Ok(())
}

/// Remove one entry.
pub async fn remove(config: &Config, key: &str) -> anyhow::Result<()> {
    open(config)?
        .remove(key)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("Removed '{}'.", key);
    Ok(())
}

/// Remove every entry after confirmation.
pub async fn clear(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm("Remove every stored entry?")? {
        println!("Aborted.");
        return Ok(());
    }

    open(config)?
        .clear()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("All entries removed.");
    Ok(())
}

/// Print the platform name.
pub async fn platform(config: &Config) -> anyhow::Result<()> {
    println!("{}", open(config)?.get_platform().await);
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
