//! Diagnostic commands.

use capsec_core::Config;
use capsec_storage::{SecureStorage, StorageStrategy};
use chrono::Utc;
use clap::Args;
use console::{style, Emoji};

static CHECK: Emoji = Emoji("✓", "+");
static CROSS: Emoji = Emoji("✗", "x");
static WARN: Emoji = Emoji("⚠", "!");

/// Doctor command arguments.
#[derive(Args)]
pub struct DoctorArgs {
    /// Also open the store and read every entry back
    #[arg(long)]
    pub full: bool,
}

/// Run the doctor command.
pub async fn run(args: DoctorArgs, config: &Config) -> anyhow::Result<()> {
    println!("capsec doctor\n");

    let mut errors = 0;
    let mut warnings = 0;

    println!("Checking configuration...");
    match config.validate() {
        Ok(()) => println!("  {} Configuration valid", style(CHECK).green()),
        Err(e) => {
            println!("  {} Configuration invalid: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    println!("\nChecking directories...");
    for (label, dir) in [("Data", config.data_dir()), ("Vault", config.vault_dir())] {
        match dir {
            Ok(dir) if dir.exists() => {
                println!("  {} {} directory exists: {:?}", style(CHECK).green(), label, dir)
            }
            Ok(dir) => println!(
                "  {} {} directory not created yet: {:?}",
                style(WARN).yellow(),
                label,
                dir
            ),
            Err(e) => {
                println!("  {} Failed to determine {} directory: {}", style(CROSS).red(), label, e);
                errors += 1;
            }
        }
    }

    if errors > 0 {
        return summary(errors, warnings);
    }

    println!("\nChecking storage...");
    let storage = match SecureStorage::open(config) {
        Ok(storage) => storage,
        Err(e) => {
            println!("  {} Failed to open storage: {}", style(CROSS).red(), e);
            return summary(errors + 1, warnings);
        }
    };

    println!("  Platform: {}", storage.platform());
    println!("  Namespace: {}", storage.namespace());
    println!("  Key alias: {}", storage.alias());

    match storage.strategy() {
        Some(StorageStrategy::Strong) => {
            println!(
                "  {} Strong strategy ({} vault)",
                style(CHECK).green(),
                storage.vault_name().unwrap_or("unknown")
            );
            match storage.certificate() {
                Ok(Some(cert)) => {
                    println!("  Certificate subject: {}", cert.subject);
                    println!("  Fingerprint: {}", cert.fingerprint());
                    if cert.validity.contains(Utc::now()) {
                        println!(
                            "  {} Valid until {}",
                            style(CHECK).green(),
                            cert.validity.not_after.format("%Y-%m-%d")
                        );
                    } else {
                        println!(
                            "  {} Certificate outside its validity window ({} to {})",
                            style(WARN).yellow(),
                            cert.validity.not_before.format("%Y-%m-%d"),
                            cert.validity.not_after.format("%Y-%m-%d")
                        );
                        warnings += 1;
                    }
                }
                Ok(None) => {
                    println!("  {} No certificate stored for the key pair", style(WARN).yellow());
                    warnings += 1;
                }
                Err(e) => {
                    println!("  {} Failed to read certificate: {}", style(CROSS).red(), e);
                    errors += 1;
                }
            }
        }
        Some(StorageStrategy::Basic) => {
            println!(
                "  {} Basic strategy: values are encoded but not encrypted",
                style(WARN).yellow()
            );
            warnings += 1;
        }
        None => {
            println!("  {} Storage not initialized", style(CROSS).red());
            errors += 1;
        }
    }

    if args.full {
        println!("\nReading entries...");
        match storage.keys().await {
            Ok(keys) => {
                let mut unreadable = 0;
                for key in &keys {
                    if let Err(e) = storage.get_data(key).await {
                        println!("  {} {}: {}", style(CROSS).red(), key, e);
                        unreadable += 1;
                    }
                }
                if unreadable == 0 {
                    println!("  {} {} entries readable", style(CHECK).green(), keys.len());
                }
                errors += unreadable;
            }
            Err(e) => {
                println!("  {} Failed to list entries: {}", style(CROSS).red(), e);
                errors += 1;
            }
        }
    }

    summary(errors, warnings)
}

fn summary(errors: usize, warnings: usize) -> anyhow::Result<()> {
    println!("\n{}", style("Summary").bold());
    println!(
        "  Errors: {}",
        if errors > 0 { style(errors).red() } else { style(errors).green() }
    );
    println!(
        "  Warnings: {}",
        if warnings > 0 { style(warnings).yellow() } else { style(warnings).green() }
    );

    if errors > 0 {
        anyhow::bail!("{} error(s) found", errors);
    }

    Ok(())
}
