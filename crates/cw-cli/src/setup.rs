use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;

const CONFIG_TEMPLATE: &str = r#"# cw configuration
#
# Every key can also be set with a CW_-prefixed environment variable,
# e.g. CW_ENDPOINT=https://amyphanwest.com

# Site serving POST /api/chat
endpoint = "http://localhost:3000"

# Seconds to wait for a reply before showing the fallback message
timeout_secs = 30

# Conversation domain sent with every message
# context = "amy_campaign"

# Delay before the signup follow-up prompt
# follow_up_delay_ms = 1000

# ── Analytics & sharing ──────────────────────────────────────────
# site_url = "https://amyphanwest.com"
# page = "/"
"#;

pub fn run() -> Result<()> {
    let config_dir = Config::config_dir()?;
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    if config_path.exists() {
        println!("Existing config file found:");
        println!("  {}", config_path.display());
        print!("\nOverwrite? (Existing file will be backed up) [y/N] ");

        // Flush stdout so the prompt appears before reading
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }

        backup_file(&config_path)?;
    }

    std::fs::write(&config_path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {}", config_path.display());

    println!("\nNext steps:");
    println!("  1. Point cw at your site:  edit endpoint in the file above");
    println!("  2. Start chatting:         cw");
    println!("  3. Or ask one question:    cw -p \"Where does Amy stand on taxes?\"");

    Ok(())
}

/// Back up a file to <name>.bak, appending a timestamp if .bak already exists.
fn backup_file(path: &Path) -> Result<()> {
    let mut backup = path.with_extension("toml.bak");

    if backup.exists() {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        backup = path.with_extension(format!("toml.bak.{timestamp}"));
    }

    std::fs::rename(path, &backup)
        .with_context(|| format!("Failed to back up {} to {}", path.display(), backup.display()))?;
    println!("  Backed up to {}", backup.display());

    Ok(())
}
