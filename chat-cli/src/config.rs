//! Configuration resolution for the huddle CLI.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use huddle_client::ClientConfig;

/// Environment variable that overrides `identity.token`.
pub const TOKEN_ENV: &str = "HUDDLE_TOKEN";

/// Default config file location (`<platform config dir>/huddle.toml`).
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "huddle", "huddle")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().join("huddle.toml"))
}

/// Load the configuration the CLI runs with.
///
/// An explicit `--config` must exist. The default location may be absent,
/// in which case built-in defaults apply. `HUDDLE_TOKEN` wins over the file.
pub fn load(explicit: Option<&Path>) -> Result<ClientConfig> {
    let mut config = match explicit {
        Some(path) => ClientConfig::from_file(path)?,
        None => {
            let path = default_path()?;
            if path.exists() {
                ClientConfig::from_file(&path)?
            } else {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                ClientConfig::default()
            }
        }
    };
    apply_token_override(&mut config, std::env::var(TOKEN_ENV).ok());
    Ok(config)
}

fn apply_token_override(config: &mut ClientConfig, token: Option<String>) {
    if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
        config.identity.token = token;
    }
}

/// Fail early when no local user is configured.
pub fn require_identity(config: &ClientConfig) -> Result<()> {
    if config.identity.user_id.trim().is_empty() {
        bail!("identity.user_id is not set. Run 'huddle init --user <id>' first.");
    }
    Ok(())
}

/// Write a starter config file.
pub fn write(path: &Path, config: &ClientConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, contents).context("Failed to write config file")?;
    set_file_permissions_0600(path)?;
    Ok(())
}

/// Restrict the file to its owner; it may hold a bearer token.
fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to set config file permissions")?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
