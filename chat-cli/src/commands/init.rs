//! Write a starter config file.

use anyhow::Result;
use std::path::Path;

use huddle_client::ClientConfig;

use crate::config;

/// Run the init command.
pub fn run(
    path: &Path,
    user: &str,
    http_url: Option<String>,
    ws_url: Option<String>,
    force: bool,
) -> Result<()> {
    let mut client = ClientConfig::default();
    client.identity.user_id = user.to_string();
    if let Some(url) = http_url {
        client.server.http_base_url = url;
    }
    if let Some(url) = ws_url {
        client.server.ws_url = url;
    }

    config::write(path, &client, force)?;

    println!("Config written to {}", path.display());
    println!();
    println!("  User:     {}", client.identity.user_id);
    println!("  REST:     {}", client.server.http_base_url);
    println!("  Push:     {}", client.server.ws_url);
    println!();
    println!("Next steps:");
    println!("  1. Set identity.token in the file, or export {}", config::TOKEN_ENV);
    println!("  2. Follow a project: huddle watch --project <id>");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_writes_identity_and_urls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huddle.toml");

        run(
            &path,
            "alice",
            Some("https://chat.example.com".into()),
            None,
            false,
        )
        .unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded.identity.user_id, "alice");
        assert_eq!(loaded.server.http_base_url, "https://chat.example.com");
        assert_eq!(loaded.server.ws_url, ClientConfig::default().server.ws_url);
    }

    #[test]
    fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huddle.toml");

        run(&path, "alice", None, None, false).unwrap();
        assert!(run(&path, "bob", None, None, false).is_err());

        run(&path, "bob", None, None, true).unwrap();
        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded.identity.user_id, "bob");
    }
}
