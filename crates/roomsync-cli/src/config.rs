//! Client configuration: an optional TOML file layered with `ROOMSYNC_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime configuration, deserialised from `roomsync.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
  #[serde(default = "default_server_url")]
  pub server_url: String,
  /// Server id of the logged-in user. Empty means anonymous.
  #[serde(default)]
  pub user_id:    String,
  #[serde(default)]
  pub auth_token: String,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_server_url() -> String { "http://localhost:3000".to_owned() }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/roomsync/store.db") }

impl ClientConfig {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ROOMSYNC"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: ClientConfig = settings
      .try_deserialize()
      .context("failed to deserialise ClientConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn paths_without_tilde_are_untouched() {
    assert_eq!(expand_tilde(Path::new("/var/db/x.db")), PathBuf::from("/var/db/x.db"));
    assert_eq!(expand_tilde(Path::new("rel/x.db")), PathBuf::from("rel/x.db"));
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let cfg = ClientConfig::load(Path::new("/nonexistent/roomsync.toml")).unwrap();
    assert!(!cfg.server_url.is_empty());
    assert!(!cfg.store_path.as_os_str().is_empty());
  }
}
