use anyhow::anyhow;
use protocol::BRIDGE_DIR_NAME;
use std::path::PathBuf;

/// `~/Documents/ae-mcp-bridge`, the directory both sides use unless told otherwise.
pub fn default_bridge_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("failed to resolve HOME dir"))?;
    Ok(home.join("Documents").join(BRIDGE_DIR_NAME))
}

/// Command line wins over the config file, which wins over the default.
pub fn resolve_bridge_dir(cli: Option<&str>, config: Option<&str>) -> anyhow::Result<PathBuf> {
    match cli.or(config) {
        Some(path) => Ok(expand_tilde(path)),
        None => default_bridge_dir(),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
