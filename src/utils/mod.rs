pub mod token_counter;

use std::path::PathBuf;

/// Expand a leading `~/` against the home directory. Other paths pass through.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}
