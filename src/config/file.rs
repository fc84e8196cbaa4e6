//! JSON config file layer

use std::path::Path;

use crate::common::{Error, Result};

use super::command::PartialRunTestsConfig;

/// Load the config file layer.
///
/// A missing file is an error only when the path was given explicitly;
/// the default path silently yields an empty layer.
pub fn load_config_file(path: &Path, explicit: bool) -> Result<PartialRunTestsConfig> {
    if !path.exists() {
        if explicit {
            return Err(Error::ConfigFileNotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(PartialRunTestsConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config_file_parse(&path.display().to_string(), e))?;

    let layer = serde_json::from_str(&content)
        .map_err(|e| Error::config_file_parse(&path.display().to_string(), e))?;

    tracing::debug!(path = %path.display(), "Loaded config file");
    Ok(layer)
}
