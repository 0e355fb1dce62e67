use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path};

/// Validates a server configuration
pub fn validate_server_config(id: &str, config: &ServerConfig) -> Result<()> {
    if !is_single_component(id) {
        return Err(Error::ConfigInvalid(format!(
            "Server id '{}' must be a single directory name",
            id
        )));
    }

    if config.port == 0 {
        return Err(Error::ConfigInvalid(format!("Server '{}' has port 0", id)));
    }

    if let Some(mod_pack) = &config.settings.selected_mod_pack {
        if !is_single_component(mod_pack) {
            return Err(Error::ConfigInvalid(format!(
                "Server '{}' selects invalid mod pack '{}'",
                id, mod_pack
            )));
        }
    }

    Ok(())
}

/// Validates a map of server configurations
pub fn validate_server_configs(configs: &BTreeMap<String, ServerConfig>) -> Result<()> {
    if configs.is_empty() {
        return Err(Error::ConfigInvalid("No servers configured".to_string()));
    }

    let mut ports: HashMap<u16, &str> = HashMap::new();
    for (id, config) in configs {
        validate_server_config(id, config)?;

        if let Some(other) = ports.insert(config.port, id) {
            return Err(Error::ConfigInvalid(format!(
                "Servers '{}' and '{}' share port {}",
                other, id, config.port
            )));
        }
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server_configs(&config.servers)?;

    if config.max_log_files == 0 {
        return Err(Error::ConfigInvalid(
            "maxLogFiles must be at least 1".to_string(),
        ));
    }

    if config.control_message_capacity == 0 {
        return Err(Error::ConfigInvalid(
            "controlMessageCapacity must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// True when `name` is exactly one normal path component.
pub(crate) fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
