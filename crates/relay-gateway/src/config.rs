//! The outer configuration file: gateway-level settings (bind address,
//! egress allow-list, OAuth issuer) plus the routing payload the state
//! engine compiles. Routers/servers/tools live in the persisted config
//! layout the state engine consumes directly; this file format is the
//! local stand-in for that externally-stored record set.

use std::path::Path;

use relay_state::GatewayConfig;
use serde::Deserialize;

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_oauth_issuer() -> String {
    "http://127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_oauth_issuer")]
    pub oauth_issuer: String,

    /// Hostnames/IPs/CIDRs tool endpoints are allowed to reach despite
    /// resolving to an internal address.
    #[serde(default)]
    pub egress_allow_list: Vec<String>,

    #[serde(flatten)]
    pub gateway: GatewayConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let config: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_falls_back_to_defaults() {
        let config: FileConfig = serde_yaml::from_str("routers: []\n").unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert!(config.egress_allow_list.is_empty());
    }

    #[test]
    fn load_reads_a_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"bind_address: \"0.0.0.0:9000\"\nrouters: []\n",
        )
        .unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
    }
}
