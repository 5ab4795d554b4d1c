//! Config file loading for the aggregator binary: process bootstrap
//! plumbing, not core logic, mirrored on the original Go `core/config`
//! package's file-then-env-override precedence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Raw on-disk shape, matching `avs_raw_config.go`'s field set
/// (`eth_rpc_url`, `aggregator_server_ip_port_address`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub eth_rpc_url: String,
    pub eth_ws_url: String,
    pub aggregator_server_ip_port_address: String,
    pub aggregator_grpc_server_ip_port_address: String,
    pub aggregator_jsonrpc_server_ip_port_address: String,
    pub layer1_chain_id: u64,
    pub quorum_nums: Vec<u8>,
    pub registry_coordinator_address: String,
    pub operator_state_retriever_address: String,
}

impl AggregatorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment overrides matching the process's documented env surface.
    /// An unset or empty variable leaves the file value untouched.
    pub fn apply_env_overrides(&mut self) {
        Self::override_from_env("ETH_RPC_URL", &mut self.eth_rpc_url);
        Self::override_from_env("ETH_WS_URL", &mut self.eth_ws_url);
        Self::override_from_env("AGGREGATOR_SERVER_URL", &mut self.aggregator_server_ip_port_address);
        Self::override_from_env(
            "AGGREGATOR_GRPC_SERVER_URL",
            &mut self.aggregator_grpc_server_ip_port_address,
        );
        Self::override_from_env(
            "AGGREGATOR_JSONRPC_SERVER_URL",
            &mut self.aggregator_jsonrpc_server_ip_port_address,
        );
        Self::override_from_env(
            "AVS_REGISTRY_COORDINATOR_ADDRESS",
            &mut self.registry_coordinator_address,
        );
        Self::override_from_env(
            "OPERATOR_STATE_RETRIEVER_ADDRESS",
            &mut self.operator_state_retriever_address,
        );
    }

    fn override_from_env(var: &str, field: &mut String) {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                tracing::debug!(var, "overriding config field from environment");
                *field = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn sample_toml() -> &'static str {
        r#"
            eth_rpc_url = "http://localhost:8545"
            eth_ws_url = "ws://localhost:8546"
            aggregator_server_ip_port_address = "0.0.0.0:8080"
            aggregator_grpc_server_ip_port_address = "0.0.0.0:8081"
            aggregator_jsonrpc_server_ip_port_address = "0.0.0.0:8082"
            layer1_chain_id = 1
            quorum_nums = [0]
            registry_coordinator_address = "0xcoordinator"
            operator_state_retriever_address = "0xretriever"
        "#
    }

    #[test]
    fn loads_a_well_formed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        let config = AggregatorConfig::load(file.path()).unwrap();
        assert_eq!(config.layer1_chain_id, 1);
        assert_eq!(config.quorum_nums, vec![0]);
    }

    #[test]
    fn environment_overrides_take_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();

        std::env::set_var("ETH_RPC_URL", "http://overridden:8545");
        let config = AggregatorConfig::load(file.path()).unwrap();
        std::env::remove_var("ETH_RPC_URL");

        assert_eq!(config.eth_rpc_url, "http://overridden:8545");
    }
}
