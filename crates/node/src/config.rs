//! Node Configuration

use anyhow::Context;
use ccv_consumer::ConsumerParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Simulated provider behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Size of the provider's validator set
    pub validators: usize,
    /// Blocks between VSC packets
    pub vsc_interval: u64,
    /// Chance per block that a validator is caught for downtime
    pub downtime_probability: f64,
    /// Chance the provider bounces a slash packet
    pub bounce_ratio: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            validators: 4,
            vsc_interval: 5,
            downtime_probability: 0.05,
            bounce_ratio: 0.3,
            seed: 7,
        }
    }
}

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Channel the provider opens toward us
    pub channel_id: String,
    /// Consumer parameters
    pub params: ConsumerParams,
    pub simulation: SimulationConfig,
}

impl NodeConfig {
    /// Load from a JSON file, or use defaults when no file is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let config: NodeConfig = serde_json::from_str(&raw)?;
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            None => Self::default(),
        };
        config
            .params
            .validate()
            .context("invalid consumer params")?;
        Ok(config)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            channel_id: "channel-0".to_string(),
            // Short periods so matured and bounced packets show up in a demo run
            params: ConsumerParams {
                retry_delay_period_secs: 5,
                unbonding_period_secs: 30,
                ..ConsumerParams::default()
            },
            simulation: SimulationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "channel_id": "channel-3", "params": {{ "retry_delay_period_secs": 60 }} }}"#
        )
        .unwrap();

        let config = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.channel_id, "channel-3");
        assert_eq!(config.params.retry_delay_period_secs, 60);
        assert_eq!(
            config.params.unbonding_period_secs,
            ConsumerParams::default().unbonding_period_secs
        );
        assert_eq!(config.simulation.validators, 4);
    }

    #[test]
    fn test_out_of_range_period_rejected_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "params": {{ "ccv_timeout_period_secs": 10000000000000000 }} }}"#
        )
        .unwrap();

        let err = NodeConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("invalid consumer params"));
    }
}
