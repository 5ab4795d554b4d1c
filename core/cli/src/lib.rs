use clap::Parser;

/// Process-entry flags. `--avs-configs` accepts a comma-separated list
/// since a single deployment may run more than one AVS instance side by
/// side, each reading its own config file.
#[derive(Parser)]
#[command(about, version)]
pub struct Args {
    /// Path to the aggregator's toml configuration file.
    #[arg(long)]
    pub config: String,
    /// Path to the AVS deployment file (registry coordinator / operator
    /// state retriever addresses).
    #[arg(long)]
    pub avs_deployment: String,
    /// Hex-encoded ECDSA private key used to sign submitted transactions.
    #[arg(long, env = "ECDSA_PRIVATE_KEY")]
    pub ecdsa_private_key: String,
    /// Comma-separated paths to per-AVS config files, for multi-AVS
    /// deployments.
    #[arg(long, value_delimiter = ',')]
    pub avs_configs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_minimal_required_flags() {
        let args = Args::parse_from([
            "aggregator",
            "--config",
            "config.toml",
            "--avs-deployment",
            "deployment.json",
            "--ecdsa-private-key",
            "0xabc",
        ]);
        assert_eq!(args.config, "config.toml");
        assert!(args.avs_configs.is_empty());
    }

    #[test]
    fn splits_avs_configs_on_commas() {
        let args = Args::parse_from([
            "aggregator",
            "--config",
            "config.toml",
            "--avs-deployment",
            "deployment.json",
            "--ecdsa-private-key",
            "0xabc",
            "--avs-configs",
            "a.toml,b.toml",
        ]);
        assert_eq!(args.avs_configs, vec!["a.toml", "b.toml"]);
    }
}
