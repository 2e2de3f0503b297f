use anyhow::{Context, Result};
use clap::Args;

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ConfigArgs, config_path: Option<&str>) -> Result<()> {
    let config = ConfigLoader::load_with_custom_config(config_path)?.extract()?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&config).context("Failed to render configuration as JSON")?
    } else {
        toml::to_string_pretty(&config).context("Failed to render configuration as TOML")?
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
