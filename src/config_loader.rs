use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use std::fs::File;
use std::path::Path;

/// Load, parse and validate a scenario file.
///
/// Does not log: the CLI calls this before its logger is initialised.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open scenario file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse scenario file '{}'", config_path.display()))?;

    config.validate()?;
    Ok(config)
}
