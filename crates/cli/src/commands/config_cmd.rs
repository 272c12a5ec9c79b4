//! `autoloop config`: Configuration management commands.

use autoloop_config::AppConfig;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file plus environment)
    Show,
    /// Print the config file location
    Path,
    /// Load and validate the configuration
    Validate,
}

pub async fn run(action: Option<ConfigAction>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        None => {
            print!("{}", AppConfig::default_toml());
            Ok(())
        }
        Some(ConfigAction::Show) => show().await,
        Some(ConfigAction::Path) => path().await,
        Some(ConfigAction::Validate) => validate().await,
    }
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            if !config.has_api_key() {
                println!("   Warning: no API key set for provider '{}'", config.provider);
            }

            println!();
            println!("   Provider:        {}", config.provider);
            println!("   Model:           {}", config.model());
            println!(
                "   Images to keep:  {}",
                config
                    .images_to_keep
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "all".into())
            );
            println!("   Max tokens:      {}", config.max_output_tokens);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

fn redacted_toml(mut config: AppConfig) -> Result<String, toml::ser::Error> {
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&config)
}
