use std::path::Path;

use misebox_core::config::ClientConfig;
use misebox_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::paths::load_config;

/// Values passed to `config init`.
#[derive(Debug, Default)]
pub struct InitOptions {
    pub users_collection: Option<String>,
    pub profiles_collection: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub force: bool,
}

pub fn run_config(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            users_collection,
            profiles_collection,
            supabase_url,
            supabase_anon_key,
            force,
        } => {
            let config = init_config(
                path,
                InitOptions {
                    users_collection,
                    profiles_collection,
                    supabase_url,
                    supabase_anon_key,
                    force,
                },
            )?;
            println!("Config written to {}", path.display());
            if config.supabase_url.is_none() {
                println!("No Supabase project configured; the shell will use offline auth.");
            }
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(path)?;
            println!("{}", render_config(&config)?);
            Ok(())
        }
    }
}

/// Merge explicit values into the config at `path` and save it.
pub fn init_config(path: &Path, options: InitOptions) -> Result<ClientConfig, CliError> {
    let mut config = if path.exists() && !options.force {
        ClientConfig::load_from_path(path)?
    } else {
        ClientConfig::default()
    };

    if let Some(value) = normalize_text_option(options.users_collection) {
        config.users_collection = value;
    }
    if let Some(value) = normalize_text_option(options.profiles_collection) {
        config.profiles_collection = value;
    }
    if let Some(value) = normalize_text_option(options.supabase_url) {
        if !is_http_url(&value) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
        config.supabase_url = Some(value);
    }
    if let Some(value) = normalize_text_option(options.supabase_anon_key) {
        config.supabase_anon_key = Some(value);
    }

    config.validate()?;
    config.save_to_path(path)?;
    Ok(config)
}

/// Pretty JSON with the anon key masked.
pub fn render_config(config: &ClientConfig) -> Result<String, CliError> {
    let mut shown = config.clone();
    if shown.supabase_anon_key.is_some() {
        shown.supabase_anon_key = Some("[REDACTED]".to_string());
    }
    Ok(serde_json::to_string_pretty(&shown)?)
}
