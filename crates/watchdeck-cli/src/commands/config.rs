use super::prompts;
use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use owo_colors::OwoColorize;
use serde_json::json;
use watchdeck_config::{default_scheduler_config, Config, CredentialStore, PathManager, PreferencesStore};

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create configuration directories: {}", e))?;

    match cmd {
        ConfigCommands::Show { full } => show_config(&paths, full, output),
        ConfigCommands::Init { force } => init_config(&paths, force, output),
        ConfigCommands::Tmdb { api_key } => configure_tmdb(&paths, api_key, output),
        ConfigCommands::Dropbox { app_key, refresh_token, access_token, remote_root, clear } => {
            let args = DropboxArgs { app_key, refresh_token, access_token, remote_root, clear };
            configure_dropbox(&paths, args, output)
        }
    }
}

fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))
}

fn save_config(paths: &PathManager, config: &Config) -> Result<()> {
    let config_file = paths.config_file();
    config
        .validate()
        .map_err(|e| eyre!("Refusing to save invalid configuration: {}", e))?;
    config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))
}

fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    Ok(store)
}

fn save_credentials(paths: &PathManager, store: &CredentialStore) -> Result<()> {
    store
        .save()
        .map_err(|e| eyre!("Failed to save credentials to {}: {}", paths.credentials_file().display(), e))
}

fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

fn secret(value: Option<&String>, full: bool) -> String {
    match value {
        Some(v) if full => v.clone(),
        Some(v) => mask_string(v),
        None => "<not set>".to_string(),
    }
}

fn section(title: &str, rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold),
        Cell::new(""),
    ]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn show_config(paths: &PathManager, full: bool, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    let config = load_config(paths)?;
    let credentials = load_credentials(paths)?;
    let scheduler = config.scheduler.clone().unwrap_or_else(default_scheduler_config);
    let last_sync = PreferencesStore::load(paths.preferences_file())
        .ok()
        .and_then(|p| p.last_sync());

    if !output.is_human() {
        output.json(&json!({
            "config_file": config_file.display().to_string(),
            "config_file_exists": config_file.exists(),
            "library_dir": paths.library_dir().display().to_string(),
            "providers": {
                "enabled": config.enabled_providers(),
                "tmdb_language": config.providers.tmdb_language,
                "rate_limit_delay_ms": config.providers.rate_limit_delay_ms,
                "request_timeout_secs": config.providers.request_timeout_secs,
            },
            "sync": {
                "enabled": config.sync.enabled,
                "remote_root": config.sync.remote_root,
                "images_dir": config.sync.images_dir,
                "state_files": config.sync.state_files,
                "tolerance_ms": config.sync.tolerance_ms,
                "debounce_ms": config.sync.debounce_ms,
                "last_sync": last_sync,
            },
            "scheduler": {
                "update_check_schedule": scheduler.update_check_schedule,
                "sync_schedule": scheduler.sync_schedule,
                "run_on_startup": scheduler.run_on_startup,
            },
            "credentials": {
                "tmdb_api_key": secret(credentials.get_tmdb_api_key(), full),
                "dropbox_configured": credentials.has_dropbox(),
            },
        }));
        return Ok(());
    }

    output.println(format!("\n{}", "Configuration".bright_cyan().bold()));
    if !config_file.exists() {
        output.warn(format!(
            "{} does not exist, showing defaults. Run 'watchdeck config init' to create it.",
            config_file.display()
        ));
    }

    let files = section(
        "Locations",
        vec![
            ("Config file", config_file.display().to_string()),
            ("Credentials", paths.credentials_file().display().to_string()),
            ("Library", paths.library_dir().display().to_string()),
            ("Logs", paths.daemon_log_file().display().to_string()),
        ],
    );
    output.println(files.to_string());

    let providers = section(
        "Providers",
        vec![
            ("Enabled (in order)", config.enabled_providers().join(", ")),
            ("TMDB language", config.providers.tmdb_language.clone()),
            ("Rate limit delay", format!("{} ms", config.providers.rate_limit_delay_ms)),
            ("Request timeout", format!("{} s", config.providers.request_timeout_secs)),
            ("TMDB API key", secret(credentials.get_tmdb_api_key(), full)),
        ],
    );
    output.println(providers.to_string());

    let dropbox_auth = if credentials.get_dropbox_refresh_token().is_some() {
        "refresh token"
    } else if credentials.get_dropbox_access_token().is_some() {
        "access token"
    } else {
        "<not set>"
    };
    let sync = section(
        "Dropbox Sync",
        vec![
            ("Enabled", config.sync.enabled.to_string()),
            (
                "Remote folder",
                if config.sync.remote_root.is_empty() { "/".to_string() } else { config.sync.remote_root.clone() },
            ),
            ("Images folder", config.sync.images_dir.clone()),
            ("State files", config.sync.state_files.join(", ")),
            ("Tolerance", format!("{} ms", config.sync.tolerance_ms)),
            ("Debounce", format!("{} ms", config.sync.debounce_ms)),
            ("Credentials", dropbox_auth.to_string()),
            ("App key", secret(credentials.get_dropbox_app_key(), full)),
            (
                "Last sync",
                last_sync.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string()),
            ),
        ],
    );
    output.println(sync.to_string());

    let schedule = section(
        "Scheduler",
        vec![
            ("Update check", scheduler.update_check_schedule),
            ("Sync", scheduler.sync_schedule),
            ("Run on startup", scheduler.run_on_startup.to_string()),
        ],
    );
    output.println(schedule.to_string());
    Ok(())
}

fn init_config(paths: &PathManager, force: bool, output: &Output) -> Result<()> {
    let config_file = paths.config_file();
    if config_file.exists() && !force {
        output.warn(format!("{} already exists (use --force to overwrite)", config_file.display()));
        return Ok(());
    }

    let config = Config {
        scheduler: Some(default_scheduler_config()),
        ..Config::default()
    };
    save_config(paths, &config)?;
    output.success(format!("Wrote default configuration to {}", config_file.display()));
    Ok(())
}

fn configure_tmdb(paths: &PathManager, api_key: Option<String>, output: &Output) -> Result<()> {
    let api_key = match api_key {
        Some(key) => key,
        None => {
            output.info("Create an API key at https://www.themoviedb.org/settings/api");
            prompts::prompt_secret("TMDB API key")?
        }
    };
    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(eyre!("API key is required"));
    }

    let mut credentials = load_credentials(paths)?;
    credentials.set_tmdb_api_key(api_key);
    save_credentials(paths, &credentials)?;

    let mut config = load_config(paths)?;
    if !config.providers.tmdb {
        config.providers.tmdb = true;
        save_config(paths, &config)?;
    }
    output.success("TMDB API key saved");
    Ok(())
}

struct DropboxArgs {
    app_key: Option<String>,
    refresh_token: Option<String>,
    access_token: Option<String>,
    remote_root: Option<String>,
    clear: bool,
}

fn configure_dropbox(paths: &PathManager, args: DropboxArgs, output: &Output) -> Result<()> {
    let mut credentials = load_credentials(paths)?;
    let mut config = load_config(paths)?;

    if args.clear {
        credentials.clear_dropbox();
        save_credentials(paths, &credentials)?;
        config.sync.enabled = false;
        save_config(paths, &config)?;
        output.success("Dropbox credentials removed and sync disabled");
        return Ok(());
    }

    let (app_key, refresh_token, access_token) = match (args.app_key, args.refresh_token, args.access_token) {
        (_, _, Some(token)) => (None, None, Some(token)),
        (Some(key), Some(refresh), None) => (Some(key), Some(refresh), None),
        (key, refresh, None) => {
            output.info("Use a refresh token with your app key, or leave them empty to paste an access token.");
            let key = match key {
                Some(key) => key,
                None => prompts::prompt_string("Dropbox app key", credentials.get_dropbox_app_key().map(String::as_str))?,
            };
            let refresh = match refresh {
                Some(refresh) => refresh,
                None if key.is_empty() => String::new(),
                None => prompts::prompt_secret("Dropbox refresh token")?,
            };
            if key.is_empty() || refresh.is_empty() {
                (None, None, Some(prompts::prompt_secret("Dropbox access token")?))
            } else {
                (Some(key), Some(refresh), None)
            }
        }
    };

    credentials.clear_dropbox();
    match (app_key, refresh_token, access_token) {
        (Some(key), Some(refresh), _) => {
            credentials.set_dropbox_app_key(key.trim().to_string());
            credentials.set_dropbox_refresh_token(refresh.trim().to_string());
        }
        (_, _, Some(token)) if !token.trim().is_empty() => {
            credentials.set_dropbox_access_token(token.trim().to_string());
        }
        _ => return Err(eyre!("No Dropbox credentials given")),
    }
    save_credentials(paths, &credentials)?;

    if let Some(root) = args.remote_root {
        config.sync.remote_root = root;
    }
    let enable = config.sync.enabled || prompts::prompt_yes_no("Enable Dropbox sync?", true)?;
    config.sync.enabled = enable;
    save_config(paths, &config)?;

    output.success("Dropbox credentials saved");
    output.info(format!("  Sync enabled: {}", config.sync.enabled));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_string() {
        assert_eq!(mask_string(""), "<not set>");
        assert_eq!(mask_string("abcd"), "****");
        assert_eq!(mask_string("abcdef123456"), "ab***56");
        assert_eq!(mask_string("ключ-секрет"), "кл***ет");
    }
}
