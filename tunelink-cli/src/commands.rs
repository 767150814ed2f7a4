//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tunelink_core::config::{LOCAL_CONFIG_FILE, TunelinkConfig, load_config};
use tunelink_core::server::{self, AppState};
use tunelink_core::session::generate_signing_secret;
use tunelink_core::{LinkOrchestrator, open_store};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port } => serve(config_path, port).await,
        Commands::Config { action } => handle_config(action, config_path),
        Commands::Secret => {
            println!("{}", generate_signing_secret());
            Ok(())
        }
    }
}

async fn serve(config_path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(port) = port {
        config.server.port = port;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let store = open_store(&config.store)
        .map_err(|e| anyhow::anyhow!("Failed to open user link store: {}", e))?;
    let orchestrator = LinkOrchestrator::from_config(&config, Arc::clone(&store))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let page_path = &config.server.completion_page;
    let page = server::load_completion_page(page_path)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to read completion page {}: {}",
                page_path.display(),
                e
            )
        })?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        store = %config.store.backend,
        signed_carriers = config.session.signing_secret.is_some(),
        "Starting Tunelink"
    );

    server::run(
        &config.server.host,
        config.server.port,
        AppState::new(orchestrator, page),
    )
    .await?;
    Ok(())
}

fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = config_path.unwrap_or(Path::new(LOCAL_CONFIG_FILE));
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&TunelinkConfig::default())?;
            std::fs::write(config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config.redacted())?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tunelink.toml");

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, Some(&config_path)).await.unwrap();
        assert!(config_path.exists());

        // Verify it's valid TOML
        let content = std::fs::read_to_string(&config_path).unwrap();
        let parsed: TunelinkConfig = toml::from_str(&content).unwrap();
        assert_eq!(parsed, TunelinkConfig::default());
    }

    #[tokio::test]
    async fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("nested").join("tunelink.toml");

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, Some(&config_path)).await.unwrap();
        std::fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

        // Second init should not overwrite
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, Some(&config_path)).await.unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[server]\nport = 9000\n");
    }

    #[tokio::test]
    async fn test_config_show_after_init() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tunelink.toml");

        let init_cmd = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(init_cmd, Some(&config_path)).await.unwrap();

        let show_cmd = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(show_cmd, Some(&config_path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_config_show_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let show_cmd = Commands::Config {
            action: ConfigAction::Show,
        };
        let result = handle_command(show_cmd, Some(&dir.path().join("absent.toml"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_serve_rejects_incomplete_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tunelink.toml");
        std::fs::write(&config_path, "[server]\nport = 0\n").unwrap();

        let err = handle_command(Commands::Serve { port: None }, Some(&config_path))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[tokio::test]
    async fn test_secret() {
        assert!(handle_command(Commands::Secret, None).await.is_ok());
    }
}
