//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A startup report on the external tools the server depends on

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config::AppConfig;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Where a configured program was found, if anywhere.
fn locate_program(program: &str) -> Option<String> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return path.exists().then(|| program.to_string());
    }
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|candidate| candidate.is_file())
            .map(|found| found.display().to_string())
    })
}

/// Logs the external tool configuration at application startup
///
/// Checks:
/// - downloader program and script exist
/// - download directory exists (creating it when missing)
/// - yt-dlp is reachable for search
pub fn log_startup_configuration(config: &AppConfig) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎵 tubedrop configuration check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match locate_program(&config.downloader_bin) {
        Some(found) => log::info!("✅ DOWNLOADER_BIN: {}", found),
        None => {
            log::error!("❌ DOWNLOADER_BIN: {} (NOT FOUND!)", config.downloader_bin);
            log::error!("   Downloads will fail until the downloader is installed");
        }
    }

    for arg in &config.downloader_args {
        if Path::new(arg).exists() {
            log::info!("✅ DOWNLOADER_SCRIPT: {}", arg);
        } else {
            log::warn!("⚠️  DOWNLOADER_SCRIPT: {} (file not found)", arg);
            log::warn!("   Current directory: {:?}", std::env::current_dir());
        }
    }

    if config.download_dir.is_dir() {
        log::info!("✅ DOWNLOAD_DIR: {}", config.download_dir.display());
    } else {
        match std::fs::create_dir_all(&config.download_dir) {
            Ok(()) => log::info!("📁 DOWNLOAD_DIR created: {}", config.download_dir.display()),
            Err(e) => log::error!("❌ DOWNLOAD_DIR: {} ({})", config.download_dir.display(), e),
        }
    }

    match locate_program(&config.ytdl_bin) {
        Some(found) => log::info!("✅ YTDL_BIN: {}", found),
        None => log::warn!("⚠️  YTDL_BIN: {} (not found, search will fail)", config.ytdl_bin),
    }

    log::info!(
        "⏱️  Relay timeout {}s, keep-alive every {}s, search limit {}",
        config.relay_timeout.as_secs(),
        config.keep_alive.as_secs(),
        config.search_max_results
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_locate_program_with_explicit_path() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("download_mp3.py");
        std::fs::write(&script, "print('DONE')").unwrap();

        let script_str = script.to_str().unwrap();
        assert_eq!(locate_program(script_str).as_deref(), Some(script_str));

        let missing = dir.path().join("missing.py");
        assert!(locate_program(missing.to_str().unwrap()).is_none());
    }

    #[test]
    fn test_startup_check_creates_download_dir() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            download_dir: dir.path().join("public").join("downloads"),
            ..AppConfig::default()
        };

        log_startup_configuration(&config);

        assert!(config.download_dir.is_dir());
    }
}
