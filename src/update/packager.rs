//! Packager: writes the shared settings file and the release manifest.

use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{Config, DEFAULT_CONFIG_FILENAME};
use crate::error::{AlarmError, Result};
use crate::update::lock::{UpdateLock, MARKER_FILENAME, MARKER_LIFETIME};
use crate::update::manifest::{Manifest, Role, VERSION_FILENAME};
use crate::update::{verify_server, VERSION};

/// Inputs of a packager run.
#[derive(Debug, Clone, Default)]
pub struct PackagerOptions {
    /// Alarm server address written to the settings file.
    pub server_addr: String,
    /// URL the release will be published to.
    pub update_folder: String,
    /// Additional place to write the settings file. The release directory
    /// always gets its own copy.
    pub config_path: Option<PathBuf>,
}

/// Prepares the release in `working_dir`: saves the settings, checks the
/// server, hashes every file and writes the manifest.
pub async fn run<F>(options: &PackagerOptions, working_dir: &Path, shutdown: F) -> Result<Manifest>
where
    F: Future<Output = ()>,
{
    if options.update_folder.trim().is_empty() {
        return Err(AlarmError::config("update folder must be provided"));
    }

    let mut config = Config {
        server_addr: options.server_addr.clone(),
        update_folder: Some(options.update_folder.clone()),
        ..Config::default()
    };
    config.validate()?;

    if UpdateLock::is_held(&working_dir.join(MARKER_FILENAME), MARKER_LIFETIME) {
        return Err(AlarmError::update("The updater is running now"));
    }

    // The release always carries its own settings file; that is the copy
    // hashed into the manifest.
    let release_config = working_dir.join(DEFAULT_CONFIG_FILENAME);
    config.save(&release_config)?;
    info!(path = %release_config.display(), "Saved settings");

    if let Some(extra) = options.config_path.as_deref().filter(|p| *p != release_config) {
        config.save(extra)?;
        info!(path = %extra.display(), "Saved settings copy");
    }

    verify_server(&config, shutdown).await?;

    info!("Preparing update description");
    let manifest = Manifest::build(working_dir, VERSION)?;

    let manifest_path = working_dir.join(VERSION_FILENAME);
    manifest.save(&manifest_path)?;
    info!(path = %manifest_path.display(), version = %manifest.version, "Saved update description");

    info!("{}", next_steps(&manifest, &options.update_folder));

    Ok(manifest)
}

/// Human-readable instructions for publishing and installing the release.
fn next_steps(manifest: &Manifest, update_folder: &str) -> String {
    let mut published: Vec<&str> = manifest.files.keys().map(String::as_str).collect();
    published.push(VERSION_FILENAME);
    published.sort_unstable();

    let mut text = format!(
        "Upload the following files to {}:\n{}",
        update_folder,
        published.join(",\n")
    );

    for role in Role::all() {
        let files = manifest
            .roles
            .get(role.as_str())
            .map(|files| files.join(",\n"))
            .unwrap_or_default();
        text.push_str(&format!(
            "\n\nFor a \"{}\" machine, copy the following files to the local computer:\n{}\
             \nAt system startup, run: alarm-updater {}",
            role, files, role
        ));
    }

    text
}
