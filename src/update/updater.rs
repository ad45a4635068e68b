//! Updater: brings the files of one role up to date with the published
//! release and starts the role's executable.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Config, DEFAULT_CONFIG_FILENAME};
use crate::error::{AlarmError, Result};
use crate::update::lock::{UpdateLock, MARKER_FILENAME, MARKER_LIFETIME};
use crate::update::manifest::{file_checksum, Manifest, Role, VERSION_FILENAME};
use crate::update::verify_server;

/// Deadline for `<executable> --version`.
const VERSION_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// What an updater run did to the local files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Local files already matched the release.
    UpToDate {
        /// Installed version.
        version: String,
    },
    /// Local files were replaced.
    Updated {
        /// Version detected before the update, if any.
        from: Option<String>,
        /// Installed version.
        to: String,
    },
}

/// Inputs of an updater run.
#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    /// Role whose files are managed.
    pub role: Role,
    /// Start the role executable when done.
    pub start_executable: bool,
}

impl UpdaterOptions {
    /// Creates options for `role` that start its executable when done.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            start_executable: true,
        }
    }
}

/// Updates the installation in `working_dir` from `config.update_folder`.
pub async fn run<F>(
    config: &Config,
    options: &UpdaterOptions,
    working_dir: &Path,
    shutdown: F,
) -> Result<UpdateOutcome>
where
    F: Future<Output = ()>,
{
    let update_folder = config
        .update_folder
        .as_deref()
        .ok_or_else(|| AlarmError::config("update_folder must be set to run the updater"))?;

    let lock = UpdateLock::acquire(&working_dir.join(MARKER_FILENAME), MARKER_LIFETIME)?;

    verify_server(config, shutdown).await?;
    lock.refresh()?;

    let role = options.role;
    let executable = working_dir.join(role.executable());

    info!("Detecting local version from installed executable");
    let local_version = detect_local_version(&executable).await;

    let http = reqwest::Client::builder()
        .connect_timeout(config.timeout)
        .build()
        .map_err(|e| AlarmError::config_with_source("Failed to create HTTP client", e))?;
    let source = UpdateSource::new(http, update_folder)?;

    info!(url = %source.url(VERSION_FILENAME)?, "Downloading the update description");
    let manifest = Manifest::from_yaml(&String::from_utf8_lossy(
        &source.fetch(VERSION_FILENAME).await?,
    ))?;
    lock.refresh()?;

    let version_changed = match &local_version {
        None => {
            info!("No local version detected, update needed");
            true
        }
        Some(local) if *local != manifest.version => {
            info!(local_version = %local, remote_version = %manifest.version, "Version mismatch detected");
            true
        }
        Some(local) => {
            info!(version = %local, "Versions match, checking file integrity");
            false
        }
    };

    let stale_files = stale_files(&manifest, role, working_dir)?;
    if !stale_files.is_empty() {
        info!(files = ?stale_files, "Checksum mismatch detected");
    }

    let outcome = if version_changed || !stale_files.is_empty() {
        install_release(&source, &manifest, role, working_dir, &lock).await?;
        UpdateOutcome::Updated {
            from: local_version,
            to: manifest.version.clone(),
        }
    } else {
        info!("No update required, version and files are current");
        UpdateOutcome::UpToDate {
            version: manifest.version.clone(),
        }
    };

    if options.start_executable {
        let executable = working_dir.join(manifest.role_executable(role)?);
        start_detached(&executable, working_dir)?;
    }

    Ok(outcome)
}

/// Role files whose local copy is missing or differs from the manifest.
fn stale_files(manifest: &Manifest, role: Role, working_dir: &Path) -> Result<Vec<String>> {
    let mut stale = Vec::new();

    for name in manifest.role_files(role)? {
        let expected = manifest.checksum(name)?;
        let path = working_dir.join(name);

        let matches = match file_checksum(&path) {
            Ok(actual) => actual.eq_ignore_ascii_case(expected),
            Err(e) => {
                debug!(file = %name, error = %e, "Local file unreadable");
                false
            }
        };

        if !matches {
            stale.push(name.clone());
        }
    }

    Ok(stale)
}

/// Downloads every role file into a temporary directory, verifies it and
/// moves it into place.
async fn install_release(
    source: &UpdateSource,
    manifest: &Manifest,
    role: Role,
    working_dir: &Path,
    lock: &UpdateLock,
) -> Result<()> {
    let staging = tempfile::tempdir()
        .map_err(|e| AlarmError::update_with_source("Failed to create staging directory", e))?;

    info!(staging = %staging.path().display(), "Downloading update files");
    let files = manifest.role_files(role)?;
    for name in files {
        let staged = staging.path().join(name);
        tokio::fs::write(&staged, source.fetch(name).await?)
            .await
            .map_err(|e| {
                AlarmError::update_with_source(format!("Failed to stage {}", name), e)
            })?;

        let expected = manifest.checksum(name)?;
        let actual = file_checksum(&staged)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(AlarmError::update(format!(
                "Checksum mismatch for downloaded {}",
                name
            )));
        }
        info!(file = %name, "Downloaded file");
        lock.refresh()?;
    }

    for name in files {
        info!(file = %name, "Updating file");
        install_file(&staging.path().join(name), &working_dir.join(name))?;
    }

    Ok(())
}

/// Copies `src` next to `dest` and renames it over `dest`.
fn install_file(src: &Path, dest: &Path) -> Result<()> {
    let mut temp_name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".new");
    let temp_dest = dest.with_file_name(temp_name);

    std::fs::copy(src, &temp_dest).map_err(|e| {
        AlarmError::update_with_source(format!("Failed to copy {}", temp_dest.display()), e)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let is_settings = dest
            .file_name()
            .is_some_and(|name| name == DEFAULT_CONFIG_FILENAME);
        let mode = if is_settings { 0o600 } else { 0o755 };
        std::fs::set_permissions(&temp_dest, std::fs::Permissions::from_mode(mode)).map_err(
            |e| AlarmError::update_with_source(format!("Failed to chmod {}", temp_dest.display()), e),
        )?;
    }

    std::fs::rename(&temp_dest, dest).map_err(|e| {
        let _ = std::fs::remove_file(&temp_dest);
        AlarmError::update_with_source(format!("Failed to replace {}", dest.display()), e)
    })
}

/// Runs `<executable> --version` and extracts the version, if any.
async fn detect_local_version(executable: &Path) -> Option<String> {
    if !executable.is_file() {
        info!(executable = %executable.display(), "Executable not installed");
        return None;
    }

    let output = Command::new(executable)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(VERSION_COMMAND_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => {
            parse_version_output(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(Ok(output)) => {
            warn!(executable = %executable.display(), status = %output.status, "Version command failed");
            None
        }
        Ok(Err(e)) => {
            warn!(executable = %executable.display(), error = %e, "Could not run version command");
            None
        }
        Err(_) => {
            warn!(executable = %executable.display(), "Version command timed out");
            None
        }
    }
}

/// Extracts the version from `--version` output such as
/// `alarm-checker 1.2.3` or `version: 1.2.3, commit: abc`.
pub fn parse_version_output(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;

    if let Some(rest) = line.strip_prefix("version:") {
        let version = rest.split(',').next().unwrap_or_default().trim();
        return (!version.is_empty()).then(|| version.to_string());
    }

    let mut words = line.split_whitespace();
    let _name = words.next()?;
    words.next().map(str::to_string)
}

/// Starts `executable` without waiting for it.
fn start_detached(executable: &Path, working_dir: &Path) -> Result<()> {
    info!(executable = %executable.display(), "Starting executable");

    std::process::Command::new(executable)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            AlarmError::update_with_source(format!("Failed to start {}", executable.display()), e)
        })?;

    Ok(())
}

/// Update folder the release is downloaded from.
struct UpdateSource {
    http: reqwest::Client,
    base: reqwest::Url,
}

impl UpdateSource {
    fn new(http: reqwest::Client, folder: &str) -> Result<Self> {
        let folder = if folder.ends_with('/') {
            folder.to_string()
        } else {
            format!("{}/", folder)
        };
        let base = reqwest::Url::parse(&folder).map_err(|e| {
            AlarmError::config_with_source(format!("Invalid update folder URI '{}'", folder), e)
        })?;
        Ok(Self { http, base })
    }

    fn url(&self, name: &str) -> Result<reqwest::Url> {
        self.base.join(name).map_err(|e| {
            AlarmError::update_with_source(format!("Invalid file name {}", name), e)
        })
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url(name)?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AlarmError::connection_with_source(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(AlarmError::update(format!(
                "{}: HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AlarmError::connection_with_source(url.as_str(), e))?;
        Ok(bytes.to_vec())
    }
}
