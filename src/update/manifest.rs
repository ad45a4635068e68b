//! Release manifest: which files make up a release and their checksums.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::config::DEFAULT_CONFIG_FILENAME;
use crate::error::{AlarmError, Result};

/// File name of the manifest, both locally and in the update folder.
pub const VERSION_FILENAME: &str = "alarm-button-version.yaml";

const SERVER_EXECUTABLE: &str = "alarm-server";
const CHECKER_EXECUTABLE: &str = "alarm-checker";
const UPDATER_EXECUTABLE: &str = "alarm-updater";
const BUTTON_ON_EXECUTABLE: &str = "alarm-button-on";
const BUTTON_OFF_EXECUTABLE: &str = "alarm-button-off";

/// Installation role of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Workstation with the alarm-on button and the checker.
    Client,
    /// Machine running the alarm server and the alarm-off button.
    Server,
}

impl Role {
    /// Returns the role name used in the manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }

    /// Returns every role.
    pub fn all() -> [Role; 2] {
        [Role::Client, Role::Server]
    }

    /// Files installed on a machine with this role.
    pub fn files(&self) -> Vec<String> {
        let first = match self {
            Role::Client => vec![
                executable_name(BUTTON_ON_EXECUTABLE),
                executable_name(CHECKER_EXECUTABLE),
            ],
            Role::Server => vec![
                executable_name(BUTTON_OFF_EXECUTABLE),
                executable_name(SERVER_EXECUTABLE),
            ],
        };

        first
            .into_iter()
            .chain([
                executable_name(UPDATER_EXECUTABLE),
                DEFAULT_CONFIG_FILENAME.to_string(),
            ])
            .collect()
    }

    /// Executable started after an update.
    pub fn executable(&self) -> String {
        match self {
            Role::Client => executable_name(CHECKER_EXECUTABLE),
            Role::Server => executable_name(SERVER_EXECUTABLE),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AlarmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "server" => Ok(Role::Server),
            _ => Err(AlarmError::invalid_argument(format!(
                "Unknown role '{}'. Valid roles: client, server",
                s
            ))),
        }
    }
}

/// Appends the platform executable suffix to `base`.
pub fn executable_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", base)
    } else {
        base.to_string()
    }
}

/// Every file that is published with a release.
pub fn distributable_files() -> Vec<String> {
    vec![
        executable_name(BUTTON_OFF_EXECUTABLE),
        executable_name(BUTTON_ON_EXECUTABLE),
        executable_name(CHECKER_EXECUTABLE),
        executable_name(SERVER_EXECUTABLE),
        executable_name(UPDATER_EXECUTABLE),
        DEFAULT_CONFIG_FILENAME.to_string(),
    ]
}

/// Computes the hex encoded SHA-512 of a file.
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Description of a published release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Release version.
    pub version: String,
    /// File name to hex SHA-512.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Role name to the files installed for it.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
    /// Role name to the executable started after an update.
    #[serde(default)]
    pub executables: BTreeMap<String, String>,
}

impl Manifest {
    /// Creates a manifest for `version` with the role tables filled in and
    /// no checksums yet.
    pub fn new(version: impl Into<String>) -> Self {
        let mut manifest = Self {
            version: version.into(),
            ..Self::default()
        };

        for role in Role::all() {
            manifest
                .roles
                .insert(role.as_str().to_string(), role.files());
            manifest
                .executables
                .insert(role.as_str().to_string(), role.executable());
        }

        manifest
    }

    /// Builds the manifest of the release found in `dir`, hashing every
    /// distributable file. A missing file is an error.
    pub fn build(dir: &Path, version: impl Into<String>) -> Result<Self> {
        let mut manifest = Self::new(version);

        for name in distributable_files() {
            let path = dir.join(&name);
            if !path.is_file() {
                return Err(AlarmError::update(format!(
                    "Release file '{}' not found",
                    path.display()
                )));
            }

            let checksum = file_checksum(&path).map_err(|e| {
                AlarmError::update_with_source(format!("Failed to hash '{}'", path.display()), e)
            })?;
            manifest.files.insert(name, checksum);
        }

        Ok(manifest)
    }

    /// Parses a manifest from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| AlarmError::update_with_source("Failed to parse update manifest", e))
    }

    /// Writes the manifest as YAML to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| AlarmError::update_with_source("Failed to encode update manifest", e))?;
        std::fs::write(path, yaml).map_err(|e| {
            AlarmError::update_with_source(
                format!("Failed to write update manifest '{}'", path.display()),
                e,
            )
        })
    }

    /// Files of `role` listed in the manifest.
    pub fn role_files(&self, role: Role) -> Result<&[String]> {
        self.roles
            .get(role.as_str())
            .filter(|files| !files.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| AlarmError::update(format!("No files listed for role {}", role)))
    }

    /// Executable of `role` listed in the manifest.
    pub fn role_executable(&self, role: Role) -> Result<&str> {
        self.executables
            .get(role.as_str())
            .map(String::as_str)
            .ok_or_else(|| AlarmError::update(format!("No executable listed for role {}", role)))
    }

    /// Checksum of `name` listed in the manifest.
    pub fn checksum(&self, name: &str) -> Result<&str> {
        self.files
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AlarmError::update(format!("No checksum listed for {}", name)))
    }
}
