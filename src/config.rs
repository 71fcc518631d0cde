// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that Lattica uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use crate::format::FileFormat;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Lattica configuration layout.
///
/// # General Layout
///
/// The configuration is composed of two basic parts: store settings, and
/// format declarations. The store settings describe which remote store to
/// connect to, and how to cache its resources locally. Format declarations
/// add datatype descriptors on top of the built-in ones, so file groups of
/// site-specific formats can be fetched and uploaded too.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LatticaConfig {
    /// Settings for the remote store.
    pub store: StoreSettings,

    /// Additional datatype descriptors.
    #[serde(rename = "format", default, skip_serializing_if = "Vec::is_empty")]
    pub formats: Vec<FileFormat>,
}

impl LatticaConfig {
    /// Look up format by name or alternate name, custom formats first.
    pub fn format(&self, name: &str) -> Option<FileFormat> {
        self.formats
            .iter()
            .cloned()
            .chain(crate::format::common::all())
            .find(|format| format.answers_to(name))
    }
}

impl FromStr for LatticaConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: LatticaConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on location fields.
        config.store.server = expand(&config.store.server)?;
        config.store.user = config.store.user.as_deref().map(expand).transpose()?;
        config.store.cache_dir = config
            .store
            .cache_dir
            .as_ref()
            .map(|path| expand(&path.to_string_lossy()).map(PathBuf::from))
            .transpose()?;

        Ok(config)
    }
}

impl Display for LatticaConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

/// Remote store settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    /// Base URL of the remote server.
    pub server: String,

    /// User to log in as. Log in anonymously if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password of user. Prompted for if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Cache directory. Defaults to `$XDG_CACHE_HOME/lattica`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Compare checksums with the remote before trusting cached resources.
    #[serde(default = "default_check_md5")]
    pub check_md5: bool,

    /// Seconds to wait between checks on a concurrent download.
    #[serde(default = "default_race_condition_delay")]
    pub race_condition_delay: u64,

    /// Checks to make on a concurrent download before giving up.
    #[serde(default = "default_max_race_wait_attempts")]
    pub max_race_wait_attempts: usize,

    /// Show download progress.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            user: None,
            password: None,
            cache_dir: None,
            check_md5: default_check_md5(),
            race_condition_delay: default_race_condition_delay(),
            max_race_wait_attempts: default_max_race_wait_attempts(),
            progress: default_progress(),
        }
    }
}

fn default_check_md5() -> bool {
    true
}

fn default_race_condition_delay() -> u64 {
    30
}

fn default_max_race_wait_attempts() -> usize {
    20
}

fn default_progress() -> bool {
    true
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::common;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah"), ("XNAT_USER", "blah")])]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: LatticaConfig = r#"
            [store]
            server = "https://xnat.blah.org"
            user = "$XNAT_USER"
            cache_dir = "$BLAH/.cache/xnat"
            race_condition_delay = 5

            [[format]]
            name = "mrtrix_image"
            extension = ".mif"
            alternate_names = ["MRTRIX"]
        "#
        .parse()?;

        let expect = LatticaConfig {
            store: StoreSettings {
                server: "https://xnat.blah.org".into(),
                user: Some("blah".into()),
                password: None,
                cache_dir: Some("/home/blah/.cache/xnat".into()),
                check_md5: true,
                race_condition_delay: 5,
                max_race_wait_attempts: 20,
                progress: true,
            },
            formats: vec![FileFormat::file("mrtrix_image", ".mif")?.with_alternate_name("MRTRIX")],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_config() {
        let result = LatticaConfig {
            store: StoreSettings {
                server: "https://xnat.blah.org".into(),
                user: Some("blah".into()),
                cache_dir: Some("/home/blah/.cache/xnat".into()),
                ..Default::default()
            },
            formats: Vec::new(),
        }
        .to_string();

        let expect = indoc! {r#"
            [store]
            server = "https://xnat.blah.org"
            user = "blah"
            cache_dir = "/home/blah/.cache/xnat"
            check_md5 = true
            race_condition_delay = 30
            max_race_wait_attempts = 20
            progress = true
        "#};

        assert_eq!(result, expect);
    }

    #[test]
    fn reject_invalid_format() {
        let result: Result<LatticaConfig> = indoc! {r#"
            [store]
            server = "https://xnat.blah.org"

            [[format]]
            name = "NoCaps"
            extension = ".nc"
        "#}
        .parse();

        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn custom_formats_shadow_builtins() -> anyhow::Result<()> {
        let config = LatticaConfig {
            formats: vec![FileFormat::file("text", ".text")?],
            ..Default::default()
        };

        assert_eq!(config.format("text").and_then(|f| f.extension().map(String::from)), Some(".text".into()));
        assert_eq!(config.format("DICOM"), Some(common::dicom()));
        assert_eq!(config.format("nope"), None);

        Ok(())
    }
}
