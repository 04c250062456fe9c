// Copyright (c) The depfinder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::WorkerCount;
use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    finder::FinderSettings,
    pool::PoolConfig,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::HashMap, sync::LazyLock};
use tracing::warn;

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Overall configuration for depfinder.
///
/// This is the root data structure for depfinder configuration. Most settings are managed
/// through [profiles](FinderProfile), obtained through the [`profile`](Self::profile) method.
#[derive(Clone, Debug)]
pub struct DepfinderConfig {
    workspace_root: Utf8PathBuf,
    scratch: ScratchConfigImpl,
    default_profile: DefaultProfileImpl,
    other_profiles: HashMap<String, CustomProfileImpl>,
}

impl DepfinderConfig {
    /// The default location of the config within the workspace root: `.config/depfinder.toml`.
    pub const CONFIG_PATH: &'static str = ".config/depfinder.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the depfinder config from the given file, or if not specified from
    /// `.config/depfinder.toml` in the workspace root.
    ///
    /// If the file isn't specified and `.config/depfinder.toml` doesn't exist, the default
    /// config is used.
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let deserialized = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;
        Ok(deserialized.into_config(workspace_root))
    }

    /// Returns the default depfinder config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        let deserialized = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        deserialized.into_config(workspace_root.into())
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<FinderProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(
                self.other_profiles
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(name, self.all_profiles()))?,
            ),
        };

        let mut scratch_dir = self.workspace_root.join(&self.scratch.dir);
        scratch_dir.push(name);

        Ok(FinderProfile {
            name: name.to_owned(),
            scratch_dir,
            default_profile: &self.default_profile,
            custom_profile,
        })
    }

    // ---
    // Helper methods
    // ---

    fn all_profiles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE)
            .chain(self.other_profiles.keys().map(|key| key.as_str()))
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<DepfinderConfigDeserialize, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        serde_path_to_error::deserialize(config).map_err(|error| {
            // The config crate reports the key as well. Drop it so that the key is only
            // reported once.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })
    }
}

/// A named set of settings for a batch run.
///
/// Returned by [`DepfinderConfig::profile`].
#[derive(Clone, Debug)]
pub struct FinderProfile<'cfg> {
    name: String,
    scratch_dir: Utf8PathBuf,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl FinderProfile<'_> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directory holding the scratch files of this profile's worker slots.
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch_dir
    }

    /// Returns the number of workers to run.
    pub fn workers(&self) -> usize {
        self.custom_profile
            .and_then(|profile| profile.workers)
            .unwrap_or(self.default_profile.workers)
            .compute()
    }

    /// Returns the maximum number of search passes per target, if bounded.
    pub fn max_passes(&self) -> Option<usize> {
        self.custom_profile
            .and_then(|profile| profile.max_passes)
            .or(self.default_profile.max_passes)
    }

    /// Returns the maximum number of chains merged into a chain-search candidate, if bounded.
    pub fn max_chain_combination(&self) -> Option<usize> {
        self.custom_profile
            .and_then(|profile| profile.max_chain_combination)
            .or(self.default_profile.max_chain_combination)
    }

    /// Returns the scratch files written by the oracle environment.
    pub fn scratch_files(&self) -> &[Utf8PathBuf] {
        self.custom_profile
            .and_then(|profile| profile.scratch_files.as_deref())
            .unwrap_or(&self.default_profile.scratch_files)
    }

    /// Returns the search limits for each target.
    pub fn finder_settings(&self) -> FinderSettings {
        FinderSettings {
            max_passes: self.max_passes(),
            max_chain_combination: self.max_chain_combination(),
        }
    }

    /// Builds the configuration for a worker pool.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers(),
            scratch_dir: self.scratch_dir.clone(),
            scratch_files: self.scratch_files().to_vec(),
            settings: self.finder_settings(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DepfinderConfigDeserialize {
    scratch: ScratchConfigImpl,
    #[serde(rename = "profile")]
    profiles: HashMap<String, CustomProfileImpl>,
}

impl DepfinderConfigDeserialize {
    fn into_config(mut self, workspace_root: Utf8PathBuf) -> DepfinderConfig {
        let p = self
            .profiles
            .remove(DepfinderConfig::DEFAULT_PROFILE)
            .expect("default profile should exist");

        DepfinderConfig {
            workspace_root,
            scratch: self.scratch,
            default_profile: DefaultProfileImpl::new(p),
            other_profiles: self.profiles,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ScratchConfigImpl {
    dir: Utf8PathBuf,
}

#[derive(Clone, Debug)]
struct DefaultProfileImpl {
    workers: WorkerCount,
    max_passes: Option<usize>,
    max_chain_combination: Option<usize>,
    scratch_files: Vec<Utf8PathBuf>,
}

impl DefaultProfileImpl {
    fn new(p: CustomProfileImpl) -> Self {
        Self {
            workers: p.workers.expect("workers present in default profile"),
            max_passes: p.max_passes,
            max_chain_combination: p.max_chain_combination,
            scratch_files: p
                .scratch_files
                .expect("scratch-files present in default profile"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    workers: Option<WorkerCount>,
    #[serde(default)]
    max_passes: Option<usize>,
    #[serde(default)]
    max_chain_combination: Option<usize>,
    #[serde(default)]
    scratch_files: Option<Vec<Utf8PathBuf>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use indoc::indoc;

    #[test]
    fn default_config_is_valid() {
        let config = DepfinderConfig::default_config("/fake/workspace");
        let profile = config
            .profile(DepfinderConfig::DEFAULT_PROFILE)
            .expect("default profile exists");
        assert_eq!(profile.workers(), get_num_cpus());
        assert_eq!(profile.max_passes(), None);
        assert_eq!(profile.max_chain_combination(), None);
        assert!(profile.scratch_files().is_empty());
        assert_eq!(profile.scratch_dir(), "/fake/workspace/target/depfinder/default");

        let ci = config.profile("ci").expect("ci profile exists");
        assert_eq!(ci.max_passes(), Some(4));
        assert_eq!(ci.max_chain_combination(), Some(2));
        assert_eq!(ci.workers(), get_num_cpus());
    }

    #[test]
    fn repository_config_overrides_default() {
        let workspace_dir = tempdir().unwrap();
        let config_dir = workspace_dir.path().join(".config");
        fs_err::create_dir_all(&config_dir).unwrap();
        fs_err::write(
            config_dir.join("depfinder.toml"),
            indoc! {r#"
                [scratch]
                dir = "scratch"

                [profile.default]
                workers = 3
                scratch-files = ["db.sqlite"]

                [profile.thorough]
                max-passes = 20
                scratch-files = ["db.sqlite", "cache.json"]
            "#},
        )
        .unwrap();

        let config = DepfinderConfig::from_sources(workspace_dir.path(), None).unwrap();
        let default = config.profile("default").unwrap();
        assert_eq!(default.workers(), 3);
        assert_eq!(default.scratch_files(), [Utf8PathBuf::from("db.sqlite")]);

        let thorough = config.profile("thorough").unwrap();
        let pool_config = thorough.pool_config();
        assert_eq!(pool_config.workers, 3, "inherited from the default profile");
        assert_eq!(pool_config.settings.max_passes, Some(20));
        assert_eq!(pool_config.scratch_files.len(), 2);
        assert_eq!(
            pool_config.scratch_dir,
            workspace_dir.path().join("scratch").join("thorough")
        );
    }

    #[test]
    fn missing_repository_config_uses_default() {
        let workspace_dir = tempdir().unwrap();
        let config = DepfinderConfig::from_sources(workspace_dir.path(), None).unwrap();
        assert!(config.profile("default").is_ok());
    }

    #[test]
    fn unknown_profile() {
        let config = DepfinderConfig::default_config("/fake/workspace");
        let err = config.profile("nightly").unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile `nightly` not found (known profiles: ci, default)"
        );
    }

    #[test]
    fn invalid_value_reports_path() {
        let workspace_dir = tempdir().unwrap();
        let config_path = workspace_dir.path().join("depfinder.toml");
        fs_err::write(
            &config_path,
            indoc! {r#"
                [profile.default]
                max-passes = "many"
            "#},
        )
        .unwrap();

        let err = DepfinderConfig::from_sources(workspace_dir.path(), Some(&config_path))
            .unwrap_err();
        assert_eq!(err.config_file(), &config_path);
        match err.kind() {
            ConfigParseErrorKind::DeserializeError(err) => {
                assert_eq!(err.path().to_string(), "profile.default.max-passes");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let workspace_dir = tempdir().unwrap();
        let config_path = workspace_dir.path().join("missing.toml");
        let err = DepfinderConfig::from_sources(workspace_dir.path(), Some(&config_path))
            .unwrap_err();
        assert!(matches!(err.kind(), ConfigParseErrorKind::BuildError(_)));
    }
}
