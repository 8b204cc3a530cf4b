//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level config file names, checked in order.
const PROJECT_FILES: [&str; 2] = ["relay.toml", ".relay.toml"];

/// Prefix for environment overrides (`RELAY_GENERATION__MAX_STEPS=4`).
const ENV_PREFIX: &str = "RELAY_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `RELAY_*` environment variables (`__` separates sections)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./relay.toml` or `./.relay.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/relay/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(
            Self::global_config_path().as_deref(),
            Self::project_config_path().as_deref(),
            config_path.map(PathBuf::as_path),
            ENV_PREFIX,
        )
        .extract()
        .map_err(Box::new)
    }

    /// Load only default configuration
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("relay").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        Self::project_config_in(Path::new("."))
    }

    fn project_config_in(dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    fn figment(
        global: Option<&Path>,
        project: Option<&Path>,
        explicit: Option<&Path>,
        env_prefix: &str,
    ) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // An explicit path that does not exist is silently ignored by
        // `Toml::file`; callers check existence when it matters.
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(env_prefix).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extract(figment: Figment) -> FileConfig {
        figment.extract().unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.generation.max_steps, 12);
        assert!(config.compression.enabled);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path().unwrap();
        assert!(path.ends_with("relay/config.toml"));
    }

    #[test]
    fn test_project_config_lookup_prefers_plain_name() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ConfigLoader::project_config_in(dir.path()).is_none());

        fs::write(dir.path().join(".relay.toml"), "").unwrap();
        assert_eq!(
            ConfigLoader::project_config_in(dir.path()),
            Some(dir.path().join(".relay.toml"))
        );

        fs::write(dir.path().join("relay.toml"), "").unwrap();
        assert_eq!(
            ConfigLoader::project_config_in(dir.path()),
            Some(dir.path().join("relay.toml"))
        );
    }

    #[test]
    fn test_later_sources_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("relay.toml");
        let explicit = dir.path().join("explicit.toml");

        fs::write(
            &global,
            "[generation]\nmax_steps = 3\ntimeout_seconds = 10\n[logging]\nverbosity = 1\n",
        )
        .unwrap();
        fs::write(&project, "[generation]\nmax_steps = 5\n").unwrap();
        fs::write(&explicit, "[generation]\ntimeout_seconds = 20\n").unwrap();

        let config = extract(ConfigLoader::figment(
            Some(&global),
            Some(&project),
            Some(&explicit),
            "RELAY_LOADER_TEST_UNUSED_",
        ));
        assert_eq!(config.generation.max_steps, 5);
        assert_eq!(config.generation.timeout_seconds, 20);
        assert_eq!(config.logging.verbosity, 1);
        // Untouched keys keep their defaults
        assert_eq!(config.generation.max_timeout_seconds, 600);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = extract(ConfigLoader::figment(
            Some(&missing),
            None,
            None,
            "RELAY_LOADER_TEST_UNUSED_",
        ));
        assert_eq!(config.generation.max_steps, 12);
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "[generation]\nmax_steps = 5\n").unwrap();

        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("RELAY_LOADER_TEST_ENV_GENERATION__MAX_STEPS", "7") };
        let config = extract(ConfigLoader::figment(
            None,
            None,
            Some(&explicit),
            "RELAY_LOADER_TEST_ENV_",
        ));
        unsafe { std::env::remove_var("RELAY_LOADER_TEST_ENV_GENERATION__MAX_STEPS") };

        assert_eq!(config.generation.max_steps, 7);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("bad.toml");
        fs::write(&explicit, "[generation\nmax_steps = ").unwrap();
        let result: Result<FileConfig, _> =
            ConfigLoader::figment(None, None, Some(&explicit), "RELAY_LOADER_TEST_UNUSED_")
                .extract();
        assert!(result.is_err());
    }
}
