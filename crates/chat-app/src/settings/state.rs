use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use ollachat_llm::{
    DEFAULT_BASE_URL, DEFAULT_SYSTEM_PROMPT, ProviderConfig, SharedProviderConfig, shared_config,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "ollachat";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "OLLACHAT_";

/// User-editable connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        let url = self.ollama_url.trim().trim_end_matches('/');
        self.ollama_url = if url.is_empty() {
            default_ollama_url()
        } else {
            url.to_string()
        };

        let prompt = self.system_prompt.trim();
        self.system_prompt = if prompt.is_empty() {
            default_system_prompt()
        } else {
            prompt.to_string()
        };

        self
    }

    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(&self.ollama_url, &self.system_prompt)
    }
}

/// Loads, persists and publishes [`AppSettings`].
///
/// Every accepted update is also pushed into the shared [`ProviderConfig`]
/// so clients holding that handle see it on their next request.
pub struct SettingsStore {
    settings: Arc<ArcSwap<AppSettings>>,
    provider_config: SharedProviderConfig,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".ollachat"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        let provider_config = shared_config(settings.to_provider_config());
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            provider_config,
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    pub fn provider_config(&self) -> SharedProviderConfig {
        self.provider_config.clone()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update(&self, settings: AppSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.provider_config
            .store(Arc::new(normalized_settings.to_provider_config()));
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> AppSettings {
        if !path.exists() {
            tracing::info!(path = ?path, "settings file not found, using defaults");
        }

        let figment = Figment::from(Serialized::defaults(AppSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX));

        match figment.extract::<AppSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    path = ?path,
                    error = %error,
                    "failed to parse settings, using defaults"
                );
                AppSettings::default()
            }
        }
    }

    /// Writes next to the target and renames over it, so readers never see a partial file.
    fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let payload = serde_json::to_vec_pretty(settings).context(EncodeSnafu {
            stage: "encode-settings",
        })?;

        if let Some(directory) = self.config_path.parent() {
            std::fs::create_dir_all(directory).context(SaveSnafu {
                stage: "prepare-settings-directory",
                path: directory.to_path_buf(),
            })?;
        }

        let staging_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&staging_path, payload).context(SaveSnafu {
            stage: "stage-settings-file",
            path: staging_path.clone(),
        })?;
        std::fs::rename(&staging_path, &self.config_path).context(SaveSnafu {
            stage: "swap-in-settings-file",
            path: self.config_path.clone(),
        })?;

        tracing::info!(path = ?self.config_path, "saved settings");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("cannot encode settings on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("cannot save settings at {path:?} on `{stage}`: {source}"))]
    Save {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SettingsError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Encode { stage, .. } | Self::Save { stage, .. } => *stage,
        }
    }
}

fn default_ollama_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::new(directory.path().join(SETTINGS_FILE_NAME));

        assert_eq!(*store.settings(), AppSettings::default());
        assert_eq!(
            store.provider_config().load().base_url,
            "http://192.168.1.100:11434"
        );
    }

    #[test]
    fn update_persists_and_publishes_provider_config() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join("nested").join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());
        let shared = store.provider_config();

        store
            .update(AppSettings {
                ollama_url: "  http://localhost:11434/ ".to_string(),
                system_prompt: "Be brief.".to_string(),
            })
            .expect("settings saved");

        assert_eq!(shared.load().base_url, "http://localhost:11434");
        assert_eq!(shared.load().system_prompt, "Be brief.");
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = SettingsStore::new(path);
        assert_eq!(reloaded.settings().ollama_url, "http://localhost:11434");
        assert_eq!(reloaded.settings().system_prompt, "Be brief.");
    }

    #[test]
    fn update_reports_unwritable_location_and_keeps_old_settings() {
        let directory = tempfile::tempdir().expect("temp dir");
        let blocker = directory.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("write fixture");
        let store = SettingsStore::new(blocker.join(SETTINGS_FILE_NAME));

        let error = store
            .update(AppSettings {
                ollama_url: "http://localhost:11434".to_string(),
                system_prompt: "Be brief.".to_string(),
            })
            .expect_err("parent is a file");

        assert!(matches!(error, SettingsError::Save { .. }));
        assert_eq!(error.stage(), "prepare-settings-directory");
        assert_eq!(*store.settings(), AppSettings::default());
        assert_eq!(store.provider_config().load().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let settings = AppSettings {
            ollama_url: "   ".to_string(),
            system_prompt: String::new(),
        }
        .normalized();

        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, r#"{ "ollama_url": "http://10.0.0.2:11434//" }"#)
            .expect("write fixture");

        let store = SettingsStore::new(path);

        assert_eq!(store.settings().ollama_url, "http://10.0.0.2:11434");
        assert_eq!(store.settings().system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn malformed_file_is_ignored() {
        let directory = tempfile::tempdir().expect("temp dir");
        let path = directory.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "{ not json").expect("write fixture");

        let store = SettingsStore::new(path);

        assert_eq!(*store.settings(), AppSettings::default());
    }
}
