//! Profile configuration and credential storage.
//!
//! Profiles live in the AWS shared config file (`~/.aws/config`, overridable
//! via `AWS_CONFIG_FILE`) under `azure_*` keys; issued credentials are written
//! to the shared credentials file. The format is the AWS flavor of INI, which
//! the SDKs themselves parse by hand, so we do the same with a minimal
//! order-preserving reader/writer.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Keys that may be overridden from the environment, in lower or upper case.
const ENV_KEYS: [&str; 6] = [
    "azure_tenant_id",
    "azure_app_id_uri",
    "azure_default_username",
    "azure_default_password",
    "azure_default_role_arn",
    "azure_default_duration_hours",
];

/// Credentials this close to their deadline count as expired and get refreshed.
const EXPIRATION_MARGIN_MINUTES: i64 = 11;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown profile '{0}'. You must configure it first with --configure.")]
    UnknownProfile(String),
    #[error("profile '{0}' is not configured properly.")]
    Misconfigured(String),
    #[error("could not locate a home directory")]
    NoHomeDirectory,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One profile's Azure federation settings, after environment overrides.
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub tenant_id: String,
    pub app_id_uri: String,
    pub default_username: Option<String>,
    pub default_password: Option<String>,
    pub default_role_arn: Option<String>,
    pub default_duration_hours: Option<u32>,
    pub remember_me: bool,
    pub region: Option<String>,
}

/// Credentials returned by STS, persisted to the shared credentials file.
#[derive(Debug, Clone)]
pub struct ProfileCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// Answers collected by `--configure`.
#[derive(Debug, Clone)]
pub struct ProfileSettings {
    pub tenant_id: String,
    pub app_id_uri: String,
    pub default_username: Option<String>,
    pub default_role_arn: Option<String>,
    pub default_duration_hours: Option<u32>,
    pub remember_me: bool,
}

/// Reader/writer over the AWS shared config and credentials files.
#[derive(Debug, Clone)]
pub struct AwsFileStore {
    config_path: PathBuf,
    credentials_path: PathBuf,
}

impl AwsFileStore {
    pub fn new(config_path: PathBuf, credentials_path: PathBuf) -> Self {
        Self {
            config_path,
            credentials_path,
        }
    }

    /// Resolve file locations the way the AWS CLI does: explicit environment
    /// variables first, then `~/.aws/`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let aws_dir = dirs::home_dir()
            .ok_or(ConfigError::NoHomeDirectory)?
            .join(".aws");
        let config_path = std::env::var_os("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| aws_dir.join("config"));
        let credentials_path = std::env::var_os("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| aws_dir.join("credentials"));
        Ok(Self::new(config_path, credentials_path))
    }

    /// Load a profile, apply environment overrides, and validate the required
    /// federation settings.
    pub fn load_profile(&self, name: &str) -> Result<ProfileConfig, ConfigError> {
        let ini = self.read_ini(&self.config_path)?;
        let section = ini
            .section(&config_section_name(name))
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        let get = |key: &str| -> Option<String> {
            env_override(key).or_else(|| section.get(key).map(|value| value.to_string()))
        };

        let tenant_id = get("azure_tenant_id");
        let app_id_uri = get("azure_app_id_uri");
        let (Some(tenant_id), Some(app_id_uri)) = (tenant_id, app_id_uri) else {
            return Err(ConfigError::Misconfigured(name.to_string()));
        };

        Ok(ProfileConfig {
            tenant_id,
            app_id_uri,
            default_username: get("azure_default_username"),
            default_password: get("azure_default_password"),
            default_role_arn: get("azure_default_role_arn"),
            default_duration_hours: get("azure_default_duration_hours")
                .and_then(|value| value.parse().ok()),
            remember_me: section
                .get("azure_default_remember_me")
                .is_some_and(|value| value == "true"),
            region: section.get("region").map(|value| value.to_string()),
        })
    }

    /// Names of every profile carrying Azure federation settings.
    pub fn profile_names(&self) -> Result<Vec<String>, ConfigError> {
        let ini = self.read_ini(&self.config_path)?;
        Ok(ini
            .sections
            .iter()
            .filter(|section| section.get("azure_tenant_id").is_some())
            .map(|section| {
                section
                    .name
                    .strip_prefix("profile ")
                    .unwrap_or(&section.name)
                    .to_string()
            })
            .collect())
    }

    /// Persist `--configure` answers for a profile.
    pub fn save_profile(&self, name: &str, settings: &ProfileSettings) -> Result<(), ConfigError> {
        let mut ini = self.read_ini(&self.config_path)?;
        let section = ini.section_mut(&config_section_name(name));
        section.set("azure_tenant_id", &settings.tenant_id);
        section.set("azure_app_id_uri", &settings.app_id_uri);
        section.set(
            "azure_default_username",
            settings.default_username.as_deref().unwrap_or(""),
        );
        section.set(
            "azure_default_role_arn",
            settings.default_role_arn.as_deref().unwrap_or(""),
        );
        section.set(
            "azure_default_duration_hours",
            &settings
                .default_duration_hours
                .map(|hours| hours.to_string())
                .unwrap_or_default(),
        );
        section.set(
            "azure_default_remember_me",
            if settings.remember_me { "true" } else { "false" },
        );
        self.write_ini(&self.config_path, &ini)
    }

    /// Write issued credentials under the plain profile name in the shared
    /// credentials file.
    pub fn write_credentials(
        &self,
        name: &str,
        credentials: &ProfileCredentials,
    ) -> Result<(), ConfigError> {
        let mut ini = self.read_ini(&self.credentials_path)?;
        let section = ini.section_mut(name);
        section.set("aws_access_key_id", &credentials.access_key_id);
        section.set("aws_secret_access_key", &credentials.secret_access_key);
        section.set("aws_session_token", &credentials.session_token);
        section.set(
            "aws_expiration",
            &credentials
                .expiration
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        );
        self.write_ini(&self.credentials_path, &ini)
    }

    /// Whether the profile's stored credentials are missing, unparseable, or
    /// within the refresh margin of expiring.
    pub fn is_about_to_expire(&self, name: &str) -> Result<bool, ConfigError> {
        let ini = self.read_ini(&self.credentials_path)?;
        let Some(section) = ini.section(name) else {
            return Ok(true);
        };
        let Some(raw) = section.get("aws_expiration") else {
            return Ok(true);
        };
        let Ok(expiration) = DateTime::parse_from_rfc3339(raw) else {
            return Ok(true);
        };

        let margin = Duration::minutes(EXPIRATION_MARGIN_MINUTES);
        Ok(expiration.with_timezone(&Utc) - Utc::now() < margin)
    }

    fn read_ini(&self, path: &Path) -> Result<IniFile, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(IniFile::parse(&contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(IniFile::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn write_ini(&self, path: &Path, ini: &IniFile) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, ini.render()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Directory holding the persistent Chromium profile used for remember-me.
pub fn chromium_profile_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("aws-azure-auth")
        .join("chromium")
}

fn config_section_name(profile: &str) -> String {
    if profile == "default" {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

fn env_override(key: &str) -> Option<String> {
    if !ENV_KEYS.contains(&key) {
        return None;
    }
    std::env::var(key)
        .or_else(|_| std::env::var(key.to_uppercase()))
        .ok()
        .filter(|value| !value.is_empty())
}

/// Minimal order-preserving INI document.
#[derive(Debug, Default)]
struct IniFile {
    sections: Vec<IniSection>,
}

#[derive(Debug)]
struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing == key)
        {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }
}

impl IniFile {
    fn parse(contents: &str) -> Self {
        let mut sections: Vec<IniSection> = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                sections.push(IniSection {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
            } else if let Some((key, value)) = line.split_once('=') {
                if let Some(section) = sections.last_mut() {
                    section
                        .entries
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
            }
        }
        Self { sections }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let index = match self
            .sections
            .iter()
            .position(|section| section.name == name)
        {
            Some(index) => index,
            None => {
                self.sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> AwsFileStore {
        AwsFileStore::new(dir.path().join("config"), dir.path().join("credentials"))
    }

    #[test]
    fn loads_profile_with_azure_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config"),
            "[profile work]\n\
             region = eu-west-1\n\
             azure_tenant_id = tenant\n\
             azure_app_id_uri = https://signin.aws.amazon.com/saml#app\n\
             azure_default_username = user@example.com\n\
             azure_default_remember_me = true\n",
        )
        .unwrap();

        let profile = store(&dir).load_profile("work").unwrap();
        assert_eq!(profile.tenant_id, "tenant");
        assert_eq!(profile.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            profile.default_username.as_deref(),
            Some("user@example.com")
        );
        assert!(profile.remember_me);
        assert!(profile.default_password.is_none());
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(&dir).load_profile("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "nope"));
    }

    #[test]
    fn profile_without_tenant_is_misconfigured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config"),
            "[profile broken]\nazure_app_id_uri = uri\n",
        )
        .unwrap();
        let err = store(&dir).load_profile("broken").unwrap_err();
        assert!(matches!(err, ConfigError::Misconfigured(_)));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .save_profile(
                "work",
                &ProfileSettings {
                    tenant_id: "tenant".into(),
                    app_id_uri: "uri".into(),
                    default_username: Some("user@example.com".into()),
                    default_role_arn: None,
                    default_duration_hours: Some(4),
                    remember_me: false,
                },
            )
            .unwrap();

        let profile = store.load_profile("work").unwrap();
        assert_eq!(profile.app_id_uri, "uri");
        assert_eq!(profile.default_duration_hours, Some(4));
        assert!(!profile.remember_me);
        assert_eq!(store.profile_names().unwrap(), vec!["work".to_string()]);
    }

    #[test]
    fn credentials_written_under_plain_section_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .write_credentials(
                "work",
                &ProfileCredentials {
                    access_key_id: "AKIA".into(),
                    secret_access_key: "secret".into(),
                    session_token: "token".into(),
                    expiration: Utc::now() + Duration::hours(1),
                },
            )
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("credentials")).unwrap();
        assert!(written.starts_with("[work]\n"));
        assert!(written.contains("aws_access_key_id=AKIA"));
        assert!(!store.is_about_to_expire("work").unwrap());
    }

    #[test]
    fn missing_or_stale_credentials_are_about_to_expire() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.is_about_to_expire("work").unwrap());

        store
            .write_credentials(
                "work",
                &ProfileCredentials {
                    access_key_id: "AKIA".into(),
                    secret_access_key: "secret".into(),
                    session_token: "token".into(),
                    expiration: Utc::now() + Duration::minutes(5),
                },
            )
            .unwrap();
        assert!(store.is_about_to_expire("work").unwrap());
    }

    #[test]
    fn default_profile_uses_bare_section_name() {
        assert_eq!(config_section_name("default"), "default");
        assert_eq!(config_section_name("work"), "profile work");
    }
}
