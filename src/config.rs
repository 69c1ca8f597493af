use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::VwError;

pub const DEFAULT_CONFIG_FILE: &str = "vw-adaptor.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VwConfig {
    #[serde(rename = "Common")]
    pub common: CommonSection,
    #[serde(rename = "Watershed", default)]
    pub watershed: WatershedSection,
    #[serde(rename = "FGDC", default)]
    pub fgdc: FgdcSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommonSection {
    #[serde(rename = "watershedIP")]
    pub watershed_ip: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub passwd: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub verify_tls: Option<bool>,
}

/// Fields feeding the watershed JSON document. `None` means the config file
/// did not set the key; required keys are checked when a document is built.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatershedSection {
    #[serde(default)]
    pub watershed_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub model_vars: Option<String>,
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub orig_epsg: Option<u32>,
    #[serde(default)]
    pub epsg: Option<u32>,
    #[serde(default)]
    pub apps: Option<Vec<String>>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub end_datetime: Option<String>,
}

/// Fields feeding the FGDC XML template.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FgdcSection {
    #[serde(default)]
    pub begin_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_org: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub update_frequency: Option<String>,
    #[serde(default)]
    pub theme_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub place_keywords: Option<Vec<String>>,
}

impl VwConfig {
    /// Root URL of the Virtual Watershed host, always ending in `/`.
    pub fn base_url(&self) -> String {
        base_url(&self.common.watershed_ip)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(
                self.common.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            verify_tls: self.common.verify_tls.unwrap_or(true),
        }
    }

    /// Credentials from `VW_USER`/`VW_PASSWD`, falling back to the
    /// `Common` section.
    pub fn credentials(&self) -> Result<Credentials, VwError> {
        let username = env_override("VW_USER").or_else(|| self.common.user.clone());
        let password = env_override("VW_PASSWD").or_else(|| self.common.passwd.clone());
        match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
            (None, _) => Err(VwError::MissingCredentials(
                "set Common.user or VW_USER".to_string(),
            )),
            (_, None) => Err(VwError::MissingCredentials(
                "set Common.passwd or VW_PASSWD".to_string(),
            )),
        }
    }
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds the service root from a configured host. A bare host or IP gets
/// `https://`; a value that already names a scheme is used as given.
pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/")
    } else {
        format!("https://{host}/")
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<VwConfig, VwError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(VwError::MissingConfig)?,
        };
        Self::load(&config_path)
    }

    pub fn load(path: &Path) -> Result<VwConfig, VwError> {
        let content =
            fs::read_to_string(path).map_err(|_| VwError::ConfigRead(path.to_path_buf()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<VwConfig, VwError> {
        serde_json::from_str(content).map_err(|err| VwError::ConfigParse(err.to_string()))
    }

    /// `vw-adaptor.json` in the working directory, then
    /// `<config dir>/vw-adaptor/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("vw-adaptor").join("config.json"))
            .filter(|path| path.exists())
    }
}
