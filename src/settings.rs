/// User settings as stored in chrome.storage.sync

use serde::{Deserialize, Serialize};

/// Storage keys whose change invalidates the API credentials
const CREDENTIAL_KEYS: &[&str] = &["apiKey", "subdomain"];

/// Root settings structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub subdomain: String,
    #[serde(rename = "settingTimeTrackingHHMM")]
    pub setting_time_tracking_hhmm: bool,
    pub version: String,
}

impl Settings {
    pub fn new(api_key: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Settings {
            api_key: api_key.into(),
            subdomain: subdomain.into(),
            ..Settings::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.subdomain.trim().is_empty()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: String::new(),
            subdomain: String::new(),
            setting_time_tracking_hhmm: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// A storage.onChanged notification, reduced to the changed keys
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub area_name: String,
    pub keys: Vec<String>,
}

impl StorageChange {
    pub fn affects_credentials(&self) -> bool {
        self.area_name == "sync"
            && self.keys.iter().any(|key| CREDENTIAL_KEYS.contains(&key.as_str()))
    }
}
