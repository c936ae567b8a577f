use std::{fs, sync::Arc, time::Duration};

use serde::Deserialize;
use shared::protocol::DEFAULT_COLLECTION;
use tracing::warn;

use crate::{
    controller::{ControllerConfig, CustomerController},
    gateway::HttpRecordStoreGateway,
};

const SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub store_url: String,
    pub collection: String,
    pub request_timeout: Duration,
    pub saving_display_window: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            store_url: "http://127.0.0.1:8787".into(),
            collection: DEFAULT_COLLECTION.into(),
            request_timeout: Duration::from_secs(10),
            saving_display_window: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    store_url: Option<String>,
    collection: Option<String>,
    request_timeout_secs: Option<u64>,
    saving_display_window_ms: Option<u64>,
}

impl ClientSettings {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            saving_display_window: self.saving_display_window,
            ..ControllerConfig::default()
        }
    }

    /// Builds the HTTP gateway and a controller bound to it. The list is not loaded yet.
    pub fn connect(&self) -> anyhow::Result<Arc<CustomerController>> {
        let gateway =
            HttpRecordStoreGateway::new(&self.store_url, &self.collection, self.request_timeout)?;
        Ok(CustomerController::with_config(
            Arc::new(gateway),
            self.controller_config(),
        ))
    }
}

pub fn load_client_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_settings(&mut settings, &raw);
    }
    apply_env_settings(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_settings(settings: &mut ClientSettings, raw: &str) {
    let file_cfg = match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(file = SETTINGS_FILE, %error, "ignoring unreadable settings file");
            return;
        }
    };

    if let Some(v) = file_cfg.store_url {
        settings.store_url = v;
    }
    if let Some(v) = file_cfg.collection {
        settings.collection = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.saving_display_window_ms {
        settings.saving_display_window = Some(Duration::from_millis(v));
    }
}

fn apply_env_settings(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("STORE_URL") {
        settings.store_url = v;
    }
    if let Some(v) = lookup("APP__STORE_URL") {
        settings.store_url = v;
    }

    if let Some(v) = lookup("APP__COLLECTION") {
        settings.collection = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.request_timeout = Duration::from_secs(parsed),
            Err(error) => warn!(value = %v, %error, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = lookup("APP__SAVING_DISPLAY_WINDOW_MS") {
        match v.parse::<u64>() {
            Ok(parsed) => settings.saving_display_window = Some(Duration::from_millis(parsed)),
            Err(error) => {
                warn!(value = %v, %error, "ignoring invalid APP__SAVING_DISPLAY_WINDOW_MS")
            }
        }
    }
}
