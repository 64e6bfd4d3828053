//! INI file configuration adapter.
//!
//! First-run behavior: [`FileConfigAdapter::load_or_create`] writes a
//! commented template when the file does not exist and fails with
//! [`LedgerError::ConfigCreated`], forcing the operator to fill in
//! warehouse location and provider credentials before anything runs.

use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = "\
# quantledger configuration

[warehouse]
# path to the sqlite bar warehouse
path =

[provider]
# data provider credentials
username =
passwd =

[backtest]
start_date = 2020-01-01
init_cash = 100000
";

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// Load the config file, or create a template and refuse to run.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, CONFIG_TEMPLATE)?;
            return Err(LedgerError::ConfigCreated {
                path: path.display().to_string(),
            });
        }
        Self::from_file(path).map_err(|e| LedgerError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
