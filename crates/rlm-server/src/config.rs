use crate::subscriber::{CustomerRecord, VoucherRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server listen address
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Server listen port
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default)]
    pub log_level: Option<String>,

    /// Audit log file path (JSON lines, optional)
    #[serde(default)]
    pub audit_log_path: Option<String>,

    /// PostgreSQL connection URL. When unset, subscribers come from the
    /// seed lists below and state lives in memory.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Create missing tables on startup (default: true)
    #[serde(default = "default_migrate_on_startup")]
    pub migrate_on_startup: bool,

    /// Customers served by the in-memory directory
    #[serde(default)]
    pub customers: Vec<CustomerRecord>,

    /// Vouchers served by the in-memory directory
    #[serde(default)]
    pub vouchers: Vec<VoucherRecord>,
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_migrate_on_startup() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            log_level: None,
            audit_log_path: None,
            database_url: None,
            migrate_on_startup: true,
            customers: vec![],
            vouchers: vec![],
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr: IpAddr = self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid IP address: {}", self.listen_address))
        })?;
        Ok(SocketAddr::new(addr, self.listen_port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let _: IpAddr = self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid listen address: {}", self.listen_address))
        })?;

        if self.listen_port == 0 {
            return Err(ConfigError::Invalid("Port cannot be 0".to_string()));
        }

        for customer in &self.customers {
            if customer.id.is_empty() {
                return Err(ConfigError::Invalid("Customer has empty id".to_string()));
            }
            if customer.pppoe_username.is_none() && customer.hotspot_username.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "Customer {} has no credential pair",
                    customer.id
                )));
            }
        }

        for voucher in &self.vouchers {
            if voucher.code.is_empty() {
                return Err(ConfigError::Invalid("Voucher has empty code".to_string()));
            }
        }

        Ok(())
    }

    /// Create an example configuration file
    pub fn example() -> Self {
        use crate::subscriber::{CustomerStatus, Package, VoucherStatus};
        use rlm_proto::DurationUnit;

        let home_package = Package {
            name: "home-20m".to_string(),
            download_mbps: 20,
            upload_mbps: 10,
            duration: 1,
            duration_unit: DurationUnit::Month,
            burst_download_mbps: Some(40),
            burst_upload_mbps: Some(20),
            burst_threshold_download_mbps: None,
            burst_threshold_upload_mbps: None,
            burst_seconds: None,
            address_pool: Some("pppoe-pool".to_string()),
            max_devices: None,
        };

        let hotspot_package = Package {
            name: "hotspot-1h".to_string(),
            download_mbps: 10,
            upload_mbps: 5,
            duration: 1,
            duration_unit: DurationUnit::Hour,
            burst_download_mbps: None,
            burst_upload_mbps: None,
            burst_threshold_download_mbps: None,
            burst_threshold_upload_mbps: None,
            burst_seconds: None,
            address_pool: None,
            max_devices: Some(2),
        };

        Config {
            listen_address: "0.0.0.0".to_string(),
            listen_port: 8080,
            log_level: Some("info".to_string()),
            audit_log_path: Some("/var/log/rlm/audit.log".to_string()),
            database_url: None,
            migrate_on_startup: true,
            customers: vec![CustomerRecord {
                id: "cust-1001".to_string(),
                name: "Example Subscriber".to_string(),
                status: CustomerStatus::Active,
                expiry_date: None,
                pppoe_username: Some("subscriber@example".to_string()),
                pppoe_password: Some("change-me".to_string()),
                hotspot_username: Some("subscriber-hs".to_string()),
                hotspot_password: Some("change-me-too".to_string()),
                package: Some(home_package),
            }],
            vouchers: vec![VoucherRecord {
                code: "WIFI1234".to_string(),
                status: VoucherStatus::Active,
                expires_at: None,
                last_used_at: None,
                package: hotspot_package,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_port, 8080);
        assert!(config.database_url.is_none());
        assert!(config.customers.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.listen_port = 0;
        assert!(config.validate().is_err());

        config.listen_port = 8080;
        config.listen_address = "not-an-ip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_customer_without_credentials_rejected() {
        let mut config = Config::example();
        config.customers[0].pppoe_username = None;
        config.customers[0].hotspot_username = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_config_roundtrip() {
        let config = Config::example();
        assert!(config.validate().is_ok());

        let temp = tempfile::NamedTempFile::new().unwrap();
        config.to_file(temp.path()).unwrap();

        let loaded = Config::from_file(temp.path()).unwrap();
        assert_eq!(loaded.listen_port, config.listen_port);
        assert_eq!(loaded.customers.len(), 1);
        assert_eq!(loaded.vouchers[0].code, "WIFI1234");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.listen_address, "0.0.0.0");
        assert_eq!(config.listen_port, 8080);
        assert!(config.migrate_on_startup);
    }
}
