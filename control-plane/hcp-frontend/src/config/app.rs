use anyhow::Result;
use envconfig::Envconfig;
use hcp_observability::LogFormat;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Envconfig)]
pub struct AppConfig {
    // Server configuration
    #[envconfig(from = "SERVER_HOST", default = "0.0.0.0")]
    pub server_host: String,

    #[envconfig(from = "SERVER_PORT", default = "8443")]
    pub server_port: u16,

    /// Region this frontend serves; embedded in operation status paths.
    #[envconfig(from = "LOCATION", default = "eastus")]
    pub location: String,

    // Storage configuration
    #[envconfig(from = "STORAGE_TYPE", default = "memory")]
    pub storage_type: String,

    // Control plane configuration
    #[envconfig(from = "CONTROL_PLANE_URL")]
    pub control_plane_url: Option<String>,

    #[envconfig(from = "CONTROL_PLANE_TIMEOUT", default = "30")]
    pub control_plane_timeout_seconds: u64,

    #[envconfig(from = "CONTROL_PLANE_TOKEN")]
    pub control_plane_token: Option<String>,

    // Request handling policy
    #[envconfig(from = "LIST_PAGE_SIZE", default = "20")]
    pub list_page_size: usize,

    #[envconfig(from = "LOCK_ENABLED", default = "true")]
    pub lock_enabled: bool,

    #[envconfig(from = "LOCK_TTL_SECONDS", default = "10")]
    pub lock_ttl_seconds: u64,

    #[envconfig(from = "LOCK_TIMEOUT_SECONDS", default = "20")]
    pub lock_timeout_seconds: u64,

    // Observability configuration
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    #[envconfig(from = "LOG_FORMAT", default = "plain")]
    pub log_format: String,

    #[envconfig(from = "METRICS_ENABLED", default = "true")]
    pub metrics_enabled: bool,

    #[envconfig(from = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables only
    pub fn load_from_env() -> Result<Self> {
        Ok(Self::init_from_env()?)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.server_host.clone(),
            port: self.server_port,
        }
    }

    pub fn storage(&self) -> StorageConfig {
        let storage_type = match self.storage_type.to_lowercase().as_str() {
            "memory" => StorageType::Memory,
            other => {
                warn!(
                    "Unrecognized storage type '{}', falling back to 'memory'.",
                    other
                );
                StorageType::Memory
            }
        };
        StorageConfig { storage_type }
    }

    pub fn control_plane(&self) -> ControlPlaneConfig {
        ControlPlaneConfig {
            url: self
                .control_plane_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
            timeout_seconds: self.control_plane_timeout_seconds,
            token: self.control_plane_token.clone(),
        }
    }

    pub fn frontend_policy(&self) -> FrontendPolicy {
        FrontendPolicy {
            location: self.location.clone(),
            list_page_size: self.list_page_size.max(1),
            lock: self.lock_enabled.then(|| LockPolicy {
                ttl: Duration::from_secs(self.lock_ttl_seconds),
                timeout: Duration::from_secs(self.lock_timeout_seconds),
            }),
        }
    }

    pub fn observability(&self) -> ObservabilityConfig {
        ObservabilityConfig {
            log_level: self.log_level.clone(),
            format: self.log_format.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to plain logs", e);
                LogFormat::Plain
            }),
            metrics_enabled: self.metrics_enabled,
            otlp_endpoint: self.otlp_endpoint.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageType {
    Memory,
}

/// Where the upstream control plane lives. `url == None` selects the
/// in-process control plane.
#[derive(Debug, Clone, Default)]
pub struct ControlPlaneConfig {
    pub url: Option<String>,
    pub timeout_seconds: u64,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FrontendPolicy {
    pub location: String,
    pub list_page_size: usize,
    /// `None` disables the per-subscription advisory lease.
    pub lock: Option<LockPolicy>,
}

impl Default for FrontendPolicy {
    fn default() -> Self {
        Self {
            location: "eastus".to_string(),
            list_page_size: 20,
            lock: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub ttl: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub metrics_enabled: bool,
    pub otlp_endpoint: Option<String>,
}
