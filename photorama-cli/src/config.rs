//! Layered configuration shared by every command.

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use photorama_data::{
    FlickrApi, HttpTransportConfig, ImageCacheConfig, cache::DEFAULT_MEMORY_BUDGET_BYTES,
    flickr::DEFAULT_ENDPOINT,
};
use serde::{Deserialize, Serialize};

use crate::CliError;

pub(crate) const ARG_API_KEY: &str = "api-key";
pub(crate) const ARG_ENDPOINT: &str = "endpoint";
pub(crate) const ARG_DATA_DIR: &str = "data-dir";
pub(crate) const ARG_MEMORY_BUDGET_MB: &str = "memory-budget-mb";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const SERVICE_COMMAND: &str = "service";
pub(crate) const ENV_API_KEY: &str = "PHOTORAMA_CMDS_SERVICE_API_KEY";

pub(crate) const DEFAULT_DATA_DIR: &str = ".photorama";
pub(crate) const DATABASE_FILE: &str = "photorama.sqlite";
pub(crate) const IMAGES_DIR: &str = "images";

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Service options shared by every command.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
// The name sets the `PHOTORAMA_CMDS_SERVICE_` prefix and `[cmds.service]`.
#[command(
    name = SERVICE_COMMAND,
    about = "Flickr access, photo storage and image cache options"
)]
#[ortho_config(prefix = "PHOTORAMA")]
pub(crate) struct ServiceArgs {
    /// Flickr API key.
    #[arg(long = ARG_API_KEY, value_name = "key")]
    #[serde(default)]
    pub(crate) api_key: Option<String>,
    /// Flickr REST endpoint.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// Directory holding the photo database and image cache.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Memory budget of the image cache in MiB.
    #[arg(long = ARG_MEMORY_BUDGET_MB, value_name = "MiB")]
    #[serde(default)]
    pub(crate) memory_budget_mb: Option<u64>,
    /// User-Agent header sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl ServiceArgs {
    pub(crate) fn into_config(self) -> Result<AppConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AppConfig::try_from(merged)
    }
}

/// Resolved service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppConfig {
    pub(crate) api_key: String,
    pub(crate) endpoint: String,
    pub(crate) data_dir: Utf8PathBuf,
    pub(crate) memory_budget_bytes: u64,
    pub(crate) transport: HttpTransportConfig,
}

impl AppConfig {
    pub(crate) fn database_path(&self) -> Utf8PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub(crate) fn cache_config(&self) -> ImageCacheConfig {
        ImageCacheConfig::new(self.data_dir.join(IMAGES_DIR))
            .with_memory_budget(self.memory_budget_bytes)
    }

    pub(crate) fn flickr_api(&self) -> Result<FlickrApi, CliError> {
        Ok(FlickrApi::new(&self.endpoint, self.api_key.as_str())?)
    }
}

impl TryFrom<ServiceArgs> for AppConfig {
    type Error = CliError;

    fn try_from(args: ServiceArgs) -> Result<Self, Self::Error> {
        let api_key = args
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_API_KEY,
                env: ENV_API_KEY,
            })?;
        let memory_budget_bytes = match args.memory_budget_mb {
            None => DEFAULT_MEMORY_BUDGET_BYTES,
            Some(0) => {
                return Err(CliError::InvalidArgument {
                    field: ARG_MEMORY_BUDGET_MB,
                    reason: "must be at least one MiB".to_owned(),
                });
            }
            Some(mb) => mb.saturating_mul(BYTES_PER_MIB),
        };

        let mut transport = HttpTransportConfig::default();
        if let Some(secs) = args.timeout_secs {
            if secs == 0 {
                return Err(CliError::InvalidArgument {
                    field: ARG_TIMEOUT_SECS,
                    reason: "must be at least one second".to_owned(),
                });
            }
            transport = transport.with_timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = args.user_agent {
            transport = transport.with_user_agent(agent);
        }

        Ok(Self {
            api_key,
            endpoint: args.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            data_dir: args
                .data_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_DIR)),
            memory_budget_bytes,
            transport,
        })
    }
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<AppConfig, CliError> {
    let merged = ServiceArgs::merge_from_layers(layers).map_err(CliError::from)?;
    AppConfig::try_from(merged)
}
