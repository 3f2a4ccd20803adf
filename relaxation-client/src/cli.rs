use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::codec::{ByteOrder, SENTINEL_INDEX};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, allow_negative_numbers = true)]
pub struct Cli {
    /// Index this external process reports with every message.
    pub index: i32,

    /// Starting temperature of this external process.
    pub temperature: f32,

    /// Address of the central coordinator.
    #[arg(long, default_value = "127.0.0.1:2000")]
    pub server: SocketAddr,

    /// Byte order both peers use for the 8-byte record.
    #[arg(long, value_enum, default_value_t = ByteOrder::Little)]
    pub byte_order: ByteOrder,

    /// Format of the final report printed on exit.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Validated settings for one run of the exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    pub index: i32,
    pub initial_temperature: f32,
    pub server: SocketAddr,
    pub byte_order: ByteOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("index {index} is reserved for the coordinator's convergence signal")]
    SentinelIndex { index: i32 },

    #[error("initial temperature must be finite, got {0}")]
    NonFiniteTemperature(f32),
}

impl Cli {
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        if self.index == SENTINEL_INDEX {
            return Err(ConfigError::SentinelIndex { index: self.index });
        }
        if !self.temperature.is_finite() {
            return Err(ConfigError::NonFiniteTemperature(self.temperature));
        }

        Ok(ClientConfig {
            index: self.index,
            initial_temperature: self.temperature,
            server: self.server,
            byte_order: self.byte_order,
        })
    }
}
