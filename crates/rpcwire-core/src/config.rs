//! Runtime configuration

use crate::generators::IdGeneratorConfig;
use crate::protocols::{JsonRpcProtocol, MsgPackRpcProtocol, RpcProtocol, WireFormat};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub protocol: WireFormat,
    #[serde(default)]
    pub id_generator: IdGeneratorConfig,
    pub server: ServerConfig,
}

/// How a byte stream is cut into messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One message per line. Only safe for JSON payloads.
    #[default]
    Lines,
    /// 4-byte big-endian length prefix
    LengthDelimited,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Lines => write!(f, "lines"),
            Framing::LengthDelimited => write!(f, "length_delimited"),
        }
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lines" => Ok(Framing::Lines),
            "length_delimited" | "length-delimited" => Ok(Framing::LengthDelimited),
            other => Err(Error::Validation(format!(
                "Unknown framing '{}'. Must be one of: lines, length_delimited",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub socket_path: String,
    pub log_level: String,
    #[serde(default)]
    pub framing: Framing,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.id_generator.validate()?;

        if self.protocol == WireFormat::MsgPackRpc {
            if !self.id_generator.is_numeric() {
                return Err(Error::Validation(
                    "MessagePack-RPC requires the decimal id generator".to_string(),
                ));
            }
            if self.server.framing == Framing::Lines {
                return Err(Error::Validation(
                    "MessagePack-RPC payloads need length_delimited framing".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Protocol instance for the configured format and id generator
    pub fn build_protocol(&self) -> Box<dyn RpcProtocol + Sync> {
        let generator = self.id_generator.build();
        match self.protocol {
            WireFormat::JsonRpc => Box::new(JsonRpcProtocol::with_id_generator(generator)),
            WireFormat::MsgPackRpc => Box::new(MsgPackRpcProtocol::with_id_generator(generator)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            protocol: WireFormat::JsonRpc,
            id_generator: IdGeneratorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.trim().is_empty() {
            return Err(Error::Validation("Socket path cannot be empty".to_string()));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/rpcwire.sock".to_string(),
            log_level: "info".to_string(),
            framing: Framing::Lines,
        }
    }
}
