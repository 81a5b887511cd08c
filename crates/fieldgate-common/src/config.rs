//! Configuration structures for the gateway service.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for production deployment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Fieldbus network configuration.
    pub network: NetworkConfig,

    /// Real-time performance tuning.
    pub performance: PerformanceConfig,

    /// Control-socket configuration.
    pub security: SecurityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            performance: PerformanceConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Fieldbus network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network interface the bus master attaches to (e.g. "eth0", "enp3s0").
    pub interface: String,

    /// Cycle period of the process-data exchange loop.
    #[serde(with = "humantime_serde")]
    pub cycle_time: Duration,

    /// Receive timeout for bus datagrams.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: String::from("eth0"),
            cycle_time: Duration::from_micros(1000),
            timeout: Duration::from_millis(1000),
        }
    }
}

/// Real-time performance configuration for the cyclic thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// SCHED_FIFO priority for the cyclic thread (0 disables RT scheduling).
    pub rt_priority: u8,

    /// CPU affinity for the cyclic thread.
    pub cpu_affinity: CpuAffinity,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            rt_priority: 50,
            cpu_affinity: CpuAffinity::Single(1),
        }
    }
}

/// Control-socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Address the UDP control socket binds to.
    pub bind_address: String,

    /// UDP control port.
    pub port: u16,

    /// Maximum number of tracked operator clients.
    pub max_clients: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            port: 2346,
            max_clients: 16,
        }
    }
}

/// CPU affinity specification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CpuAffinity {
    /// No affinity set (OS chooses).
    #[default]
    None,
    /// Pin to a single CPU core.
    Single(usize),
    /// Pin to a set of CPU cores.
    Set(Vec<usize>),
}

impl CpuAffinity {
    /// Flatten to the list of requested CPU indices (empty when unset).
    #[must_use]
    pub fn cpus(&self) -> Vec<usize> {
        match self {
            CpuAffinity::None => Vec::new(),
            CpuAffinity::Single(cpu) => vec![*cpu],
            CpuAffinity::Set(cpus) => cpus.clone(),
        }
    }
}

impl Serialize for CpuAffinity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CpuAffinity::None => serializer.serialize_none(),
            CpuAffinity::Single(cpu) => serializer.serialize_u64(*cpu as u64),
            CpuAffinity::Set(cpus) => cpus.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CpuAffinity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct AffinityVisitor;

        impl<'de> Visitor<'de> for AffinityVisitor {
            type Value = CpuAffinity;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("null, an integer, or an array of integers")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::None)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::None)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CpuAffinity::Single(value as usize))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(de::Error::custom("CPU index cannot be negative"));
                }
                Ok(CpuAffinity::Single(value as usize))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut cpus = Vec::new();
                while let Some(cpu) = seq.next_element::<usize>()? {
                    cpus.push(cpu);
                }
                Ok(CpuAffinity::Set(cpus))
            }
        }

        deserializer.deserialize_any(AffinityVisitor)
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
