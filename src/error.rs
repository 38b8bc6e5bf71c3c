//! Error types for node configuration synthesis

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synthesizing a node's configuration.
///
/// Every variant is fatal to a synthesis run. Conditions that are only worth
/// a warning (missing devices on a non-gateway node, an unknown transport)
/// never surface as an `Error`; they are recorded on the report instead.
#[derive(Error, Debug)]
pub enum Error {
    /// No node configuration was loaded
    #[error("Node configuration is missing")]
    ConfigMissing,

    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// No candidate interface carries a usable IPv4 address
    #[error("Can't find IP accessible address via network interface {spec}")]
    InterfaceUnresolvable { spec: String },

    /// DNS fallback chain exhausted for a cluster member
    #[error("Can't lookup DNS entry {name}")]
    HostUnresolvable { name: String },

    /// Querying link state of an interface failed
    #[error("Link query for interface {iface} failed: {reason}")]
    LinkQuery { iface: String, reason: String },

    /// DNS resolver could not be built from system configuration
    #[error("DNS resolver initialization failed: {0}")]
    ResolverInit(String),

    // =========================================================================
    // Artifact Errors
    // =========================================================================
    /// Template copy/read/write failed
    #[error("Template I/O error on {}: {source}", .path.display())]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Structured configuration could not be written
    #[error("Can't marshal JSON file {}: {reason}", .path.display())]
    Serialization { path: PathBuf, reason: String },

    /// Autodetect root is missing or not a directory
    #[error("Rt-lfs autodetect points to non existing object or to file: {}", .path.display())]
    DirectoryInvalid { path: PathBuf },

    /// Placeholder backing location could not be created
    #[error("Can't create backing location {}: {source}", .path.display())]
    DeviceCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Wrap an I/O failure on a template or text artifact.
    pub fn template_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::TemplateIo {
            path: path.into(),
            source,
        }
    }

    /// Wrap a failure to produce a structured config file.
    pub fn serialization(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Error::Serialization {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
