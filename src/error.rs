use std::fmt;

use crate::dsp::device::NodeId;

#[derive(Debug)]
pub enum HarmonyError {
    Config(ConfigError),
    Device(DeviceError),
}

/// Malformed configuration input (settings or chord requests).
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
}

/// Failure reported by an [`AudioDevice`](crate::dsp::device::AudioDevice).
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The node was never created or has already been released.
    UnknownNode(NodeId),
    /// The operation needs a node of a different kind.
    WrongNodeKind { node: NodeId, expected: &'static str },
    /// The parameter does not exist on that node.
    UnknownParam { node: NodeId, param: &'static str },
    /// The connection would feed a node back into itself.
    Cycle { from: NodeId, to: NodeId },
}

impl fmt::Display for HarmonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarmonyError::Config(e) => write!(f, "Config error: {e}"),
            HarmonyError::Device(e) => write!(f, "Device error: {e}"),
        }
    }
}

impl std::error::Error for HarmonyError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "Invalid JSON: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::UnknownNode(node) => write!(f, "Unknown node {node}"),
            DeviceError::WrongNodeKind { node, expected } => {
                write!(f, "Node {node} is not a {expected}")
            }
            DeviceError::UnknownParam { node, param } => {
                write!(f, "Node {node} has no '{param}' parameter")
            }
            DeviceError::Cycle { from, to } => {
                write!(f, "Connecting {from} -> {to} would create a cycle")
            }
        }
    }
}

impl std::error::Error for DeviceError {}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<ConfigError> for HarmonyError {
    fn from(e: ConfigError) -> Self {
        HarmonyError::Config(e)
    }
}

impl From<DeviceError> for HarmonyError {
    fn from(e: DeviceError) -> Self {
        HarmonyError::Device(e)
    }
}
