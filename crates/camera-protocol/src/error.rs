//! Protocol Error Types

use thiserror::Error;

/// Errors raised while decoding inbound camera commands
///
/// None of these are surfaced to the operator: an undecodable command is
/// simply not dispatched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Command code / requested message not handled by the camera component
    #[error("Unknown camera command {command} (param1 {param1})")]
    UnknownCommand { command: u16, param1: f32 },

    /// Command addressed to a different component
    #[error("Command targets component {0}, not the camera")]
    NotAddressed(u8),
}
