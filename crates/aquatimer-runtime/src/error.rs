//! Error handling for the bridge runtime

use aquatimer_core::AquaError;
use thiserror::Error;

/// Runtime-level error types
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Core(#[from] AquaError),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use aquatimer_core::{ConnectError, MessageError};

    #[test]
    fn test_core_errors_pass_through() {
        let err = BridgeError::from(AquaError::from(ConnectError::AdapterNotAvailable));
        assert_eq!(
            err.to_string(),
            ConnectError::AdapterNotAvailable.to_string()
        );

        let err: BridgeError = AquaError::from(MessageError::Closed).into();
        assert!(matches!(
            err,
            BridgeError::Core(AquaError::Message(MessageError::Closed))
        ));
    }
}
