//! Animation graph construction errors

pub type Result<T> = std::result::Result<T, AnimError>;

/// Errors raised while building or validating an animation graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnimError {
    #[error("invalid node handle {index}")]
    InvalidNode { index: u32 },

    #[error("invalid state handle {index}")]
    InvalidState { index: u32 },

    /// A blend node reaches itself through its children
    #[error("blend graph cycle through node {node}")]
    CycleDetected { node: u32 },

    #[error("invalid layer handle {index}")]
    InvalidLayer { index: u32 },

    /// Joint parents must precede their children
    #[error("joint {joint} has parent {parent}, parents must precede children")]
    InvalidJointParent { joint: usize, parent: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AnimError::CycleDetected { node: 3 }.to_string(),
            "blend graph cycle through node 3"
        );
        assert!(
            AnimError::InvalidJointParent { joint: 1, parent: 4 }
                .to_string()
                .contains("parent 4")
        );
    }
}
