//! Server lifecycle state.

use std::fmt;

/// Where the server is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Uninitialized,
    Initialized,
    Running,
    Interrupted,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Uninitialized => "uninitialized",
            ServerState::Initialized => "initialized",
            ServerState::Running => "running",
            ServerState::Interrupted => "interrupted",
            ServerState::Stopped => "stopped",
        }
    }

    /// Whether requests reaching the dispatcher are still queued for workers.
    pub fn is_accepting_work(&self) -> bool {
        matches!(self, ServerState::Initialized | ServerState::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered() {
        assert!(ServerState::Uninitialized < ServerState::Initialized);
        assert!(ServerState::Running < ServerState::Interrupted);
        assert!(ServerState::Interrupted < ServerState::Stopped);
    }

    #[test]
    fn accepting_work() {
        assert!(ServerState::Running.is_accepting_work());
        assert!(!ServerState::Interrupted.is_accepting_work());
        assert_eq!(ServerState::Stopped.to_string(), "stopped");
    }
}
