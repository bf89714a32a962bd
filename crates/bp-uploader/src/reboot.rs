//! Reboot outcome classification

use std::fmt;

use bp_core::CommandError;

/// What happened to the optional reboot at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootState {
    /// The operator did not ask for a reboot
    NotRequested,
    /// A reboot was asked for but not yet issued
    Requested,
    /// The reboot command exited with status 0
    Acknowledged,
    /// The session dropped before an exit status arrived
    LostConnection,
    /// The reboot command failed
    Failed,
}

impl RebootState {
    /// Classify the result of running the reboot command.
    ///
    /// A device that goes down mid-command never reports an exit status, so
    /// that outcome counts as success.
    pub fn classify(result: &Result<(), CommandError>) -> Self {
        match result {
            Ok(()) => RebootState::Acknowledged,
            Err(e) if e.is_exit_missing() => RebootState::LostConnection,
            Err(_) => RebootState::Failed,
        }
    }

    /// Whether the run may still report success
    pub fn is_success(self) -> bool {
        !matches!(self, RebootState::Failed)
    }
}

impl fmt::Display for RebootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RebootState::NotRequested => "not requested",
            RebootState::Requested => "requested",
            RebootState::Acknowledged => "acknowledged",
            RebootState::LostConnection => "connection lost",
            RebootState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify() {
        assert_eq!(RebootState::classify(&Ok(())), RebootState::Acknowledged);
        assert_eq!(
            RebootState::classify(&Err(CommandError::ExitMissing)),
            RebootState::LostConnection
        );
        assert_eq!(
            RebootState::classify(&Err(CommandError::ExitStatus(1))),
            RebootState::Failed
        );
        assert_eq!(
            RebootState::classify(&Err(CommandError::Signal("KILL".into()))),
            RebootState::Failed
        );
        assert_eq!(
            RebootState::classify(&Err(CommandError::TimedOut(Duration::from_secs(1)))),
            RebootState::Failed
        );
    }

    #[test]
    fn test_success_states() {
        assert!(RebootState::NotRequested.is_success());
        assert!(RebootState::Acknowledged.is_success());
        assert!(RebootState::LostConnection.is_success());
        assert!(!RebootState::Failed.is_success());
    }
}
