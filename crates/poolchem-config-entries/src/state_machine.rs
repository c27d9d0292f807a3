//! Config entry lifecycle transitions
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//!                                      ↘ FailedUnload (terminal)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    /// Return `to` if the lifecycle allows moving there from `self`
    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let valid = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded)
                | (SetupInProgress, SetupError)
                | (SetupError, SetupInProgress)
                | (SetupError, UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded)
                | (UnloadInProgress, FailedUnload)
        );

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_setup_path() {
        assert_eq!(NotLoaded.try_transition(SetupInProgress), Ok(SetupInProgress));
        assert!(SetupInProgress.can_transition_to(Loaded));
        assert!(SetupInProgress.can_transition_to(SetupError));
        assert!(SetupError.can_transition_to(SetupInProgress));
    }

    #[test]
    fn test_unload_path() {
        assert!(Loaded.can_transition_to(UnloadInProgress));
        assert!(SetupError.can_transition_to(UnloadInProgress));
        assert!(UnloadInProgress.can_transition_to(NotLoaded));
        assert!(UnloadInProgress.can_transition_to(FailedUnload));
    }

    #[test]
    fn test_shortcuts_rejected() {
        assert!(!NotLoaded.can_transition_to(Loaded));
        assert!(!Loaded.can_transition_to(NotLoaded));
        assert!(!Loaded.can_transition_to(SetupInProgress));
        assert!(!UnloadInProgress.can_transition_to(Loaded));
        assert_eq!(
            Loaded.try_transition(NotLoaded),
            Err(InvalidTransition {
                from: Loaded,
                to: NotLoaded
            })
        );
    }

    #[test]
    fn test_failed_unload_is_terminal() {
        for to in [NotLoaded, SetupInProgress, Loaded, SetupError, UnloadInProgress] {
            assert!(!FailedUnload.can_transition_to(to));
        }
    }
}
