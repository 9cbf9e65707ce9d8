/// Traversal state definitions for one directory URL
///
/// Each directory visited by the crawler moves through these states in order.
/// A unit whose listing could not be fetched, or a root-mode unit that never
/// fetches a listing, jumps straight from `Fetching` to `SpawningChildren`.
use std::fmt;

/// Represents the current state of a traversal unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// Listing page is being requested
    Fetching,

    /// Listing HTML is being turned into file and directory records
    Parsing,

    /// Files of this directory are being checked and downloaded
    ProcessingFiles,

    /// One task per subdirectory is being spawned
    SpawningChildren,

    /// Waiting for every spawned child to finish
    JoiningChildren,

    /// The unit and all of its descendants are finished
    Done,
}

impl TraversalState {
    /// Returns true if this is the terminal state
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if a unit may move from `self` to `next`
    pub fn can_transition_to(&self, next: TraversalState) -> bool {
        matches!(
            (self, next),
            (Self::Fetching, Self::Parsing)
                | (Self::Fetching, Self::SpawningChildren)
                | (Self::Parsing, Self::ProcessingFiles)
                | (Self::ProcessingFiles, Self::SpawningChildren)
                | (Self::SpawningChildren, Self::JoiningChildren)
                | (Self::JoiningChildren, Self::Done)
        )
    }

    /// Short lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::ProcessingFiles => "processing_files",
            Self::SpawningChildren => "spawning_children",
            Self::JoiningChildren => "joining_children",
            Self::Done => "done",
        }
    }

    /// Returns all states in traversal order
    #[cfg(test)]
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Fetching,
            Self::Parsing,
            Self::ProcessingFiles,
            Self::SpawningChildren,
            Self::JoiningChildren,
            Self::Done,
        ]
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(TraversalState::Done.is_terminal());

        for state in TraversalState::all_states() {
            if state != TraversalState::Done {
                assert!(!state.is_terminal(), "{} should not be terminal", state);
            }
        }
    }

    #[test]
    fn test_full_sequence_is_valid() {
        let states = TraversalState::all_states();
        for pair in states.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_degraded_shortcut() {
        assert!(TraversalState::Fetching.can_transition_to(TraversalState::SpawningChildren));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!TraversalState::Done.can_transition_to(TraversalState::Fetching));
        assert!(!TraversalState::Parsing.can_transition_to(TraversalState::Done));
        assert!(!TraversalState::JoiningChildren.can_transition_to(TraversalState::Parsing));
        assert!(!TraversalState::Fetching.can_transition_to(TraversalState::Fetching));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TraversalState::Fetching), "fetching");
        assert_eq!(
            format!("{}", TraversalState::ProcessingFiles),
            "processing_files"
        );
        assert_eq!(format!("{}", TraversalState::Done), "done");
    }

    #[test]
    fn test_all_states_complete() {
        let all = TraversalState::all_states();
        assert_eq!(all.len(), 6);

        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j], "Duplicate state found");
            }
        }
    }
}
