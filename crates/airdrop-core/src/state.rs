//! Campaign lifecycle state machine.
//!
//! ```text
//! Initialized -> Prepared -> Open -> { Expired, Restarting }
//!                            Open <- Restarting
//! ```
//!
//! `Expired` is terminal. Self-loops are never allowed: asking to move to the
//! current state is an [`StateError::InvalidTransition`].
//!
//! The machine itself holds no persistence. Owners that must persist a state
//! before it becomes observable use [`StateMachine::check`] to validate the
//! move, write the new state durably, then [`StateMachine::transition_to`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Lifecycle state of a campaign.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash,
    bincode::Encode, bincode::Decode,
)]
pub enum CampaignState {
    /// Constructed; collaborators not yet wired.
    #[serde(rename = "initialized")]
    Initialized,
    /// Setup complete; waiting for the claim window to open.
    #[serde(rename = "prepared")]
    Prepared,
    /// Claims are accepted.
    #[serde(rename = "claim-window-open")]
    Open,
    /// Claim window has closed for good.
    #[serde(rename = "claim-window-expired")]
    Expired,
    /// Reloaded after an upgrade; re-registering timers before reopening.
    #[serde(rename = "restarting")]
    Restarting,
}

impl CampaignState {
    /// The set of states reachable in one step from `self`.
    pub fn successors(self) -> &'static [CampaignState] {
        use CampaignState::*;
        match self {
            Initialized => &[Prepared],
            Prepared => &[Open],
            Open => &[Expired, Restarting],
            Restarting => &[Open],
            Expired => &[],
        }
    }

    /// Whether `next` is an allowed successor of `self`.
    pub fn can_transition_to(self, next: CampaignState) -> bool {
        self.successors().contains(&next)
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Stable wire name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Prepared => "prepared",
            Self::Open => "claim-window-open",
            Self::Expired => "claim-window-expired",
            Self::Restarting => "restarting",
        }
    }
}

impl fmt::Display for CampaignState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holds the current lifecycle state and enforces the transition table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateMachine {
    state: CampaignState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// A fresh machine in [`CampaignState::Initialized`].
    pub fn new() -> Self {
        Self {
            state: CampaignState::Initialized,
        }
    }

    /// Rebuild a machine at a previously persisted state.
    pub fn restore(state: CampaignState) -> Self {
        Self { state }
    }

    /// Current state. Pure read.
    pub fn status(&self) -> CampaignState {
        self.state
    }

    /// Validate a transition without applying it.
    pub fn check(&self, next: CampaignState) -> Result<(), StateError> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(StateError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    /// Apply a transition. Returns the previous state.
    pub fn transition_to(&mut self, next: CampaignState) -> Result<CampaignState, StateError> {
        self.check(next)?;
        let prev = self.state;
        self.state = next;
        Ok(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignState::*;

    const ALL: [CampaignState; 5] = [Initialized, Prepared, Open, Expired, Restarting];

    #[test]
    fn starts_initialized() {
        assert_eq!(StateMachine::new().status(), Initialized);
    }

    #[test]
    fn happy_path_to_expired() {
        let mut m = StateMachine::new();
        assert_eq!(m.transition_to(Prepared).unwrap(), Initialized);
        assert_eq!(m.transition_to(Open).unwrap(), Prepared);
        assert_eq!(m.transition_to(Expired).unwrap(), Open);
        assert!(m.status().is_terminal());
    }

    #[test]
    fn restart_cycle_returns_to_open() {
        let mut m = StateMachine::restore(Open);
        m.transition_to(Restarting).unwrap();
        m.transition_to(Open).unwrap();
        assert_eq!(m.status(), Open);
    }

    #[test]
    fn self_loops_rejected() {
        for s in ALL {
            let mut m = StateMachine::restore(s);
            assert_eq!(
                m.transition_to(s),
                Err(StateError::InvalidTransition { from: s, to: s })
            );
            assert_eq!(m.status(), s);
        }
    }

    #[test]
    fn cannot_skip_prepared() {
        let mut m = StateMachine::new();
        assert!(m.transition_to(Open).is_err());
        assert_eq!(m.status(), Initialized);
    }

    #[test]
    fn expired_is_terminal() {
        for s in ALL {
            assert!(!Expired.can_transition_to(s));
        }
    }

    #[test]
    fn restarting_only_reopens() {
        assert_eq!(Restarting.successors(), &[Open]);
    }

    #[test]
    fn failed_transition_leaves_state() {
        let mut m = StateMachine::restore(Prepared);
        assert!(m.transition_to(Expired).is_err());
        assert_eq!(m.status(), Prepared);
    }

    #[test]
    fn display_matches_serde_names() {
        for s in ALL {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
    }
}
