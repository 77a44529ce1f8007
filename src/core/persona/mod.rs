//! Persona state machine.
//!
//! Tracks which persona is speaking and whether an emergency is active. The
//! active persona selects the synthesized voice identity and the label the
//! UI attaches to subsequent agent utterances; switches take effect for the
//! next utterance, never retroactively.

use serde::{Deserialize, Serialize};

/// Which behavioral/voice profile the agent presents as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// General receptionist.
    Default,
    /// Emergency dispatch specialist.
    Emergency,
}

/// Display label and synthesized voice identity for one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    /// Label shown next to agent utterances.
    pub label: String,
    /// Voice identity requested from the remote agent.
    pub voice: String,
}

/// Session-wide persona state, mutated only by the tool-call dispatcher.
#[derive(Debug, Clone)]
pub struct PersonaState {
    active: Persona,
    emergency_active: bool,
    default_profile: PersonaProfile,
    emergency_profile: PersonaProfile,
}

impl PersonaState {
    /// Create the state machine in its initial `Default` persona.
    pub fn new(default_profile: PersonaProfile, emergency_profile: PersonaProfile) -> Self {
        Self {
            active: Persona::Default,
            emergency_active: false,
            default_profile,
            emergency_profile,
        }
    }

    /// Apply `set_emergency_status`.
    ///
    /// Idempotent: re-applying the current value changes nothing. Returns
    /// whether a transition actually happened.
    pub fn set_emergency(&mut self, active: bool) -> bool {
        if self.emergency_active == active {
            return false;
        }
        self.emergency_active = active;
        self.active = if active {
            Persona::Emergency
        } else {
            Persona::Default
        };
        true
    }

    /// Reset to the initial state (session end).
    pub fn reset(&mut self) {
        self.active = Persona::Default;
        self.emergency_active = false;
    }

    /// Currently active persona.
    pub fn active(&self) -> Persona {
        self.active
    }

    /// Whether an emergency is flagged.
    pub fn emergency_active(&self) -> bool {
        self.emergency_active
    }

    /// Profile for the active persona; determines the voice and label for
    /// the next agent utterance.
    pub fn active_profile(&self) -> &PersonaProfile {
        match self.active {
            Persona::Default => &self.default_profile,
            Persona::Emergency => &self.emergency_profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> PersonaState {
        PersonaState::new(
            PersonaProfile {
                label: "Chloe".to_string(),
                voice: "Kore".to_string(),
            },
            PersonaProfile {
                label: "Sam".to_string(),
                voice: "Zephyr".to_string(),
            },
        )
    }

    #[test]
    fn test_initial_state_is_default() {
        let state = state();
        assert_eq!(state.active(), Persona::Default);
        assert!(!state.emergency_active());
        assert_eq!(state.active_profile().voice, "Kore");
    }

    #[test]
    fn test_emergency_transition_and_back() {
        let mut state = state();

        assert!(state.set_emergency(true));
        assert_eq!(state.active(), Persona::Emergency);
        assert!(state.emergency_active());
        assert_eq!(state.active_profile().label, "Sam");

        assert!(state.set_emergency(false));
        assert_eq!(state.active(), Persona::Default);
        assert!(!state.emergency_active());
    }

    #[test]
    fn test_set_emergency_is_idempotent() {
        let mut state = state();

        assert!(state.set_emergency(true));
        let snapshot = state.clone();
        assert!(!state.set_emergency(true));

        assert_eq!(state.active(), snapshot.active());
        assert_eq!(state.emergency_active(), snapshot.emergency_active());
    }

    #[test]
    fn test_reset_clears_emergency() {
        let mut state = state();
        state.set_emergency(true);
        state.reset();

        assert_eq!(state.active(), Persona::Default);
        assert!(!state.emergency_active());
    }
}
