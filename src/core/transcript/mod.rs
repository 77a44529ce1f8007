//! Transcript assembler.
//!
//! Merges interleaved partial/final text fragments per speaker role into a
//! stable, append-only ordered log. Partials are cumulative (each carries
//! the full text-so-far for the utterance), so applying one replaces the
//! open entry's text rather than appending.

use serde::{Deserialize, Serialize};

use crate::core::persona::Persona;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    /// The human caller.
    Caller,
    /// The remote agent.
    Agent,
}

/// One utterance in the log.
///
/// Created on the first fragment of a new utterance, mutated in place while
/// fragments for the same turn keep arriving, immutable once the turn closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    /// Speaker role.
    pub role: SpeakerRole,
    /// Current text for the utterance.
    pub text: String,
    /// Persona active when the entry opened (agent utterances only).
    pub persona: Option<Persona>,
}

/// Append-only transcript log with at most one open entry at a time.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    entries: Vec<TranscriptEntry>,
    turn_open: bool,
}

impl TranscriptAssembler {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a partial (cumulative) fragment.
    pub fn apply_partial(&mut self, role: SpeakerRole, text: String, persona: Option<Persona>) {
        self.upsert(role, text, persona);
        self.turn_open = true;
    }

    /// Apply a final fragment and close the turn.
    pub fn apply_final(&mut self, role: SpeakerRole, text: String, persona: Option<Persona>) {
        self.upsert(role, text, persona);
        self.turn_open = false;
    }

    /// Close any open entry so the next fragment opens a new one even for
    /// the same role.
    pub fn close_turn(&mut self) {
        self.turn_open = false;
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Owned copy of the log for UI consumption.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    /// Drop all entries (session end).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.turn_open = false;
    }

    // Replace the open same-role entry's text, or open a new entry. Entries
    // are never reordered and never merged across a role change; the persona
    // recorded at open time sticks.
    fn upsert(&mut self, role: SpeakerRole, text: String, persona: Option<Persona>) {
        match self.entries.last_mut() {
            Some(last) if self.turn_open && last.role == role => {
                last.text = text;
            }
            _ => {
                self.entries.push(TranscriptEntry {
                    role,
                    text,
                    persona,
                });
            }
        }
    }
}
