//! Resize drift correction
//!
//! Re-layout after a resize makes the renderer report whatever page it
//! happens to land on. The stabilizer remembers the last location the reader
//! actually settled on, restores it once the re-layout reports in, and
//! swallows the relocation that restore produces.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Display capability the stabilizer calls to restore a location
pub trait Redisplay {
    /// Request that the host show `location`; the host reports back later
    /// with a `Relocated` event
    fn redisplay(&mut self, location: &str);
}

impl<F> Redisplay for F
where
    F: FnMut(&str),
{
    fn redisplay(&mut self, location: &str) {
        self(location)
    }
}

/// Events fired by the host into the stabilizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "cfi", rename_all = "lowercase")]
pub enum LocationEvent {
    Resized,
    Relocated(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizerState {
    #[default]
    Stable,
    /// A resize happened; the next relocation is layout churn
    JustResized,
    /// A restore was requested; the next relocation is its echo
    Correcting,
}

/// What handling one event did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "cfi", rename_all = "snake_case")]
pub enum Outcome {
    /// Relocation recorded as the stable location
    Adopted(String),
    /// Restore of the stable location requested
    Redisplayed(String),
    /// Relocation discarded as the echo of a restore
    Suppressed,
    /// Resize observed
    Reset,
}

/// Three-state machine guarding the reader's location across resizes
#[derive(Debug)]
pub struct LocationStabilizer<D> {
    state: StabilizerState,
    last_stable: Option<String>,
    display: D,
}

impl<D: Redisplay> LocationStabilizer<D> {
    pub fn new(display: D) -> Self {
        Self {
            state: StabilizerState::Stable,
            last_stable: None,
            display,
        }
    }

    pub fn state(&self) -> StabilizerState {
        self.state
    }

    /// Location the reader was last settled on
    pub fn last_stable_location(&self) -> Option<&str> {
        self.last_stable.as_deref()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn into_display(self) -> D {
        self.display
    }

    /// Process one event in arrival order
    pub fn handle(&mut self, event: LocationEvent) -> Outcome {
        let previous = self.state;
        let outcome = match event {
            LocationEvent::Resized => {
                self.state = StabilizerState::JustResized;
                Outcome::Reset
            }
            LocationEvent::Relocated(cfi) => self.relocated(cfi),
        };

        debug!(from = ?previous, to = ?self.state, outcome = ?outcome, "Location event handled");
        outcome
    }

    fn relocated(&mut self, cfi: String) -> Outcome {
        match self.state {
            StabilizerState::Stable => self.adopt(cfi),
            StabilizerState::JustResized => match self.last_stable.clone() {
                Some(location) => {
                    self.state = StabilizerState::Correcting;
                    self.display.redisplay(&location);
                    Outcome::Redisplayed(location)
                }
                None => {
                    warn!(cfi = %cfi, "Relocated after resize with no stable location, adopting it");
                    self.state = StabilizerState::Stable;
                    self.adopt(cfi)
                }
            },
            StabilizerState::Correcting => {
                self.state = StabilizerState::Stable;
                Outcome::Suppressed
            }
        }
    }

    fn adopt(&mut self, cfi: String) -> Outcome {
        self.last_stable = Some(cfi.clone());
        Outcome::Adopted(cfi)
    }

    /// Shorthand for `handle(LocationEvent::Resized)`
    pub fn on_resized(&mut self) -> Outcome {
        self.handle(LocationEvent::Resized)
    }

    /// Shorthand for `handle(LocationEvent::Relocated(..))`
    pub fn on_relocated(&mut self, cfi: impl Into<String>) -> Outcome {
        self.handle(LocationEvent::Relocated(cfi.into()))
    }
}
