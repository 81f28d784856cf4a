//! Reading location tracking
//!
//! The host renderer reports `Relocated` and `Resized` events. The
//! stabilizer decides which relocations reflect where the reader really is.

mod stabilizer;

pub use stabilizer::{LocationEvent, LocationStabilizer, Outcome, Redisplay, StabilizerState};
