//! Reader CFI Library
//!
//! Location addressing for EPUB reader applications.
//!
//! # Modules
//!
//! - `cfi`: Parsing, ordering and range synthesis of EPUB CFIs
//! - `location`: Resize drift correction for the reader's current location
//! - `config`: Environment-driven settings for the command line tool
//! - `error`: Error type for the command line tool

pub mod cfi;
pub mod config;
pub mod error;
pub mod location;
