//! CFI (Canonical Fragment Identifier) module for EPUB
//!
//! This module provides parsing, serialization, comparison and range
//! synthesis of EPUB CFI strings.
//!
//! # Overview
//!
//! EPUB CFI is a standardized way to reference specific locations within EPUB publications.
//! It uses a path-based syntax similar to XPath but designed specifically for EPUBs.
//! Every operation here is a pure function of its inputs.
//!
//! # Example CFI
//!
//! ```text
//! epubcfi(/6/4[chapter1]!/4/2/1:42)
//!         │  │          │ │ │ │ └── character offset 42
//!         │  │          │ │ │ └──── text node (odd = text)
//!         │  │          │ │ └────── element index
//!         │  │          │ └──────── element index (body)
//!         │  │          └────────── indirection (into content doc)
//!         │  └───────────────────── spine item with ID
//!         └──────────────────────── spine element
//! ```
//!
//! A range keeps the shared steps once and lists both tails:
//!
//! ```text
//! epubcfi(/6/4!/4/2,/2:0,/4:3)
//!                  │    └──── end, relative to /4/2
//!                  └───────── start, relative to /4/2
//! ```
//!
//! # Usage
//!
//! ```
//! use std::cmp::Ordering;
//! use reader_cfi::cfi::{compare, make_range_identifier, parse};
//!
//! let a = parse("epubcfi(/6/4!/4/2/1:10)").unwrap();
//! let b = parse("epubcfi(/6/4!/4/2/1:20)").unwrap();
//! assert_eq!(compare(&a, &b).unwrap(), Ordering::Less);
//!
//! let range = make_range_identifier(
//!     "epubcfi(/6/4!/4/2/2:0)",
//!     "epubcfi(/6/4!/4/2/4:3)",
//! )
//! .unwrap();
//! assert_eq!(range, "epubcfi(/6/4!/4/2,/2:0,/4:3)");
//! ```

mod comparator;
mod error;
mod generator;
mod parser;
mod types;

// Re-export main types
pub use types::{
    segment_string, Cfi, CfiPath, CfiRange, CfiStep, CollapseSide, SideBias, StepKind, Terminal,
    TextAssertion,
};

pub use error::{CfiError, Result};

// Re-export parser functions
pub use parser::{parse, try_parse};

// Re-export generator
pub use generator::{generate_cfi, make_range, make_range_identifier, CfiBuilder};

// Re-export comparator functions
pub use comparator::{
    compare, compare_cfi_strings, compare_paths, ensure_same_base, equal_step, is_after,
    is_before, is_in_range, sort_by_document_order,
};

/// Reduce a range to the requested endpoint; points are returned unchanged
pub fn collapse(cfi: &Cfi, side: CollapseSide) -> Result<Cfi> {
    cfi.collapse(side)
}
