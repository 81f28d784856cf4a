//! CFI (Canonical Fragment Identifier) types for EPUB
//!
//! An identifier is split at the indirection marker into a base path (the
//! spine item reference in the package document) and a path inside the
//! content document. Ranges factor the common part of both endpoints into
//! `path` and keep the divergent tails in `start` and `end`.
//!
//! Format: epubcfi(/6/4[chap01ref]!/4/2/22/3:268)
//!
//! Reference: <https://idpf.org/epub/linking/cfi/epub-cfi.html>

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{CfiError, Result};

/// Characters that must be escaped with `^` inside brackets
const SPECIAL_CHARS: &[char] = &['^', '[', ']', '(', ')', ',', ';', '='];

/// A complete EPUB CFI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfi {
    /// Steps before the indirection (package document)
    pub base: CfiPath,
    /// Point path, or the common prefix of a range
    pub path: CfiPath,
    /// Divergent suffixes when this CFI is a range
    pub range: Option<CfiRange>,
}

/// A CFI path (sequence of steps)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiPath {
    /// Steps in this path
    pub steps: Vec<CfiStep>,
    /// Offset and assertions attached to the last step
    pub terminal: Option<Terminal>,
}

/// A CFI range (for text selections)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiRange {
    /// Start of the range (relative path from common ancestor)
    pub start: CfiPath,
    /// End of the range (relative path from common ancestor)
    pub end: CfiPath,
}

/// A single step in a CFI path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfiStep {
    pub kind: StepKind,
    /// Child index; even for elements, odd for text positions
    pub index: u32,
    /// Optional ID assertion [id]
    pub id: Option<String>,
}

/// Type of CFI step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Element child (/2, /4, ...)
    Element,
    /// Text position between elements (/1, /3, ...)
    Text,
}

/// Offset plus assertions on the final step of a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    /// Character offset (0-based)
    pub offset: u32,
    /// Optional text assertion for validation
    pub assertion: Option<TextAssertion>,
    pub side_bias: Option<SideBias>,
    /// Additional `;key=value` parameters other than the side bias
    pub parameters: Vec<(String, String)>,
}

/// Text location assertion for disambiguation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAssertion {
    /// Text before the location
    pub prefix: Option<String>,
    /// Text after the location
    pub suffix: Option<String>,
}

/// Which side of an offset the location leans towards (`;s=b` / `;s=a`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideBias {
    Before,
    After,
}

/// Endpoint picked when a range is reduced to a point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseSide {
    Start,
    #[default]
    End,
}

impl Cfi {
    /// Create a point CFI
    pub fn new(base: CfiPath, path: CfiPath) -> Self {
        Self {
            base,
            path,
            range: None,
        }
    }

    /// Create a range CFI from a common path and two suffixes
    pub fn with_range(base: CfiPath, path: CfiPath, range: CfiRange) -> Self {
        Self {
            base,
            path,
            range: Some(range),
        }
    }

    /// Check if this CFI represents a range (text selection)
    pub fn is_range(&self) -> bool {
        self.range.is_some()
    }

    /// Get the spine index if the base references a spine item
    pub fn spine_index(&self) -> Option<u32> {
        // Standard EPUB CFI format: /6/N where N is 2*(spine_index+1)
        match self.base.steps.as_slice() {
            [spine, item, ..] if spine.index == 6 && item.index >= 2 && item.index % 2 == 0 =>
            {
                Some(item.index / 2 - 1)
            }
            _ => None,
        }
    }

    /// Reduce a range to one of its endpoints; points are returned unchanged
    pub fn collapse(&self, side: CollapseSide) -> Result<Cfi> {
        let Some(range) = &self.range else {
            return Ok(self.clone());
        };

        let endpoint = match side {
            CollapseSide::Start => &range.start,
            CollapseSide::End => &range.end,
        };

        let mut steps = self.path.steps.clone();
        steps.extend(endpoint.steps.iter().cloned());
        if steps.is_empty() {
            return Err(CfiError::EmptyRangeCollapse(self.to_string()));
        }

        Ok(Cfi::new(
            self.base.clone(),
            CfiPath {
                steps,
                terminal: endpoint.terminal.clone(),
            },
        ))
    }

    /// Start point of a range, or the point itself
    pub fn start_point(&self) -> Result<Cfi> {
        self.collapse(CollapseSide::Start)
    }

    /// End point of a range, or the point itself
    pub fn end_point(&self) -> Result<Cfi> {
        self.collapse(CollapseSide::End)
    }
}

impl FromStr for Cfi {
    type Err = CfiError;

    fn from_str(s: &str) -> Result<Self> {
        super::parser::parse(s)
    }
}

impl CfiPath {
    /// Create an empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a path with steps
    pub fn with_steps(steps: Vec<CfiStep>) -> Self {
        Self {
            steps,
            terminal: None,
        }
    }

    /// Add a step to the path
    pub fn push(&mut self, step: CfiStep) {
        self.steps.push(step);
    }

    /// Set the character offset
    pub fn set_character_offset(&mut self, offset: u32) {
        self.terminal = Some(Terminal::offset(offset));
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.terminal.is_none()
    }
}

impl CfiStep {
    /// Create a step from a raw index, deriving the kind from its parity
    pub fn new(index: u32) -> Self {
        Self {
            kind: StepKind::from_index(index),
            index,
            id: None,
        }
    }

    /// Create an element step
    pub fn element(index: u32) -> Self {
        Self {
            kind: StepKind::Element,
            index,
            id: None,
        }
    }

    /// Create an element step with ID assertion
    pub fn element_with_id(index: u32, id: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Element,
            index,
            id: Some(id.into()),
        }
    }

    /// Create a text position step
    pub fn text(index: u32) -> Self {
        Self {
            kind: StepKind::Text,
            index,
            id: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == StepKind::Text
    }
}

impl StepKind {
    /// Odd indices address text between elements
    pub fn from_index(index: u32) -> Self {
        if index % 2 == 1 {
            StepKind::Text
        } else {
            StepKind::Element
        }
    }
}

impl Terminal {
    /// A bare character offset
    pub fn offset(offset: u32) -> Self {
        Self {
            offset,
            assertion: None,
            side_bias: None,
            parameters: Vec::new(),
        }
    }

    fn has_bracket(&self) -> bool {
        self.assertion.is_some() || self.side_bias.is_some() || !self.parameters.is_empty()
    }
}

impl FromStr for CollapseSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(CollapseSide::Start),
            "end" => Ok(CollapseSide::End),
            other => Err(format!("unknown collapse side '{}', expected start or end", other)),
        }
    }
}

impl fmt::Display for CollapseSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseSide::Start => write!(f, "start"),
            CollapseSide::End => write!(f, "end"),
        }
    }
}

/// Serialize a path or base segment to its canonical text
pub fn segment_string(path: &CfiPath) -> String {
    path.to_string()
}

/// Escape special characters with `^`
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            out.push('^');
        }
        out.push(ch);
    }
    out
}

// Display implementations for serialization

impl fmt::Display for Cfi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epubcfi({}!{}", self.base, self.path)?;
        if let Some(ref range) = self.range {
            write!(f, ",{},{}", range.start, range.end)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for CfiPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step)?;
        }
        if let Some(ref terminal) = self.terminal {
            write!(f, "{}", terminal)?;
        }
        Ok(())
    }
}

impl fmt::Display for CfiStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.index)?;
        if let Some(ref id) = self.id {
            write!(f, "[{}]", escape(id))?;
        }
        Ok(())
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.offset)?;
        if !self.has_bracket() {
            return Ok(());
        }

        write!(f, "[")?;
        if let Some(ref assertion) = self.assertion {
            write!(f, "{}", assertion)?;
        }
        if let Some(bias) = self.side_bias {
            let code = match bias {
                SideBias::Before => "b",
                SideBias::After => "a",
            };
            write!(f, ";s={}", code)?;
        }
        for (key, value) in &self.parameters {
            write!(f, ";{}={}", escape(key), escape(value))?;
        }
        write!(f, "]")
    }
}

impl fmt::Display for TextAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, "{}", escape(prefix))?;
        }
        if let Some(ref suffix) = self.suffix {
            write!(f, ",{}", escape(suffix))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(base: &[u32], path: &[u32]) -> Cfi {
        Cfi::new(
            CfiPath::with_steps(base.iter().copied().map(CfiStep::new).collect()),
            CfiPath::with_steps(path.iter().copied().map(CfiStep::new).collect()),
        )
    }

    #[test]
    fn test_simple_cfi_display() {
        let cfi = point(&[6, 4], &[4, 2]);
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2)");
    }

    #[test]
    fn test_cfi_with_id_assertion() {
        let cfi = Cfi::new(
            CfiPath::with_steps(vec![
                CfiStep::element(6),
                CfiStep::element_with_id(4, "chapter1"),
            ]),
            CfiPath::with_steps(vec![CfiStep::element(4)]),
        );

        assert_eq!(cfi.to_string(), "epubcfi(/6/4[chapter1]!/4)");
    }

    #[test]
    fn test_cfi_with_character_offset() {
        let mut cfi = point(&[6, 4], &[4, 2, 1]);
        cfi.path.set_character_offset(42);
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2/1:42)");
    }

    #[test]
    fn test_terminal_with_assertion_and_side_bias() {
        let mut cfi = point(&[6, 4], &[4, 2, 1]);
        cfi.path.terminal = Some(Terminal {
            offset: 3,
            assertion: Some(TextAssertion {
                prefix: Some("yes, no".to_string()),
                suffix: None,
            }),
            side_bias: Some(SideBias::After),
            parameters: Vec::new(),
        });

        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2/1:3[yes^, no;s=a])");
    }

    #[test]
    fn test_range_display() {
        let mut start = CfiPath::with_steps(vec![CfiStep::element(2)]);
        start.set_character_offset(0);
        let mut end = CfiPath::with_steps(vec![CfiStep::element(4)]);
        end.set_character_offset(3);

        let base = point(&[6, 4], &[4, 2]);
        let cfi = Cfi::with_range(base.base, base.path, CfiRange { start, end });
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/2:0,/4:3)");
    }

    #[test]
    fn test_step_kind_follows_parity() {
        assert_eq!(CfiStep::new(4).kind, StepKind::Element);
        assert_eq!(CfiStep::new(3).kind, StepKind::Text);
        assert!(CfiStep::new(1).is_text());
    }

    #[test]
    fn test_spine_index_extraction() {
        // /6/4 means spine item at index 1 (4/2 - 1 = 1)
        assert_eq!(point(&[6, 4], &[4]).spine_index(), Some(1));
        assert_eq!(point(&[6, 2], &[4]).spine_index(), Some(0));
        assert_eq!(point(&[8, 2], &[4]).spine_index(), None);
        assert_eq!(point(&[6, 0], &[4]).spine_index(), None);
        assert_eq!(point(&[6, 3], &[4]).spine_index(), None);
    }

    #[test]
    fn test_collapse_point_is_unchanged() {
        let cfi = point(&[6, 4], &[4, 2]);
        assert_eq!(cfi.collapse(CollapseSide::End).unwrap(), cfi);
        assert_eq!(cfi.collapse(CollapseSide::Start).unwrap(), cfi);
    }

    #[test]
    fn test_collapse_range_endpoints() {
        let mut start = CfiPath::with_steps(vec![CfiStep::element(2)]);
        start.set_character_offset(0);
        let mut end = CfiPath::with_steps(vec![CfiStep::element(4)]);
        end.set_character_offset(3);
        let base = point(&[6, 4], &[4, 2]);
        let range = Cfi::with_range(base.base, base.path, CfiRange { start, end });

        assert_eq!(
            range.end_point().unwrap().to_string(),
            "epubcfi(/6/4!/4/2/4:3)"
        );
        assert_eq!(
            range.start_point().unwrap().to_string(),
            "epubcfi(/6/4!/4/2/2:0)"
        );
        assert_eq!(
            range.collapse(CollapseSide::default()).unwrap(),
            range.end_point().unwrap()
        );
    }

    #[test]
    fn test_collapse_empty_endpoint_fails() {
        let base = point(&[6, 4], &[]);
        let range = Cfi::with_range(
            base.base,
            base.path,
            CfiRange {
                start: CfiPath::new(),
                end: CfiPath::new(),
            },
        );

        assert!(matches!(
            range.collapse(CollapseSide::End),
            Err(CfiError::EmptyRangeCollapse(_))
        ));
    }

    #[test]
    fn test_collapse_side_from_str() {
        assert_eq!("start".parse::<CollapseSide>(), Ok(CollapseSide::Start));
        assert_eq!("END".parse::<CollapseSide>(), Ok(CollapseSide::End));
        assert!("middle".parse::<CollapseSide>().is_err());
    }
}
