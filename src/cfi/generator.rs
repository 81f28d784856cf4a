//! CFI Generator
//!
//! Builds CFIs from document positions and synthesizes range CFIs for text
//! selections by factoring out the steps both endpoints share.

use tracing::debug;

use super::comparator::{ensure_same_base, equal_step};
use super::error::{CfiError, Result};
use super::parser::parse;
use super::types::*;

/// Builder for constructing CFIs programmatically
///
/// Steps added before [`CfiBuilder::indirection`] go into the base path,
/// later steps into the content document path. An index that does not fit a
/// step is kept as an error and reported by [`CfiBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct CfiBuilder {
    base: CfiPath,
    path: CfiPath,
    indirected: bool,
    error: Option<CfiError>,
}

impl CfiBuilder {
    /// Create a new CFI builder
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut CfiPath {
        if self.indirected {
            &mut self.path
        } else {
            &mut self.base
        }
    }

    fn push(mut self, step: CfiStep) -> Self {
        self.current().push(step);
        self
    }

    fn push_index(
        mut self,
        index: usize,
        cfi_index: Option<u32>,
        step: impl FnOnce(u32) -> CfiStep,
    ) -> Self {
        match cfi_index {
            Some(cfi_index) => self.push(step(cfi_index)),
            None => {
                if self.error.is_none() {
                    let position = self.current().steps.len();
                    self.error = Some(CfiError::InvalidStepIndex {
                        token: index.to_string(),
                        position,
                    });
                }
                self
            }
        }
    }

    /// Add a step to the package document (/6 is the spine in EPUB 3)
    pub fn package_step(self) -> Self {
        self.push(CfiStep::element(6))
    }

    /// Add a spine item step (converts 0-based index to CFI format)
    /// CFI uses 1-based even numbering: index 0 -> /2, index 1 -> /4, etc.
    pub fn spine_item(self, index: usize) -> Self {
        self.push_index(index, even_index(index), CfiStep::element)
    }

    /// Add a spine item step with ID assertion
    pub fn spine_item_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.push_index(index, even_index(index), |i| CfiStep::element_with_id(i, id))
    }

    /// Switch from the package document into the content document
    pub fn indirection(mut self) -> Self {
        self.indirected = true;
        self
    }

    /// Add an element step within the content document
    /// Uses 1-based even numbering: index 0 -> /2, index 1 -> /4, etc.
    pub fn element(self, index: usize) -> Self {
        self.push_index(index, even_index(index), CfiStep::element)
    }

    /// Add a step with raw CFI index (for when you have the actual CFI value)
    pub fn element_raw(self, cfi_index: u32) -> Self {
        self.push(CfiStep::new(cfi_index))
    }

    /// Add an element step with ID assertion
    pub fn element_with_id(self, index: usize, id: impl Into<String>) -> Self {
        self.push_index(index, even_index(index), |i| CfiStep::element_with_id(i, id))
    }

    /// Add a text node step (odd numbers for text nodes)
    /// Text nodes use 1-based odd numbering: first text -> /1, second text -> /3, etc.
    pub fn text_node(self, index: usize) -> Self {
        self.push_index(index, odd_index(index), CfiStep::text)
    }

    /// Set the character offset within a text node
    pub fn character_offset(mut self, offset: u32) -> Self {
        self.current().set_character_offset(offset);
        self
    }

    /// Set the character offset with text assertion for validation
    pub fn character_offset_with_assertion(
        mut self,
        offset: u32,
        prefix: Option<String>,
        suffix: Option<String>,
    ) -> Self {
        let mut terminal = Terminal::offset(offset);
        terminal.assertion = Some(TextAssertion { prefix, suffix });
        self.current().terminal = Some(terminal);
        self
    }

    /// Lean the offset towards the content before or after it
    pub fn side_bias(mut self, bias: SideBias) -> Self {
        let terminal = self.current().terminal.get_or_insert(Terminal::offset(0));
        terminal.side_bias = Some(bias);
        self
    }

    /// Build the final CFI, checking it against the grammar
    pub fn build(self) -> Result<Cfi> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let cfi = Cfi::new(self.base, self.path);
        parse(&cfi.to_string())
    }
}

fn even_index(index: usize) -> Option<u32> {
    let cfi_index = index.checked_add(1)?.checked_mul(2)?;
    u32::try_from(cfi_index).ok()
}

fn odd_index(index: usize) -> Option<u32> {
    let cfi_index = index.checked_mul(2)?.checked_add(1)?;
    u32::try_from(cfi_index).ok()
}

/// Generate a CFI for a position in a spine item
///
/// # Arguments
/// * `spine_index` - 0-based index of the spine item
/// * `element_path` - Path of element indices within the content document
/// * `text_node_index` - Index of the text node within the final element (0-based)
/// * `char_offset` - Character offset within the text node
///
/// # Example
/// ```
/// use reader_cfi::cfi::generate_cfi;
///
/// // Character 42 in the first text node of the first paragraph in chapter 2
/// let cfi = generate_cfi(1, &[0], 0, 42).unwrap();
/// assert_eq!(cfi.to_string(), "epubcfi(/6/4!/2/2/1:42)");
/// ```
pub fn generate_cfi(
    spine_index: usize,
    element_path: &[usize],
    text_node_index: usize,
    char_offset: u32,
) -> Result<Cfi> {
    let mut builder = CfiBuilder::new()
        .package_step()
        .spine_item(spine_index)
        .indirection()
        .element(0); // body

    for &idx in element_path {
        builder = builder.element(idx);
    }

    builder
        .text_node(text_node_index)
        .character_offset(char_offset)
        .build()
}

/// Span two points with a range CFI
///
/// Steps shared by both points become the common path; the remainders keep
/// their own terminals. When `a` and `b` address the same position the
/// result is the point `a` rather than an empty range. Range inputs
/// contribute their start (`a`) or end (`b`) point.
pub fn make_range(a: &Cfi, b: &Cfi) -> Result<Cfi> {
    ensure_same_base(a, b)?;
    let a = a.start_point()?;
    let b = b.end_point()?;

    let steps_a = &a.path.steps;
    let steps_b = &b.path.steps;
    let common_len = steps_a
        .iter()
        .zip(steps_b.iter())
        .take_while(|(x, y)| equal_step(x, y))
        .count();

    if common_len == steps_a.len()
        && common_len == steps_b.len()
        && a.path.terminal == b.path.terminal
    {
        debug!(cfi = %a, "Range endpoints address the same point");
        return Ok(a);
    }

    let common = CfiPath::with_steps(steps_a[..common_len].to_vec());
    let start = CfiPath {
        steps: steps_a[common_len..].to_vec(),
        terminal: a.path.terminal.clone(),
    };
    let end = CfiPath {
        steps: steps_b[common_len..].to_vec(),
        terminal: b.path.terminal.clone(),
    };

    debug!(
        common_steps = common_len,
        start_steps = start.steps.len(),
        end_steps = end.steps.len(),
        "Synthesized range CFI"
    );

    Ok(Cfi::with_range(a.base, common, CfiRange { start, end }))
}

/// Parse two point CFIs and return the canonical string of the range spanning them
pub fn make_range_identifier(a: &str, b: &str) -> Result<String> {
    let a = parse(a)?;
    let b = parse(b)?;
    Ok(make_range(&a, &b)?.to_string())
}
