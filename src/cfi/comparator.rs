//! CFI Comparison and Ordering
//!
//! Orders CFIs that share a base path by document position. Id assertions
//! take part in step equality but never in ordering.

use std::cmp::Ordering;

use super::error::{CfiError, Result};
use super::types::*;

/// Step identity: kind, index and id must match, assertions are ignored
pub fn equal_step(a: &CfiStep, b: &CfiStep) -> bool {
    a.kind == b.kind && a.index == b.index && a.id == b.id
}

/// Base steps match when indices agree and no pair carries conflicting ids
fn same_base_step(a: &CfiStep, b: &CfiStep) -> bool {
    if a.index != b.index {
        return false;
    }
    match (&a.id, &b.id) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Fail with `IncomparableBase` unless both CFIs address the same container
pub fn ensure_same_base(a: &Cfi, b: &Cfi) -> Result<()> {
    let matches = a.base.steps.len() == b.base.steps.len()
        && a
            .base
            .steps
            .iter()
            .zip(&b.base.steps)
            .all(|(x, y)| same_base_step(x, y));

    if matches {
        Ok(())
    } else {
        Err(CfiError::IncomparableBase {
            left: segment_string(&a.base),
            right: segment_string(&b.base),
        })
    }
}

/// Compare two sequences of CFI steps by index
fn compare_steps(a: &[CfiStep], b: &[CfiStep]) -> Ordering {
    for (step_a, step_b) in a.iter().zip(b.iter()) {
        let cmp = step_a.index.cmp(&step_b.index);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    // If all compared steps are equal, the shorter path is the ancestor
    a.len().cmp(&b.len())
}

fn bias_rank(bias: Option<SideBias>) -> u8 {
    match bias {
        Some(SideBias::Before) => 0,
        None => 1,
        Some(SideBias::After) => 2,
    }
}

fn compare_terminals(a: Option<&Terminal>, b: Option<&Terminal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a
            .offset
            .cmp(&b.offset)
            .then_with(|| bias_rank(a.side_bias).cmp(&bias_rank(b.side_bias))),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Order two point paths within the same content document
pub fn compare_paths(a: &CfiPath, b: &CfiPath) -> Ordering {
    compare_steps(&a.steps, &b.steps)
        .then_with(|| compare_terminals(a.terminal.as_ref(), b.terminal.as_ref()))
}

/// Compare two CFIs in document order
///
/// Ranges are ordered by their start point.
pub fn compare(a: &Cfi, b: &Cfi) -> Result<Ordering> {
    ensure_same_base(a, b)?;
    let a = a.start_point()?;
    let b = b.start_point()?;
    Ok(compare_paths(&a.path, &b.path))
}

/// Determine if CFI `a` comes before CFI `b` in reading order
pub fn is_before(a: &Cfi, b: &Cfi) -> Result<bool> {
    Ok(compare(a, b)? == Ordering::Less)
}

/// Determine if CFI `a` comes after CFI `b` in reading order
pub fn is_after(a: &Cfi, b: &Cfi) -> Result<bool> {
    Ok(compare(a, b)? == Ordering::Greater)
}

/// Check if a CFI falls within a range (inclusive on both ends)
pub fn is_in_range(cfi: &Cfi, start: &Cfi, end: &Cfi) -> Result<bool> {
    Ok(compare(cfi, start)? != Ordering::Less && compare(cfi, end)? != Ordering::Greater)
}

/// Compare two CFI strings, returning their ordering
pub fn compare_cfi_strings(a: &str, b: &str) -> Result<Ordering> {
    let cfi_a = super::parser::parse(a)?;
    let cfi_b = super::parser::parse(b)?;
    compare(&cfi_a, &cfi_b)
}

/// Sort CFIs sharing one base into document order
pub fn sort_by_document_order(cfis: &mut [Cfi]) -> Result<()> {
    let Some(first) = cfis.first() else {
        return Ok(());
    };
    for cfi in cfis.iter() {
        ensure_same_base(first, cfi)?;
    }

    let mut keyed = cfis
        .iter()
        .map(|cfi| cfi.start_point().map(|point| (point.path, cfi.clone())))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|(a, _), (b, _)| compare_paths(a, b));

    for (slot, (_, cfi)) in cfis.iter_mut().zip(keyed) {
        *slot = cfi;
    }
    Ok(())
}
