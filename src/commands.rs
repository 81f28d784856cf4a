//! Subcommand implementations
//!
//! Each command writes its result to `out` in the configured format.

use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::io::{BufRead, Write};

use reader_cfi::cfi::{self, Cfi, CollapseSide};
use reader_cfi::config::OutputFormat;
use reader_cfi::error::{AppError, Result};
use reader_cfi::location::{LocationEvent, LocationStabilizer, Outcome, StabilizerState};

fn emit_json<W: Write>(out: &mut W, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn ordering_name(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Less => "less",
        Ordering::Equal => "equal",
        Ordering::Greater => "greater",
    }
}

pub fn parse<W: Write>(input: &str, format: OutputFormat, out: &mut W) -> Result<()> {
    let cfi = cfi::parse(input)?;
    match format {
        OutputFormat::Json => emit_json(out, &cfi),
        OutputFormat::Text => {
            writeln!(out, "cfi:   {}", cfi)?;
            writeln!(out, "base:  {}", cfi::segment_string(&cfi.base))?;
            if let Some(spine) = cfi.spine_index() {
                writeln!(out, "spine: {}", spine)?;
            }
            writeln!(out, "path:  {}", cfi::segment_string(&cfi.path))?;
            if let Some(range) = &cfi.range {
                writeln!(out, "start: {}", cfi::segment_string(&range.start))?;
                writeln!(out, "end:   {}", cfi::segment_string(&range.end))?;
            }
            Ok(())
        }
    }
}

pub fn compare<W: Write>(a: &str, b: &str, format: OutputFormat, out: &mut W) -> Result<()> {
    let name = ordering_name(cfi::compare_cfi_strings(a, b)?);
    match format {
        OutputFormat::Json => emit_json(out, &json!({ "ordering": name })),
        OutputFormat::Text => Ok(writeln!(out, "{}", name)?),
    }
}

pub fn range<W: Write>(a: &str, b: &str, format: OutputFormat, out: &mut W) -> Result<()> {
    let range = cfi::make_range_identifier(a, b)?;
    write_cfi_string(&range, format, out)
}

pub fn collapse<W: Write>(
    input: &str,
    side: CollapseSide,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let point = cfi::collapse(&cfi::parse(input)?, side)?;
    write_cfi_string(&point.to_string(), format, out)
}

pub fn sort<W: Write>(inputs: &[String], format: OutputFormat, out: &mut W) -> Result<()> {
    let mut cfis = inputs
        .iter()
        .map(|s| cfi::parse(s))
        .collect::<cfi::Result<Vec<Cfi>>>()?;
    cfi::sort_by_document_order(&mut cfis)?;

    let sorted: Vec<String> = cfis.iter().map(Cfi::to_string).collect();
    match format {
        OutputFormat::Json => emit_json(out, &sorted),
        OutputFormat::Text => {
            for cfi in &sorted {
                writeln!(out, "{}", cfi)?;
            }
            Ok(())
        }
    }
}

fn write_cfi_string<W: Write>(cfi: &str, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Json => emit_json(out, &json!({ "cfi": cfi })),
        OutputFormat::Text => Ok(writeln!(out, "{}", cfi)?),
    }
}

/// Parse one replay line: `resized` or `relocated <cfi>`
fn parse_event(line: &str, number: usize) -> Result<Option<LocationEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match (name, rest.trim()) {
        ("resized", "") => Ok(Some(LocationEvent::Resized)),
        ("relocated", cfi) if !cfi.is_empty() => Ok(Some(LocationEvent::Relocated(cfi.to_string()))),
        _ => Err(AppError::BadInput {
            line: number,
            message: format!("expected 'resized' or 'relocated <cfi>', got '{}'", line),
        }),
    }
}

#[derive(Serialize)]
struct ReplaySummary {
    outcomes: Vec<Outcome>,
    state: StabilizerState,
    last_stable_location: Option<String>,
}

/// Feed stabilizer events read from `input` and report what it did
pub fn replay<R: BufRead, W: Write>(input: R, format: OutputFormat, out: &mut W) -> Result<()> {
    let mut stabilizer = LocationStabilizer::new(|cfi: &str| {
        tracing::info!(cfi = %cfi, "Redisplay requested");
    });
    let mut outcomes = Vec::new();

    for (i, line) in input.lines().enumerate() {
        let Some(event) = parse_event(&line?, i + 1)? else {
            continue;
        };
        let outcome = stabilizer.handle(event);
        if format == OutputFormat::Text {
            if let Outcome::Redisplayed(cfi) = &outcome {
                writeln!(out, "redisplay {}", cfi)?;
            }
        }
        outcomes.push(outcome);
    }

    let summary = ReplaySummary {
        outcomes,
        state: stabilizer.state(),
        last_stable_location: stabilizer.last_stable_location().map(str::to_string),
    };

    match format {
        OutputFormat::Json => emit_json(out, &summary),
        OutputFormat::Text => {
            writeln!(out, "state: {:?}", summary.state)?;
            writeln!(
                out,
                "last:  {}",
                summary.last_stable_location.as_deref().unwrap_or("-")
            )?;
            Ok(())
        }
    }
}
