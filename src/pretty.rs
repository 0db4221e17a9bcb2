//! # Pretty Printing
//!
//! Colored terminal output for the `awc` binary: ranked search hits, dataset
//! profiles and build summaries. Colors go through `crossterm` so they work on
//! every platform it supports.
//!
//! Every `print_*` function writes to stdout; the matching `write_*` function
//! takes any [`Write`] so the layout can be checked without a terminal.
//!
//! ```text
//! #1  sales.csv  (distance 0.4213)
//!     Dataset: sales.csv
//!     Number of rows: 3
//!     ...
//! ```

use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use std::error::Error;
use std::io::{Write, stdout};

use crate::metadata::DatasetProfile;
use crate::retrieval::{Manifest, SearchHit};

/// Print ranked search hits, nearest first.
pub fn print_hits(hits: &[SearchHit]) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    write_hits(&mut out, hits)?;
    out.flush()?;
    Ok(())
}

pub fn write_hits<W: Write>(out: &mut W, hits: &[SearchHit]) -> Result<(), Box<dyn Error>> {
    for hit in hits {
        out.execute(SetForegroundColor(Color::Cyan))?;
        out.execute(SetAttribute(Attribute::Bold))?;
        write!(out, "#{}  {}", hit.rank, hit.chunk.source_name)?;
        out.execute(SetAttribute(Attribute::Reset))?;
        out.execute(SetForegroundColor(Color::DarkGrey))?;
        writeln!(out, "  (distance {:.4})", hit.distance)?;
        out.execute(SetForegroundColor(Color::Reset))?;
        for line in hit.chunk.text.lines() {
            writeln!(out, "    {line}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Print a dataset profile with its header line highlighted.
pub fn print_profile(profile: &DatasetProfile) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    write_profile(&mut out, profile)?;
    out.flush()?;
    Ok(())
}

pub fn write_profile<W: Write>(
    out: &mut W,
    profile: &DatasetProfile,
) -> Result<(), Box<dyn Error>> {
    let text = profile.to_string();
    let mut lines = text.lines();
    if let Some(header) = lines.next() {
        out.execute(SetForegroundColor(Color::Cyan))?;
        out.execute(SetAttribute(Attribute::Bold))?;
        writeln!(out, "{header}")?;
        out.execute(SetAttribute(Attribute::Reset))?;
        out.execute(SetForegroundColor(Color::Reset))?;
    }
    for line in lines {
        // Numeric columns carry stats; make them stand out.
        if line.contains(", mean=") {
            out.execute(SetForegroundColor(Color::Yellow))?;
            writeln!(out, "{line}")?;
            out.execute(SetForegroundColor(Color::Reset))?;
        } else {
            writeln!(out, "{line}")?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// One-line summary of a finished build.
pub fn print_manifest(manifest: &Manifest) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    out.execute(SetForegroundColor(Color::Green))?;
    writeln!(
        out,
        "Indexed {} datasets with {} ({} dimensions)",
        manifest.chunks, manifest.model, manifest.dimension
    )?;
    out.execute(SetForegroundColor(Color::Reset))?;
    writeln!(out, "Generation {} built at {}", manifest.generation, manifest.built_at)?;
    out.flush()?;
    Ok(())
}
