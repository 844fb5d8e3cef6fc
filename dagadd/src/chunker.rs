//! Chunker spec parsing.
//!
//! Accepted forms:
//!
//! - `size-<bytes>`: fixed-size chunks
//! - `rabin`, `rabin-<avg>`, `rabin-<min>-<avg>-<max>`: content-defined chunks
//!
//! An absent or empty spec selects fixed-size chunks of
//! [`Chunker::DEFAULT_SIZE`] bytes.

use crate::AddError;
use dagadd_core::Chunker;

const RABIN_FORMAT: &str = r#"expected "rabin", "rabin-[avg]" or "rabin-[min]-[avg]-[max]""#;

/// Parses a chunker spec into a [`Chunker`] descriptor.
pub fn parse_chunker(spec: Option<&str>) -> Result<Chunker, AddError> {
    let spec = match spec.map(str::trim) {
        None | Some("") => return Ok(Chunker::default()),
        Some(spec) => spec,
    };

    if let Some(size) = spec.strip_prefix("size-") {
        let size = parse_size(spec, size, "size")?;
        Ok(Chunker::FixedSize { size })
    } else if spec == "rabin" || spec.starts_with("rabin-") {
        parse_rabin(spec)
    } else {
        Err(AddError::chunker(spec, "unrecognized chunker"))
    }
}

fn parse_rabin(spec: &str) -> Result<Chunker, AddError> {
    let parts: Vec<&str> = spec.split('-').collect();
    match parts.as_slice() {
        ["rabin"] => Ok(rabin_around(Chunker::DEFAULT_SIZE)),
        ["rabin", avg] => Ok(rabin_around(parse_size(spec, avg, "avg")?)),
        ["rabin", min, avg, max] => {
            let min = parse_size(spec, min, "min")?;
            let avg = parse_size(spec, avg, "avg")?;
            let max = parse_size(spec, max, "max")?;
            if min > avg || avg > max {
                return Err(AddError::chunker(
                    spec,
                    "rabin sizes must satisfy min <= avg <= max",
                ));
            }
            Ok(Chunker::Rabin { min, avg, max })
        }
        _ => Err(AddError::chunker(spec, RABIN_FORMAT)),
    }
}

/// Rabin bounds derived from an average size.
fn rabin_around(avg: usize) -> Chunker {
    Chunker::Rabin {
        min: (avg / 3).max(1),
        avg,
        max: avg + avg / 2,
    }
}

fn parse_size(spec: &str, value: &str, name: &str) -> Result<usize, AddError> {
    match value.parse::<usize>() {
        Ok(0) => Err(AddError::chunker(
            spec,
            format!("chunker parameter {name} must be positive"),
        )),
        Ok(size) => Ok(size),
        Err(_) => Err(AddError::chunker(
            spec,
            format!("chunker parameter {name} must be an integer"),
        )),
    }
}
