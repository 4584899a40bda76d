pub mod tag;

pub use tag::{tag, SelectionTag};

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

/// Upper bound on how many PR numbers a single selection may expand to.
pub const MAX_SELECTION_SIZE: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Selection is empty")]
    Empty { selection: String },

    #[error("Empty segment in selection '{selection}'")]
    EmptySegment { selection: String },

    #[error("Invalid token '{segment}' in selection '{selection}': expected N or N-M")]
    InvalidToken { segment: String, selection: String },

    #[error("PR numbers must be positive, got '{segment}' in selection '{selection}'")]
    NonPositive { segment: String, selection: String },

    #[error("Range '{segment}' in selection '{selection}' has its start after its end")]
    Descending { segment: String, selection: String },

    #[error("Selection '{selection}' expands to more than {max} PR numbers")]
    TooLarge { selection: String, max: u64 },
}

/// A validated set of PR numbers plus its canonical string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The expression as the user typed it
    pub requested: String,
    /// Minimal comma/range rendering of `numbers`
    pub canonical: String,
    /// Distinct PR numbers, ascending
    pub numbers: Vec<u64>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn tag(&self) -> SelectionTag {
        tag(&self.numbers)
    }
}

/// Parse a selection expression such as `"1-5, #8, 10-12"`.
///
/// Segments are comma separated and each is either a single number or an
/// inclusive ascending `start-end` range. A leading `#` on any number is
/// ignored. All segments are unioned, so overlapping ranges merge silently.
pub fn parse(requested: &str) -> Result<Selection, SelectionError> {
    let selection = requested.to_string();
    if requested.trim().is_empty() {
        return Err(SelectionError::Empty { selection });
    }

    let mut numbers = BTreeSet::new();
    for raw_segment in requested.split(',') {
        let segment = raw_segment.trim();
        if segment.is_empty() {
            return Err(SelectionError::EmptySegment { selection });
        }

        match segment.split_once('-') {
            Some((start, end)) => {
                let start = parse_token(start, segment, &selection)?;
                let end = parse_token(end, segment, &selection)?;
                if start > end {
                    return Err(SelectionError::Descending {
                        segment: segment.to_string(),
                        selection,
                    });
                }
                if end - start >= MAX_SELECTION_SIZE {
                    return Err(SelectionError::TooLarge {
                        selection,
                        max: MAX_SELECTION_SIZE,
                    });
                }
                numbers.extend(start..=end);
            }
            None => {
                numbers.insert(parse_token(segment, segment, &selection)?);
            }
        }

        if numbers.len() as u64 > MAX_SELECTION_SIZE {
            return Err(SelectionError::TooLarge {
                selection,
                max: MAX_SELECTION_SIZE,
            });
        }
    }

    if numbers.is_empty() {
        return Err(SelectionError::Empty { selection });
    }

    let numbers: Vec<u64> = numbers.into_iter().collect();
    let canonical = canonicalize(&numbers);
    debug!(requested = %selection, canonical = %canonical, count = numbers.len(), "parsed selection");

    Ok(Selection {
        requested: selection,
        canonical,
        numbers,
    })
}

fn parse_token(token: &str, segment: &str, selection: &str) -> Result<u64, SelectionError> {
    let token = token.trim();
    let digits = token.strip_prefix('#').unwrap_or(token);
    let invalid = || SelectionError::InvalidToken {
        segment: segment.to_string(),
        selection: selection.to_string(),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value = digits.parse::<u64>().map_err(|_| invalid())?;
    if value == 0 {
        return Err(SelectionError::NonPositive {
            segment: segment.to_string(),
            selection: selection.to_string(),
        });
    }
    Ok(value)
}

/// Render sorted, deduplicated numbers as the minimal comma/range string.
///
/// Runs of consecutive integers collapse into `start-end`; a run of one is a
/// bare number. `parse(&canonicalize(ns)).numbers == ns` for any valid `ns`.
pub fn canonicalize(numbers: &[u64]) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut iter = numbers.iter().copied();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let (mut run_start, mut run_end) = (first, first);
    for n in iter {
        if n == run_end + 1 {
            run_end = n;
            continue;
        }
        tokens.push(render_run(run_start, run_end));
        run_start = n;
        run_end = n;
    }
    tokens.push(render_run(run_start, run_end));

    tokens.join(",")
}

fn render_run(start: u64, end: u64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
