//! Expansion of input arguments into concrete file lists.
//!
//! Each argument is either a literal path or a glob pattern such as
//! `logs/*.csv.gz`. The result is sorted and de-duplicated so multi-file runs
//! process inputs in a deterministic order.
//!
//! ```no_run
//! use ironload::io::glob::expand_inputs;
//!
//! let files = expand_inputs(&["logs/2024-*.jsonl.gz", "extra.csv"])?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::PathBuf;

/// Expand one glob pattern into the sorted list of matching files.
///
/// Directories are ignored. A pattern that matches nothing yields an empty
/// vector.
///
/// # Errors
/// Returns an error if the pattern is invalid or a matched entry cannot be
/// read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Expand several input arguments into one sorted, de-duplicated file list.
///
/// # Errors
/// Returns an error if any argument is an invalid pattern, or if an argument
/// matches no file at all.
pub fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let matched = expand_glob(input)?;
        if matched.is_empty() {
            bail!("no files found matching: {input}");
        }
        files.extend(matched);
    }
    files.sort();
    files.dedup();
    Ok(files)
}
