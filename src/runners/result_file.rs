// src/runners/result_file.rs

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Closing tag of the NUnit 2.x result document.
pub const RESULTS_END: &str = "</test-results>";

/// Read the runner's result file line by line.
///
/// Stops at end-of-file or at the first line ending in `</test-results>`,
/// whichever comes first; some runners keep the file open for a moment after
/// writing the final record.
pub async fn read_results(path: &Path) -> Result<String> {
    let file = File::open(path)
        .await
        .with_context(|| format!("opening result file {:?}", path))?;
    let mut lines = BufReader::new(file).lines();
    let mut text = String::new();

    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("reading result file {:?}", path))?
    {
        let done = line.trim_end().ends_with(RESULTS_END);
        text.push_str(&line);
        text.push('\n');
        if done {
            break;
        }
    }
    Ok(text)
}
