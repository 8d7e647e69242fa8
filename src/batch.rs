//! Walk a `root/<cik>/<form>/<file>` tree of downloaded filings and extract
//! everything in it. Documents are processed independently and share no
//! state, so a bad one logs its diagnostics and the batch moves on; the only
//! fatal condition is a missing root directory.

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use itertools::Itertools;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::edgar::document::{decode_content, process_document, ExtractionOutcome};
use crate::normalize::{normalize_holdings, normalize_transactions, HoldingRow, TransactionRow};

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub documents: usize,
    pub extracted: usize,
    pub no_data: usize,
    pub skipped: usize,
    pub warnings: usize,
    /// Documents per filing type, "unknown" included.
    pub by_type: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub holdings: Vec<HoldingRow>,
    pub transactions: Vec<TransactionRow>,
    pub summary: BatchSummary,
}

pub fn run(root: &Path, progress: Option<&ProgressBar>) -> Result<BatchResult> {
    if !root.is_dir() {
        return Err(anyhow!("filings directory not found: {}", root.display()));
    }

    let mut result = BatchResult::default();
    let mut seen_types: Vec<String> = Vec::new();

    for cik_dir in subdirectories(root)? {
        let cik = dir_name(&cik_dir);
        info!("processing CIK {}", cik);
        for form_dir in subdirectories(&cik_dir)? {
            for path in files_in(&form_dir)? {
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                let bytes = match fs::read(&path) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("{}: unreadable ({}); skipped", path.display(), err);
                        continue;
                    }
                };
                let output = process_document(&decode_content(&bytes));

                result.summary.documents += 1;
                result.summary.warnings += output.diagnostics.len();
                for diagnostic in &output.diagnostics {
                    warn!("{}: {}", path.display(), diagnostic);
                }
                seen_types.push(
                    output
                        .filing_type
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                );
                match output.outcome {
                    ExtractionOutcome::Extracted => result.summary.extracted += 1,
                    ExtractionOutcome::NoDataExpected => result.summary.no_data += 1,
                    ExtractionOutcome::NoTableFound | ExtractionOutcome::Unclassified => {
                        result.summary.skipped += 1
                    }
                }

                let accession = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match output.filing_type {
                    Some(t) if t.is_13f() => {
                        let rows = normalize_holdings(&output.holdings, &cik, &output.metadata);
                        info!("{}: {} holdings", path.display(), rows.len());
                        result.holdings.extend(rows);
                    }
                    Some(_) => {
                        let rows =
                            normalize_transactions(&output.transactions, &accession, &output.metadata);
                        info!("{}: {} transactions", path.display(), rows.len());
                        result.transactions.extend(rows);
                    }
                    None => {}
                }
            }
        }
    }

    result.summary.by_type = seen_types.into_iter().counts();
    Ok(result)
}

/// Number of files the batch will visit; sizes the progress bar.
pub fn count_documents(root: &Path) -> usize {
    let Ok(cik_dirs) = subdirectories(root) else {
        return 0;
    };
    cik_dirs
        .iter()
        .flat_map(|cik_dir| subdirectories(cik_dir).unwrap_or_default())
        .map(|form_dir| files_in(&form_dir).map(|f| f.len()).unwrap_or(0))
        .sum()
}

fn subdirectories(path: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn files_in(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
