//! Batch extraction over many document revision pairs.
//!
//! Line diffs are independent per document and run in parallel. Extraction
//! mints ids from one shared generator, so it runs sequentially afterwards
//! in input order.

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::align::AlignError;
use crate::extract::{diff_lines, ExtractError, OperationExtractor};
use crate::ids::IdSource;
use crate::models::{DiffLine, ExtractorParams, OperationLog};

/// Two revisions of one annotated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPair {
    pub file_path: String,
    pub from_revision: String,
    pub to_revision: String,
    pub product_identity_id: Option<String>,
    pub language: Option<String>,
    pub old_text: String,
    pub new_text: String,
}

impl RevisionPair {
    pub fn new(
        file_path: impl Into<String>,
        from_revision: impl Into<String>,
        to_revision: impl Into<String>,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            from_revision: from_revision.into(),
            to_revision: to_revision.into(),
            product_identity_id: None,
            language: None,
            old_text: old_text.into(),
            new_text: new_text.into(),
        }
    }

    fn operation_prefix(&self) -> String {
        format!("{}..{}", self.from_revision, self.to_revision)
    }
}

/// Extract the operation log of a single revision pair.
pub fn extract_log<G: IdSource>(
    pair: &RevisionPair,
    ids: &mut G,
    params: &ExtractorParams,
) -> Result<OperationLog, ExtractError> {
    let diff = diff_lines(&pair.old_text, &pair.new_text)?;
    log_from_diff(pair, &diff, ids, params)
}

fn log_from_diff<G: IdSource>(
    pair: &RevisionPair,
    diff: &[DiffLine],
    ids: &mut G,
    params: &ExtractorParams,
) -> Result<OperationLog, ExtractError> {
    let operations = OperationExtractor::new(ids, params.clone())
        .with_operation_prefix(pair.operation_prefix())
        .extract(diff)?;

    Ok(OperationLog {
        file_path: pair.file_path.clone(),
        from_revision: pair.from_revision.clone(),
        to_revision: pair.to_revision.clone(),
        product_identity_id: pair.product_identity_id.clone(),
        language: pair.language.clone(),
        operations,
    })
}

/// Extract operation logs for many revision pairs, in input order.
///
/// Fails on the first pair whose diff cannot be extracted; ids minted for
/// earlier pairs stay in the inventory.
pub fn extract_many<G: IdSource>(
    pairs: &[RevisionPair],
    ids: &mut G,
    params: &ExtractorParams,
    show_progress: bool,
) -> Result<Vec<OperationLog>, ExtractError> {
    let progress = if show_progress {
        let pb = ProgressBar::new(pairs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let diffs: Vec<Result<Vec<DiffLine>, AlignError>> = pairs
        .par_iter()
        .map(|pair| {
            let diff = diff_lines(&pair.old_text, &pair.new_text);
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
            diff
        })
        .collect();

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }

    let mut logs = Vec::with_capacity(pairs.len());
    for (pair, diff) in pairs.iter().zip(diffs) {
        let log = log_from_diff(pair, &diff?, ids, params)?;
        info!(
            "{} ({}..{}): {} operations",
            pair.file_path,
            pair.from_revision,
            pair.to_revision,
            log.operations.len()
        );
        logs.push(log);
    }

    let total: usize = logs.iter().map(|l| l.operations.len()).sum();
    info!("Extracted {} operations from {} documents", total, logs.len());

    Ok(logs)
}
