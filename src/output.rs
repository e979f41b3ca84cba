//! Reading and writing operation logs (JSON, CSV) and subtitle lists.

use crate::models::{Operation, OperationLog, Subtitle};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write operation logs as JSON.
pub fn write_json<W: Write>(logs: &[OperationLog], writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(logs)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write operation logs as JSON to a file.
pub fn write_json_file(logs: &[OperationLog], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(logs, &mut file)
}

pub fn read_json<R: Read>(reader: R) -> Result<Vec<OperationLog>, OutputError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn read_json_file(path: &Path) -> Result<Vec<OperationLog>, OutputError> {
    let file = std::fs::File::open(path)?;
    read_json(BufReader::new(file))
}

/// Write operations as CSV, one row per affected subtitle.
pub fn write_csv<W: Write>(logs: &[OperationLog], writer: &mut W) -> Result<(), OutputError> {
    writeln!(
        writer,
        "file_path,from_revision,to_revision,operation_id,operation_type,after_stid,\
         stid,record_id,before,after"
    )?;

    for log in logs {
        for op in &log.operations {
            for element in &op.affected_stids {
                writeln!(
                    writer,
                    "{:?},{},{},{},{},{},{},{},{:?},{:?}",
                    log.file_path,
                    log.from_revision,
                    log.to_revision,
                    op.operation_id,
                    op.operation_type,
                    op.after_stid.as_deref().unwrap_or(""),
                    element.stid,
                    element.record_id.as_deref().unwrap_or(""),
                    element.before,
                    element.after
                )?;
            }
        }
    }

    Ok(())
}

pub fn write_csv_file(logs: &[OperationLog], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_csv(logs, &mut file)
}

/// Read a subtitle list: one stid per line, optionally followed by a tab
/// and a record id. Blank lines are skipped.
pub fn read_subtitle_list<R: Read>(reader: R) -> Result<Vec<Subtitle>, OutputError> {
    let mut subtitles = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let subtitle = match line.split_once('\t') {
            Some((stid, record_id)) => Subtitle::with_record_id(stid.trim(), record_id.trim()),
            None => Subtitle::new(line),
        };
        subtitles.push(subtitle);
    }
    Ok(subtitles)
}

pub fn read_subtitle_list_file(path: &Path) -> Result<Vec<Subtitle>, OutputError> {
    read_subtitle_list(std::fs::File::open(path)?)
}

pub fn write_subtitle_list<W: Write>(subtitles: &[Subtitle], writer: &mut W) -> Result<(), OutputError> {
    for subtitle in subtitles {
        match &subtitle.record_id {
            Some(record_id) => writeln!(writer, "{}\t{}", subtitle.persistent_id, record_id)?,
            None => writeln!(writer, "{}", subtitle.persistent_id)?,
        }
    }
    Ok(())
}

/// Format an operation as a human-readable string.
pub fn format_operation(op: &Operation) -> String {
    let stids: Vec<&str> = op.affected_stids.iter().map(|e| e.stid.as_str()).collect();
    format!(
        "{} {} after={} [{}]",
        op.operation_id,
        op.operation_type,
        op.after_stid.as_deref().unwrap_or("-"),
        stids.join(", ")
    )
}

/// Print operations in a human-readable format.
pub fn print_operations(operations: &[Operation], limit: Option<usize>) {
    let to_print = match limit {
        Some(n) => &operations[..n.min(operations.len())],
        None => operations,
    };

    for op in to_print {
        println!("{}", format_operation(op));
    }

    if let Some(n) = limit {
        if operations.len() > n {
            println!("... and {} more operations", operations.len() - n);
        }
    }
}

/// Write a summary report to stdout.
pub fn print_summary(logs: &[OperationLog]) {
    println!("\n=== Extraction Summary ===");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    for log in logs {
        println!(
            "{} ({} -> {}): {} operations",
            log.file_path,
            log.from_revision,
            log.to_revision,
            log.operations.len()
        );
    }
}
