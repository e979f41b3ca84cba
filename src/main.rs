//! Subtitle Revisions CLI
//!
//! Extracts invertible subtitle operations between revisions of annotated
//! documents, replays them against subtitle lists, and mints persistent ids.

use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};

use subtitle_revisions::align::align;
use subtitle_revisions::apply::{apply, revert};
use subtitle_revisions::compare::{extract_many, RevisionPair};
use subtitle_revisions::db::SqliteStore;
use subtitle_revisions::ids::{FileInventory, IdSource, MemoryInventory, PersistentIdGenerator};
use subtitle_revisions::models::{ExtractorParams, ScoringParams};
use subtitle_revisions::output::{
    print_operations, print_summary, read_json_file, read_subtitle_list_file, write_csv_file,
    write_json_file, write_subtitle_list,
};
use subtitle_revisions::scoring::IdScoring;

#[derive(Parser)]
#[command(name = "subtitle-revisions")]
#[command(about = "Invertible subtitle operations across document revisions")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract operations between two revisions of an annotated document
    ///
    /// New subtitle boundaries are written as a bare `@`; ids are minted for
    /// them from the inventory file or database.
    Extract {
        /// Old revision
        #[arg(long)]
        old: PathBuf,

        /// New revision
        #[arg(long)]
        new: PathBuf,

        /// Output JSON path
        #[arg(long)]
        output: PathBuf,

        /// Also write a CSV next to the JSON output
        #[arg(long)]
        csv: bool,

        /// Document path recorded in the log [default: path of --new]
        #[arg(long)]
        file_path: Option<String>,

        #[arg(long, default_value = "old")]
        from_revision: String,

        #[arg(long, default_value = "new")]
        to_revision: String,

        #[arg(long)]
        language: Option<String>,

        /// Newline-delimited id inventory file
        #[arg(long, conflicts_with = "db")]
        inventory: Option<PathBuf>,

        /// SQLite database holding the id inventory; the log is saved there too
        #[arg(long)]
        db: Option<PathBuf>,

        /// Diagonal band for stid alignment [default: 100]
        #[arg(long)]
        band: Option<usize>,

        /// Gap penalty [default: -10]
        #[arg(long, allow_hyphen_values = true)]
        gap_penalty: Option<f64>,

        /// Match score [default: 10]
        #[arg(long)]
        match_score: Option<f64>,

        /// Minimum text similarity for a removed boundary to count as a merge [default: 0.5]
        #[arg(long)]
        merge_threshold: Option<f64>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,

        /// Print first N operations to console
        #[arg(long)]
        show_operations: Option<usize>,
    },

    /// Replay an operation log against a subtitle id list
    Apply {
        /// Subtitle list (one stid per line, optional tab + record id)
        #[arg(long)]
        subtitles: PathBuf,

        /// Operation log JSON
        #[arg(long)]
        operations: PathBuf,

        /// Undo the operations instead of applying them
        #[arg(long)]
        reverse: bool,

        /// Output path [default: stdout]
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Mint fresh persistent ids
    Ids {
        #[arg(long, default_value = "1")]
        count: usize,

        #[arg(long, conflicts_with = "db")]
        inventory: Option<PathBuf>,

        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Align two subtitle id lists and print the alignment
    Align {
        #[arg(long)]
        left: PathBuf,

        #[arg(long)]
        right: PathBuf,

        /// Diagonal band [default: 100]
        #[arg(long)]
        band: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Extract {
            old,
            new,
            output,
            csv,
            file_path,
            from_revision,
            to_revision,
            language,
            inventory,
            db,
            band,
            gap_penalty,
            match_score,
            merge_threshold,
            quiet,
            show_operations,
        } => {
            // Start with library defaults and overlay user-specified values
            let defaults = ExtractorParams::default();
            let params = ExtractorParams {
                scoring: ScoringParams {
                    band: band.unwrap_or(defaults.scoring.band),
                    gap_penalty: gap_penalty.unwrap_or(defaults.scoring.gap_penalty),
                    match_score: match_score.unwrap_or(defaults.scoring.match_score),
                },
                merge_similarity_threshold: merge_threshold
                    .unwrap_or(defaults.merge_similarity_threshold),
            };

            let mut pair = RevisionPair::new(
                file_path.unwrap_or_else(|| new.display().to_string()),
                from_revision,
                to_revision,
                std::fs::read_to_string(&old)?,
                std::fs::read_to_string(&new)?,
            );
            pair.language = language;
            let pairs = [pair];

            let logs = if let Some(db_path) = db {
                let mut ids = PersistentIdGenerator::new(SqliteStore::open(&db_path)?);
                let logs = extract_many(&pairs, &mut ids, &params, !quiet)?;
                let store = ids.into_store();
                for log in &logs {
                    let id = store.save_operation_log(log)?;
                    info!("Saved operation log {} to {}", id, db_path.display());
                }
                logs
            } else if let Some(path) = inventory {
                let mut ids = PersistentIdGenerator::new(FileInventory::new(path));
                extract_many(&pairs, &mut ids, &params, !quiet)?
            } else {
                warn!("No inventory given; minted ids are not recorded anywhere");
                let mut ids = PersistentIdGenerator::new(MemoryInventory::default());
                extract_many(&pairs, &mut ids, &params, !quiet)?
            };

            write_json_file(&logs, &output)?;
            if csv {
                let csv_path = output.with_extension("csv");
                write_csv_file(&logs, &csv_path)?;
                if !quiet {
                    eprintln!("CSV output: {}", csv_path.display());
                }
            }

            if !quiet {
                print_summary(&logs);
                eprintln!("\nOutput: {}", output.display());
            }

            if let Some(limit) = show_operations {
                println!("\n=== Operations ===");
                for log in &logs {
                    print_operations(&log.operations, Some(limit));
                }
            }
        }
        Commands::Apply {
            subtitles,
            operations,
            reverse,
            output,
        } => {
            let mut list = read_subtitle_list_file(&subtitles)?;
            let logs = read_json_file(&operations)?;

            if reverse {
                for log in logs.iter().rev() {
                    list = revert(&log.operations, &list)?;
                }
            } else {
                for log in &logs {
                    list = apply(&log.operations, &list)?;
                }
            }
            info!("{} subtitles after replay", list.len());

            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)?;
                    write_subtitle_list(&list, &mut file)?;
                }
                None => write_subtitle_list(&list, &mut std::io::stdout().lock())?,
            }
        }
        Commands::Ids {
            count,
            inventory,
            db,
        } => {
            let ids = if let Some(db_path) = db {
                mint(PersistentIdGenerator::new(SqliteStore::open(&db_path)?), count)?
            } else if let Some(path) = inventory {
                mint(PersistentIdGenerator::new(FileInventory::new(path)), count)?
            } else {
                warn!("No inventory given; ids are only unique within this run");
                mint(PersistentIdGenerator::new(MemoryInventory::default()), count)?
            };
            for id in ids {
                println!("{}", id);
            }
        }
        Commands::Align { left, right, band } => {
            run_align(&left, &right, band.unwrap_or(ScoringParams::default().band))?;
        }
    }

    Ok(())
}

fn mint<G: IdSource>(mut ids: G, count: usize) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    Ok(ids.generate(count)?)
}

/// Align two id lists by stid and print one row per aligned position.
fn run_align(left: &Path, right: &Path, band: usize) -> Result<(), Box<dyn std::error::Error>> {
    let to_ids = |path: &Path| -> Result<Vec<Option<String>>, Box<dyn std::error::Error>> {
        Ok(read_subtitle_list_file(path)?
            .into_iter()
            .map(|s| Some(s.persistent_id))
            .collect())
    };
    let left_ids = to_ids(left)?;
    let right_ids = to_ids(right)?;

    let result = align(&left_ids, &right_ids, &IdScoring::subtitle_stid(band))?;

    println!("=== Alignment (score {:.1}) ===", result.score);
    for (l, r) in result.pairs() {
        let marker = match (l, r) {
            (Some(a), Some(b)) if a == b => " ",
            (Some(_), Some(_)) => "~",
            (Some(_), None) => "-",
            _ => "+",
        };
        println!(
            "{} {:<8} {}",
            marker,
            l.as_deref().unwrap_or("."),
            r.as_deref().unwrap_or(".")
        );
    }
    Ok(())
}
