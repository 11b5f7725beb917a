//! Re-score a prediction dump written by the `train` binary.
//!
//! Reads JSON lines of `{"split", "pred", "gold"}` from a file or stdin and
//! prints one JSON line of P/R/F1 per split.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dialact_core::{DictionarySet, PredictionRecord, Prf, score_records};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dialact-score")]
#[command(about = "Compute precision/recall/F1 of a prediction dump")]
#[command(version)]
struct Cli {
    /// Dictionary file used for training
    #[arg(short, long, env = "DIALACT_DICT_PATH", default_value = "data/dict.json")]
    dict: PathBuf,

    /// Prediction dump; reads stdin when omitted
    input: Option<PathBuf>,

    /// Only score this split
    #[arg(short, long)]
    split: Option<String>,
}

#[derive(Debug, Serialize)]
struct SplitScore {
    split: String,
    samples: usize,
    #[serde(flatten)]
    prf: Prf,
}

fn read_records<R: BufRead>(reader: R) -> Result<Vec<PredictionRecord>> {
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).with_context(|| format!("line {}", number + 1))?;
        records.push(record);
    }
    Ok(records)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let file = File::open(&cli.dict).with_context(|| format!("opening {}", cli.dict.display()))?;
    let dict = DictionarySet::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", cli.dict.display()))?;

    let records = match &cli.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            read_records(BufReader::new(file))?
        }
        None => read_records(io::stdin().lock())?,
    };
    info!("Read {} records", records.len());

    let mut by_split: BTreeMap<&str, Vec<&PredictionRecord>> = BTreeMap::new();
    for record in &records {
        if cli.split.as_deref().is_some_and(|s| s != record.split) {
            continue;
        }
        by_split.entry(record.split.as_str()).or_default().push(record);
    }
    if by_split.is_empty() {
        warn!("No records to score");
    }

    for (split, records) in by_split {
        let prf = score_records(records.iter().copied(), &dict).with_context(|| format!("scoring {split}"))?;
        let score = SplitScore {
            split: split.to_string(),
            samples: records.len(),
            prf,
        };
        println!("{}", serde_json::to_string(&score)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_records_skips_blank_lines() {
        let input = concat!(
            r#"{"split":"dev","pred":{"diaacts":["inform"],"inform_slots":[],"request_slots":[]},"gold":{"diaacts":["inform"],"inform_slots":[],"request_slots":[]}}"#,
            "\n\n"
        );
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pred.diaact(), "inform");
    }

    #[test]
    fn test_read_records_reports_line() {
        let err = read_records("\nnot json\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
