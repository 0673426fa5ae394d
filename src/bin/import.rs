//! Import microtask bank files into the SQLite task bank
//!
//! Usage: cargo run --bin import -- [--db=PATH] /path/to/banks...

use anyhow::{Context, Result};
use riasec_profiler::{
    bank::SqliteTaskBank,
    config::get_data_dir,
    generator::validate_structure,
    types::{Microtask, PolicyKey},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BankFile {
    // { "<program>": { "broad": [...], "S": [...] } }
    Bank(HashMap<String, HashMap<String, Vec<Microtask>>>),
    // [ { "program": ..., "policy": ..., "task": {...} } ]
    Entries(Vec<BankEntry>),
}

#[derive(Debug, Deserialize)]
struct BankEntry {
    program: String,
    #[serde(alias = "key")]
    policy: String,
    #[serde(flatten)]
    task: Microtask,
}

impl BankFile {
    fn into_entries(self) -> Vec<(String, String, Microtask)> {
        match self {
            BankFile::Bank(programs) => programs
                .into_iter()
                .flat_map(|(program, pools)| {
                    pools.into_iter().flat_map(move |(policy, tasks)| {
                        let program = program.clone();
                        tasks
                            .into_iter()
                            .map(move |task| (program.clone(), policy.clone(), task))
                    })
                })
                .collect(),
            BankFile::Entries(entries) => entries
                .into_iter()
                .map(|e| (e.program, e.policy, e.task))
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
struct ImportCounts {
    inserted: usize,
    duplicates: usize,
    rejected: usize,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let db_path = args
        .iter()
        .find_map(|a| a.strip_prefix("--db=").map(PathBuf::from))
        .unwrap_or_else(|| get_data_dir().join("tasks.db"));
    let inputs: Vec<&String> = args[1..].iter().filter(|a| !a.starts_with("--")).collect();

    if inputs.is_empty() {
        eprintln!("Usage: {} [--db=PATH] <bank-files-or-dirs...>", args[0]);
        std::process::exit(1);
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    println!("Opening task bank at {:?}", db_path);
    let bank = SqliteTaskBank::open(&db_path)
        .with_context(|| format!("Failed to open task bank at {:?}", db_path))?;

    let mut totals = ImportCounts::default();

    for input in inputs {
        let root = PathBuf::from(input);
        if !root.exists() {
            eprintln!("Warning: {} does not exist, skipping", input);
            continue;
        }

        println!("\nProcessing: {:?}", root);

        for entry in walkdir::WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
        {
            let path = entry.path();
            let fname = path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
            match import_file(&bank, path) {
                Ok(counts) => {
                    println!(
                        "  ✓ {} ({} new, {} already present, {} rejected)",
                        fname, counts.inserted, counts.duplicates, counts.rejected
                    );
                    totals.inserted += counts.inserted;
                    totals.duplicates += counts.duplicates;
                    totals.rejected += counts.rejected;
                }
                Err(e) => eprintln!("  ✗ {}: {:#}", fname, e),
            }
        }
    }

    let programs = bank.programs()?;

    println!("\n========================================");
    println!("Import complete!");
    println!("  Inserted: {}", totals.inserted);
    println!("  Duplicates: {}", totals.duplicates);
    println!("  Rejected: {}", totals.rejected);
    println!("  Programs in bank: {}", programs.len());
    println!("========================================");

    Ok(())
}

fn import_file(bank: &SqliteTaskBank, path: &Path) -> Result<ImportCounts> {
    let content = fs::read_to_string(path)?;
    let file: BankFile = serde_json::from_str(&content).context("not a microtask bank file")?;
    let mut counts = ImportCounts::default();

    for (program, policy, task) in file.into_entries() {
        let key: PolicyKey = policy.parse()?;

        if let Err(defect) = validate_structure(&task) {
            eprintln!("    skipped {} [{}] {:?}: {}", program, key, task.question_code, defect);
            counts.rejected += 1;
            continue;
        }

        if bank.insert(&program, key, &task, false)? {
            counts.inserted += 1;
        } else {
            counts.duplicates += 1;
        }
    }

    Ok(counts)
}
