//! riasec - interactive RIASEC profiling from the terminal
//!
//! Run with: cargo run --bin riasec -- --interactive
//! Logs go to stderr; set RUST_LOG=riasec_profiler=debug for the full trace.

use anyhow::{bail, Context, Result};
use riasec_profiler::{
    bank::{MemoryTaskBank, SqliteTaskBank, TaskBank},
    catalog::ProgramCatalog,
    config::{get_data_dir, ProfilerConfig},
    eval::{diagnostics, simulation, synthetic::SyntheticTaskGenerator},
    generator::{GeneratorConfig, LlmTaskGenerator, NoopGenerator, TaskGenerator},
    profile::StudentProfile,
    recommend::RecommendationEngine,
    session::Session,
    store,
    types::*,
    ProfilerError,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const USAGE: &str = r#"riasec - adaptive RIASEC profiling

USAGE:
    riasec --interactive [--ranking=SIAERC] [--synthetic]
    riasec --recommend <r,i,a,s,e,c>
    riasec --diagnostics [--program=NAME]
    riasec --simulate [N]

OPTIONS:
    --programs=PATH   program table (.csv or .json)   [data dir/programs.csv]
    --tasks=PATH      task bank (.json or SQLite)     [data dir/tasks.db]
    --db=PATH         interaction log database        [data dir/sessions.db]
    --config=PATH     profiler configuration (JSON)
    --seed=N          RNG seed for reproducible runs
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = Options::parse(&args)?;

    match args.get(1).map(|s| s.as_str()) {
        Some("--interactive") => run_interactive(&options),
        Some("--recommend") => {
            let raw = args
                .get(2)
                .filter(|a| !a.starts_with("--"))
                .context("Usage: --recommend <r,i,a,s,e,c>")?;
            run_recommend(&options, raw)
        }
        Some("--diagnostics") => run_diagnostics(&options),
        Some("--simulate") => {
            let students = args
                .get(2)
                .filter(|a| !a.starts_with("--"))
                .map(|n| n.parse::<u32>())
                .transpose()
                .context("--simulate expects a number of students")?;
            run_simulate(&options, students)
        }
        Some("--help") | Some("-h") | None => {
            print!("{}", USAGE);
            Ok(())
        }
        Some(other) => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

/// `--key=value` options shared by every command
struct Options {
    data_dir: PathBuf,
    programs: PathBuf,
    tasks: PathBuf,
    db: PathBuf,
    config: ProfilerConfig,
    ranking: Option<String>,
    program: Option<String>,
    synthetic: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let value = |name: &str| {
            let prefix = format!("--{}=", name);
            args.iter()
                .find_map(|a| a.strip_prefix(&prefix).map(|v| v.to_string()))
        };

        let data_dir = get_data_dir();
        let mut config = match value("config") {
            Some(path) => ProfilerConfig::from_file(Path::new(&path))
                .with_context(|| format!("Failed to load config from {}", path))?,
            None => ProfilerConfig::default(),
        };
        if let Some(seed) = value("seed") {
            config.seed = Some(seed.parse().with_context(|| format!("Invalid seed '{}'", seed))?);
        }

        Ok(Self {
            programs: value("programs")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("programs.csv")),
            tasks: value("tasks")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("tasks.db")),
            db: value("db")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("sessions.db")),
            data_dir,
            config,
            ranking: value("ranking"),
            program: value("program"),
            synthetic: args.iter().any(|a| a == "--synthetic"),
        })
    }

    fn load_catalog(&self) -> Result<ProgramCatalog> {
        ProgramCatalog::from_file(&self.programs)
            .with_context(|| format!("Failed to load programs from {:?}", self.programs))
    }

    fn open_bank(&self) -> Result<Box<dyn TaskBank>> {
        let is_json = self
            .tasks
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let bank = MemoryTaskBank::from_file(&self.tasks)
                .with_context(|| format!("Failed to load task bank from {:?}", self.tasks))?;
            Ok(Box::new(bank))
        } else {
            std::fs::create_dir_all(&self.data_dir)?;
            let bank = SqliteTaskBank::open(&self.tasks)
                .with_context(|| format!("Failed to open task bank at {:?}", self.tasks))?;
            Ok(Box::new(bank))
        }
    }

    fn generator(&self) -> Box<dyn TaskGenerator> {
        if self.synthetic {
            return Box::new(SyntheticTaskGenerator);
        }
        match LlmTaskGenerator::new(GeneratorConfig::default()) {
            Ok(generator) => Box::new(generator),
            Err(e) => {
                tracing::info!(reason = %e, "Task generation disabled; serving from the bank only");
                Box::new(NoopGenerator)
            }
        }
    }
}

fn run_interactive(options: &Options) -> Result<()> {
    let catalog = options.load_catalog()?;
    let bank = options.open_bank()?;
    let generator = options.generator();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let ranking = match &options.ranking {
        Some(codes) => AxisRanking::parse(codes)?,
        None => prompt_ranking(&mut lines)?,
    };

    if let Some(parent) = options.db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = store::init_db(&options.db)
        .with_context(|| format!("Failed to open interaction log at {:?}", options.db))?;

    let mut session = Session::start(catalog, ranking, bank, generator, options.config.clone())?;
    store::insert_session(&log, session.id(), session.ranking(), session.started_at())?;

    println!("\nAnswer with the option letter. Add + or - to rate the task (e.g. \"B +\"), q to finish.\n");

    let recommendations = loop {
        let presented = match session.next_step() {
            Ok(NextStep::Task(task)) => task,
            Ok(NextStep::Recommendations(recs)) => break recs,
            Err(e @ ProfilerError::Upstream(_)) => {
                eprintln!("No more tasks available ({}); finishing early.", e);
                break session.finish();
            }
            Err(e) => return Err(e.into()),
        };

        print_task(&presented);
        let shown_at = Instant::now();

        let answer = loop {
            print!("> ");
            io::stdout().flush()?;
            let Some(line) = lines.next() else {
                break None;
            };
            let line = line?;
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") {
                break None;
            }

            let (key, preference) = match parse_answer(line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    println!("  {}", e);
                    continue;
                }
            };
            match session.answer(&key, preference) {
                Ok(record) => break Some(record),
                Err(e @ ProfilerError::InvalidAnswer(_)) => println!("  {}", e),
                Err(e) => return Err(e.into()),
            }
        };

        match answer {
            Some(record) => {
                let elapsed = shown_at.elapsed().as_millis() as i64;
                store::record_answer(&log, session.id(), &record, Some(elapsed))?;
            }
            None => break session.finish(),
        }
    };

    store::finish_session(&log, session.id(), session.stop_decision().reason, &recommendations)?;

    let profile = session.profile();
    println!("\nYour profile after {} tasks:", session.answers().len());
    print_profile(profile);
    print_recommendations(&recommendations);
    Ok(())
}

fn prompt_ranking<B: BufRead>(lines: &mut io::Lines<B>) -> Result<AxisRanking> {
    println!("Rank the six interest areas from most to least appealing.");
    for axis in Axis::ALL {
        println!("  {} = {}", axis.code(), axis.name());
    }

    loop {
        print!("Ranking (e.g. SIAERC): ");
        io::stdout().flush()?;
        let line = lines.next().context("No ranking given")??;
        match AxisRanking::parse(&line) {
            Ok(ranking) => return Ok(ranking),
            Err(e) => println!("  {}", e),
        }
    }
}

/// `"B"`, `"b +"` or `"C-"` -> option key plus optional task rating
fn parse_answer(line: &str) -> riasec_profiler::Result<(String, Option<TaskPreference>)> {
    let line = line.trim();
    let (key, rating) = match line.char_indices().find(|(_, c)| *c == '+' || *c == '-') {
        Some((i, _)) => (line[..i].trim(), Some(line[i..].trim())),
        None => (line, None),
    };
    if key.is_empty() {
        return Err(ProfilerError::InvalidAnswer("enter an option letter".to_string()));
    }
    let preference = rating.map(|r| r.parse::<TaskPreference>()).transpose()?;
    Ok((key.to_string(), preference))
}

fn print_task(presented: &PresentedTask) {
    println!("[{}] {} ({})", presented.step, presented.task.question, presented.program);
    for (key, option) in &presented.task.options {
        println!("   {}) {}", key, option.text);
    }
}

fn print_profile(profile: &StudentProfile) {
    let distribution = profile.distribution();
    for axis in Axis::ALL {
        let share = distribution[axis.index()];
        let bar = "#".repeat((share * 60.0).round() as usize);
        println!("  {} {:<14} {:>5.1}% {}", axis.code(), axis.name(), share * 100.0, bar);
    }
    println!("  entropy {:.3}, top-2 gap {:.3}", profile.entropy(), profile.top2_gap());
}

fn print_recommendations(recommendations: &[Recommendation]) {
    println!("\nRecommended programs:");
    for rec in recommendations {
        println!(
            "  {}. {:<40} distance {:.4}  closest on {}",
            rec.rank,
            rec.program,
            rec.distance,
            rec.closest_axis.name()
        );
    }
}

fn run_recommend(options: &Options, raw: &str) -> Result<()> {
    let catalog = options.load_catalog()?;
    let values: Vec<f64> = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid vector '{}'", raw))?;
    if values.len() != 6 {
        bail!("Expected 6 comma-separated values, got {}", values.len());
    }

    let mut vector = [0.0; 6];
    vector.copy_from_slice(&values);
    let profile = StudentProfile::from_vector(vector);

    let engine = RecommendationEngine::new(options.config.recommendation_count);
    let recommendations = engine.recommend(&profile, &catalog);
    println!("{}", serde_json::to_string_pretty(&recommendations)?);
    Ok(())
}

fn run_diagnostics(options: &Options) -> Result<()> {
    let catalog = options.load_catalog()?;
    let mut config = diagnostics::DiagnosticsConfig {
        program: options.program.clone(),
        epsilon: options.config.epsilon,
        seed: options.config.seed,
        ..Default::default()
    };
    if let Some(codes) = &options.ranking {
        config.ranking = AxisRanking::parse(codes)?;
    }

    let report = diagnostics::run_scaling_sweep(&catalog, &config)?;

    println!("Scaling-factor sweep: {} vectors, program {}, answer {}", config.num_vectors, report.program, report.answer.name());
    println!("{:>8}  {:>10}  {:>10}", "factor", "mean Δmax", "worst Δmax");
    for row in &report.summary {
        println!("{:>8.3}  {:>10.4}  {:>10.4}", row.scaling_factor, row.mean_max_delta, row.worst_max_delta);
    }

    let out = options.data_dir.join("diagnostics.json");
    std::fs::create_dir_all(&options.data_dir)?;
    std::fs::write(&out, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {:?}", out))?;
    println!("\nFull rows written to {:?}", out);
    Ok(())
}

fn run_simulate(options: &Options, students: Option<u32>) -> Result<()> {
    let catalog = options.load_catalog()?;
    let mut config = simulation::SimulationConfig {
        profiler: options.config.clone(),
        seed: options.config.seed,
        ..Default::default()
    };
    if let Some(n) = students {
        config.num_students = n;
    }

    println!("Simulating {} students over {} programs...", config.num_students, catalog.len());
    let results = simulation::run_simulation(&catalog, &config)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
