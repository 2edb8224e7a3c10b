use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use compound_schema_core::{validate_set, DescriptorSet};
use compound_schema_engine::{build_report, merge_families, MergeConfig, MergeOptions};

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

impl CliOutputFormat {
    fn extension(self) -> &'static str {
        match self {
            CliOutputFormat::Json => "json",
            CliOutputFormat::Yaml => "yaml",
        }
    }

    fn render<T: Serialize>(self, value: &T) -> Result<String, String> {
        match self {
            CliOutputFormat::Json => serde_json::to_string_pretty(value)
                .map_err(|err| format!("Failed to serialize output: {err}")),
            CliOutputFormat::Yaml => serde_yaml::to_string(value)
                .map_err(|err| format!("Failed to serialize output: {err}")),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "compound-merge")]
#[command(about = "Merge record descriptor families into compound schemas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge descriptor-set files into compound schema graphs.
    Merge(MergeArgs),
    /// Validate one or more descriptor-set files.
    Validate(ValidateArgs),
    /// Summarize a descriptor-set file.
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Descriptor-set files (JSON or YAML).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output directory for compound graph files.
    #[arg(long)]
    output: PathBuf,
    /// Merge configuration file (JSON or YAML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also write a merge report per input.
    #[arg(long)]
    report: bool,
    /// Number of parallel merge jobs across inputs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    /// Output format for compound and report files.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Descriptor-set files to validate.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    /// Descriptor-set file to summarize.
    input: PathBuf,
    /// Output format (yaml/json print a machine-readable summary).
    #[arg(long)]
    format: Option<CliOutputFormat>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Merge(args) => run_merge(args),
        Command::Validate(args) => run_validate(args),
        Command::Inspect(args) => run_inspect(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_merge(args: MergeArgs) -> Result<(), String> {
    let config: MergeConfig = match &args.config {
        Some(path) => load_document(path)?,
        None => MergeConfig::default(),
    };
    // Configuration errors fail fast, before any input is touched.
    let options: MergeOptions = config.compile().map_err(|err| err.to_string())?;

    fs::create_dir_all(&args.output).map_err(|err| {
        format!(
            "Failed to create output directory '{}': {err}",
            args.output.display()
        )
    })?;

    let sets: Vec<(PathBuf, DescriptorSet)> = args
        .inputs
        .iter()
        .map(|path| load_set(path).map(|set| (path.clone(), set)))
        .collect::<Result<_, _>>()?;

    let generated_at = chrono::Utc::now().to_rfc3339();

    // Each input file is an independent top-level set: merges run in
    // parallel with one context and memo table per set, and compound
    // handles never cross set boundaries.
    let merge_one = |entry: &(PathBuf, DescriptorSet)| -> Result<(String, usize), String> {
        let (path, set) = entry;
        let outcome = merge_families(&set.arena, &set.families, &options)
            .map_err(|err| format!("{}: {err}", path.display()))?;

        let stem = file_stem(path);
        let ext = args.format.extension();
        let compound_path = args.output.join(format!("{stem}.compounds.{ext}"));
        fs::write(&compound_path, args.format.render(&outcome)?)
            .map_err(|err| format!("Failed to write '{}': {err}", compound_path.display()))?;

        if args.report {
            let report = build_report(&outcome, PACKAGE_VERSION, &generated_at)
                .map_err(|err| format!("Failed to build report for '{stem}': {err}"))?;
            let report_path = args.output.join(format!("{stem}.report.{ext}"));
            fs::write(&report_path, args.format.render(&report)?)
                .map_err(|err| format!("Failed to write '{}': {err}", report_path.display()))?;
        }

        Ok((stem, outcome.compounds.len()))
    };

    let results: Result<Vec<(String, usize)>, String> = match args.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|err| format!("Failed to build thread pool: {err}"))?
            .install(|| sets.par_iter().map(merge_one).collect()),
        None => sets.par_iter().map(merge_one).collect(),
    };

    let results = results?;
    let compounds: usize = results.iter().map(|(_, count)| count).sum();
    println!(
        "Merged {} descriptor set(s) into {} compound(s).",
        results.len(),
        compounds
    );
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut failures = 0usize;
    for path in &args.inputs {
        let set: DescriptorSet = load_document(path)?;
        let errors = validate_set(&set);
        if errors.is_empty() {
            continue;
        }
        failures += 1;
        for error in errors {
            eprintln!("{}: {error}", path.display());
        }
    }
    if failures > 0 {
        return Err(format!("{failures} descriptor set(s) failed validation"));
    }
    println!("Validated {} descriptor set(s).", args.inputs.len());
    Ok(())
}

#[derive(Debug, Serialize)]
struct FamilySummary {
    name: String,
    members: usize,
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    name: Option<String>,
    version: String,
    generated_at: String,
    records: usize,
    leaves: usize,
    branches: usize,
    families: Vec<FamilySummary>,
}

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let set = load_set(&args.input)?;

    let leaves = set.arena.iter().filter(|(_, record)| record.is_leaf).count();
    let summary = InspectSummary {
        name: set.name.clone(),
        version: set.version.clone(),
        generated_at: set.generated_at.clone(),
        records: set.record_count(),
        leaves,
        branches: set.record_count() - leaves,
        families: set
            .families
            .iter()
            .map(|family| FamilySummary {
                name: family.name.clone(),
                members: family.members.len(),
            })
            .collect(),
    };

    match args.format {
        Some(format) => println!("{}", format.render(&summary)?),
        None => {
            let label = summary.name.as_deref().unwrap_or("<unnamed>");
            println!(
                "set: {label} version {} (generated {})",
                summary.version, summary.generated_at
            );
            println!(
                "records: {} ({} leaves, {} branches)",
                summary.records, summary.leaves, summary.branches
            );
            println!("families:");
            for family in &summary.families {
                println!("  {}: {} member(s)", family.name, family.members);
            }
        }
    }
    Ok(())
}

fn load_set(path: &Path) -> Result<DescriptorSet, String> {
    let set: DescriptorSet = load_document(path)?;
    let errors = validate_set(&set);
    match errors.into_iter().next() {
        None => Ok(set),
        Some(error) => Err(format!("{}: {error}", path.display())),
    }
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&raw).map_err(|err| format!("{}: {err}", path.display()))
    } else {
        serde_json::from_str(&raw).map_err(|err| format!("{}: {err}", path.display()))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output")
        .to_string()
}
