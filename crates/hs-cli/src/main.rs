//! HeurShield CLI
//!
//! Compiles heuristic rule feeds and runs databases against saved pages.

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use hs_compiler::{compile, load_database};
use hs_core::config::EngineConfig;
use hs_core::engine::HeuristicsEngine;
use hs_core::host::{HostCall, MemoryHost};
use hs_core::memdom::MemoryDocument;
use hs_core::selector::parse_selector;
use hs_core::types::ProcessedRules;

#[derive(Parser)]
#[command(name = "hs-cli")]
#[command(about = "HeurShield heuristic rule compiler and tools")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a raw rule feed into a database
    Compile {
        /// Raw rule feed (JSON array)
        #[arg(short, long)]
        input: String,

        /// Output database file
        #[arg(short, long, default_value = "heuristics.json")]
        output: String,
    },

    /// Check that every selector in a database parses
    Validate {
        /// Database file (raw or compiled)
        #[arg(short, long)]
        input: String,
    },

    /// Dump database info
    Info {
        /// Database file (raw or compiled)
        #[arg(short, long)]
        input: String,
    },

    /// Run a database against a saved page
    Run {
        /// Database file (raw or compiled)
        #[arg(short, long)]
        database: String,

        /// Saved HTML page
        #[arg(long)]
        html: String,

        /// URL the page was loaded from
        #[arg(long)]
        url: String,

        #[arg(long, default_value_t = 1)]
        tab: i32,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<String>,

        /// Manual scam whitelist, one domain per line
        #[arg(long)]
        whitelist: Option<String>,

        /// Popularity allowlist, one domain per line
        #[arg(long)]
        popular: Option<String>,

        /// Force aggressive mode
        #[arg(long)]
        aggressive: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let result = match cli.command {
        Commands::Compile { input, output } => cmd_compile(&input, &output, cli.verbose),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Info { input } => cmd_info(&input),
        Commands::Run {
            database,
            html,
            url,
            tab,
            config,
            whitelist,
            popular,
            aggressive,
        } => cmd_run(RunArgs {
            database,
            html,
            url,
            tab,
            config,
            whitelist,
            popular,
            aggressive,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn read_database(path: &str) -> Result<ProcessedRules, String> {
    let content = read_file(path)?;
    let output = load_database(&content).map_err(|e| format!("Invalid database '{}': {}", path, e))?;
    if !output.issues.is_empty() {
        log::warn!("{} records in '{}' were skipped", output.issues.len(), path);
    }
    Ok(output.rules)
}

/// One domain per line; blank lines and `#` comments are ignored.
fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

fn cmd_compile(input: &str, output: &str, verbose: bool) -> Result<(), String> {
    let start = Instant::now();

    let content = read_file(input)?;
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| format!("Invalid rule feed '{}': {}", input, e))?;
    let parse_time = start.elapsed();

    let build_start = Instant::now();
    let compiled = compile(&records);
    let build_time = build_start.elapsed();

    if verbose {
        for issue in &compiled.issues {
            println!("  skipped: {issue}");
        }
    }

    let json = serde_json::to_string_pretty(&compiled.rules).map_err(|e| format!("Failed to serialize: {}", e))?;
    fs::write(output, &json).map_err(|e| format!("Failed to write '{}': {}", output, e))?;

    let stats = compiled.stats();
    let total_time = start.elapsed();

    println!("Compiled '{}' to '{}'", input, output);
    println!("  Records:  {}", stats.records);
    println!("  Entries:  {}", stats.compiled);
    for (kind, count) in &stats.skipped {
        println!("  Skipped:  {} {}", count, kind);
    }
    println!("  Size:     {} bytes ({:.1} KB)", json.len(), json.len() as f64 / 1024.0);
    println!(
        "  Time:     {:.1}ms (parse: {:.1}ms, build: {:.1}ms)",
        total_time.as_secs_f64() * 1000.0,
        parse_time.as_secs_f64() * 1000.0,
        build_time.as_secs_f64() * 1000.0,
    );

    Ok(())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let rules = read_database(input)?;

    let mut checked = 0usize;
    let mut invalid = 0usize;
    for (rule_type, bucket) in rules.buckets() {
        for (token, by_domain) in bucket {
            for (domain, entries) in by_domain {
                for entry in entries {
                    checked += 1;
                    if let Err(e) = parse_selector(&entry.selector) {
                        invalid += 1;
                        println!("  {rule_type} {domain}{token}{}: {e}", entry.selector);
                    }
                }
            }
        }
    }

    if invalid > 0 {
        return Err(format!("{} of {} selectors in '{}' do not parse", invalid, checked, input));
    }
    println!("Database '{}' is valid ({} selectors)", input, checked);
    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let rules = read_database(input)?;

    println!("Database: {}", input);
    println!("  Name:        {}", rules.name);
    println!("  Clean name:  {}", rules.clean_name);
    println!("  Version:     {}", rules.version);
    println!("  Entries:     {}", rules.entry_count());
    println!();

    for (rule_type, bucket) in rules.buckets() {
        let domains: usize = bucket.values().map(|by_domain| by_domain.len()).sum();
        let entries: usize = bucket.values().flat_map(|by_domain| by_domain.values()).map(Vec::len).sum();
        println!("  {:<10} {} domain patterns, {} entries", rule_type.as_str(), domains, entries);
        for (token, by_domain) in bucket {
            let count: usize = by_domain.values().map(Vec::len).sum();
            println!("    {:<4} {}", token, count);
        }
    }

    Ok(())
}

struct RunArgs {
    database: String,
    html: String,
    url: String,
    tab: i32,
    config: Option<String>,
    whitelist: Option<String>,
    popular: Option<String>,
    aggressive: bool,
}

fn cmd_run(args: RunArgs) -> Result<(), String> {
    let rules = read_database(&args.database)?;

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json(&read_file(path)?).map_err(|e| format!("Invalid config '{}': {}", path, e))?,
        None => EngineConfig::default(),
    };
    if args.aggressive {
        config.aggressive_mode = true;
    }

    let mut host = MemoryHost::new();
    if let Some(path) = &args.whitelist {
        host = host.with_table(&config.databases.whitelist_scams_manual, parse_domain_list(&read_file(path)?));
    }
    if let Some(path) = &args.popular {
        host = host.with_table(&config.databases.top1m, parse_domain_list(&read_file(path)?));
    }

    let doc = MemoryDocument::parse(&read_file(&args.html)?);
    let mut engine = HeuristicsEngine::new(rules, config);

    let start = Instant::now();
    let outcome = engine
        .run_navigation(&doc, &args.url, args.tab, &host)
        .map_err(|e| format!("Navigation failed: {}", e))?;
    let elapsed = start.elapsed();

    println!("Page: {}", args.url);
    println!("  Selectors:   {} evaluated, {} skipped, {} matched", outcome.process.selectors_evaluated, outcome.process.selectors_skipped, outcome.process.selectors_matched);
    println!("  Failures:    {}", outcome.process.failures.len());
    println!("  Hidden:      {}", outcome.hidden);
    println!("  Candidates:  {}", outcome.report.urls().len());
    println!("  Excluded:    {}", outcome.scan.excluded());
    println!("  Time:        {:.2}ms", elapsed.as_secs_f64() * 1000.0);

    for failure in &outcome.process.failures {
        println!("  failed: {} '{}': {}", failure.rule_type, failure.selector, failure.error);
    }

    let report = serde_json::to_string_pretty(&outcome.report).map_err(|e| format!("Failed to serialize: {}", e))?;
    println!();
    println!("Report: {report}");

    for call in host.calls() {
        match call {
            HostCall::OnScam(context) => println!("  on_scam: {} ({}, rule {})", context.url, context.subtype, context.rule),
            HostCall::Navigate { tab_id, url } => println!("  navigate: tab {} -> {}", tab_id, url),
            HostCall::RecordAll { matched_domain, .. } => println!("  record_all: {}", matched_domain),
            HostCall::UpdateBadgeCount { tab_id } => println!("  update_badge_count: tab {}", tab_id),
        }
    }

    Ok(())
}
