mod common;
mod logic;
mod storage;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use prizeplay_game::{GameKind, default_promotions, load_or_default};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::split_csv;
use logic::{AuditResult, FairnessTester, resolve_seed_inputs};
use storage::PromotionsFile;

#[derive(Debug, Parser)]
#[command(name = "prizeplay-tester", version = "0.1.0")]
#[command(about = "Fairness audits and ledger smoke runs for PrizePlay reward tables")]
struct Args {
    /// Games to audit (comma-separated ids, or `all`)
    #[arg(long, default_value = "all")]
    games: String,

    /// List all available games and exit
    #[arg(long)]
    list_games: bool,

    /// Seeds to run (comma-separated, decimal or hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Draws per fairness audit
    #[arg(long, default_value_t = 10_000)]
    iterations: usize,

    /// Plays replayed through a ledger per game and seed
    #[arg(long)]
    smoke_plays: Option<usize>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON promotions catalog; the built-in offers are used when absent
    #[arg(long)]
    promotions: Option<PathBuf>,

    /// Keep smoke-run ledgers as JSON files under this directory
    #[arg(long)]
    ledger_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_games(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let games = expand_games(&args.games)?;
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let promotions = match &args.promotions {
        Some(path) => load_or_default(&PromotionsFile::new(path)),
        None => default_promotions().to_vec(),
    };
    log::info!(
        "auditing {} game(s) x {} seed(s) with {} promotions",
        games.len(),
        seed_infos.len(),
        promotions.len()
    );

    let mut tester =
        FairnessTester::new(promotions, args.verbose).with_ledger_dir(args.ledger_dir.clone());
    if let Some(plays) = args.smoke_plays {
        tester = tester.with_smoke_plays(plays);
    }
    let results = tester.run(&games, &seed_infos, args.iterations)?;

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_games(args: &Args) -> Result<bool> {
    if !args.list_games {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available games:")?;
    for kind in GameKind::ALL {
        writeln!(output_target.writer(), "  {:14} - {}", kind.id(), kind.description())?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎰 PrizePlay Fairness Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_games(games_arg: &str) -> Result<Vec<GameKind>> {
    let mut games = Vec::new();
    for token in split_csv(games_arg) {
        if token == "all" {
            games.extend(GameKind::ALL);
            continue;
        }
        let kind = token
            .parse::<GameKind>()
            .with_context(|| format!("--games entry `{token}`"))?;
        games.push(kind);
    }
    games.sort_unstable();
    games.dedup();
    if games.is_empty() {
        bail!("no games selected");
    }
    Ok(games)
}

fn write_reports(args: &Args, results: &[AuditResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => logic::reports::generate_markdown_report(&mut output_target, results)?,
        "csv" => logic::reports::generate_csv_report(&mut output_target, results)?,
        _ => {
            logic::reports::generate_console_report(
                &mut output_target,
                results,
                start_time.elapsed(),
            )?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
