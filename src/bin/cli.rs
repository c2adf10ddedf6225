//! Keiba CLI - offline tools for history pages and model replies

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use keiba::core::{NormalizerConfig, ProbabilityNormalizer, RankRepairer, StrictOutput};
use keiba::predictor::{parse_reply_object, probabilities_from_reply, ranking_from_reply};
use keiba::scraper::{decode_markup, ExtractorConfig, HistoryExtractor};
use keiba::{validate_distribution, validate_permutation, HorseBrief, PerformanceRecord};

#[derive(Parser)]
#[command(name = "keiba")]
#[command(author, version, about = "Horse racing history and prediction tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON only
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract race history from a saved horse profile page
    Extract {
        /// Path to the HTML file
        file: PathBuf,

        /// Maximum number of history rows
        #[arg(short, long, env = "KEIBA_HISTORY_LIMIT")]
        limit: Option<usize>,

        /// Print only the last-run summary
        #[arg(long)]
        brief: bool,
    },

    /// Normalize a model reply into win probabilities
    Normalize {
        /// Path to the reply text
        file: PathBuf,

        /// Runner ids, comma separated (default: keys of the reply)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Round and floor zeros for strict consumers
        #[arg(long)]
        strict: bool,

        /// Decimal places kept in strict mode
        #[arg(long, default_value = "4")]
        precision: u32,

        /// Replacement for zero probabilities in strict mode
        #[arg(long, default_value = "0.0001")]
        floor: f64,
    },

    /// Repair a model reply into a finishing order
    Rank {
        /// Path to the reply text
        file: PathBuf,

        /// Runner ids in canonical order, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !cli.json {
        println!("{}", "Keiba CLI v0.3.0".cyan().bold());
        println!();
    }

    match cli.command {
        Commands::Extract { file, limit, brief } => run_extract(&file, limit, brief, cli.json),
        Commands::Normalize {
            file,
            ids,
            strict,
            precision,
            floor,
        } => {
            let strict = strict.then(|| StrictOutput::new(precision, floor));
            run_normalize(&file, ids, NormalizerConfig { strict }, cli.json)
        }
        Commands::Rank { file, ids } => run_rank(&file, &ids, cli.json),
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(decode_markup(&bytes))
}

fn run_extract(file: &Path, limit: Option<usize>, brief: bool, json: bool) -> Result<()> {
    let markup = read_text(file)?;
    let extractor = HistoryExtractor::new(ExtractorConfig { row_limit: limit });
    let records = extractor.extract(&markup);

    if brief {
        let summary = HorseBrief::from_records(&records);
        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_brief(&summary);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", "No history rows found.".red());
        return Ok(());
    }

    print_records(&records);
    Ok(())
}

fn print_brief(brief: &HorseBrief) {
    println!("{}", "前走 (Last run):".yellow().bold());
    println!(
        "  {:<12} {}",
        "Date:",
        brief.last_result_date.as_deref().unwrap_or("-")
    );
    println!(
        "  {:<12} {}",
        "Race:",
        brief.last_result_name.as_deref().unwrap_or("-")
    );
    println!(
        "  {:<12} {}",
        "Finish:",
        brief
            .last_finish
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

fn print_records(records: &[PerformanceRecord]) {
    println!("{}", "戦績 (Race history):".yellow().bold());
    println!(
        "{:<12} {:<24} {:>6} {:>8} {:>6} {:>8} {:>6}",
        "Date", "Race", "Finish", "Dist", "Going", "Time", "Odds"
    );
    println!("{}", "-".repeat(80));

    for record in records {
        let finish = match record.finish_position {
            Some(keiba::FinishPosition::Placed(n)) => n.to_string(),
            Some(keiba::FinishPosition::Status(s)) => format!("{:?}", s),
            None => "-".to_string(),
        };
        let finish = if finish == "1" {
            finish.green().bold().to_string()
        } else {
            finish
        };

        println!(
            "{:<12} {:<24} {:>6} {:>8} {:>6} {:>8} {:>6}",
            record.date.as_deref().unwrap_or("-"),
            truncate(record.race_name.as_deref().unwrap_or("-"), 24),
            finish,
            record
                .distance_meters
                .map(|d| format!("{}m", d))
                .unwrap_or_else(|| "-".to_string()),
            record
                .going
                .map(|g| format!("{:?}", g))
                .unwrap_or_else(|| "-".to_string()),
            record
                .finish_time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .odds
                .map(|o| format!("{:.1}", o))
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    println!();
    println!("{} rows", records.len());
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars - 1).collect();
        out.push('…');
        out
    }
}

fn run_normalize(file: &Path, ids: Vec<String>, config: NormalizerConfig, json: bool) -> Result<()> {
    let reply = read_text(file)?;

    let ids = if ids.is_empty() {
        let object = parse_reply_object(&reply)
            .context("Reply is not a JSON object; pass --ids to fall back to uniform scores")?;
        object.keys().cloned().collect()
    } else {
        ids
    };

    let normalizer = ProbabilityNormalizer::new(config);
    let distribution = probabilities_from_reply(&ids, Some(reply.as_str()), &normalizer);
    validate_distribution(&distribution, 1e-6)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&distribution)?);
        return Ok(());
    }

    println!("{}", "勝率 (Win probabilities):".yellow().bold());
    println!("{:<24} {:>10}", "Horse", "Prob");
    println!("{}", "-".repeat(36));

    let mut rows: Vec<(&str, f64)> = distribution.iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (id, p) in rows {
        println!("{:<24} {:>9.2}%", id, p * 100.0);
    }
    Ok(())
}

fn run_rank(file: &Path, ids: &[String], json: bool) -> Result<()> {
    if ids.is_empty() {
        bail!("At least one runner id is required");
    }

    let reply = read_text(file)?;
    let ranks = ranking_from_reply(ids, Some(reply.as_str()), &RankRepairer::default());
    validate_permutation(&ranks)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranks)?);
        return Ok(());
    }

    println!("{}", "着順予想 (Predicted order):".yellow().bold());
    for (i, id) in ranks.finishing_order().iter().enumerate() {
        let line = format!("{:>3}. {}", i + 1, id);
        if i == 0 {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
    }
    Ok(())
}
