use std::time::Instant;

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use pricewatch::archive::{CaptureSource, WaybackClient};
use pricewatch::config::Settings;
use pricewatch::{AnalysisRequest, Analyzer, Interval, TimeSeries};

const DEFAULT_LOOKBACK_DAYS: u64 = 730;

#[derive(Parser)]
#[command(name = "pricewatch", about = "Reconstruct historical pricing from archived snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample archived captures of a page and extract prices from each
    Analyze {
        url: String,
        /// First date of the range (default: two years before --end)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date of the range (default: today)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// monthly, quarterly or annual
        #[arg(short, long, default_value = "quarterly")]
        interval: Interval,
        /// Days either side of each target date to accept a capture
        #[arg(short, long)]
        tolerance: Option<u32>,
        /// Ask the local inference service when heuristics find little
        #[arg(long)]
        use_llm: bool,
        /// Override the inference model name
        #[arg(long)]
        llm_model: Option<String>,
        /// Print the full time series as JSON
        #[arg(long)]
        json: bool,
        /// Skip the price table
        #[arg(long)]
        no_table: bool,
    },
    /// List archived captures of a page
    Snapshots {
        url: String,
        /// Max captures to list
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("loading settings")?;

    let result = match cli.command {
        Commands::Analyze {
            url,
            start,
            end,
            interval,
            tolerance,
            use_llm,
            llm_model,
            json,
            no_table,
        } => {
            if let Some(model) = llm_model {
                settings.inference.model = model;
            }
            let end = end.unwrap_or_else(|| Local::now().date_naive());
            let start = start.unwrap_or_else(|| {
                end.checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
                    .unwrap_or(end)
            });
            let mut request = AnalysisRequest::new(url, start, end, interval)?;
            if let Some(days) = tolerance {
                request = request.with_tolerance(days);
            }

            let analyzer = Analyzer::connect(&settings, use_llm)
                .await
                .context("setting up analyzer")?;
            if use_llm && !analyzer.pipeline().fallback_enabled() {
                println!(
                    "Inference service at {} not reachable; continuing with heuristics only.",
                    settings.inference.host
                );
            }

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );

            let shutdown = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let series = analyzer
                .run_until(&request, &pb, shutdown)
                .await
                .with_context(|| format!("analyzing {}", request.url))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                if !no_table {
                    print_table(&series);
                }
                print_summary(&series);
            }
            Ok(())
        }
        Commands::Snapshots { url, limit } => {
            let client = WaybackClient::new(&settings.archive)?;
            let captures = client
                .list_captures(&url, None, None, Some(limit))
                .await
                .with_context(|| format!("listing captures of {url}"))?;
            if captures.is_empty() {
                println!("No captures found for {}", url);
                return Ok(());
            }

            println!("{:<19} | {:>6} | {}", "Captured", "Status", "Archived URL");
            println!("{}", "-".repeat(90));
            for c in &captures {
                println!(
                    "{:<19} | {:>6} | {}",
                    c.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    c.status_code,
                    c.archived_url
                );
            }
            println!("\n{} captures", captures.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_table(series: &TimeSeries) {
    let rows = series.rows();
    if rows.is_empty() {
        println!("No prices found.");
        return;
    }

    println!(
        "{:<10} | {:>10} | {:<3} | {:<9} | {:<16} | {:>4} | {:<10} | {:>6}",
        "Date", "Price", "Cur", "Period", "Tier", "Conf", "Method", "Offset"
    );
    println!("{}", "-".repeat(92));

    for r in &rows {
        let tier = r.tier.as_deref().map(|t| truncate(t, 16)).unwrap_or_else(|| "-".into());
        let offset = if r.is_exact {
            "exact".to_string()
        } else {
            format!("{}d", r.offset_days)
        };
        println!(
            "{:<10} | {:>10.2} | {:<3} | {:<9} | {:<16} | {:>4.2} | {:<10} | {:>6}",
            r.date,
            r.value,
            r.currency.as_str(),
            r.period.as_str(),
            tier,
            r.confidence,
            r.method.as_str(),
            offset
        );
    }
}

fn print_summary(series: &TimeSeries) {
    println!(
        "\n{}: {}/{} snapshots with prices ({:.0}%) between {} and {}",
        series.url,
        series.successful_extractions,
        series.total_snapshots,
        series.success_rate() * 100.0,
        series.start_date,
        series.end_date
    );
    let failed: Vec<_> = series.results.iter().filter(|r| !r.errors.is_empty()).collect();
    if !failed.is_empty() {
        println!("\n--- Errors ---");
        for r in failed {
            println!("  {}: {}", r.capture.date(), r.errors.join("; "));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
