use anyhow::Result;
use chrono::Datelike;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;

use sec_extract::batch;
use sec_extract::core::config::ExtractConfig;
use sec_extract::edgar::fetch;

#[derive(StructOpt)]
#[structopt(
    name = "sec-extract",
    about = "Extract institutional holdings (13F) and insider transactions (Form 4) from SEC filings"
)]
enum Command {
    /// Extract records from a directory of downloaded filings
    Extract {
        /// Filings root laid out as <root>/<cik>/<form>/<accession>;
        /// defaults to SEC_DATA_DIR
        #[structopt(long, parse(from_os_str))]
        root: Option<PathBuf>,
        /// Output directory for holdings.csv and transactions.csv
        #[structopt(long, parse(from_os_str), default_value = "out")]
        out: PathBuf,
    },
    /// Download 13F and Form 4 filings for the given CIKs into the data dir
    Fetch {
        /// One or more CIK numbers
        ciks: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    log::debug!("Logger initialized");

    let config = ExtractConfig::from_env()?;

    match Command::from_args() {
        Command::Extract { root, out } => {
            run_extract(root.unwrap_or_else(|| config.data_dir.clone()), out)
        }
        Command::Fetch { ciks } => run_fetch(&config, &ciks).await,
    }
}

fn run_extract(root: PathBuf, out: PathBuf) -> Result<()> {
    let total = batch::count_documents(&root);
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let result = batch::run(&root, Some(&progress))?;
    progress.finish_and_clear();

    fs::create_dir_all(&out)?;
    let holdings_path = out.join("holdings.csv");
    let mut writer = csv::Writer::from_path(&holdings_path)?;
    for row in &result.holdings {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let transactions_path = out.join("transactions.csv");
    let mut writer = csv::Writer::from_path(&transactions_path)?;
    for row in &result.transactions {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let summary = &result.summary;
    println!(
        "{} {} documents: {} extracted, {} with no data expected, {} skipped",
        "Processed".green().bold(),
        summary.documents,
        summary.extracted,
        summary.no_data,
        summary.skipped
    );
    for (filing_type, count) in summary.by_type.iter().sorted_by_key(|(t, _)| t.clone()) {
        println!("  {:>8}  {}", filing_type, count);
    }
    println!(
        "{} holdings -> {}",
        result.holdings.len(),
        holdings_path.display()
    );
    println!(
        "{} transactions -> {}",
        result.transactions.len(),
        transactions_path.display()
    );
    if summary.warnings > 0 {
        println!(
            "{}",
            format!("{} warnings; see the log for details", summary.warnings).yellow()
        );
    }
    Ok(())
}

async fn run_fetch(config: &ExtractConfig, ciks: &[String]) -> Result<()> {
    if ciks.is_empty() {
        println!("{}", "No CIKs given; nothing to fetch".yellow());
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?;

    for cik in ciks {
        let submissions = fetch::fetch_submissions(&client, cik, &config.user_agent).await?;
        let filings: Vec<_> = submissions
            .filings
            .recent
            .entries()
            .into_iter()
            .filter(|f| f.filing_date.year() >= config.min_filing_year)
            .collect();
        println!(
            "{} {} ({}): {} filings to fetch",
            "CIK".green().bold(),
            cik,
            submissions.name,
            filings.len()
        );
        for filing in &filings {
            fetch::download_filing(&client, cik, filing, &config.data_dir, &config.user_agent)
                .await?;
        }
    }
    Ok(())
}
