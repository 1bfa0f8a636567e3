use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use std::fs;
use std::path::PathBuf;

use clawscore::github::{CachedReputationProvider, GitHubClient};
use clawscore::ingest::ingest_directory;
use clawscore::report::security_report;
use clawscore::rescore::{apply_scan_results, refresh_author_scores};
use clawscore::scan::parse_scan_report;
use clawscore::scorer::{compute_security_score, SecurityScoreInput};
use clawscore::skillmd::collect_skill_content;
use clawscore::store::JsonFileStore;

#[derive(Parser)]
#[command(
    name = "clawscore",
    about = "Security scoring for ClawStack marketplace skills."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single skill from its files, without touching a store
    Score {
        /// Path to a SKILL.md file or a skill directory
        #[arg(long)]
        input: PathBuf,

        /// GitHub handle of the skill author
        #[arg(long)]
        author: Option<String>,

        /// Public source repository URL
        #[arg(long)]
        repo_url: Option<String>,

        /// Output format: json or summary
        #[arg(long, default_value = "summary")]
        format: String,
    },

    /// Ingest a crawled author/skill directory tree into a profile store
    Ingest {
        /// Root of the crawled tree (layout: root/author/skill-name/)
        #[arg(long)]
        dir: PathBuf,

        /// Path to the JSON profile store
        #[arg(long)]
        store: PathBuf,
    },

    /// Re-score the scan dimension from a malware-scanner report
    Rescan {
        /// Path to the JSON profile store
        #[arg(long)]
        store: PathBuf,

        /// Path to the scanner report JSON
        #[arg(long)]
        report: PathBuf,
    },

    /// Refresh the author-trust dimension from the GitHub API
    RefreshAuthors {
        /// Path to the JSON profile store
        #[arg(long)]
        store: PathBuf,

        /// GitHub API token (falls back to the GITHUB_TOKEN env var)
        #[arg(long)]
        github_token: Option<String>,
    },

    /// Print a security statistics report over the whole store
    Report {
        /// Path to the JSON profile store
        #[arg(long)]
        store: PathBuf,
    },
}

fn cmd_score(
    input: PathBuf,
    author: Option<String>,
    repo_url: Option<String>,
    format: String,
) -> Result<()> {
    let content = if input.is_dir() {
        collect_skill_content(&input)?
            .ok_or_else(|| eyre::eyre!("No scoreable files under {}", input.display()))?
    } else {
        fs::read_to_string(&input)
            .wrap_err_with(|| format!("Failed to read {}", input.display()))?
    };

    let output = compute_security_score(&SecurityScoreInput {
        skill_content: Some(&content),
        author_handle: author.as_deref(),
        repo_url: repo_url.as_deref(),
        ..Default::default()
    });

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("Skill Security Score");
            println!("====================");
            println!("Grade: {}", output.grade);
            println!("Score: {}/100", output.score);
            println!();
            println!("Breakdown:");
            println!("  Permissions:   {}/20", output.details.permission_score);
            println!("  Author trust:  {}/15", output.details.author_trust_score);
            println!("  Network:       {}/15", output.details.network_score);
            println!("  Community:     {}/10", output.details.community_score);
            println!("  Auditability:  {}/10", output.details.auditability_score);
            println!("  Malware scan:  {}/30", output.details.scan_score);
        }
    }
    Ok(())
}

fn cmd_ingest(dir: PathBuf, store_path: PathBuf) -> Result<()> {
    let mut store = JsonFileStore::open(&store_path)?;
    let report = ingest_directory(&mut store, &dir)?;
    println!("{}", report.summary());
    Ok(())
}

fn cmd_rescan(store_path: PathBuf, report_path: PathBuf) -> Result<()> {
    let raw = fs::read_to_string(&report_path)
        .wrap_err_with(|| format!("Failed to read {}", report_path.display()))?;
    let results = parse_scan_report(&raw)?;

    let mut store = JsonFileStore::open(&store_path)?;
    let report = apply_scan_results(&mut store, &results)?;
    println!("{}", report.summary("Scan re-score"));
    Ok(())
}

fn cmd_refresh_authors(store_path: PathBuf, github_token: Option<String>) -> Result<()> {
    let token = github_token.or_else(|| std::env::var("GITHUB_TOKEN").ok());
    let provider = CachedReputationProvider::new(GitHubClient::new(token)?);

    let mut store = JsonFileStore::open(&store_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(refresh_author_scores(&mut store, &provider))?;
    println!("{}", report.summary("Author-trust re-score"));
    Ok(())
}

fn cmd_report(store_path: PathBuf) -> Result<()> {
    let store = JsonFileStore::open(&store_path)?;
    print!("{}", security_report(&store)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            input,
            author,
            repo_url,
            format,
        } => cmd_score(input, author, repo_url, format),
        Commands::Ingest { dir, store } => cmd_ingest(dir, store),
        Commands::Rescan { store, report } => cmd_rescan(store, report),
        Commands::RefreshAuthors {
            store,
            github_token,
        } => cmd_refresh_authors(store, github_token),
        Commands::Report { store } => cmd_report(store),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
