//! Receipt Aggregator CLI - attach emailed receipts to ledger transactions
//!
//! Usage:
//!   receipt-aggregator reconcile --emails DIR --csv FILE [--out FILE]
//!   receipt-aggregator reconcile --emails DIR --api
//!   receipt-aggregator classify --emails DIR
//!   receipt-aggregator similarity "Dunkin Donuts" "Dunkin'"

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use receipt_aggregator::{
    jaro_similarity, load_directory, ApiLedger, ClassifierBackend, Config, CsvLedger, Ledger,
    OllamaReceiptClassifier, OllamaReceiptExtractor, PipelineReport, ReceiptClassifier,
    ReceiptPipeline, ReconciliationEngine, RuleBasedClassifier,
};

type Pipeline = ReceiptPipeline<Box<dyn ReceiptClassifier>, OllamaReceiptExtractor>;

#[derive(Parser)]
#[command(name = "receipt-aggregator")]
#[command(about = "Reconcile emailed receipts against a transaction ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract receipts from emails and annotate matching ledger entries
    Reconcile(ReconcileArgs),

    /// Run the configured receipt classifier over each email
    Classify {
        /// Directory of .eml files
        #[arg(long)]
        emails: PathBuf,
    },

    /// Print the Jaro similarity of two merchant names
    Similarity { a: String, b: String },
}

#[derive(Args)]
struct ReconcileArgs {
    /// Directory of .eml files
    #[arg(long)]
    emails: PathBuf,

    /// Transactions CSV export to annotate
    #[arg(long, conflicts_with = "api", required_unless_present = "api")]
    csv: Option<PathBuf>,

    /// Write the annotated CSV here instead of overwriting the input
    #[arg(long, requires = "csv")]
    out: Option<PathBuf>,

    /// Annotate transactions through the account API
    #[arg(long)]
    api: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Reconcile(args) => cmd_reconcile(&config, args).await,
        Commands::Classify { emails } => cmd_classify(&config, &emails).await,
        Commands::Similarity { a, b } => {
            println!("{:.4}", jaro_similarity(&a, &b));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}

fn build_classifier(config: &Config) -> Box<dyn ReceiptClassifier> {
    match config.classifier.backend {
        ClassifierBackend::Rules => {
            Box::new(RuleBasedClassifier::new(config.classifier.threshold))
        }
        ClassifierBackend::Ollama => Box::new(OllamaReceiptClassifier::new(
            &config.ollama.host,
            &config.ollama.model,
        )),
    }
}

async fn cmd_reconcile(config: &Config, args: ReconcileArgs) -> Result<()> {
    let pipeline = ReceiptPipeline::new(
        build_classifier(config),
        OllamaReceiptExtractor::new(&config.ollama.host, &config.ollama.model),
        ReconciliationEngine::new(config.matching.clone()),
    );

    let report = if let Some(csv_path) = &args.csv {
        let mut ledger = CsvLedger::open(csv_path)
            .with_context(|| format!("Failed to open ledger {}", csv_path.display()))?;
        if let Some(out) = args.out {
            ledger = ledger.with_output(out);
        }
        run(&pipeline, &mut ledger, &args.emails).await?
    } else {
        let mut ledger = ApiLedger::new(&config.api.base_url)
            .with_equivalent_markers(config.api.equivalent_markers.clone());
        match config.api.token() {
            Some(token) => ledger = ledger.with_token(token),
            None => tracing::warn!(
                "{} is not set, calling the ledger API without credentials",
                config.api.token_env
            ),
        }
        run(&pipeline, &mut ledger, &args.emails).await?
    };

    print_report(&report);
    Ok(())
}

async fn run<L: Ledger>(
    pipeline: &Pipeline,
    ledger: &mut L,
    emails: &Path,
) -> Result<PipelineReport> {
    pipeline
        .run_directory(ledger, emails)
        .await
        .with_context(|| format!("Reconciliation over {} failed", emails.display()))
}

fn print_report(report: &PipelineReport) {
    let summary = report.batch.summary();

    println!("Emails loaded:        {}", report.emails_loaded);
    println!("Receipts detected:    {}", report.receipts_detected);
    println!("Unclassified:         {}", report.classification_failures);
    println!("Extraction failures:  {}", report.extraction_failures);
    println!();
    println!("Matched and updated:  {}", summary.matched);
    println!("Already reconciled:   {}", summary.already_reconciled);
    println!("No candidate:         {}", summary.no_candidate);
    println!("Ambiguous:            {}", summary.ambiguous);
    println!("Failed:               {}", summary.failed);
    println!("Invalid:              {}", summary.invalid);

    let ambiguous: Vec<_> = report.batch.ambiguous().collect();
    if !ambiguous.is_empty() {
        println!("\nNeeds manual review:");
        for (item, ids) in ambiguous {
            println!(
                "  {} ({}) -> {}",
                item.merchant,
                item.observed_date,
                ids.join(", ")
            );
        }
    }
}

async fn cmd_classify(config: &Config, emails: &Path) -> Result<()> {
    let emails = load_directory(emails)
        .with_context(|| format!("Failed to read emails from {}", emails.display()))?;

    match config.classifier.backend {
        ClassifierBackend::Rules => {
            let classifier = RuleBasedClassifier::new(config.classifier.threshold);
            for email in &emails {
                let verdict = if classifier.accepts(email) { "receipt" } else { "-" };
                println!("{:>5}  {:<8} {}", classifier.score(email), verdict, email.subject);
            }
        }
        ClassifierBackend::Ollama => {
            let classifier =
                OllamaReceiptClassifier::new(&config.ollama.host, &config.ollama.model);
            for email in &emails {
                let verdict = match classifier.is_receipt(email).await {
                    Ok(true) => "receipt".to_string(),
                    Ok(false) => "-".to_string(),
                    Err(error) => format!("error: {error}"),
                };
                println!("{:<8} {}", verdict, email.subject);
            }
        }
    }
    Ok(())
}
