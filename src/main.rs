use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use basic_auth_scan_rs::config::ScanConfig;
use basic_auth_scan_rs::creds::{self, CredentialSet};
use basic_auth_scan_rs::report::{self, ReportSink};
use basic_auth_scan_rs::scanner::Controller;
use basic_auth_scan_rs::targets;
use basic_auth_scan_rs::transport::HttpTransport;
use basic_auth_scan_rs::types::{RunStatus, ScanReport};

use anyhow::{bail, Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

/// basic-auth-scan-rs: concurrent HTTP Basic-Auth credential tester for hosts you are authorized to assess.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "basic-auth-scan-rs",
    version,
    about = "Concurrent HTTP Basic-Auth credential tester for hosts you are authorized to assess.",
    long_about = None
)]
struct Cli {
    /// File with targets, one IP[:port] per line. Repeat to merge several lists.
    #[arg(short = 'I', long = "iplist", required = true)]
    iplist: Vec<PathBuf>,

    /// Username used when no user file is given.
    #[arg(short = 'u', long = "user", default_value = creds::DEFAULT_USERNAME)]
    user: String,

    /// Password used when no password file is given.
    #[arg(short = 'p', long = "passwd", default_value = creds::DEFAULT_PASSWORD)]
    passwd: String,

    /// File with usernames, one per line.
    #[arg(short = 'U', long = "userfile")]
    userfile: Option<PathBuf>,

    /// File with passwords to try with each user, one per line.
    #[arg(short = 'P', long = "passfile")]
    passfile: Option<PathBuf>,

    /// Number of concurrent workers (never more than the number of targets).
    #[arg(short = 't', long = "threads", default_value_t = 10)]
    threads: usize,

    /// Timeout for the unauthenticated probe, in milliseconds.
    #[arg(long = "probe-timeout-ms", default_value_t = 1000)]
    probe_timeout_ms: u64,

    /// Timeout for each authenticated request, in milliseconds.
    #[arg(long = "trial-timeout-ms", default_value_t = 5000)]
    trial_timeout_ms: u64,

    /// Idle wait between polls of an empty queue, in milliseconds.
    #[arg(long = "poll-interval-ms", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Body text that marks a 200 page as a disguised rejection. Repeatable.
    #[arg(long = "fp-marker", default_value = "HTTP 401")]
    fp_marker: Vec<String>,

    /// Directory for the HTML report and the incremental results log.
    #[arg(long = "output-dir", default_value = "output")]
    output_dir: PathBuf,

    /// Also write the full report as pretty JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Verbose output (every probe and credential attempt).
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            workers: self.threads,
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            trial_timeout: Duration::from_millis(self.trial_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            false_positive_markers: self.fp_marker.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    println!("basic-auth-scan-rs configuration:");
    println!(
        "  iplist       : {}",
        cli.iplist
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  users        : {}",
        cli.userfile
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| cli.user.clone())
    );
    println!(
        "  passwords    : {}",
        cli.passfile
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<single password>".to_string())
    );
    println!("  threads      : {}", cli.threads);
    println!("  probe_ms     : {}", cli.probe_timeout_ms);
    println!("  trial_ms     : {}", cli.trial_timeout_ms);
    println!("  fp_markers   : {:?}", cli.fp_marker);
    println!("  output_dir   : {}", cli.output_dir.display());

    let config = cli.scan_config();
    config.validate()?;

    let mut sources = Vec::with_capacity(cli.iplist.len());
    for path in &cli.iplist {
        sources.push(targets::load_targets_from_path(path)?);
    }
    let endpoints = targets::merge_sources(sources);
    if endpoints.is_empty() {
        bail!("no targets to test");
    }
    println!("Elements to test: {}", endpoints.len());

    let usernames = cli.userfile.as_ref().map(|p| creds::load_wordlist(p)).transpose()?;
    let passwords = cli.passfile.as_ref().map(|p| creds::load_wordlist(p)).transpose()?;
    let creds = CredentialSet::from_sources(&cli.user, &cli.passwd, usernames, passwords);

    std::fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!("failed to create output directory: {}", cli.output_dir.display())
    })?;
    let stem = report::report_file_stem(OffsetDateTime::now_utc());
    let html_path = cli.output_dir.join(format!("{stem}.html"));
    let log_path = cli.output_dir.join(format!("{stem}.jsonl"));
    let sink = Arc::new(ReportSink::with_log(&log_path)?);

    let interrupt = CancellationToken::new();
    let interrupt_ctrlc = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("keyboard interrupt received");
            interrupt_ctrlc.cancel();
        }
    });

    let transport = Arc::new(HttpTransport::new()?);
    let mut controller = Controller::new(config, transport)?;
    let results = controller.run(endpoints, creds, sink, interrupt).await?;

    print_results_table(&results);
    report::write_html(&html_path, &results)?;
    if let Some(path) = cli.json.as_deref() {
        if let Err(e) = report::write_json(path, &results) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        }
    }
    if results.status == RunStatus::Cancelled {
        println!("Execution stopped by user");
    }
    info!(report = %html_path.display(), "done");

    Ok(())
}

fn print_results_table(results: &ScanReport) {
    let mut host_w = "host".len();
    let mut user_w = "username".len();
    for e in &results.entries {
        host_w = host_w.max(e.endpoint.len());
        user_w = user_w.max(e.username.len());
    }

    println!(
        "\nAccess granted: {} (tested: {}, candidates: {}, false positives: {})",
        results.entries.len(),
        results.stats.dequeued,
        results.stats.candidates,
        results.stats.false_positives
    );
    println!(
        "{:<host_w$}  {:<user_w$}  {}",
        "host",
        "username",
        "password",
        host_w = host_w,
        user_w = user_w
    );
    println!(
        "{:-<host_w$}  {:-<user_w$}  {:-<8}",
        "",
        "",
        "",
        host_w = host_w,
        user_w = user_w
    );
    for e in &results.entries {
        println!(
            "{:<host_w$}  {:<user_w$}  {}",
            e.endpoint,
            e.username,
            e.password,
            host_w = host_w,
            user_w = user_w
        );
    }
}
