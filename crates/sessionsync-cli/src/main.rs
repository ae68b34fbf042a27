use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sessionsync_core::repo_check::{
    check_repo_visibility, ensure_security_gitignore, RepoVisibility,
};
use sessionsync_core::status::{format_bytes, status};
use sessionsync_core::{
    default_device_id, CacheState, FileCacheMarker, Finding, GateOutcome, GitRepository,
    PullSummary, PushOptions, PushOutcome, Repository, SyncConfig, SyncConfigStore,
    SyncEnvironment, SyncError, SyncPipeline,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sessionsync")]
#[command(about = "Sync assistant sessions and skills across devices through a git repository")]
struct Cli {
    /// Log debug output (overridden by SESSIONSYNC_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone (or create) the shared repository and record this device.
    Init {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        device: Option<String>,
    },
    /// Scan, copy local sessions and skills into the repository, commit and push.
    Push {
        #[arg(long = "skip-secret-scan")]
        skip_secret_scan: bool,
        #[arg(long)]
        json: bool,
    },
    /// Pull the repository and deploy sessions and skill links locally.
    Pull {
        #[arg(long)]
        json: bool,
    },
    /// Pull, then push.
    Sync {
        #[arg(long = "skip-secret-scan")]
        skip_secret_scan: bool,
        #[arg(long)]
        json: bool,
    },
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Run the secret scan over what a push would send.
    Scan {
        #[arg(long)]
        json: bool,
    },
    /// Delete the stats cache so the assistant recalculates it.
    ResetCache,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let store = SyncConfigStore::default();
    let environment = SyncEnvironment::current();
    let transport = GitRepository::new();
    let cache = FileCacheMarker::new(environment.stats_cache_file.clone());

    match cli.command {
        Commands::Init { repo, path, device } => {
            let repo_path = path.unwrap_or_else(|| store.paths().default_repo_path.clone());
            let device = device.unwrap_or_else(default_device_id);
            let config = SyncConfig::new(repo, repo_path, &device)?;
            init_repository(&transport, &config)?;
            store.save(&config)?;
            println!(
                "initialized repo={} path={} device={}",
                config.repo,
                config.repo_path.display(),
                config.device
            );
        }
        Commands::Push {
            skip_secret_scan,
            json,
        } => {
            let config = store.require()?;
            let pipeline = SyncPipeline::new(&config, environment, &transport, &cache);
            let outcome = pipeline.push(PushOptions { skip_secret_scan })?;
            report_push(&outcome, json)?;
        }
        Commands::Pull { json } => {
            let config = store.require()?;
            let pipeline = SyncPipeline::new(&config, environment, &transport, &cache);
            let summary = pipeline.pull()?;
            report_pull(&summary, json)?;
        }
        Commands::Sync {
            skip_secret_scan,
            json,
        } => {
            let config = store.require()?;
            let pipeline = SyncPipeline::new(&config, environment, &transport, &cache);
            let summary = pipeline.sync(PushOptions { skip_secret_scan })?;
            report_pull(&summary.pull, json)?;
            report_push(&summary.push, json)?;
        }
        Commands::Status { json } => {
            let config = store.require()?;
            let info = status(&config, &environment, &transport);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("repo={} device={}", info.repo_path.display(), info.device);
                if let Some(tree) = &info.tree {
                    println!(
                        "branch={} clean={} changes={}",
                        tree.branch, tree.clean, tree.changes
                    );
                }
                if let Some(commit) = &info.last_commit {
                    println!("last_commit={} {} ({})", commit.hash, commit.message, commit.date);
                }
                println!("local_sessions={}", info.local_sessions);
                for device in &info.devices {
                    println!(
                        "{}\t{}\t{}\t{}",
                        device.name,
                        device.session_count,
                        format_bytes(device.total_bytes),
                        device
                            .last_activity
                            .map(|value| value.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| String::from("-"))
                    );
                }
                println!(
                    "skills bundle={} lock={}",
                    info.skills.bundle_count, info.skills.has_lock
                );
                for consumer in &info.skills.consumers {
                    println!("linked {}={}", consumer.directory.display(), consumer.linked);
                }
            }
        }
        Commands::Scan { json } => {
            let config = store.require()?;
            let pipeline = SyncPipeline::new(&config, environment, &transport, &cache);
            let report = pipeline.scan();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_findings(&report.findings);
                println!(
                    "scanned={} findings={}",
                    report.files_scanned,
                    report.findings.len()
                );
            }
            if !report.findings.is_empty() {
                return Err(SyncError::SecretsDetected(report.findings.len()).into());
            }
        }
        Commands::ResetCache => {
            cache.invalidate()?;
            println!("stats cache cleared");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SESSIONSYNC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

fn init_repository(transport: &dyn Repository, config: &SyncConfig) -> Result<()> {
    let path = &config.repo_path;
    match transport.clone_repo(&config.repo, path) {
        Ok(true) => println!("cloned {}", config.repo),
        Ok(false) => println!("using existing checkout {}", path.display()),
        Err(error) => {
            tracing::warn!(%error, "clone failed; initializing an empty repository");
            transport
                .init(path, &config.repo)
                .context("failed to initialize shared repository")?;
        }
    }

    let lfs = transport.configure_binary_logs(path)?;
    if !lfs {
        println!("git-lfs unavailable; session logs marked binary via .gitattributes");
    }
    ensure_security_gitignore(path)?;

    match check_repo_visibility(&config.repo) {
        RepoVisibility::Private => {}
        RepoVisibility::Public => {
            eprintln!("warning: {} is PUBLIC; session logs may contain private data", config.repo)
        }
        RepoVisibility::Unknown => {
            eprintln!("warning: could not verify that {} is private", config.repo)
        }
    }
    Ok(())
}

fn report_push(outcome: &PushOutcome, json: bool) -> Result<()> {
    match outcome {
        PushOutcome::Blocked(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                print_findings(&report.findings);
                eprintln!("add `path:` or `rule:` lines to .sessionsync-ignore-secrets for false positives, or pass --skip-secret-scan");
            }
            Err(SyncError::SecretsDetected(report.findings.len()).into())
        }
        PushOutcome::NothingToPush {
            sessions, skills, ..
        } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "pushed": false, "sessions": sessions, "skills": skills })
                );
            } else {
                println!(
                    "nothing to push (sessions unchanged={} skills unchanged={})",
                    sessions.skipped, skills.skipped
                );
            }
            Ok(())
        }
        PushOutcome::Pushed(summary) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "pushed": summary.commit.pushed,
                        "committed": summary.commit.committed,
                        "error": summary.commit.error,
                        "sessions": summary.sessions,
                        "skills": summary.skills,
                    })
                );
            } else {
                if summary.gate == GateOutcome::Bypassed {
                    eprintln!("warning: secret scan was skipped");
                }
                println!(
                    "sessions copied={} skipped={} failed={} ({}) skills copied={} skipped={} lock={} committed={} pushed={}",
                    summary.sessions.copied,
                    summary.sessions.skipped,
                    summary.sessions.failed,
                    format_bytes(summary.sessions.total_bytes),
                    summary.skills.copied,
                    summary.skills.skipped,
                    summary.skills.lock_copied,
                    summary.commit.committed,
                    summary.commit.pushed
                );
                if let Some(error) = &summary.commit.error {
                    eprintln!("push error: {error}");
                }
            }
            if summary.is_fatal() {
                let detail = summary.commit.error.clone().unwrap_or_default();
                return Err(SyncError::transport("commit", detail).into());
            }
            Ok(())
        }
    }
}

fn report_pull(summary: &PullSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({ "sessions": summary.sessions, "skills": summary.skills })
        );
        return Ok(());
    }

    let sessions = &summary.sessions;
    if let Some(error) = &sessions.error {
        eprintln!("warning: git pull failed, merged local repository state: {error}");
    }
    println!(
        "sessions copied={} skipped={} failed={} devices={}",
        sessions.sessions_copied,
        sessions.sessions_skipped,
        sessions.failed,
        sessions.devices_seen.join(",")
    );
    if sessions.cache_invalidated {
        println!("stats cache invalidated");
    }

    let skills = &summary.skills;
    println!(
        "skills linked={} skipped={} lock={}",
        skills.linked, skills.skipped, skills.lock_copied
    );
    for conflict in &skills.conflicts {
        eprintln!(
            "skill {} not linked: {} is a real file or directory",
            conflict.name,
            conflict.path.display()
        );
    }
    Ok(())
}

fn print_findings(findings: &[Finding]) {
    for finding in findings {
        eprintln!(
            "{}:{}\t{}\t{}\t{}",
            finding.file, finding.line, finding.pattern_id, finding.label, finding.snippet
        );
    }
}
