//! lanmount - discover SMB servers on the local network and provision
//! persistent, on-demand mounts for selected shares.

mod console;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lanmount_core::pipeline::{self, PipelineConfig, SystemToolchain};
use lanmount_core::{ActivationResult, MountOwner, PlanOutcome, RunReport};

use console::ConsolePrompt;

/// lanmount CLI tool.
#[derive(Parser)]
#[command(name = "lanmount")]
#[command(about = "Discover SMB servers and provision on-demand mounts", long_about = None)]
struct Cli {
    /// Persisted mount table to update.
    #[arg(long, default_value = lanmount_core::fstab::FSTAB_PATH)]
    fstab: PathBuf,

    /// Directory for per-host credential files.
    #[arg(long, default_value = lanmount_core::credentials::DEFAULT_CREDENTIAL_DIR)]
    credential_dir: PathBuf,

    /// Root under which mount points are created.
    #[arg(long, default_value = lanmount_core::fstab::DEFAULT_MOUNT_ROOT)]
    mount_root: PathBuf,

    /// Owner uid for the mounted trees; omit to leave ownership with root.
    #[arg(long)]
    uid: Option<u32>,

    /// Owner gid for the mounted trees; defaults to the uid when omitted.
    #[arg(long, requires = "uid")]
    gid: Option<u32>,

    /// Print the run report as JSON instead of a text summary.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let owner = cli.uid.map(|uid| MountOwner {
        uid,
        gid: cli.gid.unwrap_or(uid),
    });
    let config = PipelineConfig {
        fstab_path: cli.fstab,
        credential_dir: cli.credential_dir,
        mount_root: cli.mount_root,
        owner,
    };

    if let Err(e) = pipeline::check_preconditions() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match pipeline::run(&ConsolePrompt::new(), &SystemToolchain, &config) {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: failed to serialize report: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print_summary(&report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Prints the end-of-run summary: created credential files, provisioned
/// mount paths, and every soft failure recorded along the way.
fn print_summary(report: &RunReport) {
    if let Some(range) = &report.range {
        println!(
            "Scanned {}: {} host(s) with SMB service",
            range, report.hosts_found
        );
    }

    if report.hosts.is_empty() {
        println!("Nothing provisioned.");
        return;
    }

    for host in &report.hosts {
        println!("\n{}", host.host);
        if let Some(path) = &host.credential_file {
            println!("  credential file: {}", path.display());
        }
        for share in &host.shares {
            let outcome = match share.outcome {
                PlanOutcome::Added => "added to fstab",
                PlanOutcome::AlreadyPresent => "already in fstab",
            };
            let activation = match &share.activation {
                ActivationResult::Started => "mounted".to_string(),
                ActivationResult::Deferred(reason) => {
                    format!("deferred until first access: {}", reason)
                }
            };
            println!(
                "  {} -> {} ({}; {})",
                share.remote_spec,
                share.local_path.display(),
                outcome,
                activation
            );
        }
        for note in &host.notes {
            println!("  note: {}", note);
        }
    }
}
