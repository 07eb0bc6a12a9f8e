//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Accelerate package downloads across mirrors.
///
/// Mirrorfetch reads a resolved-package manifest and hands the transfer
/// to an external multi-connection download agent, then reconciles the
/// staging area with the artifact store.
#[derive(Parser, Debug)]
#[command(name = "mirrorfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Final artifact store directory (staging lives in its partial/ subdirectory)
    #[arg(short = 's', long, required_unless_present = "metalink_out")]
    pub store: Option<PathBuf>,

    /// Re-verify digests of already-present store files instead of trusting size alone
    #[arg(long)]
    pub check_hash: bool,

    /// External download agent executable
    #[arg(long, default_value = "aria2c")]
    pub agent: PathBuf,

    /// Write the transfer-description document to PATH ("-" for stdout) and perform no transfer
    #[arg(long, value_name = "PATH")]
    pub metalink_out: Option<PathBuf>,

    /// Resolved-package manifest (JSON array); reads stdin when omitted
    pub manifest: Option<PathBuf>,
}
