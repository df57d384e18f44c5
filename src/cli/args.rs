//! Command-line argument parsing for AstroVision Sync
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! from the dataset hub, publishing local results, inspecting catalogs and
//! managing the storage credential.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::{Partition, SelectionFilter};

/// AstroVision Sync - Download and publish AstroVision dataset archives
#[derive(Parser, Debug)]
#[command(
    name = "astrovision_sync",
    version,
    about = "Download and publish AstroVision dataset archives",
    long_about = "Resolves dataset, cluster and segment selections against the AstroVision catalogs,
downloads the matching archives with checksum verification and unpacks them. The publish command
packages local results, uploads them in chunks and records their checksums in the manifest."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download archives selected from a catalog
    Fetch(FetchArgs),

    /// Package, upload and checksum local results
    Publish(PublishArgs),

    /// Show catalog contents
    List(ListArgs),

    /// Print the MD5 checksum of a file
    Hash(HashArgs),

    /// Manage the storage access token
    Auth(AuthArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Catalog partition to download from
    #[arg(short, long, value_enum)]
    pub partition: Partition,

    /// Dataset to download (e.g. `dawn_vesta`)
    #[arg(short, long)]
    pub dataset_name: Option<String>,

    /// Cluster to download (train, test or clusters partition, e.g. `00000007`)
    #[arg(long)]
    pub cluster_name: Option<String>,

    /// Segment to download (segments partition, e.g. `2011205_rc3`)
    #[arg(long)]
    pub segment_name: Option<String>,

    /// Local root directory (defaults to `paths.data_root`)
    #[arg(short, long, value_name = "DIR")]
    pub local_dir: Option<PathBuf>,

    /// Leave archives zipped after download
    #[arg(long)]
    pub unpack_off: bool,

    /// Skip checksum verification
    #[arg(long)]
    pub no_verify: bool,

    /// Continue with the next item when one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Show what would be downloaded without downloading
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the publish command
#[derive(Args, Debug, Clone)]
pub struct PublishArgs {
    /// Directory whose subdirectories are packaged and uploaded
    #[arg(short, long, value_name = "DIR")]
    pub local_dir: PathBuf,

    /// Remote folder to upload into (e.g. `/research/astrovision/clusters/train/dawn_ceres`)
    #[arg(short, long, value_name = "PATH")]
    pub remote_root: String,

    /// Manifest dataset name (defaults to the local directory name)
    #[arg(short, long)]
    pub dataset_name: Option<String>,

    /// Keep local archives after upload
    #[arg(long)]
    pub keep_archives: bool,

    /// Continue with the next unit when one fails
    #[arg(long)]
    pub keep_going: bool,
}

/// Arguments for the list command
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Catalog partition to show
    #[arg(short, long, value_enum)]
    pub partition: Partition,

    /// Show the items of one dataset
    #[arg(short, long)]
    pub dataset_name: Option<String>,
}

/// Arguments for the hash command
#[derive(Args, Debug, Clone)]
pub struct HashArgs {
    /// File to checksum
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for credential management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Credential actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Store the storage access token in .env
    Setup {
        /// Replace an existing token
        #[arg(short, long)]
        force: bool,
    },

    /// Show whether a token is configured
    Status,

    /// Remove the stored token
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested by flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl FetchArgs {
    /// Reject item flags that do not apply to the chosen partition
    pub fn validate(&self) -> Result<(), String> {
        if self.cluster_name.is_some() && self.partition == Partition::Segments {
            return Err(
                "--cluster-name does not apply to the segments partition, use --segment-name"
                    .to_string(),
            );
        }
        if self.segment_name.is_some() && self.partition != Partition::Segments {
            return Err(format!(
                "--segment-name only applies to the segments partition, not {}",
                self.partition
            ));
        }
        Ok(())
    }

    /// Selection filter described by the flags
    pub fn filter(&self) -> SelectionFilter {
        SelectionFilter {
            dataset_name: self.dataset_name.clone(),
            cluster_name: self.cluster_name.clone(),
            segment_name: self.segment_name.clone(),
        }
    }
}
