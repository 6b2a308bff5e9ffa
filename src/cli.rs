// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: The default action deploys a version; subcommands cover init and status.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bluegreen")]
#[command(about = "Blue-green deployments for Kubernetes workloads")]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    /// Version to deploy (used as the image tag)
    #[arg(required = true, value_name = "VERSION")]
    pub release: Option<String>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Break an existing deploy lock
    #[arg(long)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a bluegreen.yml template in the current directory
    Init {
        /// Application name
        #[arg(long)]
        app: Option<String>,

        /// Image repository (without tag)
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the live color and both workloads
    Status,
}
