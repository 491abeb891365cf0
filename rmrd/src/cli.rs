use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rmrd", version, about = "RMR worker coordination daemon CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the rmrd daemon with a config file
    Start {
        #[arg(short, long)]
        config: PathBuf,
    },
}
