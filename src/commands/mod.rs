mod download;

use clap::Subcommand;
pub use download::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Downloads the top images of a community over a time window, skipping
    /// any file that already exists in the destination directory.
    Download(DownloadOptions),
}
