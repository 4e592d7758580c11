mod client;
mod listing;

use std::{io, path::Path, path::PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::candidates::Post;
use crate::time_window::TimeWindow;

pub use self::client::RedditClient;

/// One page of a community's top listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub posts: Vec<Post>,

    /// Cursor for the following page. Empty when there are no more pages.
    pub after: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved { bytes: u64 },

    /// A file with the same name was already in the destination directory,
    /// so nothing was requested or written.
    AlreadyExists,
}

/// Fetches pages of ranked posts.
#[async_trait]
pub trait ListingSource {
    async fn fetch_page(
        &self,
        community: &str,
        time_window: TimeWindow,
        after: &str,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Page, RedditApiError>;
}

/// Saves a single image into a directory, creating the directory if needed
/// and leaving existing files untouched.
#[async_trait]
pub trait ImageSink {
    async fn download(
        &self,
        url: &str,
        directory: &Path,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, RedditApiError>;
}

#[derive(Debug, Error)]
pub enum RedditApiError {
    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    ResponseError { status: StatusCode, url: String },

    #[error("Reddit returned success, but had malformed JSON response: {source}")]
    BadResponseJson {
        body: String,
        source: serde_json::Error,
    },

    #[error("Could not write {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("API base '{0}' is not a valid base URL")]
    InvalidApiBase(String),

    #[error("Operation was cancelled")]
    Cancelled,
}
