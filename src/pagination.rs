//! Walks a community's top listing page by page and hands every matching
//! image to an `ImageSink`.

use std::{fmt, path::PathBuf};

use tokio_util::sync::CancellationToken;

use crate::{
    candidates::{extract, ImageCandidate, Post},
    file_name::file_name_for,
    filter::Filter,
    reddit_api::{DownloadOutcome, ImageSink, ListingSource, RedditApiError},
    time_window::TimeWindow,
};

/// The listing API won't return more than this many posts per page.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub community: String,
    pub time_window: TimeWindow,

    /// Total number of posts to process, across all pages.
    pub limit: u32,
    pub filter: Filter,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_fetched: usize,
    pub posts_processed: usize,
    pub posts_matched: usize,
    pub images_saved: usize,
    pub images_existing: usize,
    pub bytes_written: u64,
    pub failed_downloads: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "{} posts processed ({} with matching images), {} images saved ({} bytes), {} already present, {} failed",
            self.posts_processed,
            self.posts_matched,
            self.images_saved,
            self.bytes_written,
            self.images_existing,
            self.failed_downloads
        )
    }
}

pub struct Downloader<S, D> {
    source: S,
    sink: D,
}

impl<S, D> Downloader<S, D>
where
    S: ListingSource + Sync,
    D: ImageSink + Sync,
{
    pub fn new(source: S, sink: D) -> Self {
        Self { source, sink }
    }

    /// Processes up to `request.limit` posts. Stops early when the listing
    /// runs dry. A failed page fetch ends the run; a failed image download
    /// is logged and skipped.
    pub async fn run(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RedditApiError> {
        let mut summary = RunSummary::default();
        let mut remaining = request.limit;
        let mut after = String::new();

        while remaining > 0 {
            if cancel.is_cancelled() {
                return Err(RedditApiError::Cancelled);
            }

            let page_size = remaining.min(MAX_PAGE_SIZE);
            log::debug!(
                "fetching up to {} posts from r/{} (cursor '{}', {} remaining)",
                page_size,
                request.community,
                after,
                remaining
            );

            let page = self
                .source
                .fetch_page(
                    &request.community,
                    request.time_window,
                    &after,
                    page_size,
                    cancel,
                )
                .await?;
            summary.pages_fetched += 1;

            // Checked before the cursor so a short last page always ends the run.
            if page.posts.is_empty() {
                log::debug!("listing returned no posts, stopping");
                break;
            }

            for post in &page.posts {
                self.process_post(post, request, cancel, &mut summary)
                    .await?;
            }

            let processed = u32::try_from(page.posts.len()).unwrap_or(u32::MAX);
            remaining = remaining.saturating_sub(processed);

            if page.after.is_empty() {
                log::debug!("listing has no further pages");
                break;
            }
            after = page.after;
        }

        Ok(summary)
    }

    async fn process_post(
        &self,
        post: &Post,
        request: &DownloadRequest,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), RedditApiError> {
        summary.posts_processed += 1;

        let candidates: Vec<ImageCandidate> = extract(post)
            .into_iter()
            .filter(|candidate| request.filter.passes(candidate))
            .collect();

        if candidates.is_empty() {
            log::debug!("no matching images in '{}'", post.title);
            return Ok(());
        }
        summary.posts_matched += 1;

        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        log::info!("{} => {}", post.title, urls.join(", "));

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(RedditApiError::Cancelled);
            }

            let file_name = file_name_for(&post.title, index, candidate.extension);

            let outcome = self
                .sink
                .download(&candidate.url, &request.directory, &file_name, cancel)
                .await;

            match outcome {
                Ok(DownloadOutcome::Saved { bytes }) => {
                    log::info!("saved {} ({} bytes)", file_name, bytes);
                    summary.images_saved += 1;
                    summary.bytes_written += bytes;
                }
                Ok(DownloadOutcome::AlreadyExists) => {
                    log::info!("{} already exists, skipping", file_name);
                    summary.images_existing += 1;
                }
                Err(err) => {
                    log::warn!("skipping download of {}: {}", candidate.url, err);
                    summary.failed_downloads += 1;
                }
            }
        }

        Ok(())
    }
}
