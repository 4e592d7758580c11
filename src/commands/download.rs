use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    filter::{parse_aspect_ratio, parse_resolution, Dimensions, Filter},
    options::Global,
    pagination::{DownloadRequest, Downloader},
    reddit_api::{RedditApiError, RedditClient},
    time_window::TimeWindow,
};

#[derive(Debug, Args)]
pub struct DownloadOptions {
    /// The community to download from, without the `r/` prefix.
    pub community: String,

    /// Ranking period of the top posts: day, week, month, year or all.
    /// Defaults to week.
    pub time_window: Option<TimeWindow>,

    /// Directory to save images into. Created if it doesn't exist.
    #[clap(long, short)]
    pub location: Option<PathBuf>,

    /// Maximum number of top posts to process. Defaults to 100.
    #[clap(long, value_parser(clap::value_parser!(u32).range(1..)))]
    pub limit: Option<u32>,

    /// Only download images with exactly this resolution, e.g. 1920x1080.
    #[clap(long, short, value_parser(clap::builder::ValueParser::new(parse_resolution)))]
    pub resolution: Option<Dimensions>,

    /// Only download images with exactly this aspect ratio, e.g. 16:9.
    #[clap(long, short, value_parser(clap::builder::ValueParser::new(parse_aspect_ratio)))]
    pub aspect_ratio: Option<Dimensions>,
}

impl DownloadOptions {
    fn into_request(self, config: &Config) -> DownloadRequest {
        DownloadRequest {
            community: self.community,
            time_window: self.time_window.unwrap_or(config.default_time_window),
            limit: self.limit.unwrap_or(config.default_limit),
            filter: Filter::new(self.resolution, self.aspect_ratio),
            directory: self
                .location
                .unwrap_or_else(|| config.default_directory.clone()),
        }
    }
}

pub async fn download(
    global: Global,
    options: DownloadOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let config = match &global.config {
        Some(path) => Config::read_from_file(path)?,
        None => Config::default(),
    };

    let request = options.into_request(&config);
    info!(
        "downloading top images of r/{} ({}) into {}",
        request.community,
        request.time_window,
        request.directory.display()
    );

    let client = RedditClient::new(&config)?;
    let downloader = Downloader::new(client.clone(), client);

    match downloader.run(&request, &cancel).await {
        Ok(summary) => info!("done: {}", summary),
        Err(RedditApiError::Cancelled) => info!("download cancelled"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
