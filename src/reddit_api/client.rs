use std::{
    future::Future,
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use reqwest::{Client, Response};
use tokio::{fs, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    listing::Listing, DownloadOutcome, ImageSink, ListingSource, Page, RedditApiError,
};
use crate::{config::Config, time_window::TimeWindow};

/// Talks to reddit's public JSON listings and fetches the images they link to.
#[derive(Debug, Clone)]
pub struct RedditClient {
    client: Client,
    api_base: Url,
}

impl RedditClient {
    pub fn new(config: &Config) -> Result<Self, RedditApiError> {
        let api_base = Url::parse(&config.api_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| RedditApiError::InvalidApiBase(config.api_base.clone()))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, api_base })
    }

    fn top_url(
        &self,
        community: &str,
        time_window: TimeWindow,
        after: &str,
        page_size: u32,
    ) -> Result<Url, RedditApiError> {
        let mut url = self.api_base.clone();

        url.path_segments_mut()
            .map_err(|_| RedditApiError::InvalidApiBase(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(["r", community, "top.json"]);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("t", time_window.as_str())
                .append_pair("limit", &page_size.to_string());

            if !after.is_empty() {
                query.append_pair("after", after);
            }
        }

        Ok(url)
    }

    /// Streams a response body into `file`, returning how many bytes were
    /// written.
    async fn write_body(
        &self,
        mut response: Response,
        file: &mut fs::File,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, RedditApiError> {
        let mut bytes = 0;

        while let Some(chunk) = cancellable(cancel, response.chunk()).await? {
            file.write_all(&chunk).await.map_err(io_error(path))?;
            bytes += chunk.len() as u64;
        }

        file.flush().await.map_err(io_error(path))?;

        Ok(bytes)
    }
}

#[async_trait]
impl ListingSource for RedditClient {
    async fn fetch_page(
        &self,
        community: &str,
        time_window: TimeWindow,
        after: &str,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Page, RedditApiError> {
        let url = self.top_url(community, time_window, after, page_size)?;
        log::debug!("fetching {}", url);

        let response = cancellable(cancel, self.client.get(url.clone()).send()).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedditApiError::ResponseError {
                status,
                url: url.to_string(),
            });
        }

        let body = cancellable(cancel, response.text()).await?;

        match serde_json::from_str::<Listing>(&body) {
            Ok(listing) => Ok(listing.into()),
            Err(source) => Err(RedditApiError::BadResponseJson { body, source }),
        }
    }
}

#[async_trait]
impl ImageSink for RedditClient {
    async fn download(
        &self,
        url: &str,
        directory: &Path,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, RedditApiError> {
        fs::create_dir_all(directory)
            .await
            .map_err(io_error(directory))?;

        let path = directory.join(file_name);

        match fs::metadata(&path).await {
            Ok(_) => return Ok(DownloadOutcome::AlreadyExists),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(RedditApiError::Io { path, source }),
        }

        log::debug!("downloading {} to {}", url, path.display());

        let response = cancellable(cancel, self.client.get(url).send()).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedditApiError::ResponseError {
                status,
                url: url.to_owned(),
            });
        }

        let mut file = fs::File::create(&path).await.map_err(io_error(&path))?;

        match self.write_body(response, &mut file, &path, cancel).await {
            Ok(bytes) => Ok(DownloadOutcome::Saved { bytes }),
            Err(err) => {
                drop(file);

                // A truncated file would be mistaken for a finished one on
                // the next run.
                if let Err(remove_err) = fs::remove_file(&path).await {
                    log::warn!(
                        "could not remove partial download {}: {}",
                        path.display(),
                        remove_err
                    );
                }

                Err(err)
            }
        }
    }
}

/// Runs a request future unless the token is cancelled first.
async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T, RedditApiError>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(RedditApiError::Cancelled),
        result = future => Ok(result?),
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> RedditApiError {
    let path: PathBuf = path.to_owned();
    move |source| RedditApiError::Io { path, source }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::time::{Duration, Instant};

    use reqwest::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RedditClient {
        let config = Config {
            api_base: server.uri(),
            ..Config::default()
        };

        RedditClient::new(&config).unwrap()
    }

    const ONE_POST: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_next",
            "children": [{"kind": "t3", "data": {"title": "Dunes", "url": "https://i.redd.it/dunes.png"}}]
        }
    }"#;

    #[test]
    fn rejects_bad_api_base() {
        let config = Config {
            api_base: "not a url".to_owned(),
            ..Config::default()
        };

        assert!(matches!(
            RedditClient::new(&config),
            Err(RedditApiError::InvalidApiBase(_))
        ));
    }

    #[tokio::test]
    async fn fetch_first_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/wallpapers/top.json"))
            .and(query_param("t", "month"))
            .and(query_param("limit", "25"))
            .and(query_param_is_missing("after"))
            .and(header("user-agent", Config::default().user_agent.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_POST))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .fetch_page(
                "wallpapers",
                TimeWindow::Month,
                "",
                25,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(page.after, "t3_next");
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "Dunes");
    }

    #[tokio::test]
    async fn fetch_passes_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/r/earthporn/top.json"))
            .and(query_param("after", "t3_next"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"data": {"after": null, "children": []}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server)
            .fetch_page(
                "earthporn",
                TimeWindow::All,
                "t3_next",
                100,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(page, Page::default());
    }

    #[tokio::test]
    async fn fetch_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch_page("private", TimeWindow::Week, "", 10, &CancellationToken::new())
            .await;

        match result {
            Err(RedditApiError::ResponseError { status, .. }) => {
                assert_eq!(status, StatusCode::FORBIDDEN)
            }
            other => panic!("expected ResponseError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_malformed_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch_page("wallpapers", TimeWindow::Week, "", 10, &CancellationToken::new())
            .await;

        match result {
            Err(RedditApiError::BadResponseJson { body, .. }) => {
                assert_eq!(body, "<html>oops</html>")
            }
            other => panic!("expected BadResponseJson, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fetch_cancelled_before_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(ONE_POST)
                    .set_delay(std::time::Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client_for(&server)
            .fetch_page("wallpapers", TimeWindow::Week, "", 10, &cancel)
            .await;

        assert!(matches!(result, Err(RedditApiError::Cancelled)));
    }

    #[tokio::test]
    async fn download_creates_directory_and_writes_file() {
        let server = MockServer::start().await;
        let body = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

        Mock::given(method("GET"))
            .and(path("/dunes.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let directory = temp.path().join("nested").join("images");

        let outcome = client_for(&server)
            .download(
                &format!("{}/dunes.png", server.uri()),
                &directory,
                "Dunes.png",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Saved { bytes: 7 });
        assert_eq!(std::fs::read(directory.join("Dunes.png")).unwrap(), body);
    }

    #[tokio::test]
    async fn download_skips_existing_file_without_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .expect(0)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("Dunes.png"), b"old").unwrap();

        let outcome = client_for(&server)
            .download(
                &format!("{}/dunes.png", server.uri()),
                temp.path(),
                "Dunes.png",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::AlreadyExists);
        assert_eq!(std::fs::read(temp.path().join("Dunes.png")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn download_non_success_leaves_no_file() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();

        let result = client_for(&server)
            .download(
                &format!("{}/gone.jpg", server.uri()),
                temp.path(),
                "gone.jpg",
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(RedditApiError::ResponseError { status, .. }) if status == StatusCode::NOT_FOUND
        ));
        assert!(!temp.path().join("gone.jpg").exists());
    }

    /// Answers one request with headers promising 100 bytes, then sends only
    /// 10. With `hold_open` the connection then stalls, otherwise it closes.
    async fn serve_short_body(hold_open: bool) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buffer = [0; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    return;
                }
                request.extend_from_slice(&buffer[..read]);
            }

            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: image/png\r\ncontent-length: 100\r\n\r\n0123456789")
                .await
                .unwrap();
            socket.flush().await.unwrap();

            if hold_open {
                tokio::time::sleep(Duration::from_secs(30)).await;
            } else {
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/partial.png", address), handle)
    }

    #[tokio::test]
    async fn download_cancelled_while_waiting_for_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1, 2, 3])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = client_for(&server)
            .download(
                &format!("{}/slow.png", server.uri()),
                temp.path(),
                "slow.png",
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(RedditApiError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!temp.path().join("slow.png").exists());
    }

    #[tokio::test]
    async fn download_cancelled_mid_body_removes_partial_file() {
        let (url, server) = serve_short_body(true).await;
        let temp = tempfile::tempdir().unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let watched = temp.path().join("partial.png");
        tokio::spawn(async move {
            // Give the first bytes a chance to land on disk before cancelling.
            for _ in 0..200 {
                let written = std::fs::metadata(&watched)
                    .map(|metadata| metadata.len() > 0)
                    .unwrap_or(false);
                if written {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.cancel();
        });

        let started = Instant::now();
        let result = RedditClient::new(&Config::default())
            .unwrap()
            .download(&url, temp.path(), "partial.png", &cancel)
            .await;

        assert!(matches!(result, Err(RedditApiError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!temp.path().join("partial.png").exists());

        server.abort();
    }

    #[tokio::test]
    async fn download_truncated_body_removes_partial_file() {
        let (url, server) = serve_short_body(false).await;
        let temp = tempfile::tempdir().unwrap();

        let result = RedditClient::new(&Config::default())
            .unwrap()
            .download(&url, temp.path(), "partial.png", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(RedditApiError::Http { .. })));
        assert!(!temp.path().join("partial.png").exists());

        server.await.unwrap();
    }
}
