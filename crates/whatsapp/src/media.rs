//! Download of media referenced by URL in send requests.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    types::MediaPayload,
};

/// Filename used when the URL path has no usable last segment.
pub const DEFAULT_MEDIA_FILENAME: &str = "Media";

const DEFAULT_MIMETYPE: &str = "application/octet-stream";

/// Fetches remote media into a [`MediaPayload`].
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl MediaFetcher {
    pub fn new(max_bytes: usize) -> Self {
        Self::with_client(reqwest::Client::new(), max_bytes)
    }

    pub fn with_client(client: reqwest::Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    /// GET `url` and return its body base64-encoded with the response's
    /// content type.
    ///
    /// Fails with [`Error::MediaFetch`] on an invalid or non-http(s) URL,
    /// transport errors, a non-2xx status, or a body above the size limit.
    pub async fn fetch(&self, url: &str) -> Result<MediaPayload> {
        let parsed = url::Url::parse(url).map_err(|e| Error::media_fetch(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::media_fetch(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Error::media_fetch)?;

        if let Some(len) = response.content_length()
            && len > self.max_bytes as u64
        {
            return Err(self.too_large());
        }

        let mimetype = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_MIMETYPE)
            .to_string();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(Error::media_fetch)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, mimetype, bytes = body.len(), "fetched media");

        Ok(MediaPayload {
            mimetype,
            data: STANDARD.encode(&body),
            filename: filename_from_url(&parsed),
        })
    }

    fn too_large(&self) -> Error {
        Error::media_fetch(format!("media exceeds {} bytes", self.max_bytes))
    }
}

fn filename_from_url(url: &url::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| DEFAULT_MEDIA_FILENAME.to_string())
}
