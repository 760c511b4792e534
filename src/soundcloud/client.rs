use async_stream::try_stream;
use futures::stream::BoxStream;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::ports::soundcloud::{ApiError, Playlist, SoundCloudApi, StreamItem};
use crate::soundcloud::types::{ApiPlaylist, StreamPage};

pub const API_BASE_URL: &str = "https://api.soundcloud.com";

/// Page size requested on the first stream request; follow-up requests use
/// the opaque `next_href` verbatim.
const STREAM_PAGE_SIZE: u32 = 50;

/// SoundCloud API client over an already-acquired access token.
pub struct SoundCloudClient {
    access_token: String,
    client: reqwest::Client,
}

impl SoundCloudClient {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            client: reqwest::Client::new(),
        }
    }
}

/// Sends one request and decodes the JSON body, mapping transport errors,
/// non-success statuses, and decode failures onto `ApiError`. No retries and
/// no client-imposed timeout.
async fn request_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    access_token: &str,
    method: Method,
    url: &str,
    body: Option<serde_json::Value>,
) -> Result<T, ApiError> {
    let mut request = http.request(method, url).bearer_auth(access_token);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await.map_err(|source| ApiError::Request {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    log::debug!("{url} -> {status}");
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }

    response.json().await.map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

fn track_payload(track_ids: &[u64]) -> serde_json::Value {
    json!(
        track_ids
            .iter()
            .map(|id| json!({ "id": id }))
            .collect::<Vec<_>>()
    )
}

#[async_trait::async_trait]
impl SoundCloudApi for SoundCloudClient {
    fn activity_stream(&self) -> BoxStream<'static, Result<StreamItem, ApiError>> {
        let http = self.client.clone();
        let access_token = self.access_token.clone();

        Box::pin(try_stream! {
            let mut url =
                format!("{API_BASE_URL}/me/activities/tracks?limit={STREAM_PAGE_SIZE}");
            loop {
                log::debug!("Fetching stream page: GET {url}");
                let page: StreamPage =
                    request_json(&http, &access_token, Method::GET, &url, None).await?;

                for item in page.collection {
                    yield StreamItem::from(item);
                }

                match page.next_href {
                    // next_href is a complete URL; no extra query parameters.
                    Some(next) => url = next,
                    None => break,
                }
            }
        })
    }

    async fn my_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        let url = format!("{API_BASE_URL}/me/playlists");
        let playlists: Vec<ApiPlaylist> =
            request_json(&self.client, &self.access_token, Method::GET, &url, None).await?;
        Ok(playlists.into_iter().map(Playlist::from).collect())
    }

    async fn playlist(&self, id: u64) -> Result<Playlist, ApiError> {
        let url = format!("{API_BASE_URL}/playlists/{id}");
        let playlist: ApiPlaylist =
            request_json(&self.client, &self.access_token, Method::GET, &url, None).await?;
        Ok(playlist.into())
    }

    async fn create_playlist(&self, title: &str, track_ids: &[u64]) -> Result<Playlist, ApiError> {
        let url = format!("{API_BASE_URL}/playlists");
        log::debug!("Creating playlist '{title}': POST {url}");
        let body = json!({
            "playlist": {
                "title": title,
                "sharing": "public",
                "tracks": track_payload(track_ids),
            }
        });
        let playlist: ApiPlaylist = request_json(
            &self.client,
            &self.access_token,
            Method::POST,
            &url,
            Some(body),
        )
        .await?;
        Ok(playlist.into())
    }

    async fn replace_playlist_tracks(
        &self,
        id: u64,
        track_ids: &[u64],
    ) -> Result<Playlist, ApiError> {
        let url = format!("{API_BASE_URL}/playlists/{id}");
        log::debug!("Replacing playlist tracks: PUT {url}");
        let body = json!({ "playlist": { "tracks": track_payload(track_ids) } });
        let playlist: ApiPlaylist = request_json(
            &self.client,
            &self.access_token,
            Method::PUT,
            &url,
            Some(body),
        )
        .await?;
        Ok(playlist.into())
    }
}
