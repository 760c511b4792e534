use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

/// Decoupled representation of a SoundCloud track from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub duration_ms: u64,
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamItemKind {
    Track,
    TrackRepost,
    Other,
}

/// One entry of the user's activity stream. Only `Track`/`TrackRepost`
/// entries with a present origin are relevant to the organizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamItem {
    pub kind: StreamItemKind,
    pub origin: Option<Track>,
}

/// Decoupled representation of a SoundCloud playlist.
///
/// The list endpoint does not include track membership; `track_ids` is only
/// authoritative on a detail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: u64,
    pub title: String,
    pub track_ids: Vec<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Port trait wrapping the SoundCloud API capabilities used by business logic.
///
/// Implementations live in `soundcloud::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SoundCloudApi: Send + Sync {
    /// The user's activity stream, newest first. The stream is lazy: pages
    /// are requested only as the consumer polls past the previous page, so
    /// dropping it early fetches nothing further.
    fn activity_stream(&self) -> BoxStream<'static, Result<StreamItem, ApiError>>;

    async fn my_playlists(&self) -> Result<Vec<Playlist>, ApiError>;

    async fn playlist(&self, id: u64) -> Result<Playlist, ApiError>;

    async fn create_playlist(&self, title: &str, track_ids: &[u64]) -> Result<Playlist, ApiError>;

    async fn replace_playlist_tracks(
        &self,
        id: u64,
        track_ids: &[u64],
    ) -> Result<Playlist, ApiError>;
}
