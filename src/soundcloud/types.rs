use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ports::soundcloud::{Playlist, StreamItem, StreamItemKind, Track};

/// SoundCloud OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: u64,
    pub username: String,
}

/// SoundCloud track from the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiTrack {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
    pub title: String,
    /// Duration in milliseconds
    pub duration: u64,
    pub user: ApiUser,
}

/// One raw entry of an activity-stream page. `origin` is left untyped here
/// because its shape depends on `type` (a playlist repost carries a playlist
/// object, which the organizer never looks at).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiStreamItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub origin: Option<serde_json::Value>,
}

/// One page of the activity stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPage {
    #[serde(default)]
    pub collection: Vec<ApiStreamItem>,
    #[serde(default)]
    pub next_href: Option<String>,
}

/// SoundCloud playlist from the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPlaylist {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub tracks: Vec<ApiTrack>,
}

/// The API emits RFC 3339 timestamps on newer objects and a legacy
/// `YYYY/MM/DD HH:MM:SS +0000` form on older ones.
fn deserialize_created_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .or_else(|_| DateTime::parse_from_str(&raw, "%Y/%m/%d %H:%M:%S %z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

impl From<ApiTrack> for Track {
    fn from(track: ApiTrack) -> Self {
        Track {
            id: track.id,
            created_at: track.created_at,
            title: track.title,
            duration_ms: track.duration,
            user_id: track.user.id,
        }
    }
}

impl From<ApiStreamItem> for StreamItem {
    fn from(item: ApiStreamItem) -> Self {
        let kind = match item.kind.as_str() {
            "track" => StreamItemKind::Track,
            "track-repost" => StreamItemKind::TrackRepost,
            _ => StreamItemKind::Other,
        };
        // An origin that doesn't parse as a track is treated as absent, which
        // makes the processor discard the item.
        let origin = match kind {
            StreamItemKind::Track | StreamItemKind::TrackRepost => item
                .origin
                .and_then(|value| serde_json::from_value::<ApiTrack>(value).ok())
                .map(Track::from),
            StreamItemKind::Other => None,
        };
        StreamItem { kind, origin }
    }
}

impl From<ApiPlaylist> for Playlist {
    fn from(playlist: ApiPlaylist) -> Self {
        Playlist {
            id: playlist.id,
            title: playlist.title,
            track_ids: playlist.tracks.iter().map(|track| track.id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_page_deserializes_both_timestamp_formats() {
        let page: StreamPage = serde_json::from_str(
            r#"{
                "collection": [
                    {
                        "type": "track",
                        "origin": {
                            "id": 1,
                            "created_at": "2023-10-01T10:00:00Z",
                            "title": "Track 1",
                            "duration": 180000,
                            "user": {"id": 10, "username": "user10"}
                        }
                    },
                    {
                        "type": "track-repost",
                        "origin": {
                            "id": 2,
                            "created_at": "2023/10/02 10:00:00 +0000",
                            "title": "Track 2",
                            "duration": 240000,
                            "user": {"id": 20, "username": "user20"}
                        }
                    }
                ],
                "next_href": "https://api.soundcloud.com/me/activities/tracks?cursor=next-page"
            }"#,
        )
        .unwrap();

        assert_eq!(page.collection.len(), 2);
        assert_eq!(
            page.next_href.as_deref(),
            Some("https://api.soundcloud.com/me/activities/tracks?cursor=next-page")
        );

        let first = StreamItem::from(page.collection[0].clone());
        assert_eq!(first.kind, StreamItemKind::Track);
        let track = first.origin.unwrap();
        assert_eq!(track.id, 1);
        assert_eq!(
            track.created_at,
            "2023-10-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );

        let second = StreamItem::from(page.collection[1].clone());
        assert_eq!(second.kind, StreamItemKind::TrackRepost);
        let repost = second.origin.unwrap();
        assert_eq!(
            repost.created_at,
            "2023-10-02T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(repost.duration_ms, 240000);
    }

    #[test]
    fn test_stream_item_with_foreign_origin_is_harmless() {
        // A playlist repost carries a playlist object as its origin.
        let item: ApiStreamItem = serde_json::from_str(
            r#"{
                "type": "playlist-repost",
                "origin": {"id": 7, "title": "Some Playlist", "track_count": 3}
            }"#,
        )
        .unwrap();

        let converted = StreamItem::from(item);
        assert_eq!(converted.kind, StreamItemKind::Other);
        assert!(converted.origin.is_none());
    }

    #[test]
    fn test_last_page_has_no_next_href() {
        let page: StreamPage = serde_json::from_str(r#"{"collection": []}"#).unwrap();
        assert!(page.collection.is_empty());
        assert!(page.next_href.is_none());
    }

    #[test]
    fn test_playlist_detail_conversion_keeps_track_order() {
        let playlist: ApiPlaylist = serde_json::from_str(
            r#"{
                "id": 102,
                "title": "2023-10",
                "track_count": 2,
                "tracks": [
                    {
                        "id": 50,
                        "created_at": "2023-10-05T10:00:00Z",
                        "title": "Existing Track",
                        "duration": 300000,
                        "user": {"id": 30, "username": "user30"}
                    },
                    {
                        "id": 12,
                        "created_at": "2023-10-06T10:00:00Z",
                        "title": "Another Track",
                        "duration": 200000,
                        "user": {"id": 30, "username": "user30"}
                    }
                ]
            }"#,
        )
        .unwrap();

        let converted = Playlist::from(playlist);
        assert_eq!(converted.id, 102);
        assert_eq!(converted.title, "2023-10");
        assert_eq!(converted.track_ids, vec![50, 12]);
    }
}
