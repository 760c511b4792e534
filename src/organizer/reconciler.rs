use std::collections::{HashMap, HashSet};

use crate::ports::soundcloud::{ApiError, Playlist, SoundCloudApi};

/// Upper bound on new track ids pushed per replace request. Each request
/// still carries the full cumulative list, per the API's playlist-mutation
/// contract.
pub const REPLACE_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created { playlist_id: u64, added: usize },
    Updated { playlist_id: u64, added: usize },
    Unchanged { playlist_id: u64 },
}

fn dedup_preserving_order(track_ids: &[u64]) -> Vec<u64> {
    let mut seen = HashSet::new();
    track_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Idempotent create/update of monthly playlists against the remote store.
///
/// Holds the one-per-run title snapshot; playlists created during the run are
/// registered so later buckets see them. Tracks are only ever added, never
/// removed.
pub struct PlaylistReconciler<'a, C: SoundCloudApi> {
    api: &'a C,
    existing: HashMap<String, Playlist>,
}

impl<'a, C: SoundCloudApi> PlaylistReconciler<'a, C> {
    /// Takes the playlist-collection snapshot, keyed by title.
    pub async fn load(api: &'a C) -> Result<PlaylistReconciler<'a, C>, ApiError> {
        let existing = api
            .my_playlists()
            .await?
            .into_iter()
            .map(|playlist| (playlist.title.clone(), playlist))
            .collect();
        Ok(Self { api, existing })
    }

    /// Brings the playlist named `title` up to date with `track_ids`.
    ///
    /// Missing playlists are created in a single call carrying the full
    /// initial list. Existing playlists get only the ids they don't already
    /// hold, appended in candidate order, pushed in batches of at most
    /// [`REPLACE_BATCH_SIZE`] new ids. A second call with the same ids
    /// performs no write.
    pub async fn ensure(
        &mut self,
        title: &str,
        track_ids: &[u64],
    ) -> Result<EnsureOutcome, ApiError> {
        let Some(known) = self.existing.get(title) else {
            let initial = dedup_preserving_order(track_ids);
            log::info!(
                "Creating new playlist '{title}' with {} track(s)",
                initial.len()
            );
            let playlist = self.api.create_playlist(title, &initial).await?;
            let outcome = EnsureOutcome::Created {
                playlist_id: playlist.id,
                added: initial.len(),
            };
            self.existing.insert(playlist.title.clone(), playlist);
            return Ok(outcome);
        };

        // The list snapshot carries no track membership; fetch the detail
        // for the authoritative current state.
        let detail = self.api.playlist(known.id).await?;
        let playlist_id = detail.id;

        let mut current: HashSet<u64> = detail.track_ids.iter().copied().collect();
        let new_ids: Vec<u64> = track_ids
            .iter()
            .copied()
            .filter(|id| current.insert(*id))
            .collect();

        if new_ids.is_empty() {
            log::debug!("No new tracks to add to playlist '{title}'");
            return Ok(EnsureOutcome::Unchanged { playlist_id });
        }

        log::info!(
            "Adding {} track(s) to existing playlist '{title}'",
            new_ids.len()
        );
        let mut cumulative = detail.track_ids;
        let mut updated = None;
        for batch in new_ids.chunks(REPLACE_BATCH_SIZE) {
            cumulative.extend_from_slice(batch);
            updated = Some(
                self.api
                    .replace_playlist_tracks(playlist_id, &cumulative)
                    .await?,
            );
        }

        if let Some(playlist) = updated {
            self.existing.insert(playlist.title.clone(), playlist);
        }
        Ok(EnsureOutcome::Updated {
            playlist_id,
            added: new_ids.len(),
        })
    }
}
