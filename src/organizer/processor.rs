use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::organizer::reconciler::PlaylistReconciler;
use crate::organizer::report::{Reporter, RunSummary};
use crate::ports::soundcloud::{ApiError, SoundCloudApi, StreamItemKind, Track};
use crate::scope::{InvalidScope, ScopeInterval, parse_scope};

/// Number of consecutive tracks older than the scope to see before stopping.
///
/// Assumes the activity stream is strictly reverse-chronological; if the
/// upstream ever violates that ordering, this bound can cut off in-scope
/// tracks.
pub const CONSECUTIVE_OUT_OF_SCOPE_LIMIT: u32 = 25;

const SHORT_MAX_MS: u64 = 5 * 60 * 1000;
const MEDIUM_MAX_MS: u64 = 20 * 60 * 1000;

/// Track length filtering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TrackLengthFilter {
    /// < 5 minutes
    Short,
    /// 5-20 minutes
    Medium,
    /// > 20 minutes
    Long,
    All,
}

/// Both boundaries belong to Medium.
pub fn track_matches_filter(duration_ms: u64, length_filter: TrackLengthFilter) -> bool {
    match length_filter {
        TrackLengthFilter::Short => duration_ms < SHORT_MAX_MS,
        TrackLengthFilter::Medium => (SHORT_MAX_MS..=MEDIUM_MAX_MS).contains(&duration_ms),
        TrackLengthFilter::Long => duration_ms > MEDIUM_MAX_MS,
        TrackLengthFilter::All => true,
    }
}

pub fn track_matches_scope(created_at: DateTime<Utc>, interval: Option<&ScopeInterval>) -> bool {
    match interval {
        None => true,
        Some(interval) => interval.contains(created_at),
    }
}

/// Qualifying tracks of one calendar month, in arrival order. `title` is the
/// playlist title (`YYYY-MM`).
#[derive(Debug, Clone)]
pub struct MonthBucket {
    pub title: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Scope(#[from] InvalidScope),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Orchestrates fetch -> filter -> group -> reconcile over the activity
/// stream.
pub struct StreamOrganizer<C: SoundCloudApi> {
    api: C,
}

impl<C: SoundCloudApi> StreamOrganizer<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    /// Runs one organize pass. Scope errors abort before any network I/O;
    /// stream errors abort the run; per-bucket reconcile failures are
    /// isolated and named in the summary.
    pub async fn process(
        &self,
        length_filter: TrackLengthFilter,
        scope: Option<&str>,
        dry_run: bool,
        reporter: &dyn Reporter,
    ) -> Result<(), ProcessError> {
        log::info!("Fetching stream and filtering for '{length_filter:?}' tracks");

        let interval = match scope {
            Some(token) => {
                log::info!("Filtering for time interval: '{token}'");
                Some(parse_scope(token, Utc::now())?)
            }
            None => None,
        };

        let buckets = self
            .collect_buckets(length_filter, interval.as_ref())
            .await?;

        if buckets.is_empty() {
            log::info!("No new matching tracks found in the stream");
            reporter.nothing_to_do();
            return Ok(());
        }

        if dry_run {
            reporter.dry_run_preview(&buckets);
            return Ok(());
        }

        self.reconcile_buckets(&buckets, reporter).await
    }

    /// Consumes the stream in arrival order (newest first) and groups
    /// qualifying tracks into `YYYY-MM` buckets, first-seen order.
    async fn collect_buckets(
        &self,
        length_filter: TrackLengthFilter,
        interval: Option<&ScopeInterval>,
    ) -> Result<Vec<MonthBucket>, ApiError> {
        let mut buckets: Vec<MonthBucket> = Vec::new();
        let mut consecutive_out_of_scope: u32 = 0;

        let mut stream = self.api.activity_stream();
        while let Some(item) = stream.next().await {
            let item = item?;
            if !matches!(
                item.kind,
                StreamItemKind::Track | StreamItemKind::TrackRepost
            ) {
                continue;
            }
            let Some(track) = item.origin else { continue };

            if track_matches_scope(track.created_at, interval)
                && track_matches_filter(track.duration_ms, length_filter)
            {
                let title = track.created_at.format("%Y-%m").to_string();
                log::debug!(
                    "Found matching track: '{}' -> playlist '{title}'",
                    track.title
                );
                match buckets.iter_mut().find(|bucket| bucket.title == title) {
                    Some(bucket) => bucket.tracks.push(track),
                    None => buckets.push(MonthBucket {
                        title,
                        tracks: vec![track],
                    }),
                }
                consecutive_out_of_scope = 0;
            } else if let Some(interval) = interval {
                // Only tracks older than the scope's start count toward the
                // early exit; in-scope tracks of the wrong length do not.
                if track.created_at < interval.start {
                    consecutive_out_of_scope += 1;
                    log::debug!(
                        "Skipping older track: '{}' ({}/{})",
                        track.title,
                        consecutive_out_of_scope,
                        CONSECUTIVE_OUT_OF_SCOPE_LIMIT
                    );
                    if consecutive_out_of_scope >= CONSECUTIVE_OUT_OF_SCOPE_LIMIT {
                        log::info!("Stopping early: found enough consecutive older tracks");
                        break;
                    }
                }
            }
        }

        Ok(buckets)
    }

    async fn reconcile_buckets(
        &self,
        buckets: &[MonthBucket],
        reporter: &dyn Reporter,
    ) -> Result<(), ProcessError> {
        log::info!("Processing {} playlist(s)", buckets.len());
        let mut reconciler = PlaylistReconciler::load(&self.api).await?;
        let mut summary = RunSummary::default();

        for bucket in buckets {
            let track_ids: Vec<u64> = bucket.tracks.iter().map(|track| track.id).collect();
            match reconciler.ensure(&bucket.title, &track_ids).await {
                Ok(outcome) => {
                    reporter.bucket_outcome(&bucket.title, &outcome);
                    summary.record(&outcome);
                }
                Err(error) => {
                    log::error!("Error reconciling playlist '{}': {error}", bucket.title);
                    reporter.bucket_failed(&bucket.title, &error);
                    summary.failed.push(bucket.title.clone());
                }
            }
        }

        reporter.summary(&summary);
        Ok(())
    }
}
