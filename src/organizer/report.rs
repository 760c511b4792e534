use crate::organizer::processor::MonthBucket;
use crate::organizer::reconciler::EnsureOutcome;
use crate::ports::soundcloud::ApiError;

/// Tally of one organize run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created { .. } => self.created += 1,
            EnsureOutcome::Updated { .. } => self.updated += 1,
            EnsureOutcome::Unchanged { .. } => self.unchanged += 1,
        }
    }
}

/// User-facing output sink for the processor. The console implementation
/// prints; tests record.
pub trait Reporter: Send + Sync {
    fn nothing_to_do(&self);
    fn dry_run_preview(&self, buckets: &[MonthBucket]);
    fn bucket_outcome(&self, title: &str, outcome: &EnsureOutcome);
    fn bucket_failed(&self, title: &str, error: &ApiError);
    fn summary(&self, summary: &RunSummary);
}

pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn nothing_to_do(&self) {
        println!("No new matching tracks found in your stream.");
    }

    fn dry_run_preview(&self, buckets: &[MonthBucket]) {
        println!("\n-- DRY RUN --");
        println!("The following actions would be taken:");
        for bucket in buckets {
            println!("\nPlaylist '{}':", bucket.title);
            println!("Would add {} track(s):", bucket.tracks.len());
            for track in &bucket.tracks {
                println!("  - '{}'", track.title);
            }
        }
    }

    fn bucket_outcome(&self, title: &str, outcome: &EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created { added, .. } => {
                println!("Created playlist '{title}' with {added} track(s)");
            }
            EnsureOutcome::Updated { added, .. } => {
                println!("Added {added} track(s) to playlist '{title}'");
            }
            EnsureOutcome::Unchanged { .. } => {
                println!("Playlist '{title}' is already up to date");
            }
        }
    }

    fn bucket_failed(&self, title: &str, error: &ApiError) {
        println!("Failed to update playlist '{title}': {error}");
    }

    fn summary(&self, summary: &RunSummary) {
        println!(
            "\nProcessing complete: {} created, {} updated, {} unchanged",
            summary.created, summary.updated, summary.unchanged
        );
        if !summary.failed.is_empty() {
            println!("Failed playlists: {}", summary.failed.join(", "));
        }
    }
}

/// Captures everything the processor reports, for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingReporter {
    pub events: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingReporter {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn nothing_to_do(&self) {
        self.push("nothing-to-do".into());
    }

    fn dry_run_preview(&self, buckets: &[MonthBucket]) {
        for bucket in buckets {
            let ids: Vec<String> = bucket
                .tracks
                .iter()
                .map(|track| track.id.to_string())
                .collect();
            self.push(format!("preview {}: {}", bucket.title, ids.join(",")));
        }
    }

    fn bucket_outcome(&self, title: &str, outcome: &EnsureOutcome) {
        let kind = match outcome {
            EnsureOutcome::Created { .. } => "created",
            EnsureOutcome::Updated { .. } => "updated",
            EnsureOutcome::Unchanged { .. } => "unchanged",
        };
        self.push(format!("{kind} {title}"));
    }

    fn bucket_failed(&self, title: &str, _error: &ApiError) {
        self.push(format!("failed {title}"));
    }

    fn summary(&self, summary: &RunSummary) {
        self.push(format!(
            "summary created={} updated={} unchanged={} failed={}",
            summary.created,
            summary.updated,
            summary.unchanged,
            summary.failed.join(",")
        ));
    }
}
