//! Transfer progress per requested path

use std::sync::{Arc, Mutex, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::bundles::BundleSizeTable;

const SIZED_TEMPLATE: &str =
    "{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const UNSIZED_TEMPLATE: &str = "{msg} {spinner:.green} {bytes} ({bytes_per_sec})";

struct ActiveBar {
    path: String,
    bar: ProgressBar,
}

/// Hands out one progress bar per distinct, consecutively requested path.
///
/// Repeated requests for the same path keep adding to the same bar; a
/// request for another path finishes the old bar and starts a fresh one.
pub struct ProgressTracker {
    table: Arc<BundleSizeTable>,
    progress: MultiProgress,
    active: Mutex<Option<ActiveBar>>,
}

impl ProgressTracker {
    /// Create a tracker drawing into `progress`
    pub fn new(table: Arc<BundleSizeTable>, progress: MultiProgress) -> Self {
        Self {
            table,
            progress,
            active: Mutex::new(None),
        }
    }

    /// Bundle sizes used to size new bars
    pub fn table(&self) -> &BundleSizeTable {
        &self.table
    }

    /// Bar for a request to `url_path`
    pub fn begin(&self, url_path: &str) -> ProgressBar {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = active.as_ref() {
            if current.path == url_path {
                return current.bar.clone();
            }
        }

        if let Some(previous) = active.take() {
            previous.bar.finish();
        }

        let bar = self
            .progress
            .add(new_bar(url_path, self.table.size_of(url_path)));
        *active = Some(ActiveBar {
            path: url_path.to_owned(),
            bar: bar.clone(),
        });
        bar
    }

    /// Path and bar of the most recent request, if any
    pub fn current(&self) -> Option<(String, ProgressBar)> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .as_ref()
            .map(|current| (current.path.clone(), current.bar.clone()))
    }

    /// Finish the active bar, leaving it drawn
    pub fn finish(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref() {
            current.bar.finish();
        }
    }
}

fn new_bar(url_path: &str, size: Option<u64>) -> ProgressBar {
    let (bar, template) = match size {
        Some(len) => (ProgressBar::new(len), SIZED_TEMPLATE),
        None => (ProgressBar::no_length(), UNSIZED_TEMPLATE),
    };

    let style = ProgressStyle::with_template(template)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    bar.with_style(style).with_message(format!("/{}", url_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use std::path::PathBuf;

    async fn tracker_with(files: &[(&str, usize)]) -> (tempfile::TempDir, ProgressTracker) {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, size) in files {
            std::fs::write(dir.path().join(name), vec![7u8; *size]).unwrap();
            paths.push(PathBuf::from(name));
        }
        let table = BundleSizeTable::stat(&paths, dir.path()).await.unwrap();
        let progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        (dir, ProgressTracker::new(Arc::new(table), progress))
    }

    #[tokio::test]
    async fn test_bar_sized_from_table() {
        let (_dir, tracker) = tracker_with(&[("a.bundle", 4096)]).await;

        let bar = tracker.begin("a.bundle");
        assert_eq!(bar.length(), Some(4096));
        assert_eq!(bar.position(), 0);
    }

    #[tokio::test]
    async fn test_unknown_path_has_no_length() {
        let (_dir, tracker) = tracker_with(&[("a.bundle", 10)]).await;

        let bar = tracker.begin("other.txt");
        assert_eq!(bar.length(), None);
        bar.inc(5);
        assert_eq!(bar.position(), 5);
    }

    #[tokio::test]
    async fn test_same_path_reuses_bar() {
        let (_dir, tracker) = tracker_with(&[("a.bundle", 100)]).await;

        tracker.begin("a.bundle").inc(40);
        let again = tracker.begin("a.bundle");
        assert_eq!(again.position(), 40);
    }

    #[tokio::test]
    async fn test_path_change_resets_bar() {
        let (_dir, tracker) = tracker_with(&[("a.bundle", 100), ("b.bundle", 50)]).await;

        tracker.begin("a.bundle").inc(100);
        let b = tracker.begin("b.bundle");
        assert_eq!(b.length(), Some(50));
        assert_eq!(b.position(), 0);

        let a = tracker.begin("a.bundle");
        assert_eq!(a.position(), 0);
        assert_eq!(tracker.current().map(|(path, _)| path).as_deref(), Some("a.bundle"));
    }
}
