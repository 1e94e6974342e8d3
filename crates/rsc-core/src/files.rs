//! File listing service and the per-category library view.
//!
//! Each category is fetched on its own; a failure in one never affects the
//! others. [`LibraryView`] merges fetch results category by category and
//! drops any that were issued under an older session.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::channel::{Method, RequestChannel};
use crate::errors::CoreError;
use crate::session::{Generation, SessionLease, SessionStore};
use crate::types::{ApiData, FileListing, MediaCategory};

/// Result of fetching one category.
#[derive(Debug, Clone)]
pub struct CategoryFetch {
    pub category: MediaCategory,
    pub generation: Generation,
    pub result: Result<Vec<FileListing>, CoreError>,
}

impl CategoryFetch {
    /// `(listings, error)` with exactly one side set.
    pub fn into_parts(self) -> (Option<Vec<FileListing>>, Option<CoreError>) {
        match self.result {
            Ok(listings) => (Some(listings), None),
            Err(e) => (None, Some(e)),
        }
    }
}

pub struct FileListingService {
    channel: Arc<RequestChannel>,
}

impl FileListingService {
    pub fn new(channel: Arc<RequestChannel>) -> Self {
        Self { channel }
    }

    pub async fn list(&self, category: MediaCategory, lease: &SessionLease) -> CategoryFetch {
        let result = self
            .channel
            .call_with::<(), ApiData<Vec<FileListing>>>(lease, &category.path(), Method::Get, None)
            .await
            .map(|resp| resp.data);

        match &result {
            Ok(listings) => debug!(%category, roots = listings.len(), "listing fetched"),
            Err(e) => warn!(%category, error = %e, "listing failed"),
        }

        CategoryFetch {
            category,
            generation: lease.generation,
            result,
        }
    }

    /// Fetch every category concurrently. Results come back in input order.
    pub async fn fetch_all(&self, categories: &[MediaCategory], lease: &SessionLease) -> Vec<CategoryFetch> {
        join_all(categories.iter().map(|c| self.list(*c, lease))).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryState {
    pub listings: Option<Vec<FileListing>>,
    pub error: Option<CoreError>,
    pub loading: bool,
}

/// Aggregated listing state across categories.
#[derive(Debug, Clone, Default)]
pub struct LibraryView {
    categories: BTreeMap<MediaCategory, CategoryState>,
}

impl LibraryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark categories as loading. Existing listings stay until replaced.
    pub fn begin(&mut self, categories: &[MediaCategory]) {
        for c in categories {
            self.categories.entry(*c).or_default().loading = true;
        }
    }

    /// Merge one fetch. Returns `false` (and changes nothing) if the fetch
    /// belongs to a session that is no longer current.
    pub fn apply(&mut self, fetch: CategoryFetch, store: &SessionStore) -> bool {
        if !store.is_current(fetch.generation) {
            debug!(
                category = %fetch.category,
                stale = fetch.generation.value(),
                "dropping stale listing"
            );
            return false;
        }

        let state = self.categories.entry(fetch.category).or_default();
        state.loading = false;
        match fetch.result {
            Ok(listings) => {
                state.listings = Some(listings);
                state.error = None;
            }
            Err(e) => state.error = Some(e),
        }
        true
    }

    /// Forget everything, e.g. after the session was reset.
    pub fn clear(&mut self) {
        self.categories.clear();
    }

    pub fn state(&self, category: MediaCategory) -> Option<&CategoryState> {
        self.categories.get(&category)
    }

    pub fn listings(&self, category: MediaCategory) -> Option<&[FileListing]> {
        self.state(category)?.listings.as_deref()
    }

    pub fn error(&self, category: MediaCategory) -> Option<&CoreError> {
        self.state(category)?.error.as_ref()
    }

    pub fn is_loading(&self, category: MediaCategory) -> bool {
        self.state(category).is_some_and(|s| s.loading)
    }

    pub fn audios(&self) -> Option<&[FileListing]> {
        self.listings(MediaCategory::Audio)
    }

    pub fn images(&self) -> Option<&[FileListing]> {
        self.listings(MediaCategory::Image)
    }

    pub fn videos(&self) -> Option<&[FileListing]> {
        self.listings(MediaCategory::Video)
    }

    pub fn is_audio_error(&self) -> Option<&CoreError> {
        self.error(MediaCategory::Audio)
    }

    pub fn is_image_error(&self) -> Option<&CoreError> {
        self.error(MediaCategory::Image)
    }

    pub fn is_video_error(&self) -> Option<&CoreError> {
        self.error(MediaCategory::Video)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaCategory, &CategoryState)> {
        self.categories.iter().map(|(c, s)| (*c, s))
    }
}
