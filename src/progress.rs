//! Progress-callback trait for per-item generation events.
//!
//! Inject an [`Arc<dyn FlashcardProgressCallback>`] via
//! [`crate::config::FlashcardConfigBuilder::progress_callback`] to receive
//! events as chunks and figures are sent to the model.
//!
//! Callbacks rather than channels: a host can forward events to a progress
//! bar, a channel or a log without the library knowing how. The trait is
//! `Send + Sync` because items are processed concurrently.
//!
//! # Example
//!
//! ```rust
//! use pdf2cards::{FlashcardConfig, FlashcardProgressCallback, WorkItem};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl FlashcardProgressCallback for Counter {
//!     fn on_item_complete(&self, _item: WorkItem, cards: usize) {
//!         self.0.fetch_add(cards, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = FlashcardConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::WorkItem;
use std::sync::Arc;

/// Called by the generation pipeline as it processes each work item.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_item_*` may be called concurrently.
pub trait FlashcardProgressCallback: Send + Sync {
    /// Called once extraction has finished, before any model call.
    ///
    /// # Arguments
    /// * `chunks` : text chunks that will be sent
    /// * `figures`: figures that will be captioned
    fn on_generation_start(&self, chunks: usize, figures: usize) {
        let _ = (chunks, figures);
    }

    /// Called just before the model request for an item.
    fn on_item_start(&self, item: WorkItem) {
        let _ = item;
    }

    /// Called when an item produced its cards.
    ///
    /// # Arguments
    /// * `cards`: number of cards the item contributed (may be 0)
    fn on_item_complete(&self, item: WorkItem, cards: usize) {
        let _ = (item, cards);
    }

    /// Called when an item is skipped after all retries.
    fn on_item_error(&self, item: WorkItem, error: &str) {
        let _ = (item, error);
    }

    /// Called once after every item has been attempted.
    ///
    /// # Arguments
    /// * `total_cards` : cards in the final deck
    /// * `failed_items`: items that contributed nothing because they failed
    fn on_generation_complete(&self, total_cards: usize, failed_items: usize) {
        let _ = (total_cards, failed_items);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl FlashcardProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FlashcardConfig`].
pub type ProgressCallback = Arc<dyn FlashcardProgressCallback>;
