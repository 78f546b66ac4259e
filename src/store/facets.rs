//! Facet bookkeeping for one harvest
//!
//! [`FacetTracker`] remembers which facet keys have been intercepted and lets
//! the harvester wait for a key to show up. [`ItemsById`] merges the items
//! fetched under every facet by their `objectID`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::watch;

/// Label items get when their facet key is not in [`CATEGORIES`]
pub const UNRECOGNIZED_LABEL: &str = "unrecognized";

/// A category as shown in the store sidebar and the filter value it sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub text: &'static str,
    pub filter: &'static str,
}

/// Known store categories
///
/// Needed both ways: to tell which button a facet key belongs to, and which
/// facet key to wait for after a button was selected.
pub const CATEGORIES: [Category; 19] = [
    Category { text: "ai", filter: "AI" },
    Category { text: "automation", filter: "AUTOMATION" },
    Category { text: "business", filter: "BUSINESS" },
    Category { text: "covid-19", filter: "COVID_19" },
    Category { text: "developer examples", filter: "DEVELOPER_EXAMPLES" },
    Category { text: "developer tools", filter: "DEVELOPER_TOOLS" },
    Category { text: "e-commerce", filter: "ECOMMERCE" },
    Category { text: "games", filter: "GAMES" },
    Category { text: "jobs", filter: "JOBS" },
    Category { text: "marketing", filter: "MARKETING" },
    Category { text: "news", filter: "NEWS" },
    Category { text: "seo tools", filter: "SEO_TOOLS" },
    Category { text: "social media", filter: "SOCIAL_MEDIA" },
    Category { text: "travel", filter: "TRAVEL" },
    Category { text: "videos", filter: "VIDEOS" },
    Category { text: "real estate", filter: "REAL_ESTATE" },
    Category { text: "sports", filter: "SPORTS" },
    Category { text: "education", filter: "EDUCATION" },
    Category { text: "other", filter: "OTHER" },
];

/// Trims and lowercases a category text for comparison
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn category_by_text(text: &str) -> Option<&'static Category> {
    let text = normalize_text(text);
    CATEGORIES.iter().find(|c| c.text == text)
}

pub fn category_by_filter(filter: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.filter == filter)
}

/// Facet key of a `filters` value: `categories:AI` gives `AI`
pub fn facet_key(filters: &str) -> Option<&str> {
    filters.split(':').nth(1).map(str::trim).filter(|key| !key.is_empty())
}

/// Facet keys intercepted so far in one harvest
#[derive(Debug, Clone)]
pub struct FacetTracker {
    seen: watch::Sender<HashSet<String>>,
}

impl Default for FacetTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FacetTracker {
    pub fn new() -> Self {
        let (seen, _) = watch::channel(HashSet::new());
        Self { seen }
    }

    /// Marks a key as discovered
    ///
    /// # Returns
    ///
    /// `true` the first time a key is seen, `false` for every repeat
    pub fn mark_discovered(&self, key: &str) -> bool {
        self.seen.send_if_modified(|seen| seen.insert(key.to_string()))
    }

    pub fn is_discovered(&self, key: &str) -> bool {
        self.seen.borrow().contains(key)
    }

    pub fn discovered_count(&self) -> usize {
        self.seen.borrow().len()
    }

    /// Waits until `key` has been discovered
    ///
    /// A key discovered before the call returns immediately.
    ///
    /// # Returns
    ///
    /// `false` if the key did not show up within `timeout`
    pub async fn wait_discovered(&self, key: &str, timeout: Duration) -> bool {
        let mut rx = self.seen.subscribe();
        let found = tokio::time::timeout(timeout, rx.wait_for(|seen| seen.contains(key))).await;
        matches!(found, Ok(Ok(_)))
    }
}

/// One store item, identified by `objectID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreItem {
    #[serde(rename = "objectID")]
    pub object_id: String,
    /// Labels of every facet the item was found under
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoreItem {
    /// Decodes a hit; hits without an `objectID` string are rejected
    pub fn from_hit(hit: Value) -> Option<Self> {
        let mut item: StoreItem = serde_json::from_value(hit).ok()?;
        item.categories.clear();
        Some(item)
    }
}

/// Items merged by identity, in order of first sighting
#[derive(Debug, Default)]
pub struct ItemsById {
    items: Vec<StoreItem>,
    index: HashMap<String, usize>,
}

impl ItemsById {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item found under `label`
    ///
    /// An item seen before only gains the label; its other fields are kept
    /// from the first sighting.
    pub fn add(&mut self, mut item: StoreItem, label: &str) {
        match self.index.get(&item.object_id) {
            Some(&position) => {
                let existing = &mut self.items[position];
                if !existing.categories.iter().any(|c| c == label) {
                    existing.categories.push(label.to_string());
                }
            }
            None => {
                item.categories = vec![label.to_string()];
                self.index.insert(item.object_id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, object_id: &str) -> Option<&StoreItem> {
        self.index.get(object_id).map(|&position| &self.items[position])
    }

    pub fn into_items(self) -> Vec<StoreItem> {
        self.items
    }
}
