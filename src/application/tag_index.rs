//! Tag usage counts, per collection or across all of them.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;

use crate::application::repos::{RepoError, TagsRepo};
use crate::domain::entities::{TagRecord, TagWithCount};
use crate::domain::types::ItemScope;

#[derive(Clone)]
pub struct TagIndex {
    tags: Arc<dyn TagsRepo>,
}

impl TagIndex {
    pub fn new(tags: Arc<dyn TagsRepo>) -> Self {
        Self { tags }
    }

    /// Tag id to number of linked items. `All` sums the five collections.
    pub async fn tag_counts(&self, scope: ItemScope) -> Result<HashMap<i64, u64>, RepoError> {
        let per_kind = try_join_all(
            scope
                .kinds()
                .into_iter()
                .map(|kind| self.tags.tag_counts(kind)),
        )
        .await?;

        let mut totals = HashMap::new();
        for counts in per_kind {
            for (tag_id, count) in counts {
                *totals.entry(tag_id).or_insert(0) += count;
            }
        }
        Ok(totals)
    }

    /// Attach counts to tags, reporting zero for tags without links.
    pub fn with_counts(tags: Vec<TagRecord>, counts: &HashMap<i64, u64>) -> Vec<TagWithCount> {
        tags.into_iter()
            .map(|tag| {
                let count = counts.get(&tag.id).copied().unwrap_or(0);
                TagWithCount { tag, count }
            })
            .collect()
    }

    /// Tags with at least one link, most used first, name breaking ties.
    pub async fn popular(&self, limit: usize) -> Result<Vec<TagWithCount>, RepoError> {
        let (tags, counts) =
            futures::try_join!(self.tags.list_tags(), self.tag_counts(ItemScope::All))?;

        let mut ranked: Vec<TagWithCount> = Self::with_counts(tags, &counts)
            .into_iter()
            .filter(|entry| entry.count > 0)
            .collect();
        ranked.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.tag.name.cmp(&b.tag.name))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }
}
