use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::Result;
use crate::steam::{Candidate, GameDetails, SteamClient, SteamReview};
use crate::steamspy::SteamSpyClient;

/// Primary store access: discovery, per-game detail, reviews.
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn newest_indies(&self, limit: usize) -> Result<Vec<Candidate>>;
    async fn details(&self, app_id: u32) -> Result<GameDetails>;
    async fn reviews(&self, app_id: u32, count: usize) -> Result<Vec<SteamReview>>;
}

/// Secondary, popularity-ranked discovery. Best-effort by contract.
#[async_trait]
pub trait PopularitySource: Send + Sync {
    async fn top_owned(&self, limit: usize) -> Result<Vec<Candidate>>;
}

#[async_trait]
impl GameStore for SteamClient {
    async fn newest_indies(&self, limit: usize) -> Result<Vec<Candidate>> {
        SteamClient::newest_indies(self, limit).await
    }
    async fn details(&self, app_id: u32) -> Result<GameDetails> {
        SteamClient::details(self, app_id).await
    }
    async fn reviews(&self, app_id: u32, count: usize) -> Result<Vec<SteamReview>> {
        SteamClient::reviews(self, app_id, count).await
    }
}

#[async_trait]
impl PopularitySource for SteamSpyClient {
    async fn top_owned(&self, limit: usize) -> Result<Vec<Candidate>> {
        SteamSpyClient::top_owned(self, limit).await
    }
}

/// Merges the two discovery sources into one ordered candidate list.
///
/// Primary items come first in their returned order; secondary items are
/// appended only when their id is unseen. A failing secondary source degrades
/// to an empty contribution. When the primary search returns nothing, the
/// seed list is resolved instead so the pipeline always has something to try.
pub struct CatalogMerger<'a> {
    store: &'a dyn GameStore,
    popularity: &'a dyn PopularitySource,
    seeds: &'a [u32],
}

impl<'a> CatalogMerger<'a> {
    pub fn new(
        store: &'a dyn GameStore,
        popularity: &'a dyn PopularitySource,
        seeds: &'a [u32],
    ) -> Self {
        Self {
            store,
            popularity,
            seeds,
        }
    }

    pub async fn list_candidates(&self, limit: usize) -> Result<Vec<Candidate>> {
        let primary = self.store.newest_indies(limit).await?;

        if primary.is_empty() {
            warn!("primary search returned no items, resolving seed list");
            return self.resolve_seeds(limit).await;
        }

        let secondary = match self.popularity.top_owned(limit).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "popularity source failed, continuing without it");
                Vec::new()
            }
        };

        let mut seen: HashSet<u32> = primary.iter().map(|c| c.app_id).collect();
        let mut merged = primary;
        for candidate in secondary {
            if seen.insert(candidate.app_id) {
                merged.push(candidate);
            }
        }
        merged.truncate(limit);
        Ok(merged)
    }

    /// One detail lookup per seed id; unresolvable seeds are skipped.
    async fn resolve_seeds(&self, limit: usize) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();
        for &app_id in self.seeds {
            if out.len() >= limit {
                break;
            }
            match self.store.details(app_id).await {
                Ok(details) => out.push(Candidate {
                    app_id,
                    name: details.name,
                }),
                Err(err) => warn!(app_id, error = %err, "seed lookup failed, skipping"),
            }
        }
        info!(candidates = out.len(), "seed fallback resolved");
        Ok(out)
    }
}
