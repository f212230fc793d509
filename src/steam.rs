use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::http::RetryClient;

const STORE_API_BASE: &str = "https://store.steampowered.com";

/// Steam storesearch category for "games".
const CATEGORY_GAMES: &str = "998";

// ---------------------------------------------------------------------------
// Domain types

/// A discovered game identifier + name, not yet enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub app_id: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct GameDetails {
    pub app_id: u32,
    pub name: String,
    pub description: String,
    pub detailed_description: String,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub price: String,
    pub release_date: String,
    pub developer: String,
    pub header_image: String,
    pub review_score: String,
    pub review_percentage: u32,
}

#[derive(Debug, Clone)]
pub struct SteamReview {
    pub text: String,
    pub voted_up: bool,
    pub playtime_hours: u32,
    pub author_steam_id: String,
}

// ---------------------------------------------------------------------------
// Wire types

#[derive(Debug, Deserialize)]
struct StoreSearchResp {
    #[serde(default)]
    items: Vec<StoreSearchItem>,
}

#[derive(Debug, Deserialize)]
struct StoreSearchItem {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AppDetailsEntry {
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    detailed_description: Option<String>,
    #[serde(default)]
    genres: Option<Vec<DescEntry>>,
    #[serde(default)]
    categories: Option<Vec<DescEntry>>,
    #[serde(default)]
    price_overview: Option<PriceOverview>,
    #[serde(default)]
    is_free: Option<bool>,
    #[serde(default)]
    release_date: Option<ReleaseDate>,
    #[serde(default)]
    developers: Option<Vec<String>>,
    #[serde(default)]
    header_image: Option<String>,
    #[serde(default)]
    review_score_desc: Option<String>,
    #[serde(default)]
    metacritic: Option<Metacritic>,
}

#[derive(Debug, Deserialize)]
struct DescEntry {
    description: String,
}

#[derive(Debug, Deserialize)]
struct PriceOverview {
    #[serde(default)]
    final_formatted: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Metacritic {
    #[serde(default)]
    score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AppReviewsResp {
    #[serde(default)]
    success: Option<i64>,
    #[serde(default)]
    reviews: Vec<RawReview>,
    #[serde(default)]
    query_summary: Option<QuerySummary>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    review: String,
    voted_up: bool,
    author: ReviewAuthor,
}

#[derive(Debug, Deserialize)]
struct ReviewAuthor {
    steamid: String,
    #[serde(default)]
    playtime_forever: u32,
}

#[derive(Debug, Deserialize)]
struct QuerySummary {
    #[serde(default)]
    total_positive: u32,
    #[serde(default)]
    total_negative: u32,
    #[serde(default)]
    total_reviews: u32,
}

// ---------------------------------------------------------------------------
// Client

/// Steam Store API client (storesearch / appdetails / appreviews), no auth.
#[derive(Clone)]
pub struct SteamClient {
    http: RetryClient,
    base: String,
}

impl SteamClient {
    pub fn new(http: RetryClient) -> Self {
        Self::with_base(http, STORE_API_BASE)
    }

    pub fn with_base(http: RetryClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    /// Recently released indie games via the unauthenticated storesearch
    /// endpoint, newest first.
    pub async fn newest_indies(&self, limit: usize) -> Result<Vec<Candidate>> {
        let url = format!(
            "{}/api/storesearch/?term=&category1={}&tags=indie&sort_by=Released_DESC&count={}",
            self.base, CATEGORY_GAMES, limit
        );
        let resp: StoreSearchResp = self.http.get_json(&url).await?;
        debug!(items = resp.items.len(), "storesearch returned");
        Ok(resp
            .items
            .into_iter()
            .map(|item| Candidate {
                app_id: item.id,
                name: item.name,
            })
            .collect())
    }

    /// Store detail for one app id, Japanese locale. The payload is keyed by
    /// id-as-string with a per-entry `success` flag; a missing or
    /// unsuccessful entry means the id is not resolvable.
    pub async fn details(&self, app_id: u32) -> Result<GameDetails> {
        let url = format!("{}/api/appdetails?appids={}&l=japanese", self.base, app_id);
        let resp: HashMap<String, AppDetailsEntry> = self.http.get_json(&url).await?;

        let entry = resp.get(&app_id.to_string());
        let data = match entry {
            Some(e) if e.success => match &e.data {
                Some(d) => d,
                None => return Err(Error::NotFound(app_id)),
            },
            _ => return Err(Error::NotFound(app_id)),
        };

        let price = data
            .price_overview
            .as_ref()
            .and_then(|p| p.final_formatted.clone())
            .unwrap_or_else(|| {
                if data.is_free.unwrap_or(false) {
                    "無料".to_string()
                } else {
                    "価格不明".to_string()
                }
            });

        Ok(GameDetails {
            app_id,
            name: data.name.clone().unwrap_or_default(),
            description: data.short_description.clone().unwrap_or_default(),
            detailed_description: data.detailed_description.clone().unwrap_or_default(),
            genres: data
                .genres
                .iter()
                .flatten()
                .map(|g| g.description.clone())
                .collect(),
            tags: data
                .categories
                .iter()
                .flatten()
                .map(|c| c.description.clone())
                .collect(),
            price,
            release_date: data
                .release_date
                .as_ref()
                .and_then(|r| r.date.clone())
                .unwrap_or_default(),
            developer: data
                .developers
                .as_ref()
                .and_then(|d| d.first().cloned())
                .unwrap_or_default(),
            header_image: data.header_image.clone().unwrap_or_default(),
            review_score: data.review_score_desc.clone().unwrap_or_default(),
            review_percentage: data.metacritic.as_ref().and_then(|m| m.score).unwrap_or(0),
        })
    }

    /// Top-rated English reviews for one app id. An unsuccessful payload
    /// degrades to an empty list; review quality filtering happens later.
    pub async fn reviews(&self, app_id: u32, count: usize) -> Result<Vec<SteamReview>> {
        let url = format!(
            "{}/appreviews/{}?json=1&language=english&num_per_page={}&filter=toprated",
            self.base, app_id, count
        );
        let resp: AppReviewsResp = self.http.get_json(&url).await?;

        if resp.success != Some(1) {
            return Ok(Vec::new());
        }
        if let Some(summary) = &resp.query_summary {
            debug!(
                app_id,
                positive = summary.total_positive,
                negative = summary.total_negative,
                total = summary.total_reviews,
                "review summary"
            );
        }

        Ok(resp
            .reviews
            .into_iter()
            .map(|r| SteamReview {
                text: r.review,
                voted_up: r.voted_up,
                playtime_hours: (r.author.playtime_forever + 30) / 60,
                author_steam_id: r.author.steamid,
            })
            .collect())
    }
}
