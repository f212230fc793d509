use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;
use crate::http::RetryClient;
use crate::steam::Candidate;

const STEAMSPY_API_BASE: &str = "https://steamspy.com";

#[derive(Debug, Deserialize)]
struct SpyEntry {
    appid: u32,
    #[serde(default)]
    name: Option<String>,
    /// Owner-count range, e.g. "1,000,000 .. 2,000,000".
    #[serde(default)]
    owners: Option<String>,
}

/// Lower bound of an owner-count range string. Unparseable input ranks last.
pub fn parse_owner_floor(owners: &str) -> u64 {
    let lower = owners.split("..").next().unwrap_or("");
    let digits: String = lower.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// SteamSpy popularity source. Secondary and best-effort: callers treat any
/// failure here as an empty contribution.
#[derive(Clone)]
pub struct SteamSpyClient {
    http: RetryClient,
    base: String,
}

impl SteamSpyClient {
    pub fn new(http: RetryClient) -> Self {
        Self::with_base(http, STEAMSPY_API_BASE)
    }

    pub fn with_base(http: RetryClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    /// Most-owned indie games over the last two weeks, ranked by the lower
    /// bound of each entry's owner-count range.
    pub async fn top_owned(&self, limit: usize) -> Result<Vec<Candidate>> {
        let url = format!("{}/api.php?request=top100in2weeks", self.base);
        let resp: HashMap<String, SpyEntry> = self.http.get_json(&url).await?;
        debug!(entries = resp.len(), "steamspy returned");

        let mut ranked: Vec<(u64, Candidate)> = resp
            .into_values()
            .filter_map(|e| {
                let name = e.name.filter(|n| !n.is_empty())?;
                let floor = e.owners.as_deref().map(parse_owner_floor).unwrap_or(0);
                Some((
                    floor,
                    Candidate {
                        app_id: e.appid,
                        name,
                    },
                ))
            })
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.app_id.cmp(&b.1.app_id)));
        Ok(ranked.into_iter().take(limit).map(|(_, c)| c).collect())
    }
}
