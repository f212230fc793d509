use std::path::PathBuf;
use std::time::Duration;

use crate::util::env as env_util;

/// Fallback app ids resolved when the storesearch endpoint returns nothing.
/// Well-known indie titles that always have resolvable details.
pub const SEED_APP_IDS: &[u32] = &[
    413150,  // Stardew Valley
    367520,  // Hollow Knight
    504230,  // Celeste
    646570,  // Slay the Spire
    1145360, // Hades
    105600,  // Terraria
    250900,  // The Binding of Isaac: Rebirth
    588650,  // Dead Cells
];

/// Explicit run configuration.
///
/// Everything the pipeline used to hardcode lives here so tests can run with
/// tiny batches and zero delay. `from_env` applies the production defaults,
/// overridable per variable.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How many candidates to ask the catalog sources for.
    pub discover_limit: usize,
    /// Upper bound of games fully processed per invocation.
    pub max_games_per_run: usize,
    /// Target number of reviews kept (and translated) per game.
    pub reviews_per_game: usize,
    /// Pause inserted after each network-bound step.
    pub api_delay: Duration,
    /// Failures per id before the id is permanently skipped.
    pub max_fail_count: u32,
    /// FIFO cap on the persisted processed-id list.
    pub max_processed_ids: usize,
    /// Attempt ceiling of the HTTP retry client.
    pub max_http_attempts: u32,
    /// Base wait of the exponential backoff (`base * 2^attempt`).
    pub backoff_base: Duration,
    /// Reviews shorter than this (chars) are discarded.
    pub min_review_chars: usize,
    /// Reviews from authors with less playtime (hours) are discarded.
    pub min_playtime_hours: u32,
    pub state_file: PathBuf,
    pub output_dir: PathBuf,
    pub prompts_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            discover_limit: 20,
            max_games_per_run: 3,
            reviews_per_game: 3,
            api_delay: Duration::from_millis(1500),
            max_fail_count: 3,
            max_processed_ids: 500,
            max_http_attempts: 3,
            backoff_base: Duration::from_secs(1),
            min_review_chars: 30,
            min_playtime_hours: 1,
            state_file: PathBuf::from("state.json"),
            output_dir: PathBuf::from("content/games"),
            prompts_dir: PathBuf::from("prompts"),
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            discover_limit: env_util::env_parse("DISCOVER_LIMIT", d.discover_limit),
            max_games_per_run: env_util::env_parse("MAX_GAMES_PER_RUN", d.max_games_per_run),
            reviews_per_game: env_util::env_parse("REVIEWS_PER_GAME", d.reviews_per_game),
            api_delay: Duration::from_millis(env_util::env_parse(
                "API_DELAY_MS",
                d.api_delay.as_millis() as u64,
            )),
            max_fail_count: env_util::env_parse("MAX_FAIL_COUNT", d.max_fail_count),
            max_processed_ids: env_util::env_parse("MAX_PROCESSED_IDS", d.max_processed_ids),
            max_http_attempts: env_util::env_parse("HTTP_MAX_RETRIES", d.max_http_attempts),
            backoff_base: Duration::from_millis(env_util::env_parse(
                "HTTP_BACKOFF_MS",
                d.backoff_base.as_millis() as u64,
            )),
            min_review_chars: env_util::env_parse("MIN_REVIEW_CHARS", d.min_review_chars),
            min_playtime_hours: env_util::env_parse("MIN_PLAYTIME_HOURS", d.min_playtime_hours),
            state_file: env_util::env_opt("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.state_file),
            output_dir: env_util::env_opt("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
            prompts_dir: env_util::env_opt("PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.prompts_dir),
        }
    }

    /// Zero-delay variant for tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            api_delay: Duration::ZERO,
            backoff_base: Duration::ZERO,
            ..Self::default()
        }
    }
}
