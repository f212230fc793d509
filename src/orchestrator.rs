use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::article::{self, ArticleData, TranslatedReview};
use crate::catalog::{CatalogMerger, GameStore, PopularitySource};
use crate::config::{RunConfig, SEED_APP_IDS};
use crate::error::Result;
use crate::generator::{format_game_details, Enricher};
use crate::prompts::PromptSet;
use crate::reviews;
use crate::state::StateStore;
use crate::steam::Candidate;

/// Per-candidate terminal outcomes. Both count as processed: a game with no
/// usable reviews is not an upstream failure and is never retried.
enum ItemOutcome {
    Published { slug: String },
    NoUsableReviews,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The per-invocation control loop: load state, merge candidates, filter,
/// cap the batch, drive per-item enrichment, reconcile, save state once.
///
/// A single item's failure never aborts the batch; state is written exactly
/// once at run end so a crash mid-batch loses only the in-progress run.
pub struct Orchestrator<'a> {
    cfg: &'a RunConfig,
    store: &'a dyn GameStore,
    popularity: &'a dyn PopularitySource,
    enricher: &'a dyn Enricher,
    prompts: &'a PromptSet,
    state_store: &'a StateStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        cfg: &'a RunConfig,
        store: &'a dyn GameStore,
        popularity: &'a dyn PopularitySource,
        enricher: &'a dyn Enricher,
        prompts: &'a PromptSet,
        state_store: &'a StateStore,
    ) -> Self {
        Self {
            cfg,
            store,
            popularity,
            enricher,
            prompts,
            state_store,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut state = self.state_store.load()?;
        let last_run: &str = if state.last_run_at.is_empty() {
            "(first run)"
        } else {
            &state.last_run_at
        };
        info!(
            last_run,
            processed = state.processed_app_ids.len(),
            "state loaded"
        );

        let merger = CatalogMerger::new(self.store, self.popularity, SEED_APP_IDS);
        let candidates = merger.list_candidates(self.cfg.discover_limit).await?;
        info!(candidates = candidates.len(), "candidates merged");

        let fresh: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                !state.is_processed(c.app_id)
                    && !state.is_exhausted(c.app_id, self.cfg.max_fail_count)
            })
            .collect();
        info!(fresh = fresh.len(), "after processed/exhausted filter");

        let mut summary = RunSummary::default();

        if fresh.is_empty() {
            info!("no new games to process");
            state.last_run_at = Utc::now().to_rfc3339();
            self.state_store.save(&mut state)?;
            return Ok(summary);
        }

        let targets: Vec<Candidate> = fresh
            .into_iter()
            .take(self.cfg.max_games_per_run)
            .collect();

        for game in &targets {
            info!(app_id = game.app_id, name = %game.name, "processing");
            match self.process_one(game).await {
                Ok(ItemOutcome::Published { slug }) => {
                    info!(app_id = game.app_id, slug = %slug, "article published");
                    state.record_processed(game.app_id);
                    summary.processed += 1;
                }
                Ok(ItemOutcome::NoUsableReviews) => {
                    info!(app_id = game.app_id, "no usable reviews, marking processed");
                    state.record_processed(game.app_id);
                    summary.skipped += 1;
                }
                Err(err) => {
                    let count = state.record_failure(game.app_id);
                    warn!(
                        app_id = game.app_id,
                        name = %game.name,
                        fail_count = count,
                        error = %err,
                        "processing failed, will retry on a later run"
                    );
                    summary.failed += 1;
                }
            }
        }

        state.last_run_at = Utc::now().to_rfc3339();
        self.state_store.save(&mut state)?;
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );
        Ok(summary)
    }

    async fn process_one(&self, game: &Candidate) -> Result<ItemOutcome> {
        let details = self.store.details(game.app_id).await?;
        self.pace().await;

        let raw = self
            .store
            .reviews(game.app_id, self.cfg.reviews_per_game * 2)
            .await?;
        self.pace().await;

        let ranked = reviews::filter_and_rank(
            raw,
            self.cfg.min_review_chars,
            self.cfg.min_playtime_hours,
        );
        let selected = reviews::select_balanced(ranked, self.cfg.reviews_per_game);
        if selected.is_empty() {
            return Ok(ItemOutcome::NoUsableReviews);
        }

        let details_block = format_game_details(&details);
        let intro = self
            .enricher
            .generate(&self.prompts.intro, &details_block)
            .await?;
        self.pace().await;

        let mut translated = Vec::with_capacity(selected.len());
        for review in &selected {
            let translation = self
                .enricher
                .generate(&self.prompts.translation, &review.text)
                .await?;
            translated.push(TranslatedReview {
                original: review.text.clone(),
                translated: translation,
                playtime_hours: review.playtime_hours,
                voted_up: review.voted_up,
            });
            self.pace().await;
        }

        let review_block = selected
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        let highlights = self
            .enricher
            .generate(&self.prompts.highlights, &review_block)
            .await?;
        self.pace().await;

        let catch = self
            .enricher
            .generate(&self.prompts.catch, &details_block)
            .await?;
        self.pace().await;

        let slug = article::slug(details.app_id, &details.name);
        let data = ArticleData {
            details,
            generated_intro: intro,
            reviews: translated,
            kansai_highlights: highlights,
            kansai_catch: catch,
            generated_at: Utc::now().to_rfc3339(),
        };
        article::save_article(&self.cfg.output_dir, &slug, &article::build_article(&data))?;

        Ok(ItemOutcome::Published { slug })
    }

    /// Fixed inter-call delay to respect upstream rate limits. Zero in tests.
    async fn pace(&self) {
        if !self.cfg.api_delay.is_zero() {
            sleep(self.cfg.api_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GameStore, PopularitySource};
    use crate::error::Error;
    use crate::prompts::{ModelConfig, TaskPrompt};
    use crate::steam::{GameDetails, SteamReview};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FakeStore {
        search: Vec<Candidate>,
        reviews_per_game: usize,
    }

    fn cand(app_id: u32) -> Candidate {
        Candidate {
            app_id,
            name: format!("Game {app_id}"),
        }
    }

    fn details(app_id: u32) -> GameDetails {
        GameDetails {
            app_id,
            name: format!("Game {app_id}"),
            description: "desc".into(),
            detailed_description: "long desc".into(),
            genres: vec!["Indie".into()],
            tags: vec![],
            price: "¥500".into(),
            release_date: "2026".into(),
            developer: "dev".into(),
            header_image: "https://cdn.example/h.jpg".into(),
            review_score: "好評".into(),
            review_percentage: 80,
        }
    }

    #[async_trait]
    impl GameStore for FakeStore {
        async fn newest_indies(&self, _limit: usize) -> Result<Vec<Candidate>> {
            Ok(self.search.clone())
        }
        async fn details(&self, app_id: u32) -> Result<GameDetails> {
            Ok(details(app_id))
        }
        async fn reviews(&self, _app_id: u32, _count: usize) -> Result<Vec<SteamReview>> {
            Ok((0..self.reviews_per_game)
                .map(|i| SteamReview {
                    text: format!("A wonderful little game, review number {i}. ").repeat(4),
                    voted_up: true,
                    playtime_hours: 25,
                    author_steam_id: i.to_string(),
                })
                .collect())
        }
    }

    struct NoPopularity;

    #[async_trait]
    impl PopularitySource for NoPopularity {
        async fn top_owned(&self, _limit: usize) -> Result<Vec<Candidate>> {
            Ok(vec![])
        }
    }

    /// Enricher that fails whenever the user content mentions a configured
    /// marker (the fake game names flow through intro/catch content).
    struct FakeEnricher {
        fail_for: HashSet<String>,
        calls: Mutex<usize>,
    }

    impl FakeEnricher {
        fn ok() -> Self {
            Self {
                fail_for: HashSet::new(),
                calls: Mutex::new(0),
            }
        }
        fn failing_on(name: &str) -> Self {
            Self {
                fail_for: HashSet::from([name.to_string()]),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl Enricher for FakeEnricher {
        async fn generate(&self, _task: &TaskPrompt, user_content: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            if self.fail_for.iter().any(|n| user_content.contains(n)) {
                return Err(Error::Generation("synthetic failure".into()));
            }
            Ok("生成されたテキストやで".into())
        }
    }

    fn prompt_set() -> PromptSet {
        let task = |name: &str| TaskPrompt {
            prompt: format!("{name} prompt"),
            config: ModelConfig {
                model: "test/model".into(),
                temperature: 0.5,
                max_tokens: 100,
                prompt_file: format!("{name}.md"),
            },
        };
        PromptSet {
            intro: task("intro"),
            translation: task("translation"),
            highlights: task("highlights"),
            catch: task("catch"),
        }
    }

    struct Harness {
        cfg: RunConfig,
        state_store: StateStore,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            output_dir: dir.path().join("content"),
            state_file: dir.path().join("state.json"),
            ..RunConfig::for_tests()
        };
        let state_store = StateStore::new(cfg.state_file.clone(), cfg.max_processed_ids);
        Harness {
            cfg,
            state_store,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn full_batch_succeeds_and_is_capped() {
        let h = harness();
        let store = FakeStore {
            search: vec![cand(1), cand(2), cand(3), cand(4)],
            reviews_per_game: 5,
        };
        let enricher = FakeEnricher::ok();
        let prompts = prompt_set();
        let orch = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &enricher,
            &prompts,
            &h.state_store,
        );

        let summary = orch.run().await.unwrap();
        assert_eq!(summary.processed, 3); // capped at max_games_per_run
        assert_eq!(summary.failed, 0);

        let state = h.state_store.load().unwrap();
        assert_eq!(state.processed_app_ids, vec![1, 2, 3]);
        assert!(!state.last_run_at.is_empty());
        assert!(h.cfg.output_dir.join("1-game-1.md").exists());
    }

    #[tokio::test]
    async fn partial_failure_is_isolated() {
        // 3 candidates, the 2nd fails during enrichment: the run completes,
        // 1 and 3 are processed, 2 gets fail_count += 1.
        let h = harness();
        let store = FakeStore {
            search: vec![cand(1), cand(2), cand(3)],
            reviews_per_game: 5,
        };
        let enricher = FakeEnricher::failing_on("Game 2");
        let prompts = prompt_set();
        let orch = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &enricher,
            &prompts,
            &h.state_store,
        );

        let summary = orch.run().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);

        let state = h.state_store.load().unwrap();
        assert_eq!(state.processed_app_ids, vec![1, 3]);
        assert_eq!(state.failed_app_ids.get(&2).unwrap().fail_count, 1);
    }

    #[tokio::test]
    async fn rerun_never_reprocesses_ids() {
        let h = harness();
        let store = FakeStore {
            search: vec![cand(1), cand(2)],
            reviews_per_game: 5,
        };
        let prompts = prompt_set();

        let first = FakeEnricher::ok();
        Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &first,
            &prompts,
            &h.state_store,
        )
        .run()
        .await
        .unwrap();

        let second = FakeEnricher::ok();
        let summary = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &second,
            &prompts,
            &h.state_store,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert_eq!(*second.calls.lock().unwrap(), 0, "no enrichment on rerun");

        let state = h.state_store.load().unwrap();
        assert_eq!(state.processed_app_ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn exhausted_ids_are_excluded_forever() {
        let h = harness();
        let store = FakeStore {
            search: vec![cand(2)],
            reviews_per_game: 5,
        };
        let prompts = prompt_set();
        let enricher = FakeEnricher::failing_on("Game 2");

        for _ in 0..h.cfg.max_fail_count {
            Orchestrator::new(
                &h.cfg,
                &store,
                &NoPopularity,
                &enricher,
                &prompts,
                &h.state_store,
            )
            .run()
            .await
            .unwrap();
        }
        let state = h.state_store.load().unwrap();
        assert_eq!(
            state.failed_app_ids.get(&2).unwrap().fail_count,
            h.cfg.max_fail_count
        );

        // Upstream still offers the id, even with a healthy enricher now.
        let healthy = FakeEnricher::ok();
        let summary = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &healthy,
            &prompts,
            &h.state_store,
        )
        .run()
        .await
        .unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(*healthy.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn no_usable_reviews_is_a_degraded_success() {
        let h = harness();
        let store = FakeStore {
            search: vec![cand(1)],
            reviews_per_game: 0,
        };
        let prompts = prompt_set();
        let enricher = FakeEnricher::ok();
        let orch = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &enricher,
            &prompts,
            &h.state_store,
        );

        let summary = orch.run().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.processed, 0);
        assert_eq!(*enricher.calls.lock().unwrap(), 0);

        let state = h.state_store.load().unwrap();
        assert!(state.is_processed(1), "skip-with-success is terminal");
        assert!(!h.cfg.output_dir.exists(), "no article written");
    }

    #[tokio::test]
    async fn seed_fallback_feeds_the_batch() {
        let h = harness();
        let store = FakeStore {
            search: vec![],
            reviews_per_game: 5,
        };
        let prompts = prompt_set();
        let enricher = FakeEnricher::ok();
        let orch = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &enricher,
            &prompts,
            &h.state_store,
        );

        // Empty primary triggers the seed fallback; the fake store resolves
        // every seed, so the batch fills up to the per-run cap.
        let summary = orch.run().await.unwrap();
        assert_eq!(summary.processed, 3);

        let state = h.state_store.load().unwrap();
        assert_eq!(state.processed_app_ids.len(), 3);
        assert!(!state.last_run_at.is_empty());
    }

    #[tokio::test]
    async fn all_filtered_out_still_stamps_last_run() {
        let h = harness();
        let store = FakeStore {
            search: vec![cand(1)],
            reviews_per_game: 5,
        };
        let prompts = prompt_set();
        let enricher = FakeEnricher::ok();

        let mut pre = crate::state::ProcessingState::default();
        pre.record_processed(1);
        h.state_store.save(&mut pre).unwrap();

        let summary = Orchestrator::new(
            &h.cfg,
            &store,
            &NoPopularity,
            &enricher,
            &prompts,
            &h.state_store,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(summary, RunSummary::default());
        let state = h.state_store.load().unwrap();
        assert!(!state.last_run_at.is_empty());
        assert_eq!(*enricher.calls.lock().unwrap(), 0);
    }
}
