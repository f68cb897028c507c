//! End-to-end `rank` pipeline: keyword → candidate ids → annotations → volumes → ranking.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use tracing::{debug, info, instrument, warn};

use keywordscout_discovery::{CandidateSource, PinterestSearch};
use keywordscout_relevancy::Scorer;
use keywordscout_scrape::{
    AnnotationScraper, HttpClient, RateLimiter, ScrapeError, VolumeCache, VolumeResolver,
};
use keywordscout_shared::{
    Annotation, AppConfig, CacheConfig, HttpConfig, KeywordScoutError, LimiterConfig,
    PipelineConfig, RankCandidate, Result, RetryPolicy, RunId, ScoredAnnotation,
};

use crate::keyword::validate_keyword;

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct RankResult {
    pub run_id: RunId,
    /// Sanitized seed keyword.
    pub keyword: String,
    /// Candidates, best first.
    pub ranked: Vec<ScoredAnnotation>,
    /// Ids returned by the candidate source.
    pub candidate_ids: Vec<String>,
    /// Ids whose scrape failed, with the reason.
    pub scrape_failures: Vec<(String, ScrapeError)>,
    /// Annotations ranked with volume 0 because resolution failed.
    pub volumes_missing: usize,
    pub elapsed: Duration,
    pub generated_at: DateTime<Utc>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when one candidate id has been scraped (or failed).
    fn id_scraped(&self, id: &str, ok: bool, current: usize, total: usize);
    /// Called as each annotation volume lookup finishes.
    fn volume_resolved(&self, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &RankResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn id_scraped(&self, _id: &str, _ok: bool, _current: usize, _total: usize) {}
    fn volume_resolved(&self, _current: usize, _total: usize) {}
    fn done(&self, _result: &RankResult) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The ranking pipeline. Built once and shared by every request; the rate
/// limiter and volume cache inside it are process-wide.
pub struct Pipeline {
    source: Arc<dyn CandidateSource>,
    scraper: AnnotationScraper,
    resolver: VolumeResolver,
    scorer: Scorer,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        scraper: AnnotationScraper,
        resolver: VolumeResolver,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.volume_concurrency == 0 {
            return Err(KeywordScoutError::config(
                "pipeline.volume_concurrency must be at least 1",
            ));
        }
        let scorer = Scorer::new(config.weights)?;

        Ok(Self {
            source,
            scraper,
            resolver,
            scorer,
            config,
        })
    }

    /// Wire the production pipeline from configuration: one rate limiter,
    /// one HTTP client and one volume cache shared by every component.
    pub fn from_config(app: &AppConfig) -> Result<Self> {
        app.validate()?;

        let limiter = RateLimiter::new(LimiterConfig::from(app))?;
        let http = HttpClient::new(limiter, RetryPolicy::from(app))?;
        let http_config = HttpConfig::from(app);
        let cache = Arc::new(VolumeCache::new(CacheConfig::from(app))?);

        let source = Arc::new(PinterestSearch::new(http.clone(), &http_config)?);
        let scraper = AnnotationScraper::new(http.clone(), &http_config)?;
        let resolver = VolumeResolver::new(http, cache, &http_config);

        Self::new(source, scraper, resolver, PipelineConfig::from(app))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Rank candidates for `seed` with the configured source cap.
    pub async fn rank(&self, seed: &str) -> Result<Vec<ScoredAnnotation>> {
        let result = self
            .run(seed, self.config.max_candidate_sources, &SilentProgress)
            .await?;
        Ok(result.ranked)
    }

    /// Run the full pipeline.
    ///
    /// 1. Validate the seed keyword
    /// 2. Search candidate ids
    /// 3. Scrape annotations for the first `max_scraped_ids` ids
    /// 4. Resolve a volume per unique annotation
    /// 5. Score and sort
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn run(
        &self,
        seed: &str,
        max_candidate_sources: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<RankResult> {
        let start = Instant::now();
        let keyword = validate_keyword(seed)?;
        let run_id = RunId::new();

        info!(%run_id, keyword = %keyword, max_candidate_sources, "starting rank pipeline");

        // --- Phase 1: Candidate ids ---
        progress.phase("Searching candidates");
        let candidate_ids = self.source.search(&keyword, max_candidate_sources).await?;
        debug!(count = candidate_ids.len(), "candidate ids");

        // --- Phase 2: Scrape annotations ---
        progress.phase("Scraping annotations");
        let (annotations, scrape_failures) = self.scrape_all(&candidate_ids, progress).await;

        // --- Phase 3: Volumes ---
        progress.phase("Resolving search volumes");
        let (candidates, volumes_missing) = self.resolve_volumes(&annotations, progress).await;

        // --- Phase 4: Score ---
        progress.phase("Scoring relevancy");
        let ranked = self.scorer.score(&keyword, &candidates);

        let result = RankResult {
            run_id,
            keyword,
            ranked,
            candidate_ids,
            scrape_failures,
            volumes_missing,
            elapsed: start.elapsed(),
            generated_at: Utc::now(),
        };

        progress.done(&result);

        info!(
            run_id = %result.run_id,
            ranked = result.ranked.len(),
            scrape_failures = result.scrape_failures.len(),
            volumes_missing = result.volumes_missing,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "rank pipeline completed"
        );

        Ok(result)
    }

    /// Scrape the first `max_scraped_ids` distinct ids concurrently. Each
    /// outcome is settled on its own; failures are logged and returned next to
    /// the merged annotations.
    async fn scrape_all(
        &self,
        ids: &[String],
        progress: &dyn ProgressReporter,
    ) -> (Vec<Annotation>, Vec<(String, ScrapeError)>) {
        let mut unique: HashSet<&str> = HashSet::new();
        let selected: Vec<String> = ids
            .iter()
            .filter(|id| unique.insert(id.as_str()))
            .take(self.config.max_scraped_ids)
            .cloned()
            .collect();
        let total = selected.len();
        let finished = AtomicUsize::new(0);

        let outcomes = join_all(selected.into_iter().map(|id: String| {
            let finished = &finished;
            async move {
                let outcome = self.scraper.scrape(&id).await;
                let current = finished.fetch_add(1, Ordering::SeqCst) + 1;
                progress.id_scraped(&id, outcome.is_ok(), current, total);
                (id, outcome)
            }
        }))
        .await;

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut annotations = Vec::new();
        let mut failures = Vec::new();

        for (id, outcome) in outcomes {
            match outcome {
                Ok(batch) => {
                    for annotation in batch {
                        if !annotation.is_complete() {
                            continue;
                        }
                        if seen.insert((annotation.url.clone(), annotation.name.clone())) {
                            annotations.push(annotation);
                        }
                    }
                }
                Err(e) => {
                    warn!(id = %id, kind = e.kind(), error = %e, "annotation scrape failed");
                    failures.push((id, e));
                }
            }
        }

        debug!(
            annotations = annotations.len(),
            failures = failures.len(),
            "scrape phase settled"
        );
        (annotations, failures)
    }

    /// Look up a volume for each annotation, at most `volume_concurrency` at a
    /// time. A failed lookup ranks the annotation with volume 0.
    async fn resolve_volumes(
        &self,
        annotations: &[Annotation],
        progress: &dyn ProgressReporter,
    ) -> (Vec<RankCandidate>, usize) {
        let total = annotations.len();
        let finished = AtomicUsize::new(0);
        let missing = AtomicUsize::new(0);

        let candidates: Vec<RankCandidate> = stream::iter(annotations.to_vec())
            .map(|annotation: Annotation| {
                let finished = &finished;
                let missing = &missing;
                async move {
                    let url = self.volume_url(&annotation.url);
                    let volume = match self.resolver.resolve(&url).await {
                        Some(volume) => volume,
                        None => {
                            missing.fetch_add(1, Ordering::SeqCst);
                            0
                        }
                    };
                    let current = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.volume_resolved(current, total);
                    RankCandidate::new(annotation.name, volume)
                }
            })
            .buffered(self.config.volume_concurrency)
            .collect()
            .await;

        (candidates, missing.load(Ordering::SeqCst))
    }

    /// Absolute volume page URL for an annotation's relative path.
    fn volume_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.volume_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
