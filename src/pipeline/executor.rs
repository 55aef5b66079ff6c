//! Pipeline executor
//!
//! Sequences one run: make sure a session exists, obtain a snapshot per
//! resource (reused from the store or fetched and saved), aggregate, then
//! write every table. The Pokémon chain (listing → details) and the combat
//! listing are extracted concurrently and share one session.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::{PipelineConfig, DETAIL_RATE_WINDOW};
use super::rate_limit::RateLimiter;
use super::report::{ResourceOutcome, RunReport};
use super::{PipelineError, PipelineResult};
use crate::fetcher::pagination::collect_all;
use crate::fetcher::parser::PokemonParser;
use crate::fetcher::{
    DataFetcher, FetcherError, PokemonApi, ReqwestTransport, RetryController, RetryPolicy,
};
use crate::metrics::{record_extracted, record_table_written, RunMetrics};
use crate::output::{write_table, OutputKind, OutputLayout, OutputResult};
use crate::shutdown::{self, SharedShutdown};
use crate::store::{FsRawStore, RawStore, RefreshMode, Snapshot};
use crate::transform::{self, Tables};
use crate::Resource;

/// Snapshots feeding the transform, plus how each resource was obtained
#[derive(Debug)]
pub struct Extraction {
    /// Pokémon detail records
    pub attributes: Snapshot,
    /// Combat records
    pub combats: Snapshot,
    /// Outcome per resource
    pub resources: BTreeMap<Resource, ResourceOutcome>,
}

/// Runs extract → transform → write
pub struct PipelineExecutor {
    fetcher: Arc<dyn DataFetcher>,
    store: Arc<dyn RawStore>,
    layout: OutputLayout,
    shutdown: Option<SharedShutdown>,
}

impl PipelineExecutor {
    /// Create an executor from its collaborators
    ///
    /// # Arguments
    /// * `fetcher` - Source of raw records
    /// * `store` - Snapshot store, opened with the desired refresh mode
    /// * `output_dir` - Directory receiving the CSV tables
    pub fn new(
        fetcher: Arc<dyn DataFetcher>,
        store: Arc<dyn RawStore>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            store,
            layout: OutputLayout::new(output_dir),
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Wire the production HTTP client and filesystem store for `config`
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        config.api.validate().map_err(PipelineError::Config)?;
        Ok(Self::build(config))
    }

    /// Executor that only reads stored snapshots; API settings are not checked
    pub fn for_snapshots(config: &PipelineConfig) -> Self {
        Self::build(config)
    }

    fn build(config: &PipelineConfig) -> Self {
        let policy = RetryPolicy::default().with_max_retries(config.max_retries);
        let limiter = Arc::new(RateLimiter::request_based(
            config.detail_requests_per_window,
            DETAIL_RATE_WINDOW,
        ));
        let api = PokemonApi::connect(
            config.api.clone(),
            Arc::new(ReqwestTransport::new()),
            RetryController::new(policy),
            Some(limiter),
        );
        let store = FsRawStore::new(
            &config.raw_dir,
            RefreshMode::from_force_flag(config.force_refresh),
        );

        info!(
            base_url = %config.api.base_url,
            raw_dir = %config.raw_dir.display(),
            output_dir = %config.output_dir.display(),
            force_refresh = config.force_refresh,
            max_retries = config.max_retries,
            "Pipeline configured"
        );

        Self::new(Arc::new(api), Arc::new(store), config.output_dir.clone())
    }

    /// Use a specific shutdown coordinator instead of the global one
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Output layout
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Extract, transform and write everything
    pub async fn run(&self) -> PipelineResult<RunReport> {
        let metrics = RunMetrics::start("run");
        let result = async {
            let extraction = self.extract_resources().await?;
            self.check_cancelled()?;
            Ok::<_, PipelineError>(self.transform_and_write(extraction))
        }
        .instrument(info_span!("pipeline_run"))
        .await;
        finish(&metrics, result)
    }

    /// Refresh the snapshots without producing tables
    pub async fn extract(&self) -> PipelineResult<RunReport> {
        let metrics = RunMetrics::start("extract");
        let result = self
            .extract_resources()
            .instrument(info_span!("pipeline_extract"))
            .await
            .map(|extraction| RunReport {
                resources: extraction.resources,
                ..RunReport::default()
            });
        finish(&metrics, result)
    }

    /// Build the tables from the snapshots already in the store
    pub async fn transform_only(&self) -> PipelineResult<RunReport> {
        let metrics = RunMetrics::start("transform");
        let result = self.stored_extraction().map(|extraction| {
            let _span = info_span!("pipeline_transform").entered();
            self.transform_and_write(extraction)
        });
        finish(&metrics, result)
    }

    /// Aggregate an extraction and write every table, best effort per table
    pub fn transform_and_write(&self, extraction: Extraction) -> RunReport {
        let output = transform::transform(
            extraction.attributes.records(),
            extraction.combats.records(),
        );

        let mut report = RunReport {
            resources: extraction.resources,
            warnings: output.warnings,
            ..RunReport::default()
        };
        self.write_tables(&output.tables, &mut report);
        report
    }

    fn write_tables(&self, tables: &Tables, report: &mut RunReport) {
        for kind in OutputKind::ALL {
            let path = self.layout.path_for(kind);
            match write_kind(kind, &path, tables) {
                Ok(rows) => {
                    debug!(table = %kind, rows, "Table persisted");
                    record_table_written(kind.manifest_key(), true);
                    report.record_written(kind, path);
                }
                Err(e) => {
                    error!(table = %kind, path = %path.display(), error = %e, "Failed to write table");
                    record_table_written(kind.manifest_key(), false);
                    report.record_failed(kind, e);
                }
            }
        }
    }

    async fn extract_resources(&self) -> PipelineResult<Extraction> {
        self.check_cancelled()?;

        let ((attributes, pokemon_outcomes), (combats, combats_outcome)) = tokio::try_join!(
            self.extract_pokemon()
                .instrument(info_span!("extract", resource = "pokemon")),
            self.extract_listing(Resource::Combats)
                .instrument(info_span!("extract", resource = "combats")),
        )?;

        let mut resources: BTreeMap<Resource, ResourceOutcome> =
            pokemon_outcomes.into_iter().collect();
        resources.insert(Resource::Combats, combats_outcome);
        for (resource, outcome) in &resources {
            info!(%resource, %outcome, "Resource ready");
        }

        Ok(Extraction {
            attributes,
            combats,
            resources,
        })
    }

    async fn extract_pokemon(&self) -> PipelineResult<(Snapshot, Vec<(Resource, ResourceOutcome)>)> {
        let (listing, listing_outcome) = self.extract_listing(Resource::Pokemon).await?;
        let (attributes, attributes_outcome) = self.extract_attributes(&listing).await?;
        Ok((
            attributes,
            vec![
                (Resource::Pokemon, listing_outcome),
                (Resource::PokemonAttributes, attributes_outcome),
            ],
        ))
    }

    /// Reuse or walk a paginated resource
    async fn extract_listing(&self, resource: Resource) -> PipelineResult<(Snapshot, ResourceOutcome)> {
        if let Some(snapshot) = self.cached(resource)? {
            info!(
                %resource,
                records = snapshot.len(),
                fetched_at = %snapshot.fetch_time(),
                "Reusing snapshot"
            );
            let outcome = ResourceOutcome::Reused {
                records: snapshot.len(),
            };
            return Ok((snapshot, outcome));
        }

        self.ensure_session(resource).await?;
        let records = collect_all(self.fetcher.fetch_all(
            resource,
            self.fetcher.page_size(resource),
            self.fetcher.max_records(resource),
        ))
        .await
        .map_err(|e| PipelineError::fetch(resource, e))?;
        record_extracted(resource.snapshot_name(), records.len());

        self.check_cancelled()?;
        let snapshot = self.save(resource, &records)?;
        let outcome = ResourceOutcome::Fetched {
            records: snapshot.len(),
        };
        Ok((snapshot, outcome))
    }

    /// Fetch details for every listed id the previous snapshot lacks
    async fn extract_attributes(&self, listing: &Snapshot) -> PipelineResult<(Snapshot, ResourceOutcome)> {
        let resource = Resource::PokemonAttributes;
        let previous = self.cached(resource)?;

        let mut merged: BTreeMap<i64, Value> = BTreeMap::new();
        if let Some(previous) = &previous {
            for record in previous.records() {
                if let Some(id) = PokemonParser::record_id(record) {
                    merged.insert(id, record.clone());
                }
            }
        }
        let reused = merged.len();

        let mut seen = HashSet::new();
        let missing: Vec<i64> = listing
            .records()
            .iter()
            .filter_map(PokemonParser::record_id)
            .filter(|id| seen.insert(*id) && !merged.contains_key(id))
            .collect();

        if let (Some(previous), true) = (previous.as_ref(), missing.is_empty()) {
            info!(records = previous.len(), "Pokemon details up to date");
            let outcome = ResourceOutcome::Reused {
                records: previous.len(),
            };
            return Ok((previous.clone(), outcome));
        }

        info!(missing = missing.len(), cached = reused, "Fetching pokemon details");
        if !missing.is_empty() {
            self.ensure_session(resource).await?;
        }

        let mut fetched = 0;
        for id in missing {
            self.check_cancelled()?;
            match self.fetcher.fetch_one(resource, id).await {
                Ok(record) => {
                    merged.insert(id, with_id(record, id));
                    fetched += 1;
                }
                Err(FetcherError::HttpError { status: 404, .. }) => {
                    warn!(id, "Listed pokemon has no detail record, skipping");
                }
                Err(e) => return Err(PipelineError::fetch(resource, e)),
            }
        }
        record_extracted(resource.snapshot_name(), fetched);

        let records: Vec<Value> = merged.into_values().collect();
        let snapshot = self.save(resource, &records)?;
        let outcome = match previous {
            Some(_) => ResourceOutcome::Merged { reused, fetched },
            None => ResourceOutcome::Fetched { records: fetched },
        };
        Ok((snapshot, outcome))
    }

    fn stored_extraction(&self) -> PipelineResult<Extraction> {
        let attributes = self.stored(Resource::PokemonAttributes)?;
        let combats = self.stored(Resource::Combats)?;

        let resources = BTreeMap::from([
            (
                Resource::PokemonAttributes,
                ResourceOutcome::Reused {
                    records: attributes.len(),
                },
            ),
            (
                Resource::Combats,
                ResourceOutcome::Reused {
                    records: combats.len(),
                },
            ),
        ]);

        Ok(Extraction {
            attributes,
            combats,
            resources,
        })
    }

    fn stored(&self, resource: Resource) -> PipelineResult<Snapshot> {
        self.store
            .load(resource)
            .map_err(|e| PipelineError::store(resource, e))?
            .ok_or(PipelineError::MissingSnapshot { resource })
    }

    /// Snapshot to reuse; unusable snapshots count as absent
    fn cached(&self, resource: Resource) -> PipelineResult<Option<Snapshot>> {
        match self.store.load_if_fresh(resource) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_unusable_snapshot() => {
                warn!(%resource, error = %e, "Ignoring unusable snapshot, re-fetching");
                Ok(None)
            }
            Err(e) => Err(PipelineError::store(resource, e)),
        }
    }

    fn save(&self, resource: Resource, records: &[Value]) -> PipelineResult<Snapshot> {
        let snapshot = self
            .store
            .save(resource, records)
            .map_err(|e| PipelineError::store(resource, e))?;
        info!(%resource, records = snapshot.len(), "Snapshot saved");
        Ok(snapshot)
    }

    async fn ensure_session(&self, resource: Resource) -> PipelineResult<()> {
        self.fetcher
            .ensure_session()
            .await
            .map_err(|e| PipelineError::fetch(resource, e))
    }

    fn check_cancelled(&self) -> PipelineResult<()> {
        match &self.shutdown {
            Some(shutdown) if shutdown.is_shutdown_requested() => {
                warn!("Shutdown requested, stopping run");
                Err(PipelineError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

fn write_kind(kind: OutputKind, path: &std::path::Path, tables: &Tables) -> OutputResult<u64> {
    match kind {
        OutputKind::Pokemon => write_table(path, &tables.pokemon),
        OutputKind::Combats => write_table(path, &tables.combats),
        OutputKind::Stats => write_table(path, &tables.stats),
        OutputKind::ByType => write_table(path, &tables.by_type),
        OutputKind::Top10Winners => write_table(path, &tables.top10_winners),
        OutputKind::Top10Losers => write_table(path, &tables.top10_losers),
    }
}

/// Detail records are keyed by id, so make sure they carry one
fn with_id(mut record: Value, id: i64) -> Value {
    if PokemonParser::record_id(&record).is_none() {
        if let Some(object) = record.as_object_mut() {
            object.insert("id".to_string(), Value::from(id));
        }
    }
    record
}

fn finish(metrics: &RunMetrics, result: PipelineResult<RunReport>) -> PipelineResult<RunReport> {
    match &result {
        Ok(report) => metrics.record_success(report.tables_written(), report.warnings.len()),
        Err(e) => metrics.record_failure(&e.to_string()),
    }
    result
}
