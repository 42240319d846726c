//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives the four-phase traversal of each selected reference
//! period:
//! - Phase 1 links every upstream brand to the period
//! - Phase 2 fetches models for brands whose models are pending
//! - Phase 3 fetches model-years for models whose years are pending
//! - Phase 4 fetches prices for model-years whose price is pending
//!
//! Every phase only acts on checkpoints that are still pending, so a rerun
//! resumes where the previous one stopped. A fetch failure for one item is
//! logged and leaves its checkpoint pending; storage failures end the run.

use crate::classifier::{ClassifierError, SegmentClassifier};
use crate::config::{Config, CrawlConfig};
use crate::crawler::outcome::{CrawlReport, PeriodReport, PhaseReport};
use crate::crawler::progress::{ProgressSink, TracingProgress};
use crate::crawler::selection::{select_periods, SelectedPeriod};
use crate::crawler::CrawlOptions;
use crate::fipe::{parse_amount, parse_year_value, BrandEntry, FipeClient, PriceQuery};
use crate::storage::{
    PendingBrand, PendingModel, PendingModelYear, PriceChange, SegmentSource, SqliteStorage,
    Storage,
};
use crate::{FetchError, SyncError};
use chrono::Datelike;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Main crawler coordinator structure
pub struct Coordinator<S: Storage> {
    client: FipeClient,
    storage: S,
    classifier: Option<SegmentClassifier>,
    crawl_config: CrawlConfig,
    progress: Arc<dyn ProgressSink>,
}

impl<S: Storage> Coordinator<S> {
    /// Creates a coordinator without a classifier, reporting through `tracing`
    pub fn new(client: FipeClient, storage: S, crawl_config: CrawlConfig) -> Self {
        Self {
            client,
            storage,
            classifier: None,
            crawl_config,
            progress: Arc::new(TracingProgress),
        }
    }

    /// Uses `classifier` for models discovered during phase 2
    pub fn with_classifier(mut self, classifier: SegmentClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sends progress lines to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs one crawl pass over the periods selected by `options`
    ///
    /// Returns an error only when the period catalog cannot be fetched, a
    /// requested period cannot be decoded, or storage fails.
    pub async fn run(&mut self, options: &CrawlOptions) -> Result<CrawlReport, SyncError> {
        options.validate()?;
        let start_time = Instant::now();
        let mut report = CrawlReport::default();

        if options.classify && self.classifier.is_none() {
            warn!("Classification requested but no classifier is configured; skipping");
        }

        self.progress.line("Fetching reference tables...");
        let catalog = self.client.reference_periods().await?;
        let current_year = chrono::Local::now().year();
        let periods = select_periods(&catalog, options, current_year)?;

        if periods.is_empty() {
            self.progress.line("No reference tables found to process");
            report.elapsed = start_time.elapsed();
            return Ok(report);
        }

        self.progress
            .line(&format!("Found {} reference tables to process", periods.len()));

        for period in &periods {
            let period_report = self.sync_period(period, options).await?;
            report.prices_fetched += period_report.prices.succeeded;
            report.periods.push(period_report);
        }

        report.elapsed = start_time.elapsed();
        self.progress.line(&format!(
            "Crawl complete: {} prices in {}s",
            report.prices_fetched,
            report.elapsed.as_secs()
        ));

        Ok(report)
    }

    /// Runs the four phases for one reference period
    pub async fn sync_period(
        &mut self,
        period: &SelectedPeriod,
        options: &CrawlOptions,
    ) -> Result<PeriodReport, SyncError> {
        let record = self
            .storage
            .upsert_reference_period(period.code, period.month, period.year)?;
        let mut report = PeriodReport {
            code: period.code,
            label: period.label.clone(),
            ..PeriodReport::default()
        };

        self.progress.line(&format!(
            "Processing reference {} ({})...",
            period.code, period.label
        ));

        if options.force {
            self.progress.line("  Force mode: clearing crawl status...");
            self.storage.clear_crawl_status(record.id)?;
        }

        self.progress.line("  Phase 1: Crawling brands...");
        match self.crawl_brands(period.code, record.id, options).await {
            Ok(linked) => {
                report.brands_linked = linked;
                self.progress.line(&format!("    Crawled {} brands", linked));
            }
            Err(SyncError::Fetch(e)) => {
                error!("Failed to fetch brands for reference {}: {}", period.code, e);
                self.progress.line(&format!(
                    "    Error crawling brands for reference {}; skipping it",
                    period.code
                ));
                report.brands_failed = true;
                return Ok(report);
            }
            Err(e) => return Err(e),
        }

        report.models = self.crawl_models(period.code, record.id, options).await?;
        report.model_years = self.crawl_model_years(period.code, record.id).await?;
        report.prices = self.crawl_prices(period.code, record.id).await?;

        report.marked_crawled = if self.crawl_config.require_complete_period {
            let pending = self.storage.count_pending_checkpoints(record.id)?;
            if pending.is_complete() {
                true
            } else {
                self.progress.line(&format!(
                    "  Reference {} left incomplete: {} brands, {} models, {} model-years pending",
                    period.code, pending.brands, pending.models, pending.model_years
                ));
                false
            }
        } else {
            true
        };

        if report.marked_crawled {
            self.storage.mark_reference_period_crawled(record.id)?;
            self.progress
                .line(&format!("  Completed reference {}", period.code));
        }

        Ok(report)
    }

    /// Phase 1: links every wanted upstream brand to the period
    ///
    /// Returns the number of brands linked.
    pub async fn crawl_brands(
        &mut self,
        period_code: i64,
        period_id: i64,
        options: &CrawlOptions,
    ) -> Result<usize, SyncError> {
        let brands = self.client.brands(period_code).await?;
        let wanted: Vec<&BrandEntry> = brands
            .iter()
            .filter(|b| self.brand_wanted(&b.code, options))
            .collect();

        for entry in &wanted {
            let brand = self.storage.upsert_brand(&entry.code, &entry.label)?;
            self.storage.upsert_reference_brand(period_id, brand.id)?;
        }

        Ok(wanted.len())
    }

    fn brand_wanted(&self, code: &str, options: &CrawlOptions) -> bool {
        let requested = options.brand_code.as_deref().map_or(true, |b| b == code);
        let allowed = self.crawl_config.allowed_brands.is_empty()
            || self.crawl_config.allowed_brands.iter().any(|b| b == code);
        requested && allowed
    }

    /// Phase 2: fetches models for every brand still pending in the period
    pub async fn crawl_models(
        &mut self,
        period_code: i64,
        period_id: i64,
        options: &CrawlOptions,
    ) -> Result<PhaseReport, SyncError> {
        let pending = self.storage.get_uncrawled_reference_brands(period_id)?;
        let mut report = PhaseReport::default();

        if pending.is_empty() {
            self.progress.line("  Phase 2: Models already crawled");
            return Ok(report);
        }

        self.progress.line(&format!(
            "  Phase 2: Crawling models for {} brands...",
            pending.len()
        ));

        for brand in &pending {
            let outcome = recoverable(
                self.crawl_brand_models(period_code, period_id, brand, options)
                    .await,
            )?;
            if let Err(e) = &outcome {
                warn!("Models for brand {} failed: {}", brand.fipe_code, e);
                self.progress
                    .line(&format!("    Error crawling models for {}", brand.name));
            }
            report.record(&outcome);
        }

        Ok(report)
    }

    async fn crawl_brand_models(
        &mut self,
        period_code: i64,
        period_id: i64,
        brand: &PendingBrand,
        options: &CrawlOptions,
    ) -> Result<(), SyncError> {
        let response = self.client.models(period_code, &brand.fipe_code).await?;
        let classify = options.classify && self.classifier.is_some();

        for entry in &response.models {
            let code = entry.code.to_string();
            if let Some(filter) = &options.model_codes {
                if !filter.contains(&code) {
                    continue;
                }
            }

            let upserted = self
                .storage
                .upsert_model(brand.brand_id, &code, &entry.label)?;
            self.storage
                .upsert_reference_model(period_id, upserted.record.id)?;

            if upserted.is_new && classify {
                self.classify_new_model(upserted.record.id, &brand.name, &entry.label)
                    .await?;
            }
        }

        // A filtered fetch is partial, so the brand stays eligible for a full one
        if options.model_codes.is_none() {
            self.storage
                .mark_reference_brand_models_crawled(brand.checkpoint_id)?;
        }

        Ok(())
    }

    /// Classifies a freshly discovered model; failures leave it unclassified
    async fn classify_new_model(
        &mut self,
        model_id: i64,
        brand_name: &str,
        model_name: &str,
    ) -> Result<(), SyncError> {
        let Some(classifier) = &self.classifier else {
            return Ok(());
        };

        match classifier.classify(brand_name, model_name).await {
            Ok(segment) => {
                self.storage
                    .update_model_segment(model_id, segment, SegmentSource::Ai)?;
                self.progress
                    .line(&format!("      Classified {} as {}", model_name, segment));
            }
            Err(ClassifierError::Unparseable(answer)) => {
                warn!(
                    "Could not parse segment for {} {}: {:?}",
                    brand_name, model_name, answer
                );
            }
            Err(e) => {
                warn!("Error classifying {} {}: {}", brand_name, model_name, e);
            }
        }

        Ok(())
    }

    /// Phase 3: fetches model-years for every model still pending in the period
    pub async fn crawl_model_years(
        &mut self,
        period_code: i64,
        period_id: i64,
    ) -> Result<PhaseReport, SyncError> {
        let pending = self.storage.get_uncrawled_reference_models(period_id)?;
        let mut report = PhaseReport::default();

        if pending.is_empty() {
            self.progress.line("  Phase 3: Model-years already crawled");
            return Ok(report);
        }

        self.progress.line(&format!(
            "  Phase 3: Crawling years for {} models...",
            pending.len()
        ));

        for model in &pending {
            let outcome =
                recoverable(self.crawl_model_model_years(period_code, period_id, model).await)?;
            if let Err(e) = &outcome {
                warn!(
                    "Model-years for {} {} failed: {}",
                    model.brand_name, model.name, e
                );
            }
            report.record(&outcome);

            if report.attempted % 50 == 0 {
                info!(
                    "Progress: {}/{} models, {} failed",
                    report.attempted,
                    pending.len(),
                    report.failed
                );
            }
        }

        Ok(report)
    }

    async fn crawl_model_model_years(
        &mut self,
        period_code: i64,
        period_id: i64,
        model: &PendingModel,
    ) -> Result<(), SyncError> {
        let entries = self
            .client
            .model_years(period_code, &model.brand_fipe_code, &model.fipe_code)
            .await?;

        // Decode everything first so a bad value leaves no partial writes
        let decoded = entries
            .iter()
            .map(|entry| parse_year_value(&entry.value).map(|yf| (yf, entry.label.as_str())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FetchError::validation("ConsultarAnoModelo", e.to_string()))?;

        for (year_fuel, label) in decoded {
            let model_year = self.storage.upsert_model_year(
                model.model_id,
                year_fuel.year,
                year_fuel.fuel_code,
                label,
            )?;
            self.storage
                .upsert_reference_model_year(period_id, model_year.id)?;
        }

        self.storage
            .mark_reference_model_years_crawled(model.checkpoint_id)?;
        Ok(())
    }

    /// Phase 4: fetches the price of every model-year still pending in the period
    pub async fn crawl_prices(
        &mut self,
        period_code: i64,
        period_id: i64,
    ) -> Result<PhaseReport, SyncError> {
        let pending = self.storage.get_uncrawled_reference_model_years(period_id)?;
        let mut report = PhaseReport::default();

        if pending.is_empty() {
            self.progress.line("  Phase 4: All prices already crawled");
            return Ok(report);
        }

        self.progress
            .line(&format!("  Phase 4: Fetching {} prices...", pending.len()));

        for model_year in &pending {
            let outcome =
                recoverable(self.crawl_price(period_code, period_id, model_year).await)?;
            if let Err(e) = &outcome {
                warn!(
                    "Price for {} {} ({}) failed: {}",
                    model_year.model_name, model_year.year, model_year.fuel_code, e
                );
            }
            report.record(&outcome);

            if report.attempted % 100 == 0 {
                info!(
                    "Progress: {}/{} prices, {} failed, interval {:?}",
                    report.attempted,
                    pending.len(),
                    report.failed,
                    self.client.current_interval().await
                );
            }
        }

        self.progress
            .line(&format!("    Fetched {} prices", report.succeeded));
        Ok(report)
    }

    async fn crawl_price(
        &mut self,
        period_code: i64,
        period_id: i64,
        model_year: &PendingModelYear,
    ) -> Result<(), SyncError> {
        let query = PriceQuery {
            period_code,
            brand_code: &model_year.brand_fipe_code,
            model_code: &model_year.model_fipe_code,
            year: model_year.year,
            fuel_code: model_year.fuel_code,
        };
        let entry = self.client.price(&query).await?;
        let amount = parse_amount(&entry.amount).map_err(|e| {
            FetchError::validation("ConsultarValorComTodosParametros", e.to_string())
        })?;

        let upsert = self.storage.upsert_price(
            model_year.model_year_id,
            period_id,
            &entry.fipe_code,
            &amount,
        )?;
        if let PriceChange::Updated { previous } = &upsert.change {
            debug!(
                "Price of {} changed from {} to {}",
                entry.fipe_code, previous, amount
            );
        }

        self.storage
            .mark_reference_model_year_price_crawled(model_year.checkpoint_id)?;
        Ok(())
    }
}

/// Separates a recoverable per-item fetch failure from a fatal error
fn recoverable(outcome: Result<(), SyncError>) -> Result<Result<(), FetchError>, SyncError> {
    match outcome {
        Ok(()) => Ok(Ok(())),
        Err(SyncError::Fetch(e)) => Ok(Err(e)),
        Err(e) => Err(e),
    }
}

/// Runs a complete crawl against the configured database
///
/// Opens (or creates) the SQLite database, builds the upstream client and,
/// when `options.classify` is set, the segment classifier. A missing API key
/// disables classification with a warning instead of failing the run.
pub async fn run_crawl(config: &Config, options: &CrawlOptions) -> Result<CrawlReport, SyncError> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
    let client = FipeClient::new(&config.client)?;
    let mut coordinator = Coordinator::new(client, storage, config.crawl.clone());

    if options.classify {
        match SegmentClassifier::from_config(&config.classifier) {
            Ok(classifier) => coordinator = coordinator.with_classifier(classifier),
            Err(e) => warn!("{}, skipping classification", e),
        }
    }

    coordinator.run(options).await
}
