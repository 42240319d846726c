//! Out-of-band classification of models discovered without a segment

use crate::classifier::SegmentClassifier;
use crate::crawler::ProgressSink;
use crate::storage::{SegmentSource, Storage};
use crate::Result;
use tracing::info;

/// Number of models listed by a dry run before the rest are summarized
pub const DRY_RUN_LISTING_LIMIT: usize = 20;

/// Outcome of a classification sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Models without a segment when the sweep started
    pub pending: usize,
    pub classified: usize,
    pub failed: usize,
}

/// Classifies every stored model that has no segment yet
///
/// Without a classifier the sweep is a dry run: the pending models are
/// listed to `progress` and nothing is written.
pub async fn run_classification_sweep<S: Storage>(
    storage: &mut S,
    classifier: Option<&SegmentClassifier>,
    progress: &dyn ProgressSink,
) -> Result<SweepReport> {
    let models = storage.get_models_without_segment()?;
    let mut report = SweepReport {
        pending: models.len(),
        ..SweepReport::default()
    };

    if models.is_empty() {
        progress.line("All models are already classified.");
        return Ok(report);
    }

    progress.line(&format!("Found {} models without segment", models.len()));

    let Some(classifier) = classifier else {
        for model in models.iter().take(DRY_RUN_LISTING_LIMIT) {
            progress.line(&format!("  {} {}", model.brand_name, model.model_name));
        }
        if models.len() > DRY_RUN_LISTING_LIMIT {
            progress.line(&format!(
                "  ... and {} more",
                models.len() - DRY_RUN_LISTING_LIMIT
            ));
        }
        return Ok(report);
    };

    for (model_id, segment) in classifier.classify_batch(&models).await {
        match segment {
            Some(segment) => {
                storage.update_model_segment(model_id, segment, SegmentSource::Ai)?;
                report.classified += 1;
            }
            None => report.failed += 1,
        }
    }

    info!(
        "Classification sweep done: {} classified, {} failed",
        report.classified, report.failed
    );
    progress.line(&format!(
        "Classified: {}, Failed: {}",
        report.classified, report.failed
    ));

    Ok(report)
}
