//! Batch and retry drivers.
//!
//! The drivers sit between the orchestrator and the DLQ store: they feed
//! items into [`Pipeline::run`](super::orchestrator::Pipeline::run) and
//! translate its failures into DLQ writes. Items run strictly one at a time
//! with a fixed pacing sleep in between.

use tokio::time::sleep;
use uuid::Uuid;

use crate::content::{ChartData, DataType};
use crate::generator::ParamSampler;
use crate::storage::dlq::{AttemptFailure, DlqError, DlqStatus, DlqStore, NewDlqItem};

use super::config::PipelineConfig;
use super::orchestrator::{ErrorStage, Pipeline, PipelineResult, ResumeState};

/// Outcome of one item in a batch.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// The item completed and its question was stored.
    Stored {
        data_type: DataType,
        question_id: String,
    },
    /// The item failed and was queued for retry.
    Queued {
        data_type: DataType,
        dlq_id: Uuid,
        stage: ErrorStage,
        error: String,
    },
}

/// Aggregate result of a batch run. Partial failure is not an error.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub successful: usize,
    pub failed: usize,
    pub outcomes: Vec<ItemOutcome>,
}

/// Aggregate result of a retry sweep.
#[derive(Debug, Clone, Default)]
pub struct RetryReport {
    /// Records picked up from `pending`.
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed again with retries remaining.
    pub requeued: usize,
    /// Failed again with the retry budget spent.
    pub exhausted: usize,
}

/// Drives batches and retry sweeps through the pipeline.
pub struct PipelineRunner {
    pipeline: Pipeline,
    dlq: DlqStore,
    sampler: ParamSampler,
    config: PipelineConfig,
}

impl PipelineRunner {
    pub fn new(
        pipeline: Pipeline,
        dlq: DlqStore,
        sampler: ParamSampler,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pipeline,
            dlq,
            sampler,
            config,
        }
    }

    /// The underlying DLQ store.
    pub fn dlq(&self) -> &DlqStore {
        &self.dlq
    }

    /// Generates `count` items, cycling through the configured data types.
    ///
    /// Each item gets freshly sampled parameters. Failures are added to the
    /// DLQ and counted; only a DLQ write failure aborts the batch.
    pub async fn run_batch(
        &mut self,
        count: usize,
        batch_id: Option<String>,
    ) -> Result<BatchReport, DlqError> {
        let batch_id = batch_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        // An unvalidated config may carry an empty list; fall back to the
        // full rotation rather than panic on the modulo below.
        let data_types = if self.config.data_types.is_empty() {
            DataType::ALL.to_vec()
        } else {
            self.config.data_types.clone()
        };

        tracing::info!(batch_id, count, "starting batch");

        let mut report = BatchReport {
            batch_id: batch_id.clone(),
            successful: 0,
            failed: 0,
            outcomes: Vec::with_capacity(count),
        };

        for i in 0..count {
            if i > 0 {
                sleep(self.config.item_pacing).await;
            }

            let data_type = data_types[i % data_types.len()];
            let params = self.sampler.sample();

            let result = self
                .pipeline
                .run(data_type, &params, ResumeState::default(), Some(&batch_id))
                .await;

            match result {
                PipelineResult::Success { question_id, .. } => {
                    report.successful += 1;
                    report.outcomes.push(ItemOutcome::Stored {
                        data_type,
                        question_id,
                    });
                }
                PipelineResult::Failure {
                    stage,
                    error,
                    params,
                    chart_data,
                    figure,
                } => {
                    let record = self
                        .dlq
                        .add(NewDlqItem {
                            data_type,
                            params,
                            chart_data: chart_data.map(ChartData::into_value),
                            figure,
                            batch_id: Some(batch_id.clone()),
                            error: error.clone(),
                            error_stage: stage,
                            max_retries: self.config.max_retries,
                        })
                        .await?;
                    report.failed += 1;
                    report.outcomes.push(ItemOutcome::Queued {
                        data_type,
                        dlq_id: record.id,
                        stage,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            batch_id,
            successful = report.successful,
            failed = report.failed,
            "batch finished"
        );
        Ok(report)
    }

    /// Retries every `pending` DLQ record, oldest first.
    ///
    /// For each record: `mark_retrying`, rebuild the resume state from the
    /// persisted artifacts, re-run the pipeline, then `mark_succeeded` or
    /// `mark_failed`. Terminal records are never picked up.
    pub async fn retry_pending(&self) -> Result<RetryReport, DlqError> {
        let pending = self.dlq.list_pending().await?;
        tracing::info!(count = pending.len(), "starting retry sweep");

        let mut report = RetryReport::default();

        for (i, record) in pending.into_iter().enumerate() {
            if i > 0 {
                sleep(self.config.item_pacing).await;
            }

            let record = self.dlq.mark_retrying(record.id).await?;
            report.attempted += 1;

            tracing::info!(
                dlq_id = %record.id,
                retry_count = record.retry_count,
                stage = %record.error_stage,
                "retrying DLQ item"
            );

            // Artifacts that no longer validate are regenerated instead of
            // trusted.
            let resume = ResumeState {
                chart_data: record
                    .chart_data
                    .clone()
                    .and_then(|v| ChartData::from_value(record.data_type, v).ok()),
                figure: record.figure.clone(),
            };

            let result = self
                .pipeline
                .run(
                    record.data_type,
                    &record.params,
                    resume,
                    record.batch_id.as_deref(),
                )
                .await;

            match result {
                PipelineResult::Success { question_id, .. } => {
                    self.dlq.mark_succeeded(record.id, &question_id).await?;
                    report.succeeded += 1;
                }
                PipelineResult::Failure {
                    stage,
                    error,
                    chart_data,
                    figure,
                    ..
                } => {
                    let updated = self
                        .dlq
                        .mark_failed(
                            record.id,
                            AttemptFailure {
                                error,
                                error_stage: stage,
                                chart_data: chart_data.map(ChartData::into_value),
                                figure,
                            },
                        )
                        .await?;
                    if updated.status == DlqStatus::FailedPermanently {
                        report.exhausted += 1;
                    } else {
                        report.requeued += 1;
                    }
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            requeued = report.requeued,
            exhausted = report.exhausted,
            "retry sweep finished"
        );
        Ok(report)
    }
}
