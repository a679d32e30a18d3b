use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, NotificationError, PipelineError, RecordStage};
use crate::models::StorageLocator;
use crate::models::notification::SnsEvent;
use crate::services::archive::ArchiveBuilder;
use crate::services::notification::{StorageChange, storage_changes};
use crate::services::resizer::ImageResizer;
use crate::services::storage::StorageService;
use crate::utils::keys::{archive_base_name, destination_key};

/// Final state of one storage-change record.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
    Done {
        destination: StorageLocator,
        variants: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        skipped_variants: Vec<String>,
        archive_size: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        stage: RecordStage,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// `None` when the notification message or entry could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StorageLocator>,
    #[serde(flatten)]
    pub status: RecordStatus,
}

impl RecordOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.status, RecordStatus::Done { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed { .. })
    }
}

/// Per-record results of one invocation, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.succeeded() - self.failed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

enum WorkItem {
    Record {
        message_id: Option<String>,
        change: StorageChange,
    },
    Invalid {
        message_id: Option<String>,
        error: NotificationError,
    },
}

/// Runs fetch -> resize -> archive -> upload for each storage-change record.
///
/// Records share nothing but the storage handle and the read-only config, so a
/// failure in one never affects another.
pub struct RecordProcessor {
    storage: Arc<dyn StorageService>,
    config: Arc<PipelineConfig>,
    resizer: ImageResizer,
    archiver: ArchiveBuilder,
}

impl RecordProcessor {
    /// Fails when `config` does not pass [`PipelineConfig::validate`].
    pub fn new(storage: Arc<dyn StorageService>, config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            resizer: ImageResizer::new(config.resize_policy),
            archiver: ArchiveBuilder::new(config.archive_leading_separator),
            storage,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every storage-change record of every notification in `event`.
    ///
    /// At most `max_concurrent_records` records are in flight, which bounds
    /// how many source images and variant sets are held in memory.
    pub async fn process_batch(&self, event: &SnsEvent) -> BatchReport {
        let mut work = Vec::new();
        for record in &event.records {
            let message_id = record.sns.message_id.clone();
            match storage_changes(&record.sns) {
                Ok(changes) => {
                    info!(
                        "📨 Notification {} carries {} storage change(s)",
                        message_id.as_deref().unwrap_or("<unknown>"),
                        changes.len()
                    );
                    for change in changes {
                        let message_id = message_id.clone();
                        work.push(match change {
                            Ok(change) => WorkItem::Record { message_id, change },
                            Err(e) => {
                                error!("Skipping storage-change entry: {}", e);
                                WorkItem::Invalid {
                                    message_id,
                                    error: e,
                                }
                            }
                        });
                    }
                }
                Err(e) => {
                    error!("Skipping notification: {}", e);
                    work.push(WorkItem::Invalid {
                        message_id,
                        error: e,
                    });
                }
            }
        }

        let outcomes = stream::iter(work)
            .map(|item| self.handle(item))
            .buffered(self.config.max_concurrent_records.max(1))
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport { outcomes };
        info!(
            "✅ Batch finished: {} done, {} skipped, {} failed",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
        report
    }

    async fn handle(&self, item: WorkItem) -> RecordOutcome {
        match item {
            WorkItem::Record { message_id, change } => {
                if let Some(reason) = change.skip_reason() {
                    info!("Ignoring {}: {}", change.locator, reason);
                    return RecordOutcome {
                        message_id,
                        source: Some(change.locator),
                        status: RecordStatus::Skipped { reason },
                    };
                }
                let mut outcome = self.process_record(change.locator).await;
                outcome.message_id = message_id;
                outcome
            }
            WorkItem::Invalid { message_id, error } => {
                let error = PipelineError::from(error);
                RecordOutcome {
                    message_id,
                    source: None,
                    status: RecordStatus::Failed {
                        stage: error.stage(),
                        error: error.to_string(),
                    },
                }
            }
        }
    }

    /// Run the full pipeline for one object. Never panics or returns early on
    /// failure; the failing stage is carried in the outcome.
    pub async fn process_record(&self, locator: StorageLocator) -> RecordOutcome {
        info!(
            "Processing record: bucket={}, key={}",
            locator.bucket, locator.key
        );

        let status = match self.run_pipeline(&locator).await {
            Ok(status) => status,
            Err(e) => {
                let stage = e.stage();
                error!(
                    "Record failed at {:?}: bucket={}, key={}, error={}",
                    stage, locator.bucket, locator.key, e
                );
                RecordStatus::Failed {
                    stage,
                    error: e.to_string(),
                }
            }
        };

        RecordOutcome {
            message_id: None,
            source: Some(locator),
            status,
        }
    }

    async fn run_pipeline(&self, locator: &StorageLocator) -> Result<RecordStatus, PipelineError> {
        if self.config.sizes.is_empty() && !self.config.upload_empty_archive {
            info!("Size catalog is empty, not archiving {}", locator);
            return Ok(RecordStatus::Skipped {
                reason: "size catalog is empty".to_string(),
            });
        }

        let fetched = match self.storage.fetch_object(locator).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(
                    "S3 retrieve object failed: bucket={}, key={}: {}",
                    locator.bucket, locator.key, e
                );
                return Err(PipelineError::Fetch(e));
            }
        };

        // Decoding and resizing are CPU bound
        let resizer = self.resizer;
        let config = Arc::clone(&self.config);
        let bytes = fetched.bytes;
        let batch = tokio::task::spawn_blocking(move || {
            resizer.resize_all(&bytes, &config.sizes, config.decode_failure_policy)
        })
        .await??;

        for (size, e) in &batch.failures {
            warn!(
                "Skipping '{}' variant of bucket={}, key={}: {}",
                size, locator.bucket, locator.key, e
            );
        }
        if !self.config.sizes.is_empty() && batch.variants.is_empty() {
            return Err(PipelineError::NoVariants {
                failed: batch.failures.len(),
            });
        }

        let base_name = archive_base_name(&locator.key);
        let archive = self.archiver.build(&base_name, &batch.variants)?;
        let archive_size = archive.len();

        let destination = StorageLocator::new(locator.bucket.clone(), destination_key(&locator.key));
        self.storage
            .upload_object(&destination, archive, &self.config.upload_tags)
            .await
            .map_err(PipelineError::Upload)?;

        info!(
            "📦 Uploaded {} variant(s) of {} to {} ({} bytes)",
            batch.variants.len(),
            locator,
            destination,
            archive_size
        );

        Ok(RecordStatus::Done {
            destination,
            variants: batch.variants.names(),
            skipped_variants: batch.failures.into_iter().map(|(size, _)| size).collect(),
            archive_size,
        })
    }
}
