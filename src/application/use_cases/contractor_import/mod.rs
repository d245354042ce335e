pub mod export;
pub mod parser;
pub mod transformer;
pub mod validator;


use crate::domain::contractor::{
    Contractor, ContractorImportRow, ImportOutcome, ImportPreview, ImportProgress, ImportStage,
    RowFailure,
};
use crate::domain::error::Result;
use crate::infrastructure::clients::ServiceCatalog;
use crate::infrastructure::db::contractors::ContractorRepository;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub type ProgressFn<'a> = &'a (dyn Fn(ImportProgress) + Send + Sync);

fn no_progress(_: ImportProgress) {}

/// Contractor import: parse, normalise, validate, dedupe and insert.
pub struct ContractorImportUseCase {
    repository: Arc<ContractorRepository>,
    catalog: Arc<dyn ServiceCatalog>,
    max_rows: usize,
}

impl ContractorImportUseCase {
    pub fn new(
        repository: Arc<ContractorRepository>,
        catalog: Arc<dyn ServiceCatalog>,
        max_rows: usize,
    ) -> Self {
        Self {
            repository,
            catalog,
            max_rows,
        }
    }

    pub async fn preview(&self, file_name: &str, bytes: &[u8]) -> Result<ImportPreview> {
        self.preview_with_progress(file_name, bytes, &no_progress).await
    }

    pub async fn preview_with_progress(
        &self,
        file_name: &str,
        bytes: &[u8],
        progress: ProgressFn<'_>,
    ) -> Result<ImportPreview> {
        let preview = self.analyze(file_name, bytes, progress).await?;
        let total = preview.rows.len();
        progress(ImportProgress {
            stage: ImportStage::Completed,
            processed: total,
            total,
        });
        Ok(preview)
    }

    pub async fn import(&self, file_name: &str, bytes: &[u8]) -> Result<ImportOutcome> {
        self.import_with_progress(file_name, bytes, &no_progress).await
    }

    pub async fn import_with_progress(
        &self,
        file_name: &str,
        bytes: &[u8],
        progress: ProgressFn<'_>,
    ) -> Result<ImportOutcome> {
        let preview = self.analyze(file_name, bytes, progress).await?;
        let total = preview.rows.len();

        let (importable, rejected): (Vec<ContractorImportRow>, Vec<ContractorImportRow>) =
            preview.rows.into_iter().partition(|row| row.is_importable());

        progress(ImportProgress {
            stage: ImportStage::Importing,
            processed: 0,
            total: importable.len(),
        });

        let data: Vec<_> = importable.iter().map(|row| row.data.clone()).collect();
        let now = chrono::Utc::now().timestamp_millis();
        let imported_ids = if data.is_empty() {
            Vec::new()
        } else {
            self.repository
                .insert_batch(&data, &preview.session_id, now)
                .await?
        };

        progress(ImportProgress {
            stage: ImportStage::Importing,
            processed: imported_ids.len(),
            total: importable.len(),
        });

        let failed_rows: Vec<RowFailure> = rejected
            .into_iter()
            .map(|row| RowFailure {
                row_number: row.row_number,
                errors: if row.validation_errors.is_empty() {
                    row.warnings
                } else {
                    row.validation_errors
                },
            })
            .collect();

        info!(
            session_id = %preview.session_id,
            file_name,
            imported = imported_ids.len(),
            skipped = failed_rows.len(),
            "Contractor import finished"
        );

        progress(ImportProgress {
            stage: ImportStage::Completed,
            processed: total,
            total,
        });

        Ok(ImportOutcome {
            session_id: preview.session_id,
            imported: imported_ids.len(),
            skipped: total - imported_ids.len(),
            imported_ids,
            failed_rows,
            statistics: preview.statistics,
        })
    }

    pub async fn list_contractors(&self) -> Result<Vec<Contractor>> {
        self.repository.list().await
    }

    pub async fn export_csv(&self) -> Result<String> {
        let contractors = self.repository.list().await?;
        export::contractors_csv(&contractors)
    }

    pub fn template_csv(&self) -> Result<String> {
        export::template_csv()
    }

    async fn analyze(
        &self,
        file_name: &str,
        bytes: &[u8],
        progress: ProgressFn<'_>,
    ) -> Result<ImportPreview> {
        let session_id = Uuid::new_v4().to_string();

        progress(ImportProgress {
            stage: ImportStage::Parsing,
            processed: 0,
            total: 0,
        });
        let sheet = parser::parse_upload(file_name, bytes, self.max_rows)?;
        let total = sheet.rows.len();
        info!(
            session_id = %session_id,
            file_name,
            rows = total,
            empty_rows = sheet.empty_rows,
            unmapped = sheet.unmapped_headers.len(),
            "Parsed contractor import file"
        );

        progress(ImportProgress {
            stage: ImportStage::Transforming,
            processed: 0,
            total,
        });
        let mut rows: Vec<ContractorImportRow> =
            sheet.rows.iter().map(transformer::transform_row).collect();
        progress(ImportProgress {
            stage: ImportStage::Transforming,
            processed: total,
            total,
        });

        progress(ImportProgress {
            stage: ImportStage::Validating,
            processed: 0,
            total,
        });
        let services = match self.catalog.available_services().await {
            Ok(services) => services,
            Err(err) => {
                warn!(error = %err, "Service catalogue unavailable; skipping service cross-check");
                Vec::new()
            }
        };
        validator::validate_rows(&mut rows, &services);
        let existing = self.repository.existing_keys().await?;
        validator::flag_existing(&mut rows, &existing);
        progress(ImportProgress {
            stage: ImportStage::Validating,
            processed: total,
            total,
        });

        let statistics = validator::statistics(&rows, sheet.empty_rows);

        Ok(ImportPreview {
            session_id,
            headers: sheet.headers,
            unmapped_headers: sheet.unmapped_headers,
            rows,
            statistics,
        })
    }
}
