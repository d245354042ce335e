use crate::domain::dr_validation::{
    normalize_drop_number, normalize_sheet_date, reconcile, RecordedDrop, ReconciliationResult,
    SheetDrop,
};
use crate::domain::error::{AppError, Result};
use crate::domain::qa_review::{QaReviewDrop, QaStep, QaSteps};
use crate::infrastructure::db::qa_reviews::QaReviewRepository;
use crate::infrastructure::tabular::{read_table, Table};
use crate::shared::time::{now_millis, parse_iso_date, sast};
use chrono::{NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const MANUAL_ENTRY_USER: &str = "Manual Entry";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMissingRequest {
    pub project: String,
    pub drops: Vec<SheetDrop>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddMissingOutcome {
    pub inserted: usize,
    pub ids: Vec<String>,
}

/// Column positions of the reconciliation sheet.
#[derive(Debug, Default, PartialEq)]
struct SheetColumns {
    date: Option<usize>,
    drop_number: Option<usize>,
    time: Option<usize>,
}

impl SheetColumns {
    fn locate(headers: &[String]) -> Self {
        let mut columns = SheetColumns::default();
        for (index, header) in headers.iter().enumerate() {
            let lower = header.trim().to_lowercase();
            if lower == "date" {
                columns.date.get_or_insert(index);
            } else if lower.contains("dr") && lower.contains("nr") {
                columns.drop_number.get_or_insert(index);
            } else if lower == "time" {
                columns.time.get_or_insert(index);
            }
        }
        columns
    }
}

/// Reconciles a project's daily drop sheet with the drops recorded in QA review.
pub struct DrValidationUseCase {
    repository: Arc<QaReviewRepository>,
}

impl DrValidationUseCase {
    pub fn new(repository: Arc<QaReviewRepository>) -> Self {
        Self { repository }
    }

    pub async fn drops_for(&self, project: &str, date: NaiveDate) -> Result<Vec<RecordedDrop>> {
        let project = required_project(project)?;
        self.repository.drops_for(project, date).await
    }

    pub async fn reconcile(
        &self,
        project: &str,
        date: NaiveDate,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<ReconciliationResult> {
        let project = required_project(project)?;
        let table = read_table(file_name, bytes)?;
        let sheet = sheet_drops(&table, &date.format("%Y-%m-%d").to_string())?;
        let recorded = self.repository.drops_for(project, date).await?;

        let result = reconcile(sheet, recorded);
        info!(
            project,
            %date,
            file_total = result.file_total,
            db_total = result.db_total,
            missing_in_db = result.in_file_not_in_db.len(),
            missing_in_file = result.in_db_not_in_file.len(),
            "Reconciled DR sheet"
        );
        Ok(result)
    }

    /// Insert sheet drops that are not recorded yet; drop numbers already stored are skipped.
    pub async fn add_missing(&self, request: AddMissingRequest) -> Result<AddMissingOutcome> {
        let project = required_project(&request.project)?.to_string();
        if request.drops.is_empty() {
            return Err(AppError::ValidationError(
                "Drops array is required".to_string(),
            ));
        }

        let mut ids = Vec::new();
        for sheet_drop in &request.drops {
            let drop_number = normalize_drop_number(&sheet_drop.drop_number);
            if drop_number.is_empty() {
                continue;
            }
            if self.repository.exists_drop_number(&drop_number).await? {
                debug!(drop_number = %drop_number, "Drop already recorded; skipping");
                continue;
            }

            let date = parse_iso_date(&sheet_drop.date).ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Invalid date for {}: {}",
                    drop_number, sheet_drop.date
                ))
            })?;
            let time = sheet_drop.time.trim();
            let created_at = timestamp(date, time);

            let drop = QaReviewDrop {
                id: Uuid::new_v4().to_string(),
                drop_number,
                project: Some(project.clone()),
                review_date: date,
                user_name: MANUAL_ENTRY_USER.to_string(),
                steps: QaSteps::default(),
                completed_photos: 0,
                outstanding_photos: QaStep::COUNT as i64,
                comment: None,
                assigned_agent: None,
                sender_phone: None,
                resubmitted: false,
                feedback_count: 0,
                feedback_sent_at: None,
                submitted_date: date,
                created_at,
                updated_at: created_at,
            };

            let submitted_time = if time.is_empty() { "00:00" } else { time };
            match self.repository.insert(&drop, submitted_time).await {
                Ok(()) => ids.push(drop.id),
                Err(AppError::Conflict(_)) => continue,
                Err(err) => return Err(err),
            }
        }

        info!(project = %project, inserted = ids.len(), "Added missing drops");
        Ok(AddMissingOutcome {
            inserted: ids.len(),
            ids,
        })
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await?;
        info!(drop_id = %id, "Deleted drop record");
        Ok(())
    }
}

fn required_project(project: &str) -> Result<&str> {
    let project = project.trim();
    if project.is_empty() {
        return Err(AppError::ValidationError("Project is required".to_string()));
    }
    Ok(project)
}

/// Rows of the uploaded sheet with a usable drop number, normalised.
fn sheet_drops(table: &Table, fallback_date: &str) -> Result<Vec<SheetDrop>> {
    let columns = SheetColumns::locate(&table.headers);
    let Some(drop_column) = columns.drop_number else {
        return Err(AppError::ValidationError(
            "No drop number column found (expected a header containing \"DR\" and \"Nr\")"
                .to_string(),
        ));
    };

    Ok(table
        .rows
        .iter()
        .map(|row| SheetDrop {
            date: normalize_sheet_date(
                columns.date.map(|i| row.cell(i)).unwrap_or(""),
                fallback_date,
            ),
            drop_number: normalize_drop_number(row.cell(drop_column)),
            time: columns
                .time
                .map(|i| row.cell(i).trim().to_string())
                .unwrap_or_default(),
        })
        .filter(|drop| !drop.drop_number.is_empty())
        .collect())
}

/// Epoch millis of a sheet date and `HH:MM` time in SAST; unparseable times mean midnight.
fn timestamp(date: NaiveDate, time: &str) -> i64 {
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .unwrap_or(NaiveTime::MIN);
    sast()
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(now_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::connection::init_memory_db;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup() -> (DrValidationUseCase, Arc<QaReviewRepository>) {
        let repository = Arc::new(QaReviewRepository::new(init_memory_db().await.unwrap()));
        (DrValidationUseCase::new(repository.clone()), repository)
    }

    async fn record(repository: &QaReviewRepository, number: &str, project: &str, day: &str) {
        let day = date(day);
        let drop = QaReviewDrop {
            id: Uuid::new_v4().to_string(),
            drop_number: number.to_string(),
            project: Some(project.to_string()),
            review_date: day,
            user_name: "agent".to_string(),
            steps: QaSteps::default(),
            completed_photos: 0,
            outstanding_photos: 12,
            comment: None,
            assigned_agent: None,
            sender_phone: None,
            resubmitted: false,
            feedback_count: 0,
            feedback_sent_at: None,
            submitted_date: day,
            created_at: 1,
            updated_at: 1,
        };
        repository.insert(&drop, "09:30").await.unwrap();
    }

    #[test]
    fn columns_are_found_by_loose_header_names() {
        let headers: Vec<String> = ["Date", "DR Nr.", "Time", "Notes"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            SheetColumns::locate(&headers),
            SheetColumns {
                date: Some(0),
                drop_number: Some(1),
                time: Some(2)
            }
        );
    }

    #[tokio::test]
    async fn reconcile_splits_sheet_against_database() {
        let (use_case, repository) = setup().await;
        record(&repository, "DR1000001", "Lawley", "2025-11-25").await;
        record(&repository, "DR1000002", "Lawley", "2025-11-25").await;
        record(&repository, "DR1000009", "Mohadin", "2025-11-25").await;

        let csv = "Date,DR Nr,Time\n25/11/2025,dr1000001,08:15\n,1000003,09:00\n,,\n";
        let result = use_case
            .reconcile("lawley", date("2025-11-25"), "sheet.csv", csv.as_bytes())
            .await
            .unwrap();

        assert_eq!(result.file_total, 2);
        assert_eq!(result.db_total, 2);
        assert_eq!(result.in_file_and_db[0].drop_number, "DR1000001");
        assert_eq!(result.in_file_and_db[0].date, "2025-11-25");
        assert_eq!(result.in_file_not_in_db[0].drop_number, "DR1000003");
        assert_eq!(result.in_file_not_in_db[0].date, "2025-11-25");
        assert_eq!(result.in_db_not_in_file.len(), 1);
        assert_eq!(result.in_db_not_in_file[0].drop_number, "DR1000002");
    }

    #[tokio::test]
    async fn sheet_without_drop_column_is_rejected() {
        let (use_case, _) = setup().await;
        let result = use_case
            .reconcile("Lawley", date("2025-11-25"), "sheet.csv", b"Date,Pole\n25/11/2025,P1\n")
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn add_missing_inserts_manual_entries_once() {
        let (use_case, repository) = setup().await;
        record(&repository, "DR1000001", "Lawley", "2025-11-25").await;

        let request = AddMissingRequest {
            project: "Lawley".to_string(),
            drops: vec![
                SheetDrop {
                    date: "2025-11-25".to_string(),
                    drop_number: "DR1000001".to_string(),
                    time: "08:00".to_string(),
                },
                SheetDrop {
                    date: "2025-11-25".to_string(),
                    drop_number: "DR1000004".to_string(),
                    time: "10:45".to_string(),
                },
            ],
        };

        let outcome = use_case.add_missing(request.clone()).await.unwrap();
        assert_eq!(outcome.inserted, 1);

        let stored = repository.get(&outcome.ids[0]).await.unwrap();
        assert_eq!(stored.user_name, MANUAL_ENTRY_USER);
        assert_eq!(stored.outstanding_photos, 12);
        assert_eq!(stored.submitted_date, date("2025-11-25"));

        let drops = use_case.drops_for("Lawley", date("2025-11-25")).await.unwrap();
        let added = drops.iter().find(|d| d.drop_number == "DR1000004").unwrap();
        assert_eq!(added.time, "10:45");
        assert!(added.incomplete);

        let again = use_case.add_missing(request).await.unwrap();
        assert_eq!(again.inserted, 0);
    }

    #[tokio::test]
    async fn add_missing_requires_project_and_rows() {
        let (use_case, _) = setup().await;
        let no_project = use_case
            .add_missing(AddMissingRequest {
                project: " ".to_string(),
                drops: vec![],
            })
            .await;
        assert!(matches!(no_project, Err(AppError::ValidationError(_))));

        let no_rows = use_case
            .add_missing(AddMissingRequest {
                project: "Lawley".to_string(),
                drops: vec![],
            })
            .await;
        assert!(matches!(no_rows, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn delete_removes_drop() {
        let (use_case, repository) = setup().await;
        record(&repository, "DR1000001", "Lawley", "2025-11-25").await;
        let drops = use_case.drops_for("Lawley", date("2025-11-25")).await.unwrap();

        use_case.delete(&drops[0].id).await.unwrap();
        assert!(use_case
            .drops_for("Lawley", date("2025-11-25"))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn sheet_times_become_sast_timestamps() {
        let millis = timestamp(date("2025-11-25"), "10:45");
        let utc = chrono::Utc.with_ymd_and_hms(2025, 11, 25, 8, 45, 0).unwrap();
        assert_eq!(millis, utc.timestamp_millis());
        assert_eq!(timestamp(date("2025-11-25"), "junk"), timestamp(date("2025-11-25"), "00:00"));
    }
}
