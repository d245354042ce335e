use crate::domain::error::{AppError, Result};
use crate::domain::qa_review::{
    auto_feedback, DailyProjectCount, DropFilter, DropUpdate, NewDrop, QaReviewDrop,
    QaReviewDropView, QaSteps, QaSummary,
};
use crate::infrastructure::clients::MessageGateway;
use crate::infrastructure::config::WhatsAppConfig;
use crate::infrastructure::db::qa_reviews::QaReviewRepository;
use crate::shared::time::{now_sast, today_sast};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const UNKNOWN_USER: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub message: String,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReceipt {
    pub drop_id: String,
    pub drop_number: String,
    pub recipient: String,
    pub feedback_count: i64,
    pub sent_at: i64,
}

/// WA Monitor drop review: checklist CRUD, summaries and WhatsApp feedback.
pub struct QaReviewUseCase {
    repository: Arc<QaReviewRepository>,
    gateway: Arc<dyn MessageGateway>,
    whatsapp: WhatsAppConfig,
}

impl QaReviewUseCase {
    pub fn new(
        repository: Arc<QaReviewRepository>,
        gateway: Arc<dyn MessageGateway>,
        whatsapp: WhatsAppConfig,
    ) -> Self {
        Self {
            repository,
            gateway,
            whatsapp,
        }
    }

    pub async fn create_drop(&self, new_drop: NewDrop) -> Result<QaReviewDropView> {
        self.create_drop_at(new_drop, now_sast()).await
    }

    pub async fn create_drop_at(
        &self,
        new_drop: NewDrop,
        now: DateTime<FixedOffset>,
    ) -> Result<QaReviewDropView> {
        let drop_number = drop_number(&new_drop.drop_number)?;
        let millis = now.timestamp_millis();
        let today = now.date_naive();

        let mut steps = QaSteps::default();
        steps.apply(&new_drop.steps);

        let mut drop = QaReviewDrop {
            id: Uuid::new_v4().to_string(),
            drop_number,
            project: non_empty(new_drop.project),
            review_date: new_drop.review_date.unwrap_or(today),
            user_name: non_empty(new_drop.user_name).unwrap_or_else(|| UNKNOWN_USER.to_string()),
            steps,
            completed_photos: 0,
            outstanding_photos: 0,
            comment: non_empty(new_drop.comment),
            assigned_agent: None,
            sender_phone: non_empty(new_drop.sender_phone),
            resubmitted: false,
            feedback_count: 0,
            feedback_sent_at: None,
            submitted_date: today,
            created_at: millis,
            updated_at: millis,
        };
        drop.refresh_derived();

        let submitted_time = now.format("%H:%M").to_string();
        self.repository.insert(&drop, &submitted_time).await?;

        info!(
            drop_id = %drop.id,
            drop_number = %drop.drop_number,
            project = drop.project.as_deref().unwrap_or("-"),
            completed = drop.completed_photos,
            "Created QA review drop"
        );
        Ok(drop.into())
    }

    pub async fn list_drops(&self, filter: &DropFilter) -> Result<Vec<QaReviewDropView>> {
        let drops = self.repository.list(filter).await?;
        Ok(drops.into_iter().map(QaReviewDropView::from).collect())
    }

    pub async fn get_drop(&self, id: &str) -> Result<QaReviewDropView> {
        Ok(self.repository.get(id).await?.into())
    }

    pub async fn update_drop(&self, id: &str, update: DropUpdate) -> Result<QaReviewDropView> {
        let mut drop = self.repository.get(id).await?;

        drop.steps.apply(&update.steps);
        if let Some(number) = update.drop_number {
            drop.drop_number = drop_number(&number)?;
        }
        if update.comment.is_some() {
            drop.comment = non_empty(update.comment);
        }
        if update.assigned_agent.is_some() {
            drop.assigned_agent = non_empty(update.assigned_agent);
        }
        if update.project.is_some() {
            drop.project = non_empty(update.project);
        }
        drop.refresh_derived();
        drop.updated_at = now_sast().timestamp_millis();

        self.repository.update(&drop).await?;
        info!(
            drop_id = %drop.id,
            drop_number = %drop.drop_number,
            completed = drop.completed_photos,
            "Updated QA review drop"
        );
        Ok(drop.into())
    }

    pub async fn delete_drop(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await?;
        info!(drop_id = %id, "Deleted QA review drop");
        Ok(())
    }

    pub async fn summary(&self) -> Result<QaSummary> {
        self.repository.summary().await
    }

    pub async fn daily_drops(&self, date: Option<NaiveDate>) -> Result<Vec<DailyProjectCount>> {
        self.repository
            .daily_counts(date.unwrap_or_else(today_sast))
            .await
    }

    pub async fn auto_feedback(&self, id: &str) -> Result<String> {
        let drop = self.repository.get(id).await?;
        Ok(auto_feedback(&drop.drop_number, &drop.steps))
    }

    /// Send feedback for a drop; the drop is only marked once the gateway accepted the message.
    pub async fn send_feedback(&self, id: &str, request: FeedbackRequest) -> Result<FeedbackReceipt> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::ValidationError(
                "Feedback message is required".to_string(),
            ));
        }

        let drop = self.repository.get(id).await?;
        let recipient = self.recipient_for(&drop, request.project.as_deref())?;

        if let Err(err) = self.gateway.send_text(&recipient, message).await {
            warn!(
                drop_number = %drop.drop_number,
                recipient = %recipient,
                error = %err,
                "WhatsApp feedback dispatch failed"
            );
            return Err(err);
        }

        let sent_at = now_sast().timestamp_millis();
        self.repository.record_feedback(id, sent_at).await?;

        info!(
            drop_number = %drop.drop_number,
            recipient = %recipient,
            "Sent WhatsApp feedback"
        );
        Ok(FeedbackReceipt {
            drop_id: drop.id,
            drop_number: drop.drop_number,
            recipient,
            feedback_count: drop.feedback_count + 1,
            sent_at,
        })
    }

    fn recipient_for(&self, drop: &QaReviewDrop, project: Option<&str>) -> Result<String> {
        resolve_recipient(
            &self.whatsapp,
            requested_project(project).or(drop.project.as_deref()),
            drop.sender_phone.as_deref(),
            &drop.drop_number,
        )
    }
}

/// Project group when one is configured for the project, otherwise the sender's phone.
pub fn resolve_recipient(
    whatsapp: &WhatsAppConfig,
    project: Option<&str>,
    sender_phone: Option<&str>,
    drop_number: &str,
) -> Result<String> {
    let project = requested_project(project);

    if let Some(group) = project.and_then(|p| whatsapp.group_for(p)) {
        return Ok(group.to_string());
    }
    if let Some(phone) = sender_phone.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(phone.to_string());
    }
    Err(AppError::ValidationError(format!(
        "No WhatsApp group configured for project {} and drop {} has no sender phone",
        project.unwrap_or("(none)"),
        drop_number
    )))
}

/// A request's project override, ignoring blanks.
pub fn requested_project(project: Option<&str>) -> Option<&str> {
    project.map(str::trim).filter(|p| !p.is_empty())
}

fn drop_number(value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Drop number cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_uppercase())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::qa_review::{DropStatus, QaStep};
    use crate::infrastructure::db::connection::init_memory_db;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        async fn send_text(&self, recipient: &str, message: &str) -> Result<()> {
            if self.fail {
                return Err(AppError::ExternalService("gateway offline".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), message.to_string()));
            Ok(())
        }
    }

    fn whatsapp() -> WhatsAppConfig {
        WhatsAppConfig {
            base_url: "http://localhost:8081".to_string(),
            api_key: None,
            project_groups: HashMap::from([("Lawley".to_string(), "120363@g.us".to_string())]),
        }
    }

    async fn use_case(gateway: Arc<RecordingGateway>) -> QaReviewUseCase {
        let repository = Arc::new(QaReviewRepository::new(init_memory_db().await.unwrap()));
        QaReviewUseCase::new(repository, gateway, whatsapp())
    }

    fn new_drop(number: &str, project: Option<&str>, phone: Option<&str>) -> NewDrop {
        NewDrop {
            drop_number: number.to_string(),
            project: project.map(str::to_string),
            user_name: None,
            sender_phone: phone.map(str::to_string),
            review_date: None,
            steps: BTreeMap::from([(QaStep::HousePhoto, true), (QaStep::OntBarcode, true)]),
            comment: None,
        }
    }

    #[tokio::test]
    async fn create_uses_sast_calendar_day() {
        let use_case = use_case(Arc::new(RecordingGateway::default())).await;
        let late_utc = chrono::Utc
            .with_ymd_and_hms(2025, 11, 24, 23, 15, 0)
            .unwrap()
            .with_timezone(&crate::shared::time::sast());

        let view = use_case
            .create_drop_at(new_drop(" dr1734472 ", Some("Lawley"), None), late_utc)
            .await
            .unwrap();
        assert_eq!(view.drop.drop_number, "DR1734472");
        assert_eq!(
            view.drop.submitted_date,
            NaiveDate::from_ymd_opt(2025, 11, 25).unwrap()
        );
        assert_eq!(view.drop.completed_photos, 2);
        assert_eq!(view.drop.outstanding_photos, 10);
        assert_eq!(view.drop.user_name, "Unknown");
        assert_eq!(view.status, DropStatus::Incomplete);

        let duplicate = use_case
            .create_drop_at(new_drop("DR1734472", None, None), late_utc)
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_recomputes_status() {
        let use_case = use_case(Arc::new(RecordingGateway::default())).await;
        let created = use_case
            .create_drop(new_drop("DR1000001", Some("Mohadin"), None))
            .await
            .unwrap();

        let all_steps: BTreeMap<QaStep, bool> = QaStep::ALL.into_iter().map(|s| (s, true)).collect();
        let updated = use_case
            .update_drop(
                &created.drop.id,
                DropUpdate {
                    steps: all_steps,
                    comment: Some("Looks good".to_string()),
                    ..DropUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, DropStatus::Complete);
        assert_eq!(updated.drop.completed_photos, 12);
        assert_eq!(updated.drop.outstanding_photos, 0);
        assert_eq!(updated.drop.project.as_deref(), Some("Mohadin"));

        let empty_number = use_case
            .update_drop(
                &created.drop.id,
                DropUpdate {
                    drop_number: Some("   ".to_string()),
                    ..DropUpdate::default()
                },
            )
            .await;
        assert!(matches!(empty_number, Err(AppError::ValidationError(_))));

        let complete_only = use_case
            .list_drops(&DropFilter {
                status: Some(DropStatus::Complete),
                ..DropFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(complete_only.len(), 1);
    }

    #[tokio::test]
    async fn auto_feedback_lists_missing_steps() {
        let use_case = use_case(Arc::new(RecordingGateway::default())).await;
        let created = use_case
            .create_drop(new_drop("DR1000002", None, None))
            .await
            .unwrap();
        let text = use_case.auto_feedback(&created.drop.id).await.unwrap();
        assert!(text.starts_with("DR1000002: Missing "));
        assert!(!text.contains(QaStep::HousePhoto.label()));
        assert!(text.contains(QaStep::CustomerSignature.label()));
    }

    #[tokio::test]
    async fn feedback_goes_to_project_group_first() {
        let gateway = Arc::new(RecordingGateway::default());
        let use_case = use_case(gateway.clone()).await;
        let created = use_case
            .create_drop(new_drop("DR1000003", Some("lawley"), Some("+27820000000")))
            .await
            .unwrap();

        let receipt = use_case
            .send_feedback(
                &created.drop.id,
                FeedbackRequest {
                    message: "Please resend the ONT barcode".to_string(),
                    project: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.recipient, "120363@g.us");
        assert_eq!(receipt.feedback_count, 1);

        let stored = use_case.get_drop(&created.drop.id).await.unwrap();
        assert_eq!(stored.drop.feedback_count, 1);
        assert!(stored.drop.feedback_sent_at.is_some());
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
        assert_eq!(use_case.summary().await.unwrap().total_feedback, 1);
    }

    #[tokio::test]
    async fn feedback_falls_back_to_sender_phone_or_fails() {
        let gateway = Arc::new(RecordingGateway::default());
        let use_case = use_case(gateway.clone()).await;

        let with_phone = use_case
            .create_drop(new_drop("DR1000004", Some("Mohadin"), Some("+27821111111")))
            .await
            .unwrap();
        let receipt = use_case
            .send_feedback(
                &with_phone.drop.id,
                FeedbackRequest {
                    message: "ok".to_string(),
                    project: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(receipt.recipient, "+27821111111");

        let nowhere = use_case
            .create_drop(new_drop("DR1000005", Some("Mohadin"), None))
            .await
            .unwrap();
        let result = use_case
            .send_feedback(
                &nowhere.drop.id,
                FeedbackRequest {
                    message: "ok".to_string(),
                    project: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        let explicit = use_case
            .send_feedback(
                &nowhere.drop.id,
                FeedbackRequest {
                    message: "ok".to_string(),
                    project: Some("Lawley".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(explicit.recipient, "120363@g.us");

        let empty = use_case
            .send_feedback(
                &nowhere.drop.id,
                FeedbackRequest {
                    message: "  ".to_string(),
                    project: None,
                },
            )
            .await;
        assert!(matches!(empty, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_drop_untouched() {
        let gateway = Arc::new(RecordingGateway {
            fail: true,
            ..RecordingGateway::default()
        });
        let use_case = use_case(gateway).await;
        let created = use_case
            .create_drop(new_drop("DR1000006", Some("Lawley"), None))
            .await
            .unwrap();

        let result = use_case
            .send_feedback(
                &created.drop.id,
                FeedbackRequest {
                    message: "Missing photos".to_string(),
                    project: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));

        let stored = use_case.get_drop(&created.drop.id).await.unwrap();
        assert_eq!(stored.drop.feedback_count, 0);
        assert!(stored.drop.feedback_sent_at.is_none());
    }

    #[tokio::test]
    async fn daily_counts_group_by_project() {
        let use_case = use_case(Arc::new(RecordingGateway::default())).await;
        let now = crate::shared::time::now_sast();
        use_case
            .create_drop_at(new_drop("DR2000001", Some("Lawley"), None), now)
            .await
            .unwrap();
        use_case
            .create_drop_at(new_drop("DR2000002", Some("Lawley"), None), now)
            .await
            .unwrap();
        use_case
            .create_drop_at(new_drop("DR2000003", None, None), now)
            .await
            .unwrap();

        let daily = use_case.daily_drops(Some(now.date_naive())).await.unwrap();
        let lawley = daily.iter().find(|d| d.project == "Lawley").unwrap();
        assert_eq!(lawley.count, 2);
        let unknown = daily.iter().find(|d| d.project == "Unknown").unwrap();
        assert_eq!(unknown.count, 1);
    }
}
