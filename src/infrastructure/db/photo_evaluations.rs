use crate::domain::error::{AppError, Result};
use crate::domain::photo_evaluation::{EvaluationResult, OverallStatus, StepResult};
use sqlx::sqlite::SqlitePool;

pub struct PhotoEvaluationRepository {
    pool: SqlitePool,
}

impl PhotoEvaluationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store an evaluation, replacing any earlier one for the same DR.
    pub async fn save(&self, result: &EvaluationResult) -> Result<()> {
        let status = match result.overall_status {
            OverallStatus::Pass => "PASS",
            OverallStatus::Fail => "FAIL",
        };
        let step_results = serde_json::to_string(&result.step_results)?;

        sqlx::query(
            "INSERT INTO photo_evaluations (dr_number, overall_status, average_score, total_steps,
             passed_steps, step_results, photos_evaluated, feedback_sent, markdown_report, evaluated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(dr_number) DO UPDATE SET
               overall_status = excluded.overall_status,
               average_score = excluded.average_score,
               total_steps = excluded.total_steps,
               passed_steps = excluded.passed_steps,
               step_results = excluded.step_results,
               photos_evaluated = excluded.photos_evaluated,
               feedback_sent = excluded.feedback_sent,
               markdown_report = excluded.markdown_report,
               evaluated_at = excluded.evaluated_at",
        )
        .bind(&result.dr_number)
        .bind(status)
        .bind(result.average_score)
        .bind(result.total_steps as i64)
        .bind(result.passed_steps as i64)
        .bind(step_results)
        .bind(result.photos_evaluated as i64)
        .bind(result.feedback_sent)
        .bind(&result.markdown_report)
        .bind(result.evaluated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to save photo evaluation: {e}")))?;

        Ok(())
    }

    pub async fn mark_feedback_sent(&self, dr_number: &str) -> Result<()> {
        let result = sqlx::query("UPDATE photo_evaluations SET feedback_sent = 1 WHERE dr_number = ?")
            .bind(dr_number)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark feedback sent: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No evaluation found for {}",
                dr_number
            )));
        }
        Ok(())
    }

    pub async fn get(&self, dr_number: &str) -> Result<EvaluationResult> {
        let entity = sqlx::query_as::<_, PhotoEvaluationEntity>(
            "SELECT dr_number, overall_status, average_score, total_steps, passed_steps, step_results,
             photos_evaluated, feedback_sent, markdown_report, evaluated_at
             FROM photo_evaluations WHERE dr_number = ?",
        )
        .bind(dr_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch photo evaluation: {e}")))?;

        match entity {
            Some(entity) => entity.try_into(),
            None => Err(AppError::NotFound(format!(
                "No evaluation found for {}",
                dr_number
            ))),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PhotoEvaluationEntity {
    dr_number: String,
    overall_status: String,
    average_score: f64,
    total_steps: i64,
    passed_steps: i64,
    step_results: String,
    photos_evaluated: i64,
    feedback_sent: bool,
    markdown_report: Option<String>,
    evaluated_at: i64,
}

impl TryFrom<PhotoEvaluationEntity> for EvaluationResult {
    type Error = AppError;

    fn try_from(entity: PhotoEvaluationEntity) -> Result<Self> {
        let step_results: Vec<StepResult> = serde_json::from_str(&entity.step_results)?;
        let overall_status = if entity.overall_status.eq_ignore_ascii_case("PASS") {
            OverallStatus::Pass
        } else {
            OverallStatus::Fail
        };

        Ok(Self {
            dr_number: entity.dr_number,
            overall_status,
            average_score: entity.average_score,
            total_steps: entity.total_steps.max(0) as usize,
            passed_steps: entity.passed_steps.max(0) as usize,
            step_results,
            photos_evaluated: entity.photos_evaluated.max(0) as usize,
            feedback_sent: entity.feedback_sent,
            evaluated_at: entity.evaluated_at,
            markdown_report: entity.markdown_report,
        })
    }
}
