use crate::domain::dr_validation::RecordedDrop;
use crate::domain::error::{AppError, Result};
use crate::domain::qa_review::{
    DailyProjectCount, DropFilter, DropStatus, QaReviewDrop, QaStep, QaSteps, QaSummary,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

static STEP_COLUMNS: Lazy<String> = Lazy::new(|| {
    QaStep::ALL
        .iter()
        .map(|s| s.key())
        .collect::<Vec<_>>()
        .join(", ")
});

static SELECT_DROP: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT id, drop_number, project, review_date, user_name, {}, completed_photos,
         outstanding_photos, comment, assigned_agent, sender_phone, resubmitted, feedback_count,
         feedback_sent_at, submitted_date, created_at, updated_at
         FROM qa_photo_reviews",
        STEP_COLUMNS.as_str()
    )
});

pub struct QaReviewRepository {
    pool: SqlitePool,
}

impl QaReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, drop: &QaReviewDrop, submitted_time: &str) -> Result<()> {
        let placeholders = vec!["?"; QaStep::COUNT].join(", ");
        let query = format!(
            "INSERT INTO qa_photo_reviews (id, drop_number, project, review_date, user_name, {},
             completed_photos, outstanding_photos, comment, assigned_agent, sender_phone, resubmitted,
             feedback_count, feedback_sent_at, completed, incomplete, submitted_date, submitted_time,
             created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, {}, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            STEP_COLUMNS.as_str(),
            placeholders
        );

        let mut q = sqlx::query(&query)
            .bind(&drop.id)
            .bind(&drop.drop_number)
            .bind(&drop.project)
            .bind(drop.review_date)
            .bind(&drop.user_name);
        for flag in drop.steps.flags() {
            q = q.bind(flag);
        }
        let complete = drop.status() == DropStatus::Complete;
        q.bind(drop.completed_photos)
            .bind(drop.outstanding_photos)
            .bind(&drop.comment)
            .bind(&drop.assigned_agent)
            .bind(&drop.sender_phone)
            .bind(drop.resubmitted)
            .bind(drop.feedback_count)
            .bind(drop.feedback_sent_at)
            .bind(complete)
            .bind(!complete)
            .bind(drop.submitted_date)
            .bind(submitted_time)
            .bind(drop.created_at)
            .bind(drop.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &drop.drop_number, "insert"))?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<QaReviewDrop> {
        let query = format!("{} WHERE id = ?", SELECT_DROP.as_str());
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch drop: {e}")))?;

        match row {
            Some(row) => drop_from_row(&row),
            None => Err(AppError::NotFound(format!("Drop not found: {}", id))),
        }
    }

    pub async fn list(&self, filter: &DropFilter) -> Result<Vec<QaReviewDrop>> {
        let mut query = format!("{} WHERE 1 = 1", SELECT_DROP.as_str());
        match filter.status {
            Some(DropStatus::Complete) => query.push_str(" AND completed = 1"),
            Some(DropStatus::Incomplete) => query.push_str(" AND incomplete = 1"),
            None => {}
        }
        let project = filter
            .project
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if project.is_some() {
            query.push_str(" AND LOWER(project) = LOWER(?)");
        }
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())));
        if search.is_some() {
            query.push_str(
                " AND (LOWER(drop_number) LIKE ? ESCAPE '\\' OR LOWER(user_name) LIKE ? ESCAPE '\\'
                 OR LOWER(COALESCE(comment, '')) LIKE ? ESCAPE '\\')",
            );
        }
        query.push_str(" ORDER BY created_at DESC, drop_number DESC");

        let mut q = sqlx::query(&query);
        if let Some(project) = project {
            q = q.bind(project);
        }
        if let Some(search) = &search {
            q = q.bind(search).bind(search).bind(search);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list drops: {e}")))?;
        rows.iter().map(drop_from_row).collect()
    }

    /// Persist every mutable column of a drop, including the stored status flags.
    pub async fn update(&self, drop: &QaReviewDrop) -> Result<()> {
        let assignments = QaStep::ALL
            .iter()
            .map(|s| format!("{} = ?", s.key()))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE qa_photo_reviews SET drop_number = ?, project = ?, {}, completed_photos = ?,
             outstanding_photos = ?, comment = ?, assigned_agent = ?, completed = ?, incomplete = ?,
             updated_at = ?
             WHERE id = ?",
            assignments
        );

        let mut q = sqlx::query(&query).bind(&drop.drop_number).bind(&drop.project);
        for flag in drop.steps.flags() {
            q = q.bind(flag);
        }
        let complete = drop.status() == DropStatus::Complete;
        let result = q
            .bind(drop.completed_photos)
            .bind(drop.outstanding_photos)
            .bind(&drop.comment)
            .bind(&drop.assigned_agent)
            .bind(complete)
            .bind(!complete)
            .bind(drop.updated_at)
            .bind(&drop.id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &drop.drop_number, "update"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Drop not found: {}", drop.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM qa_photo_reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete drop: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Drop not found: {}", id)));
        }
        Ok(())
    }

    pub async fn record_feedback(&self, id: &str, sent_at: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE qa_photo_reviews
             SET feedback_sent_at = ?, feedback_count = feedback_count + 1, updated_at = ?
             WHERE id = ?",
        )
        .bind(sent_at)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to record feedback: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Drop not found: {}", id)));
        }
        Ok(())
    }

    pub async fn summary(&self) -> Result<QaSummary> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    SUM(completed) AS complete,
                    SUM(incomplete) AS incomplete,
                    AVG(completed_photos) AS average_completed,
                    SUM(CASE WHEN feedback_sent_at IS NOT NULL THEN 1 ELSE 0 END) AS with_feedback
             FROM qa_photo_reviews",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to summarise drops: {e}")))?;

        let average: Option<f64> = row.try_get("average_completed")?;
        Ok(QaSummary {
            total: row.try_get("total")?,
            complete: row.try_get::<Option<i64>, _>("complete")?.unwrap_or(0),
            incomplete: row.try_get::<Option<i64>, _>("incomplete")?.unwrap_or(0),
            average_completed_photos: (average.unwrap_or(0.0) * 10.0).round() / 10.0,
            total_feedback: row.try_get::<Option<i64>, _>("with_feedback")?.unwrap_or(0),
        })
    }

    pub async fn daily_counts(&self, date: NaiveDate) -> Result<Vec<DailyProjectCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT COALESCE(NULLIF(TRIM(project), ''), 'Unknown') AS project_name,
                    COUNT(DISTINCT drop_number) AS drops
             FROM qa_photo_reviews
             WHERE submitted_date = ?
             GROUP BY project_name
             ORDER BY drops DESC, project_name",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to count daily drops: {e}")))?;

        let date = date.format("%Y-%m-%d").to_string();
        Ok(rows
            .into_iter()
            .map(|(project, count)| DailyProjectCount {
                date: date.clone(),
                project,
                count,
            })
            .collect())
    }

    pub async fn drops_for(&self, project: &str, date: NaiveDate) -> Result<Vec<RecordedDrop>> {
        let rows = sqlx::query(
            "SELECT id, drop_number, submitted_date, submitted_time, project, completed, incomplete
             FROM qa_photo_reviews
             WHERE LOWER(project) = LOWER(?) AND submitted_date = ?
             ORDER BY submitted_time, drop_number",
        )
        .bind(project.trim())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list drops for project: {e}")))?;

        rows.iter()
            .map(|row| {
                let date: NaiveDate = row.try_get("submitted_date")?;
                Ok(RecordedDrop {
                    id: row.try_get("id")?,
                    drop_number: row.try_get("drop_number")?,
                    date: date.format("%Y-%m-%d").to_string(),
                    time: row.try_get("submitted_time")?,
                    project: row.try_get("project")?,
                    completed: row.try_get("completed")?,
                    incomplete: row.try_get("incomplete")?,
                })
            })
            .collect()
    }

    /// Most recent drop recorded under a drop number, if any.
    pub async fn find_by_drop_number(&self, drop_number: &str) -> Result<Option<QaReviewDrop>> {
        let query = format!(
            "{} WHERE drop_number = ? ORDER BY created_at DESC LIMIT 1",
            SELECT_DROP.as_str()
        );
        let row = sqlx::query(&query)
            .bind(drop_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to look up drop: {e}")))?;
        row.as_ref().map(drop_from_row).transpose()
    }

    pub async fn exists_drop_number(&self, drop_number: &str) -> Result<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM qa_photo_reviews WHERE drop_number = ?")
                .bind(drop_number)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to look up drop: {e}")))?;
        Ok(count > 0)
    }
}

/// Escape LIKE wildcards so a search matches them literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_write_error(err: sqlx::Error, drop_number: &str, action: &str) -> AppError {
    let unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if unique {
        AppError::Conflict(format!("Drop {} already exists", drop_number))
    } else {
        AppError::DatabaseError(format!("Failed to {} drop: {err}", action))
    }
}

fn drop_from_row(row: &SqliteRow) -> Result<QaReviewDrop> {
    let mut flags = [false; QaStep::COUNT];
    for (flag, step) in flags.iter_mut().zip(QaStep::ALL) {
        *flag = row.try_get(step.key())?;
    }

    Ok(QaReviewDrop {
        id: row.try_get("id")?,
        drop_number: row.try_get("drop_number")?,
        project: row.try_get("project")?,
        review_date: row.try_get("review_date")?,
        user_name: row.try_get("user_name")?,
        steps: QaSteps::from_flags(flags),
        completed_photos: row.try_get("completed_photos")?,
        outstanding_photos: row.try_get("outstanding_photos")?,
        comment: row.try_get("comment")?,
        assigned_agent: row.try_get("assigned_agent")?,
        sender_phone: row.try_get("sender_phone")?,
        resubmitted: row.try_get("resubmitted")?,
        feedback_count: row.try_get("feedback_count")?,
        feedback_sent_at: row.try_get("feedback_sent_at")?,
        submitted_date: row.try_get("submitted_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
