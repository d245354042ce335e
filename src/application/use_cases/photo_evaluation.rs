use crate::domain::error::{AppError, Result};
use crate::application::use_cases::qa_review::{requested_project, resolve_recipient};
use crate::domain::photo_evaluation::{
    evaluation_feedback, evaluation_step, EvaluationResult, OverallStatus, StepResult, VlmHealth,
    EVALUATION_STEPS,
};
use crate::infrastructure::clients::{MessageGateway, PhotoSource, VisionModel};
use crate::infrastructure::config::WhatsAppConfig;
use crate::infrastructure::db::photo_evaluations::PhotoEvaluationRepository;
use crate::infrastructure::db::qa_reviews::QaReviewRepository;
use crate::infrastructure::response::extract_json_payload;
use crate::shared::time::now_millis;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationFeedbackReceipt {
    pub dr_number: String,
    pub recipient: String,
    pub message: String,
}

/// Where evaluation feedback goes: the WA Monitor drops and the project groups.
pub struct FeedbackRouting {
    pub drops: Arc<QaReviewRepository>,
    pub gateway: Arc<dyn MessageGateway>,
    pub whatsapp: WhatsAppConfig,
}

/// Scores a DR's installation photos with the vision model and stores the verdict.
pub struct PhotoEvaluationUseCase {
    photos: Arc<dyn PhotoSource>,
    vlm: Arc<dyn VisionModel>,
    repository: Arc<PhotoEvaluationRepository>,
    routing: FeedbackRouting,
}

impl PhotoEvaluationUseCase {
    pub fn new(
        photos: Arc<dyn PhotoSource>,
        vlm: Arc<dyn VisionModel>,
        repository: Arc<PhotoEvaluationRepository>,
        routing: FeedbackRouting,
    ) -> Self {
        Self {
            photos,
            vlm,
            repository,
            routing,
        }
    }

    pub async fn evaluate(&self, dr_number: &str) -> Result<EvaluationResult> {
        let dr_number = dr_number.trim().to_uppercase();
        if dr_number.is_empty() {
            return Err(AppError::ValidationError(
                "DR number is required".to_string(),
            ));
        }

        let urls = self.photos.photo_urls(&dr_number).await?;
        if urls.is_empty() {
            return Err(AppError::NotFound(format!("No photos found for {}", dr_number)));
        }

        let mut images = Vec::with_capacity(urls.len());
        for url in &urls {
            match self.photos.fetch_image(url).await {
                Ok(bytes) => images.push(STANDARD.encode(bytes)),
                Err(err) => warn!(dr_number = %dr_number, url = %url, error = %err, "Skipping photo"),
            }
        }
        if images.is_empty() {
            return Err(AppError::ExternalService(format!(
                "None of the {} photos for {} could be fetched",
                urls.len(),
                dr_number
            )));
        }

        info!(
            dr_number = %dr_number,
            photos = images.len(),
            model = self.vlm.model(),
            "Sending photos to VLM"
        );
        let content = self
            .vlm
            .complete(&evaluation_prompt(&dr_number), &images)
            .await?;
        debug!(dr_number = %dr_number, preview = %content.chars().take(200).collect::<String>(), "Raw VLM response");

        let result = parse_evaluation(&dr_number, &content, images.len(), now_millis())?;
        self.repository.save(&result).await?;

        info!(
            dr_number = %dr_number,
            status = ?result.overall_status,
            average_score = result.average_score,
            passed_steps = result.passed_steps,
            "Photo evaluation stored"
        );
        Ok(result)
    }

    pub async fn get(&self, dr_number: &str) -> Result<EvaluationResult> {
        self.repository.get(&dr_number.trim().to_uppercase()).await
    }

    /// Send the stored evaluation to WhatsApp; the evaluation is only flagged once the gateway accepted it.
    pub async fn send_evaluation_feedback(
        &self,
        dr_number: &str,
        project: Option<&str>,
    ) -> Result<EvaluationFeedbackReceipt> {
        let dr_number = dr_number.trim().to_uppercase();
        if dr_number.is_empty() {
            return Err(AppError::ValidationError(
                "DR number is required".to_string(),
            ));
        }

        let result = self.repository.get(&dr_number).await?;
        let drop = self.routing.drops.find_by_drop_number(&dr_number).await?;
        let recipient = resolve_recipient(
            &self.routing.whatsapp,
            requested_project(project).or(drop.as_ref().and_then(|d| d.project.as_deref())),
            drop.as_ref().and_then(|d| d.sender_phone.as_deref()),
            &dr_number,
        )?;
        let message = evaluation_feedback(&result);

        if let Err(err) = self.routing.gateway.send_text(&recipient, &message).await {
            warn!(
                dr_number = %dr_number,
                recipient = %recipient,
                error = %err,
                "Evaluation feedback dispatch failed"
            );
            return Err(err);
        }
        self.repository.mark_feedback_sent(&dr_number).await?;

        info!(
            dr_number = %dr_number,
            recipient = %recipient,
            status = ?result.overall_status,
            "Sent evaluation feedback"
        );
        Ok(EvaluationFeedbackReceipt {
            dr_number,
            recipient,
            message,
        })
    }

    pub async fn health(&self) -> VlmHealth {
        let model = self.vlm.model().to_string();
        match self.vlm.list_models().await {
            Ok(models) => VlmHealth {
                reachable: true,
                model_available: models.iter().any(|m| m == &model),
                model,
            },
            Err(err) => {
                warn!(error = %err, "VLM health check failed");
                VlmHealth {
                    reachable: false,
                    model_available: false,
                    model,
                }
            }
        }
    }
}

pub fn evaluation_prompt(dr_number: &str) -> String {
    let steps = EVALUATION_STEPS
        .iter()
        .map(|s| format!("{}. **{}**: {}", s.number, s.label, s.criteria))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert fiber optic installation quality inspector. Evaluate the installation photos for drop record {dr_number} against these {count} quality assurance steps:

{steps}

For each step give a pass/fail verdict, a score from 0 to 10 and a brief comment.

Respond in JSON only:
{{
  "overall_status": "PASS" or "FAIL",
  "overall_score": <average score>,
  "total_steps": {count},
  "passed_steps": <count>,
  "step_results": [
    {{"step_number": 1, "step_name": "house_photo", "passed": true, "score": 8, "comment": "..."}}
  ],
  "summary": "Overall assessment and recommendations"
}}"#,
        dr_number = dr_number,
        count = EVALUATION_STEPS.len(),
        steps = steps
    )
}

/// Turn the model's answer into an evaluation, filling labels from the step table.
pub fn parse_evaluation(
    dr_number: &str,
    content: &str,
    photos_evaluated: usize,
    evaluated_at: i64,
) -> Result<EvaluationResult> {
    let payload = extract_json_payload(content);
    let data: Value = serde_json::from_str(&payload)
        .map_err(|e| AppError::ParseError(format!("VLM response is not valid JSON: {}", e)))?;

    let raw_steps = data["step_results"].as_array().ok_or_else(|| {
        AppError::ParseError("Missing or invalid step_results in VLM response".to_string())
    })?;

    let step_results: Vec<StepResult> = raw_steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let number = step["step_number"]
                .as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .unwrap_or_else(|| u8::try_from(index + 1).unwrap_or(u8::MAX));
            let known = evaluation_step(number);
            let model_name = step["step_name"].as_str().filter(|s| !s.is_empty());

            StepResult {
                step_number: number,
                step_name: model_name
                    .map(str::to_string)
                    .or_else(|| known.map(|k| k.name.to_string()))
                    .unwrap_or_else(|| format!("step_{}", number)),
                step_label: known
                    .map(|k| k.label.to_string())
                    .or_else(|| model_name.map(str::to_string))
                    .unwrap_or_else(|| format!("Step {}", number)),
                passed: truthy(&step["passed"]),
                score: number_or_zero(&step["score"]),
                comment: step["comment"]
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or("No comment provided")
                    .to_string(),
            }
        })
        .collect();

    let overall_status = match data["overall_status"].as_str() {
        Some(status) if status.trim() == "PASS" => OverallStatus::Pass,
        _ => OverallStatus::Fail,
    };

    let average_score = if data["overall_score"].is_null() {
        mean_score(&step_results)
    } else {
        number_or_zero(&data["overall_score"])
    };

    let passed_steps = data["passed_steps"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or_else(|| step_results.iter().filter(|s| s.passed).count());

    let total_steps = data["total_steps"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or(EVALUATION_STEPS.len());

    Ok(EvaluationResult {
        dr_number: dr_number.to_string(),
        overall_status,
        average_score,
        total_steps,
        passed_steps,
        step_results,
        photos_evaluated,
        feedback_sent: false,
        evaluated_at,
        markdown_report: data["summary"].as_str().map(str::to_string),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "pass" | "yes"),
        _ => false,
    }
}

fn number_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn mean_score(steps: &[StepResult]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    let mean = steps.iter().map(|s| s.score).sum::<f64>() / steps.len() as f64;
    (mean * 10.0).round() / 10.0
}
