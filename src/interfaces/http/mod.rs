use crate::application::use_cases::dr_validation::AddMissingRequest;
use crate::application::use_cases::qa_review::FeedbackRequest;
use crate::application::use_cases::staff_documents::{
    DocumentUpdate, UploadDocumentRequest, VerifyRequest,
};
use crate::domain::error::AppError;
use crate::domain::qa_review::{DropFilter, DropStatus, DropUpdate, NewDrop};
use crate::domain::staff_document::{DocumentFilter, DocumentType, VerificationStatus};
use crate::infrastructure::db::connection::health_check;
use crate::interfaces::state::AppState;
use crate::shared::encoding::decode_base64_content;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{
    delete, dev::Server, get, patch, post, put, web, App, HttpResponse, HttpServer, ResponseError,
    Scope,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests;

const MAX_LOG_ENTRIES: usize = 100;

type HandlerResult = Result<HttpResponse, AppError>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app: Arc<AppState>,
}

impl HttpState {
    fn log(&self, level: &str, message: &str) {
        add_log(&self.app.logs, level, "HttpApi", message);
    }

    /// Record a failed request in the log ring and hand the error back.
    fn failed(&self, context: &str, err: AppError) -> AppError {
        self.log("ERROR", &format!("{}: {}", context, err));
        err
    }
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse {
        success: true,
        data,
        message: None,
    })
}

fn ok_with_message<T: Serialize>(status: StatusCode, data: T, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse {
        success: true,
        data,
        message: Some(message),
    })
}

fn csv_attachment(file_name: &str, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(body)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::DatabaseError(_) | AppError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": { "code": self.code(), "message": self.message() }
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    #[serde(alias = "file_name")]
    pub file_name: String,
    #[serde(alias = "content_base64")]
    pub content_base64: String,
}

impl FileUpload {
    fn decode(&self) -> Result<Vec<u8>, AppError> {
        if self.file_name.trim().is_empty() {
            return Err(AppError::ValidationError("fileName is required".to_string()));
        }
        decode_base64_content(&self.content_base64)
    }
}

#[get("/health")]
async fn health(data: web::Data<HttpState>) -> HandlerResult {
    health_check(&data.app.pool)
        .await
        .map_err(|e| data.failed("Health check failed", e))?;
    Ok(ok(json!({ "status": "ok", "database": "ok" })))
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> HandlerResult {
    let logs = match data.app.logs.lock() {
        Ok(logs) => logs.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    Ok(ok(logs))
}

#[get("/contractors")]
async fn list_contractors(data: web::Data<HttpState>) -> HandlerResult {
    let contractors = data.app.contractor_import_use_case.list_contractors().await?;
    Ok(ok(contractors))
}

#[get("/contractors/export")]
async fn export_contractors(data: web::Data<HttpState>) -> HandlerResult {
    let csv = data
        .app
        .contractor_import_use_case
        .export_csv()
        .await
        .map_err(|e| data.failed("Contractor export failed", e))?;
    Ok(csv_attachment("contractors.csv", csv))
}

#[get("/contractors/import/template")]
async fn import_template(data: web::Data<HttpState>) -> HandlerResult {
    let csv = data.app.contractor_import_use_case.template_csv()?;
    Ok(csv_attachment("contractor_import_template.csv", csv))
}

#[post("/contractors/import/preview")]
async fn preview_import(data: web::Data<HttpState>, req: web::Json<FileUpload>) -> HandlerResult {
    let bytes = req.decode()?;
    data.log("INFO", &format!("Previewing contractor import: {}", req.file_name));
    let preview = data
        .app
        .contractor_import_use_case
        .preview(&req.file_name, &bytes)
        .await
        .map_err(|e| data.failed("Import preview failed", e))?;
    Ok(ok(preview))
}

#[post("/contractors/import")]
async fn run_import(data: web::Data<HttpState>, req: web::Json<FileUpload>) -> HandlerResult {
    let bytes = req.decode()?;
    data.log("INFO", &format!("Importing contractors: {}", req.file_name));
    let outcome = data
        .app
        .contractor_import_use_case
        .import(&req.file_name, &bytes)
        .await
        .map_err(|e| data.failed("Contractor import failed", e))?;
    let message = format!(
        "{} contractor(s) imported, {} skipped",
        outcome.imported, outcome.skipped
    );
    Ok(ok_with_message(StatusCode::OK, outcome, message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsQuery {
    pub document_type: Option<String>,
    pub verification_status: Option<String>,
}

impl DocumentsQuery {
    fn filter(&self) -> Result<DocumentFilter, AppError> {
        let document_type = match self.document_type.as_deref().filter(|s| !s.is_empty()) {
            Some(value) => Some(value.parse::<DocumentType>().map_err(AppError::ValidationError)?),
            None => None,
        };
        let verification_status = match self.verification_status.as_deref().filter(|s| !s.is_empty()) {
            Some(value) => Some(
                value
                    .parse::<VerificationStatus>()
                    .map_err(AppError::ValidationError)?,
            ),
            None => None,
        };
        Ok(DocumentFilter {
            document_type,
            verification_status,
        })
    }
}

#[get("/staff/{staff_id}/documents")]
async fn staff_documents(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<DocumentsQuery>,
) -> HandlerResult {
    let filter = query.filter()?;
    let documents = data
        .app
        .staff_documents_use_case
        .list_for_staff(&path, &filter)
        .await?;
    Ok(ok(documents))
}

#[get("/staff/{staff_id}/compliance")]
async fn staff_compliance(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    let status = data.app.staff_documents_use_case.compliance(&path).await?;
    Ok(ok(status))
}

#[get("/staff-documents/compliance")]
async fn compliance_overview(data: web::Data<HttpState>) -> HandlerResult {
    let overview = data.app.staff_documents_use_case.compliance_overview().await?;
    Ok(ok(overview))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringQuery {
    pub days: Option<i64>,
    pub staff_id: Option<String>,
}

#[get("/staff-documents/expiring")]
async fn expiring_documents(
    data: web::Data<HttpState>,
    query: web::Query<ExpiringQuery>,
) -> HandlerResult {
    let documents = data
        .app
        .staff_documents_use_case
        .expiring(query.days, query.staff_id.as_deref().filter(|s| !s.is_empty()))
        .await?;
    Ok(ok(documents))
}

#[post("/staff-documents-upload")]
async fn upload_document(
    data: web::Data<HttpState>,
    req: web::Json<UploadDocumentRequest>,
) -> HandlerResult {
    data.log(
        "INFO",
        &format!(
            "Uploading {} for staff {} ({})",
            req.document_type, req.staff_id, req.file_name
        ),
    );
    let document = data
        .app
        .staff_documents_use_case
        .upload(req.into_inner())
        .await
        .map_err(|e| data.failed("Document upload failed", e))?;
    Ok(ok_with_message(
        StatusCode::CREATED,
        document,
        "Document uploaded successfully".to_string(),
    ))
}

#[get("/staff-documents/{id}")]
async fn get_document(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    Ok(ok(data.app.staff_documents_use_case.get(&path).await?))
}

#[put("/staff-documents/{id}")]
async fn update_document(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<DocumentUpdate>,
) -> HandlerResult {
    let document = data
        .app
        .staff_documents_use_case
        .update(&path, req.into_inner())
        .await?;
    Ok(ok(document))
}

#[delete("/staff-documents/{id}")]
async fn delete_document(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    data.app.staff_documents_use_case.delete(&path).await?;
    Ok(ok_with_message(
        StatusCode::OK,
        json!({ "id": path.as_str() }),
        "Document deleted".to_string(),
    ))
}

#[get("/staff-documents/{id}/download")]
async fn download_document(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    let download = data.app.staff_documents_use_case.download(&path).await?;
    Ok(HttpResponse::Ok()
        .content_type(download.mime_type)
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", download.file_name),
        ))
        .body(download.bytes))
}

#[post("/staff-documents/{id}/verify")]
async fn verify_document(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<VerifyRequest>,
) -> HandlerResult {
    let document = data
        .app
        .staff_documents_use_case
        .verify(&path, req.into_inner())
        .await?;
    let message = format!("Document {}", document.verification_status);
    Ok(ok_with_message(StatusCode::OK, document, message))
}

#[derive(Debug, Deserialize)]
pub struct DropsQuery {
    pub status: Option<String>,
    pub project: Option<String>,
    pub search: Option<String>,
}

#[get("/wa-monitor/drops")]
async fn list_drops(data: web::Data<HttpState>, query: web::Query<DropsQuery>) -> HandlerResult {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(value) => Some(value.parse::<DropStatus>().map_err(AppError::ValidationError)?),
        None => None,
    };
    let filter = DropFilter {
        status,
        project: query.project.clone().filter(|p| !p.trim().is_empty()),
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
    };
    Ok(ok(data.app.qa_review_use_case.list_drops(&filter).await?))
}

#[post("/wa-monitor/drops")]
async fn create_drop(data: web::Data<HttpState>, req: web::Json<NewDrop>) -> HandlerResult {
    let drop = data
        .app
        .qa_review_use_case
        .create_drop(req.into_inner())
        .await
        .map_err(|e| data.failed("Create drop failed", e))?;
    let message = format!("Drop {} created", drop.drop.drop_number);
    Ok(ok_with_message(StatusCode::CREATED, drop, message))
}

#[get("/wa-monitor/drops/{id}")]
async fn get_drop(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    Ok(ok(data.app.qa_review_use_case.get_drop(&path).await?))
}

#[patch("/wa-monitor/drops/{id}")]
async fn update_drop(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<DropUpdate>,
) -> HandlerResult {
    let drop = data
        .app
        .qa_review_use_case
        .update_drop(&path, req.into_inner())
        .await?;
    Ok(ok(drop))
}

#[delete("/wa-monitor/drops/{id}")]
async fn delete_drop(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    data.app.qa_review_use_case.delete_drop(&path).await?;
    Ok(ok_with_message(
        StatusCode::OK,
        json!({ "id": path.as_str() }),
        "Drop deleted".to_string(),
    ))
}

#[get("/wa-monitor/drops/{id}/auto-feedback")]
async fn drop_auto_feedback(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    let message = data.app.qa_review_use_case.auto_feedback(&path).await?;
    Ok(ok(json!({ "message": message })))
}

#[post("/wa-monitor/drops/{id}/feedback")]
async fn send_drop_feedback(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    req: web::Json<FeedbackRequest>,
) -> HandlerResult {
    let receipt = data
        .app
        .qa_review_use_case
        .send_feedback(&path, req.into_inner())
        .await
        .map_err(|e| data.failed("Feedback dispatch failed", e))?;
    let message = format!("Feedback sent to {}", receipt.recipient);
    Ok(ok_with_message(StatusCode::OK, receipt, message))
}

#[get("/wa-monitor/summary")]
async fn drop_summary(data: web::Data<HttpState>) -> HandlerResult {
    Ok(ok(data.app.qa_review_use_case.summary().await?))
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub date: Option<NaiveDate>,
}

#[get("/wa-monitor/daily")]
async fn daily_drops(data: web::Data<HttpState>, query: web::Query<DailyQuery>) -> HandlerResult {
    let counts = data.app.qa_review_use_case.daily_drops(query.date).await?;
    Ok(ok(counts))
}

#[derive(Debug, Deserialize)]
pub struct ProjectDateQuery {
    pub project: String,
    pub date: NaiveDate,
}

#[get("/wa-monitor/dr-validation")]
async fn dr_drops(
    data: web::Data<HttpState>,
    query: web::Query<ProjectDateQuery>,
) -> HandlerResult {
    let drops = data
        .app
        .dr_validation_use_case
        .drops_for(&query.project, query.date)
        .await?;
    let total = drops.len();
    Ok(ok(json!({ "drops": drops, "total": total })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    pub project: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub file: FileUpload,
}

#[post("/wa-monitor/dr-validation")]
async fn dr_reconcile(
    data: web::Data<HttpState>,
    req: web::Json<ReconcileRequest>,
) -> HandlerResult {
    let bytes = req.file.decode()?;
    data.log(
        "INFO",
        &format!(
            "Reconciling {} for {} on {}",
            req.file.file_name, req.project, req.date
        ),
    );
    let result = data
        .app
        .dr_validation_use_case
        .reconcile(&req.project, req.date, &req.file.file_name, &bytes)
        .await
        .map_err(|e| data.failed("DR reconciliation failed", e))?;
    Ok(ok(result))
}

#[put("/wa-monitor/dr-validation")]
async fn dr_add_missing(
    data: web::Data<HttpState>,
    req: web::Json<AddMissingRequest>,
) -> HandlerResult {
    let outcome = data
        .app
        .dr_validation_use_case
        .add_missing(req.into_inner())
        .await?;
    let message = format!("{} drop(s) added successfully", outcome.inserted);
    Ok(ok_with_message(StatusCode::CREATED, outcome, message))
}

#[delete("/wa-monitor/dr-validation/{id}")]
async fn dr_delete(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    data.app.dr_validation_use_case.delete(&path).await?;
    Ok(ok_with_message(
        StatusCode::OK,
        json!({ "id": path.as_str() }),
        "Drop deleted".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(alias = "drNumber")]
    pub dr_number: String,
}

#[post("/foto/evaluate")]
async fn evaluate_photos(
    data: web::Data<HttpState>,
    req: web::Json<EvaluateRequest>,
) -> HandlerResult {
    data.log("INFO", &format!("Evaluating photos for {}", req.dr_number));
    let result = data
        .app
        .photo_evaluation_use_case
        .evaluate(&req.dr_number)
        .await
        .map_err(|e| data.failed("Photo evaluation failed", e))?;
    Ok(ok(result))
}

#[derive(Debug, Deserialize)]
pub struct EvaluationFeedbackRequest {
    #[serde(alias = "drNumber")]
    pub dr_number: String,
    pub project: Option<String>,
}

#[post("/foto/feedback")]
async fn send_evaluation_feedback(
    data: web::Data<HttpState>,
    req: web::Json<EvaluationFeedbackRequest>,
) -> HandlerResult {
    let receipt = data
        .app
        .photo_evaluation_use_case
        .send_evaluation_feedback(&req.dr_number, req.project.as_deref())
        .await
        .map_err(|e| data.failed("Evaluation feedback failed", e))?;
    let message = format!("Feedback sent to {}", receipt.recipient);
    Ok(ok_with_message(StatusCode::OK, receipt, message))
}

#[get("/foto/evaluations/{dr_number}")]
async fn get_evaluation(data: web::Data<HttpState>, path: web::Path<String>) -> HandlerResult {
    Ok(ok(data.app.photo_evaluation_use_case.get(&path).await?))
}

#[get("/foto/health")]
async fn vlm_health(data: web::Data<HttpState>) -> HandlerResult {
    Ok(ok(data.app.photo_evaluation_use_case.health().await))
}

/// All routes under `/api`. Literal paths are registered before their `{id}` siblings.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .service(health)
        .service(get_logs)
        .service(list_contractors)
        .service(export_contractors)
        .service(import_template)
        .service(preview_import)
        .service(run_import)
        .service(staff_documents)
        .service(staff_compliance)
        .service(compliance_overview)
        .service(expiring_documents)
        .service(upload_document)
        .service(download_document)
        .service(verify_document)
        .service(get_document)
        .service(update_document)
        .service(delete_document)
        .service(list_drops)
        .service(create_drop)
        .service(drop_auto_feedback)
        .service(send_drop_feedback)
        .service(get_drop)
        .service(update_drop)
        .service(delete_drop)
        .service(drop_summary)
        .service(daily_drops)
        .service(dr_drops)
        .service(dr_reconcile)
        .service(dr_add_missing)
        .service(dr_delete)
        .service(evaluate_photos)
        .service(send_evaluation_feedback)
        .service(get_evaluation)
        .service(vlm_health)
}

/// JSON and query extractor errors rendered in the API error envelope.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into())
}

/// Largest JSON body that can carry a base64 upload of `max_upload_bytes`.
pub fn json_limit(max_upload_bytes: u64) -> usize {
    let encoded = max_upload_bytes.saturating_mul(4) / 3;
    usize::try_from(encoded)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = match logs.lock() {
        Ok(logs) => logs,
        Err(poisoned) => poisoned.into_inner(),
    };
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        let excess = logs.len() - MAX_LOG_ENTRIES;
        logs.drain(..excess);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn start_server(
    app: Arc<AppState>,
    host: &str,
    port: u16,
    max_upload_bytes: u64,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app });
    let limit = json_limit(max_upload_bytes);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .app_data(json_config(limit))
            .app_data(query_config())
            .service(api_scope())
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
