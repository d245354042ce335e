use super::*;
use crate::domain::error::Result;
use crate::infrastructure::bootstrap::{assemble, Collaborators};
use crate::infrastructure::clients::{MessageGateway, PhotoSource, ServiceCatalog, VisionModel};
use crate::infrastructure::config::AppConfig;
use crate::domain::photo_evaluation::{EvaluationResult, OverallStatus, StepResult};
use crate::infrastructure::db::connection::init_memory_db;
use crate::infrastructure::db::photo_evaluations::PhotoEvaluationRepository;
use actix_web::test as actix_test;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn send_text(&self, recipient: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

struct NoPhotos;

#[async_trait]
impl PhotoSource for NoPhotos {
    async fn photo_urls(&self, _dr_number: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        Err(AppError::NotFound(url.to_string()))
    }
}

struct IdleVlm;

#[async_trait]
impl VisionModel for IdleVlm {
    async fn complete(&self, _prompt: &str, _images: &[String]) -> Result<String> {
        Err(AppError::ExternalService("not expected".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["test-vl".to_string()])
    }

    fn model(&self) -> &str {
        "test-vl"
    }
}

struct Services;

#[async_trait]
impl ServiceCatalog for Services {
    async fn available_services(&self) -> Result<Vec<String>> {
        Ok(vec!["Trenching".to_string(), "Splicing".to_string()])
    }
}

struct Fixture {
    state: Arc<AppState>,
    gateway: Arc<RecordingGateway>,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config
        .whatsapp
        .project_groups
        .insert("Lawley".to_string(), "120363@g.us".to_string());

    let gateway = Arc::new(RecordingGateway::default());
    let collaborators = Collaborators {
        gateway: gateway.clone(),
        vlm: Arc::new(IdleVlm),
        photos: Arc::new(NoPhotos),
        catalog: Arc::new(Services),
    };
    let pool = init_memory_db().await.unwrap();
    let logs = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::new(assemble(pool, &config, collaborators, logs));

    Fixture {
        state,
        gateway,
        _dir: dir,
    }
}

macro_rules! test_app {
    ($state:expr) => {
        actix_test::init_service(
            App::new()
                .app_data(web::Data::new(HttpState {
                    app: $state.clone(),
                }))
                .app_data(json_config(json_limit(1024 * 1024)))
                .app_data(query_config())
                .service(api_scope()),
        )
        .await
    };
}

fn encoded(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[actix_web::test]
async fn health_reports_database_ok() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "ok");
}

#[actix_web::test]
async fn errors_use_the_error_envelope() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::get()
        .uri("/api/staff-documents/missing")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = actix_test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let req = actix_test::TestRequest::post()
        .uri("/api/wa-monitor/drops")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let req = actix_test::TestRequest::get()
        .uri("/api/wa-monitor/dr-validation?project=Lawley&date=yesterday")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn contractor_preview_and_import() {
    let fx = fixture().await;
    let app = test_app!(fx.state);
    let csv = "Company Name,Email,Phone,Province,Business Type,Services\n\
               Acme Fibre,info@acme.co.za,082 123 4567,gp,pty ltd,Trenching\n\
               Bad Row,nope,,,,\n";
    let payload = json!({ "fileName": "batch.csv", "contentBase64": encoded(csv.as_bytes()) });

    let req = actix_test::TestRequest::post()
        .uri("/api/contractors/import/preview")
        .set_json(&payload)
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["statistics"]["total_rows"], 2);
    assert_eq!(body["data"]["statistics"]["valid_rows"], 1);

    let req = actix_test::TestRequest::post()
        .uri("/api/contractors/import")
        .set_json(&payload)
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["imported"], 1);
    assert_eq!(body["message"], "1 contractor(s) imported, 1 skipped");

    let req = actix_test::TestRequest::get()
        .uri("/api/contractors/export")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/csv"));
    let bytes = actix_test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&bytes).contains("Acme Fibre"));

    let req = actix_test::TestRequest::post()
        .uri("/api/contractors/import/preview")
        .set_json(json!({ "fileName": "batch.csv", "contentBase64": "%%%" }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let data_url = format!("data:text/csv;base64,{}", encoded(csv.as_bytes()));
    let req = actix_test::TestRequest::post()
        .uri("/api/contractors/import/preview")
        .set_json(json!({ "fileName": "batch.csv", "contentBase64": data_url }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["statistics"]["total_rows"], 2);
}

#[actix_web::test]
async fn staff_document_lifecycle() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::post()
        .uri("/api/staff-documents-upload")
        .set_json(json!({
            "staffId": "staff-7",
            "documentType": "id_document",
            "documentName": "SA ID",
            "fileName": "id.pdf",
            "mimeType": "application/pdf",
            "contentBase64": encoded(b"%PDF-1.4 id"),
        }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["verificationStatus"], "pending");

    let req = actix_test::TestRequest::get()
        .uri("/api/staff/staff-7/documents?documentType=id_document")
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = actix_test::TestRequest::get()
        .uri("/api/staff/staff-7/documents?documentType=passport")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = actix_test::TestRequest::get()
        .uri(&format!("/api/staff-documents/{}/download", id))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "application/pdf"
    );
    assert_eq!(actix_test::read_body(resp).await.as_ref(), b"%PDF-1.4 id");

    let req = actix_test::TestRequest::post()
        .uri(&format!("/api/staff-documents/{}/verify", id))
        .set_json(json!({ "status": "rejected" }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = actix_test::TestRequest::post()
        .uri(&format!("/api/staff-documents/{}/verify", id))
        .set_json(json!({ "status": "verified", "verifiedBy": "hr@fibre" }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["verificationStatus"], "verified");

    let req = actix_test::TestRequest::get()
        .uri("/api/staff/staff-7/compliance")
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["verifiedDocuments"], 1);

    let req = actix_test::TestRequest::delete()
        .uri(&format!("/api/staff-documents/{}", id))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = actix_test::TestRequest::get()
        .uri(&format!("/api/staff-documents/{}", id))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn drop_review_and_feedback() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::post()
        .uri("/api/wa-monitor/drops")
        .set_json(json!({
            "dropNumber": "dr1751234",
            "project": "Lawley",
            "senderPhone": "+27821234567",
            "steps": { "step_01_house_photo": true }
        }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = actix_test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["dropNumber"], "DR1751234");
    assert_eq!(body["data"]["status"], "incomplete");

    let req = actix_test::TestRequest::get()
        .uri("/api/wa-monitor/drops?status=incomplete&project=Lawley")
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = actix_test::TestRequest::get()
        .uri(&format!("/api/wa-monitor/drops/{}/auto-feedback", id))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert!(body["data"]["message"].as_str().unwrap().contains("DR1751234"));

    let req = actix_test::TestRequest::post()
        .uri(&format!("/api/wa-monitor/drops/{}/feedback", id))
        .set_json(json!({ "message": "Please resend the ONT barcode" }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["recipient"], "120363@g.us");
    assert_eq!(body["data"]["feedbackCount"], 1);

    let sent = fx.gateway.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            "120363@g.us".to_string(),
            "Please resend the ONT barcode".to_string()
        )]
    );

    let req = actix_test::TestRequest::get()
        .uri("/api/wa-monitor/summary")
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 1);
}

#[actix_web::test]
async fn photo_evaluation_routes() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::get().uri("/api/foto/health").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["reachable"], true);
    assert_eq!(body["data"]["model_available"], true);

    let req = actix_test::TestRequest::post()
        .uri("/api/foto/evaluate")
        .set_json(json!({ "dr_number": "DR1" }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = actix_test::TestRequest::get()
        .uri("/api/foto/evaluations/DR1")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn evaluation_feedback_is_sent_to_the_project_group() {
    let fx = fixture().await;
    PhotoEvaluationRepository::new(fx.state.pool.clone())
        .save(&EvaluationResult {
            dr_number: "DR1733545".to_string(),
            overall_status: OverallStatus::Pass,
            average_score: 9.0,
            total_steps: 11,
            passed_steps: 1,
            step_results: vec![StepResult {
                step_number: 1,
                step_name: "house_photo".to_string(),
                step_label: "House Photo".to_string(),
                passed: true,
                score: 9.0,
                comment: "Number visible".to_string(),
            }],
            photos_evaluated: 4,
            feedback_sent: false,
            evaluated_at: 1,
            markdown_report: None,
        })
        .await
        .unwrap();
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::post()
        .uri("/api/foto/feedback")
        .set_json(json!({ "dr_number": "DR1733545", "project": "Lawley" }))
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["recipient"], "120363@g.us");
    assert_eq!(body["message"], "Feedback sent to 120363@g.us");

    let sent = fx.gateway.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            "120363@g.us".to_string(),
            "DR1733545\nAll items complete! \u{2705}".to_string()
        )]
    );

    let req = actix_test::TestRequest::get()
        .uri("/api/foto/evaluations/DR1733545")
        .to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["feedback_sent"], true);

    let req = actix_test::TestRequest::post()
        .uri("/api/foto/feedback")
        .set_json(json!({ "drNumber": "DR0000001" }))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn failed_requests_are_logged() {
    let fx = fixture().await;
    let app = test_app!(fx.state);

    let req = actix_test::TestRequest::post()
        .uri("/api/foto/evaluate")
        .set_json(json!({ "dr_number": "DR404" }))
        .to_request();
    actix_test::call_service(&app, req).await;

    let req = actix_test::TestRequest::get().uri("/api/logs").to_request();
    let body: Value = actix_test::call_and_read_body_json(&app, req).await;
    let entries = body["data"].as_array().unwrap();
    assert!(entries
        .iter()
        .any(|e| e["level"] == "ERROR" && e["message"].as_str().unwrap().contains("DR404")));
}

#[test]
fn log_ring_keeps_the_latest_entries() {
    let logs = Mutex::new(Vec::new());
    for i in 0..(MAX_LOG_ENTRIES + 5) {
        add_log(&logs, "INFO", "Test", &format!("entry {}", i));
    }
    let logs = logs.lock().unwrap();
    assert_eq!(logs.len(), MAX_LOG_ENTRIES);
    assert_eq!(logs[0].message, "entry 5");
    assert_eq!(logs[MAX_LOG_ENTRIES - 1].message, "entry 104");
}

#[test]
fn error_status_mapping() {
    assert_eq!(
        AppError::Conflict("x".into()).status_code(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::ExternalService("x".into()).status_code(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        AppError::ParseError("x".into()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::DatabaseError("x".into()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn json_limit_covers_base64_overhead() {
    assert!(json_limit(3 * 1024 * 1024) >= 4 * 1024 * 1024);
}
