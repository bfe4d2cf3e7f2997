use axum::{
    extract::{DefaultBodyLimit, Multipart, Path},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::ReconcileError;
use crate::janitor::Janitor;
use crate::tasks::{run_submission, SubmissionParams};

/// Multipart field names of the upload form.
const REPORT_FIELD: &str = "report_file";
const ROSTER_FIELD: &str = "attendance_file";
const WORKBOOK_FIELD: &str = "excel_file";

/// Uploads larger than this are rejected outright.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Upload page: posts the three files and renders the returned summary.
const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html lang="ko">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>출결 자동 반영</title>
    <style>
      body { font-family: sans-serif; max-width: 640px; margin: 40px auto; padding: 0 16px; }
      label { display: block; margin: 12px 0; }
      button { margin-top: 12px; padding: 8px 20px; }
      #result { margin-top: 24px; padding: 12px; border: 1px solid #ccc; display: none; }
      .error { color: #b00020; }
    </style>
  </head>
  <body>
    <h1>출결 자동 반영</h1>
    <p>
      참석보고서(CSV, UTF-16), 출석 데이터(CSV), 출결 엑셀 파일을 업로드하면
      변경된 셀이 주황색으로 표시된 결과 파일이 생성됩니다.
      결과 파일은 다운로드 후 1분 뒤에 자동으로 삭제됩니다.
    </p>
    <form id="upload-form">
      <label>참석보고서 <input type="file" name="report_file" required /></label>
      <label>출석 데이터 <input type="file" name="attendance_file" required /></label>
      <label>출결 엑셀 <input type="file" name="excel_file" required /></label>
      <button type="submit">업로드</button>
    </form>
    <div id="result"></div>
    <script>
      const form = document.getElementById('upload-form');
      const box = document.getElementById('result');
      form.addEventListener('submit', async (ev) => {
        ev.preventDefault();
        box.style.display = 'block';
        box.textContent = '처리 중...';
        try {
          const resp = await fetch('/reconcile', { method: 'POST', body: new FormData(form) });
          const data = await resp.json();
          if (!resp.ok) {
            box.innerHTML = '<span class="error">' + (data.error || '오류가 발생했습니다.') + '</span>';
            return;
          }
          const u = data.updates;
          box.innerHTML =
            '업데이트 완료: 출석 ' + u.attendance + '건, 접속시작 ' + u.login_time +
            '건, 접속종료 ' + u.logout_time + '건, 활용시간 ' + u.duration + '건<br/>' +
            '<a href="' + data.download_url + '">' + data.result_filename + ' 다운로드</a>';
        } catch (e) {
          box.innerHTML = '<span class="error">요청 처리 중 오류가 발생했습니다.</span>';
        }
      });
    </script>
  </body>
</html>"#;

/// Upload page
async fn index() -> impl IntoResponse {
    Html(INDEX_PAGE)
}

/// Health check endpoint, reporting the configured local time
async fn health(Extension(config): Extension<Arc<AppConfig>>) -> impl IntoResponse {
    let local = config.sheet.local_time(Utc::now());
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "local_time": local.format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Map a processing failure onto a status code and a user-facing message.
fn reconcile_error_response(err: ReconcileError) -> Response {
    let status = match err {
        ReconcileError::Format(_) | ReconcileError::Layout(_) => StatusCode::BAD_REQUEST,
        ReconcileError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("submission rejected: {}", err);
    error_response(status, format!("오류 발생: {err}"))
}

/// Accept the three uploaded artifacts and run one reconciliation.
async fn reconcile(
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(janitor): Extension<Arc<Janitor>>,
    mut multipart: Multipart,
) -> Response {
    let mut report_bytes: Option<Vec<u8>> = None;
    let mut roster_bytes: Option<Vec<u8>> = None;
    let mut workbook: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("잘못된 업로드 요청입니다: {e}"),
                )
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("파일을 읽을 수 없습니다: {e}"),
                )
            }
        };
        match name.as_str() {
            REPORT_FIELD => report_bytes = Some(bytes),
            ROSTER_FIELD => roster_bytes = Some(bytes),
            WORKBOOK_FIELD => workbook = Some((filename, bytes)),
            _ => {}
        }
    }

    let (report_bytes, roster_bytes, (workbook_filename, workbook_bytes)) =
        match (report_bytes, roster_bytes, workbook) {
            (Some(report), Some(roster), Some(workbook)) => (report, roster, workbook),
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "모든 필수 파일을 업로드해주세요.".to_string(),
                )
            }
        };
    if report_bytes.is_empty() || roster_bytes.is_empty() || workbook_bytes.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "모든 필수 파일을 선택해주세요.".to_string(),
        );
    }

    let params = SubmissionParams {
        report_bytes,
        roster_bytes,
        workbook_bytes,
        workbook_filename: if workbook_filename.is_empty() {
            "workbook.xlsx".to_string()
        } else {
            workbook_filename
        },
    };

    let summary = match run_submission(&config, &params, Utc::now()) {
        Ok(summary) => summary,
        Err(e) => return reconcile_error_response(e),
    };

    // The result files outlive the response only until the janitor fires.
    janitor.schedule(vec![summary.result_path.clone(), summary.mirror_path.clone()]);

    info!("submission accepted: {}", summary.result_filename);
    Json(serde_json::json!({
        "updates": summary.updates,
        "participants_parsed": summary.participants_parsed,
        "present_names": summary.present_names,
        "result_filename": summary.result_filename,
        "download_url": format!("/download/{}", urlencoding::encode(&summary.result_filename)),
        "message": "업데이트가 완료되었습니다. 변경된 셀은 주황색으로 표시됩니다.",
    }))
    .into_response()
}

/// Reject names that could escape the results folder.
fn sanitized_filename(filename: &str) -> Option<&str> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        return None;
    }
    Some(filename)
}

/// Stream a result file as an attachment.
async fn download(
    Extension(config): Extension<Arc<AppConfig>>,
    Path(filename): Path<String>,
) -> Response {
    let filename = match sanitized_filename(&filename) {
        Some(name) => name,
        None => return error_response(StatusCode::BAD_REQUEST, "잘못된 파일 이름입니다.".to_string()),
    };
    let path = config.storage.results_dir.join(filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return error_response(
                StatusCode::NOT_FOUND,
                "파일을 찾을 수 없습니다. 이미 삭제되었을 수 있습니다.".to_string(),
            )
        }
        Err(e) => {
            error!("failed to read result file {}: {}", path.display(), e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "파일을 다운로드할 수 없습니다.".to_string(),
            );
        }
    };

    (
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename*=UTF-8''{}", urlencoding::encode(filename)),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Create the HTTP router with all routes
pub fn create_server(config: Arc<AppConfig>, janitor: Arc<Janitor>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/reconcile", post(reconcile))
        .route("/download/:filename", get(download))
        // Publicly servable mirror of the results folder
        .nest_service(
            "/results",
            ServeDir::new(config.storage.public_results_dir.clone()),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(Extension(config))
        .layer(Extension(janitor))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    config: Arc<AppConfig>,
    janitor: Arc<Janitor>,
    port: u16,
) -> anyhow::Result<()> {
    let app = create_server(config, janitor);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");

    info!("HTTP server listening on {addr}");
    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
