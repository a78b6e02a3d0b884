use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{HeaderMap, StatusCode},
    response::Json,
};
use tracing::debug;

use crate::{
    api::{auth::user_id_from_headers, models::translate::TranslateResponse, AppState},
    error::{Result, SubmeterError},
    workflow::{TranslateUpload, UploadedFile},
};

fn multipart_error(e: MultipartError) -> SubmeterError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return SubmeterError::PayloadTooLarge;
    }
    SubmeterError::Validation(format!("Invalid multipart body: {}", e.body_text()))
}

/// Translate an uploaded subtitle file, charging the caller's credits.
///
/// Multipart fields: `file`, `targetLanguage`, optional `sourceLanguage` and
/// `userId`. Without a `userId` field the `X-User-Id` header identifies the caller.
pub async fn translate_subtitles(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<TranslateResponse>> {
    let mut multipart =
        multipart.map_err(|e| SubmeterError::Validation(format!("Expected a multipart upload: {}", e.body_text())))?;

    let mut upload = TranslateUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!("Received upload {} ({} bytes)", file_name, bytes.len());
                upload.file = Some(UploadedFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            "targetLanguage" => upload.target_language = Some(field.text().await.map_err(multipart_error)?),
            "sourceLanguage" => upload.source_language = Some(field.text().await.map_err(multipart_error)?),
            "userId" => upload.user_id = Some(field.text().await.map_err(multipart_error)?),
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    let field_user = upload.user_id.take().filter(|id| !id.trim().is_empty());
    upload.user_id = field_user.or_else(|| user_id_from_headers(&headers));

    let outcome = state.workflow.translate_upload(upload).await?;

    Ok(Json(TranslateResponse::from(outcome)))
}
