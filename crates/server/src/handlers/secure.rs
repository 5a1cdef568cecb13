//! Secure document flow handlers: upload, grant-and-process, status, health.

use crate::analysis::AnalyzedDocument;
use crate::cleanup::CleanupGuard;
use crate::error::{ApiError, ApiResult};
use crate::report;
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::{Form, Json};
use bytes::Bytes;
use coffer_core::api::{
    GrantRequest, HealthResponse, ProcessResponse, SecuritySummary, SessionStatusResponse,
    UploadResponse, UploadedFileSummary,
};
use coffer_core::{FileRecord, SessionId, StorageLocation};
use coffer_storage::backends::s3::ENCRYPTED_PREFIX;
use time::OffsetDateTime;

/// POST /secure/upload - encrypt and stage documents, open a session.
#[tracing::instrument(skip_all)]
pub async fn secure_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut client_type: Option<String> = None;
    let mut files: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("client_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("invalid client_type: {e}")))?;
                client_type = Some(value);
            }
            Some("files") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "document".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
                files.push((filename, data));
            }
            _ => {}
        }
    }

    let client_type = client_type
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("client_type is required".to_string()))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one file is required".to_string(),
        ));
    }

    let session = state.sessions.create_session(&client_type).await;
    tracing::info!(
        session_id = %session.id,
        client_type = %client_type,
        files = files.len(),
        "secure upload started"
    );

    let mut summaries = Vec::with_capacity(files.len());
    for (filename, data) in files {
        // Failures are attributed to the specific file; the partially
        // registered session is useless without a successful grant
        let location = stage_encrypted_file(&state, &session.id, &filename, &data)
            .await
            .map_err(|e| {
                tracing::error!(session_id = %session.id, filename = %filename, error = %e, "file staging failed");
                ApiError::Internal(format!("failed to store file '{filename}'"))
            })?;

        summaries.push(UploadedFileSummary {
            filename,
            encrypted: true,
            storage_location: location.to_string(),
        });
    }

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: "documents encrypted and uploaded successfully".to_string(),
        upload_session_id: session.id.to_string(),
        access_token: session.access_token.reveal().to_string(),
        files: summaries,
        expires_at: session.expires_at,
    }))
}

/// Encrypt one file and persist its ciphertext, preferring object storage
/// and falling back to local storage. The chosen backend is recorded in the
/// returned location so retrieval never guesses.
async fn stage_encrypted_file(
    state: &AppState,
    session_id: &SessionId,
    filename: &str,
    data: &[u8],
) -> ApiResult<StorageLocation> {
    let doc = state.cipher.encrypt(data, None)?;
    let ciphertext = Bytes::from(doc.ciphertext);
    let safe_name = report::sanitize_fragment(filename);

    let location = match &state.object_storage {
        Some(object_storage) => {
            let key = format!("{ENCRYPTED_PREFIX}{}_{safe_name}", report::file_timestamp());
            match object_storage.put(&key, ciphertext.clone()).await {
                Ok(()) => StorageLocation::S3 { key },
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "object storage upload failed, using local storage"
                    );
                    store_local(state, session_id, &safe_name, ciphertext).await?
                }
            }
        }
        None => store_local(state, session_id, &safe_name, ciphertext).await?,
    };

    state
        .sessions
        .add_file(
            session_id,
            FileRecord {
                filename: filename.to_string(),
                location: location.clone(),
                metadata: doc.metadata,
                key_material: doc.key_material,
                uploaded_at: OffsetDateTime::now_utc(),
            },
        )
        .await?;

    Ok(location)
}

async fn store_local(
    state: &AppState,
    session_id: &SessionId,
    safe_name: &str,
    ciphertext: Bytes,
) -> ApiResult<StorageLocation> {
    let key = format!("encrypted_{safe_name}_{session_id}");
    state.local_storage.put(&key, ciphertext).await?;
    Ok(StorageLocation::Local { key })
}

/// POST /secure/session/{session_id}/grant - verify possession, then
/// immediately decrypt, analyze, and destroy.
#[tracing::instrument(skip_all, fields(session_id = %session_id))]
pub async fn grant_and_process(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Form(form): Form<GrantRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    // A malformed id is as good as an unknown one
    let session_id = SessionId::parse(&session_id).map_err(|_| ApiError::AccessDenied)?;
    if form.client_type.trim().is_empty() {
        return Err(ApiError::BadRequest("client_type is required".to_string()));
    }

    let grant = state
        .sessions
        .grant_access(&session_id, &form.access_token)
        .await?;
    tracing::info!(files = grant.files_count, "access granted, processing documents");

    let response = process_documents(
        &state,
        session_id,
        grant.processing_key.reveal(),
        &form.client_type,
    )
    .await?;
    Ok(Json(response))
}

/// The processing step: scoped acquisition of transient plaintext with
/// guaranteed release on every exit path.
pub async fn process_documents(
    state: &AppState,
    session_id: SessionId,
    processing_key: &str,
    client_type: &str,
) -> ApiResult<ProcessResponse> {
    let files = state.sessions.get_files(&session_id, processing_key).await?;

    let mut guard = CleanupGuard::new(
        state.object_storage.clone(),
        state.local_storage.clone(),
        state.sessions.clone(),
        session_id.clone(),
    );

    let outcome = stage_and_analyze(state, &session_id, &files, &mut guard, client_type).await;

    // Cleanup runs on both outcomes before anything is surfaced; the guard's
    // drop hook covers the paths that never reach here
    match outcome {
        Ok((result_text, processed_files)) => {
            let cleanup = guard.run().await;

            let task_name = state.analyzer.task_name(client_type);
            let cleaned = report::clean_result_content(&result_text);
            let (file_path, markdown) = report::save_markdown_report(
                &state.config.server.reports_dir,
                client_type,
                &task_name,
                &cleaned,
            )
            .await
            .map_err(|e| ApiError::Internal(format!("failed to persist report: {e}")))?;

            Ok(ProcessResponse {
                status: "success".to_string(),
                task: task_name,
                result: cleaned,
                markdown,
                file_saved: file_path.display().to_string(),
                processed_files,
                session_type: "encrypted".to_string(),
                session_cleaned: cleanup.session_cleaned,
                s3_cleanup: cleanup.s3_cleanup.clone(),
                temp_files_cleaned: cleanup.temp_files_deleted,
                security_summary: SecuritySummary {
                    s3_files_deleted: cleanup.s3_files_deleted,
                    temp_files_deleted: cleanup.temp_files_deleted,
                    session_cleaned: cleanup.session_cleaned,
                    security_level: cleanup.security_level().to_string(),
                },
            })
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "processing failed, cleaning up");
            guard.run().await;
            Err(e)
        }
    }
}

/// Fetch, decrypt, and stage every file, then hand the batch to the
/// analyzer. Every artifact is tracked before it exists so the guard covers
/// partial progress.
async fn stage_and_analyze(
    state: &AppState,
    session_id: &SessionId,
    files: &[FileRecord],
    guard: &mut CleanupGuard,
    client_type: &str,
) -> ApiResult<(String, usize)> {
    let plaintext_dir = state.plaintext_dir();
    tokio::fs::create_dir_all(&plaintext_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("cannot create plaintext dir: {e}")))?;

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        guard.track_ciphertext(file.location.clone());

        let store = state.store_for(&file.location)?;
        let ciphertext = store.get(file.location.key()).await?;
        let plaintext =
            state
                .cipher
                .decrypt(&file.metadata, &ciphertext, file.key_material.password())?;

        let temp_path = plaintext_dir.join(format!(
            "temp_decrypted_{}_{session_id}",
            report::sanitize_fragment(&file.filename)
        ));
        guard.track_plaintext(temp_path.clone());
        tokio::fs::write(&temp_path, plaintext.as_slice())
            .await
            .map_err(|e| ApiError::Internal(format!("cannot stage plaintext: {e}")))?;

        documents.push(AnalyzedDocument {
            filename: file.filename.clone(),
            text: String::from_utf8_lossy(plaintext.as_slice()).into_owned(),
        });
    }

    // Long-running external call; no session lock is held here
    let result = state.analyzer.analyze(client_type, &documents).await?;
    Ok((result, documents.len()))
}

/// GET /secure/session/{session_id}/status - true session status.
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionStatusResponse> {
    let session_status = match SessionId::parse(&session_id) {
        Err(_) => "not_found",
        Ok(id) => match state.sessions.snapshot(&id).await {
            None => "not_found",
            Some(session) if session.is_expired() => "expired",
            Some(session) => session.status.as_str(),
        },
    };

    Json(SessionStatusResponse {
        status: "success".to_string(),
        session_id,
        session_status: session_status.to_string(),
    })
}

/// GET /secure/health - liveness probe, no session interaction.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "coffer-secure-documents".to_string(),
        storage_backend: state.primary_backend_name().to_string(),
        features: vec![
            "document_encryption".to_string(),
            "secure_upload".to_string(),
            "session_management".to_string(),
        ],
    })
}
