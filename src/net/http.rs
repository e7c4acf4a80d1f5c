//! HTTP route layer over the transfer service.
//!
//! Thin wrappers: every handler delegates to `TransferService` and maps
//! its errors onto status codes. Route construction follows the warp
//! filter-chaining style.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::{BufMut, Bytes};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use warp::http::{Response, StatusCode};
use warp::hyper::Body;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

use crate::error::TransferError;
use crate::net::{format_file_size, mime_for};
use crate::service::TransferService;

/// Chunk size for streaming large downloads.
const CHUNK_SIZE: usize = 8192;
/// Files below this are served from memory.
const SMALL_FILE_THRESHOLD: u64 = 50 * 1024 * 1024;

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>LAN File Transfer</title></head>
<body>
<h1>LAN File Transfer</h1>
<p>Upload: POST /upload (multipart field "file")</p>
<p>Files: GET /api/files &middot; Stores: GET /api/stores &middot; Config: GET /api/config</p>
<p>Download: GET /download/&lt;name&gt; &middot; Delete: POST /delete/&lt;name&gt;</p>
</body>
</html>
"#;

/// Build the full route tree around a shared service instance.
pub fn routes(
    service: Arc<TransferService>,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_PAGE));

    let upload = warp::path("upload")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_upload);

    let download = warp::path("download")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_download);

    let delete = warp::path("delete")
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::post())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_delete);

    let api = warp::path("api");

    let list_files = api
        .and(warp::path("files"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_list_files);

    let file_info = api
        .and(warp::path("file-info"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_file_info);

    let stores = api
        .and(warp::path("stores"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_stores);

    let config = api
        .and(warp::path("config"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service))
        .and_then(handle_config);

    index
        .or(upload)
        .or(download)
        .or(delete)
        .or(list_files)
        .or(file_info)
        .or(stores)
        .or(config)
        .with(cors)
}

fn with_service(
    service: Arc<TransferService>,
) -> impl Filter<Extract = (Arc<TransferService>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&service))
}

fn error_response(error: TransferError) -> warp::reply::Response {
    let status = match &error {
        TransferError::NotFound(_) => StatusCode::NOT_FOUND,
        TransferError::DisallowedExtension(_)
        | TransferError::TooLarge { .. }
        | TransferError::InvalidName(_) => StatusCode::BAD_REQUEST,
        TransferError::CapacityExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": error.to_string() })),
        status,
    )
    .into_response()
}

#[derive(Serialize)]
struct SavedEntry {
    name: String,
    store: String,
    size: u64,
}

#[derive(Serialize)]
struct FailedEntry {
    name: String,
    error: String,
}

#[derive(Serialize)]
struct UploadOutcome {
    saved: Vec<SavedEntry>,
    failed: Vec<FailedEntry>,
}

async fn handle_upload(
    form: FormData,
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    let parts: Vec<Part> = form.try_collect().await.map_err(|e| {
        log::warn!("Malformed multipart upload: {}", e);
        warp::reject::reject()
    })?;

    let mut saved = Vec::new();
    let mut failed = Vec::new();

    for part in parts {
        if part.name() != "file" {
            continue;
        }
        let filename = part.filename().unwrap_or("unknown").to_string();
        let data: Vec<u8> = part
            .stream()
            .try_fold(Vec::new(), |mut vec, data| {
                vec.put(data);
                async move { Ok(vec) }
            })
            .await
            .map_err(|e| {
                log::warn!("Error receiving upload body: {}", e);
                warp::reject::reject()
            })?;

        match service.upload(&filename, Bytes::from(data)).await {
            Ok(stored) => saved.push(SavedEntry {
                name: stored.stored_name,
                store: stored.store_name,
                size: stored.size,
            }),
            Err(e) => failed.push(FailedEntry {
                name: filename,
                error: e.to_string(),
            }),
        }
    }

    let status = if saved.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok(
        warp::reply::with_status(warp::reply::json(&UploadOutcome { saved, failed }), status)
            .into_response(),
    )
}

async fn handle_download(
    name: String,
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    let record = match service.download(&name).await {
        Ok(record) => record,
        Err(e) => return Ok(error_response(e)),
    };

    let mime = mime_for(&record.name);
    log::info!(
        "Serving file: {} ({}) as {}",
        record.name,
        format_file_size(record.size),
        mime
    );

    let body = if record.size < SMALL_FILE_THRESHOLD {
        match tokio::fs::read(&record.path).await {
            Ok(data) => Body::from(data),
            Err(e) => return Ok(error_response(TransferError::Io(e))),
        }
    } else {
        let file = match tokio::fs::File::open(&record.path).await {
            Ok(file) => file,
            Err(e) => return Ok(error_response(TransferError::Io(e))),
        };
        let chunks = futures_util::stream::try_unfold(file, |mut file| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                Ok::<_, std::io::Error>(None)
            } else {
                buf.truncate(n);
                Ok(Some((Bytes::from(buf), file)))
            }
        });
        Body::wrap_stream(chunks)
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", mime)
        .header("content-length", record.size.to_string())
        .header(
            "content-disposition",
            format!("attachment; filename=\"{}\"", record.name),
        )
        .header("cache-control", "no-cache")
        .body(body)
        .map_err(|_| warp::reject::reject())?;
    Ok(response)
}

async fn handle_delete(
    name: String,
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    match service.delete(&name).await {
        Ok(()) => {
            Ok(warp::reply::json(&serde_json::json!({ "success": true })).into_response())
        }
        Err(e) => Ok(error_response(e)),
    }
}

#[derive(Serialize)]
struct FileEntry {
    name: String,
    size: u64,
    size_formatted: String,
    modified: DateTime<Utc>,
    download_url: String,
    store: String,
}

async fn handle_list_files(
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    match service.list(false).await {
        Ok(records) => {
            let files: Vec<FileEntry> = records
                .into_iter()
                .map(|record| FileEntry {
                    download_url: format!("/download/{}", record.name),
                    size_formatted: format_file_size(record.size),
                    name: record.name,
                    size: record.size,
                    modified: record.modified,
                    store: record.store_name,
                })
                .collect();
            Ok(warp::reply::json(&files).into_response())
        }
        Err(e) => Ok(error_response(e)),
    }
}

async fn handle_file_info(
    name: String,
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    match service.download(&name).await {
        Ok(record) => Ok(warp::reply::json(&serde_json::json!({
            "name": record.name,
            "size": record.size,
            "size_formatted": format_file_size(record.size),
            "modified": record.modified,
            "store": record.store_name,
        }))
        .into_response()),
        Err(e) => Ok(error_response(e)),
    }
}

async fn handle_stores(
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    match service.store_status().await {
        Ok(report) => Ok(warp::reply::json(&report).into_response()),
        Err(e) => Ok(error_response(e)),
    }
}

async fn handle_config(
    service: Arc<TransferService>,
) -> Result<warp::reply::Response, Rejection> {
    let document = service.configuration().await;
    Ok(warp::reply::json(&serde_json::json!({
        "service_name": document.service_name,
        "max_file_size_gb": document.max_file_size_gb,
        "allowed_extensions": document.allowed_extensions,
    }))
    .into_response())
}
