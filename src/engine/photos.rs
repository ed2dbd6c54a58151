use axum::body::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::BackendError;
use crate::error::AppError;
use crate::state::AppState;

const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoKind {
    Pickup,
    Delivery,
}

impl PhotoKind {
    fn prefix(&self) -> &'static str {
        match self {
            PhotoKind::Pickup => "pickup",
            PhotoKind::Delivery => "delivery",
        }
    }
}

/// A photo taken on the device: its local reference plus, when the client
/// sent it, the image itself.
#[derive(Debug, Clone)]
pub struct PhotoEvidence {
    pub local_uri: String,
    pub payload: Option<Bytes>,
}

impl PhotoEvidence {
    /// `None` when the request carries no usable reference.
    pub fn from_parts(local_uri: Option<String>, payload: Bytes) -> Option<Self> {
        let local_uri = local_uri?.trim().to_string();
        if local_uri.is_empty() {
            return None;
        }

        Some(Self {
            local_uri,
            payload: (!payload.is_empty()).then_some(payload),
        })
    }
}

pub fn photo_file_name(kind: PhotoKind, order_number: &str) -> String {
    format!(
        "{}_{}_{}.jpg",
        kind.prefix(),
        order_number,
        Utc::now().timestamp_millis()
    )
}

/// The reference written onto the order, plus the stored object when one
/// was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub url: String,
    pub uploaded: Option<String>,
}

impl PhotoRecord {
    fn local(evidence: &PhotoEvidence) -> Self {
        Self {
            url: evidence.local_uri.clone(),
            uploaded: None,
        }
    }
}

/// Resolves the photo reference to store on the order.
///
/// An unprovisioned bucket falls back to the local reference. Any other
/// upload failure is returned to the caller, which decides whether the
/// transition may continue without a durable copy.
pub async fn store_photo(
    state: &AppState,
    driver_id: Uuid,
    kind: PhotoKind,
    order_number: &str,
    evidence: &PhotoEvidence,
) -> Result<PhotoRecord, AppError> {
    let Some(payload) = evidence.payload.clone() else {
        state
            .metrics
            .photo_uploads_total
            .with_label_values(&["local_only"])
            .inc();
        return Ok(PhotoRecord::local(evidence));
    };

    let file_name = photo_file_name(kind, order_number);
    match state
        .photos
        .upload(driver_id, &file_name, payload, PHOTO_CONTENT_TYPE)
        .await
    {
        Ok(url) => {
            state
                .metrics
                .photo_uploads_total
                .with_label_values(&["stored"])
                .inc();
            info!(driver_id = %driver_id, file_name = %file_name, "photo uploaded");
            Ok(PhotoRecord {
                url,
                uploaded: Some(file_name),
            })
        }
        Err(BackendError::BucketMissing(bucket)) => {
            state
                .metrics
                .photo_uploads_total
                .with_label_values(&["fallback"])
                .inc();
            warn!(bucket = %bucket, "photo bucket missing; keeping local reference");
            Ok(PhotoRecord::local(evidence))
        }
        Err(err) => {
            state
                .metrics
                .photo_uploads_total
                .with_label_values(&["failed"])
                .inc();
            Err(err.into())
        }
    }
}

/// Removes an object uploaded for a status change that was not committed.
pub async fn discard_photo(state: &AppState, driver_id: Uuid, record: &PhotoRecord) {
    let Some(file_name) = &record.uploaded else {
        return;
    };

    match state.photos.remove(driver_id, file_name).await {
        Ok(()) => {
            state
                .metrics
                .photo_uploads_total
                .with_label_values(&["discarded"])
                .inc();
            info!(driver_id = %driver_id, file_name = %file_name, "uncommitted photo removed");
        }
        Err(err) => {
            warn!(driver_id = %driver_id, file_name = %file_name, error = %err, "uncommitted photo left in storage");
        }
    }
}
