use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Request};
use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::AppError;

/// Success envelope shared by every endpoint: `{success, data, message}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// JSON body extractor that reports the failing field path as a validation error.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err: BytesRejection| AppError::bad_request(err.body_text()))?;

        let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);
        serde_path_to_error::deserialize(deserializer)
            .map(ValidatedJson)
            .map_err(|err| {
                let path = err.path().to_string();
                if path == "." {
                    AppError::validation(err.inner().to_string())
                } else {
                    AppError::validation(format!("{}: {}", path, err.inner()))
                }
            })
    }
}
