use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared::chat_api::ImageRequest;
use shared::ChatError;
use std::time::Duration;

use crate::http::{ensure_success, transport_error};
use crate::ImageBackend;

const IMAGE_PATH: &str = "/api/generate-image";

pub const AUTH_FAILED_MESSAGE: &str = "Error de autenticación. Por favor, verifica tu API key.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: String,
}

/// Client for the image-generation route.
pub struct ImageClient {
    http: Client,
    base_url: String,
}

impl ImageClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ChatError> {
        Ok(Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(transport_error)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ImageBackend for ImageClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, ChatError> {
        if request.prompt.trim().is_empty() {
            return Err(ChatError::validation(
                "Por favor, proporciona una descripción para la imagen.",
            ));
        }

        let url = format!("{}{}", self.base_url, IMAGE_PATH);
        tracing::info!(size = ?request.size, model = ?request.model, "requesting image");
        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("image backend rejected credentials");
            return Err(ChatError::Authentication {
                message: AUTH_FAILED_MESSAGE.to_string(),
            });
        }
        let resp = ensure_success(resp).await?;
        let body: ImageResponse = resp.json().await.map_err(transport_error)?;
        Ok(body.image_url)
    }
}
