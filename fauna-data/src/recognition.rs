//! Image recognition: upload a photo, receive species detections.

use std::sync::Arc;

use async_trait::async_trait;
use fauna_core::{
    Classification, DataSource, Detection, Provider, ProviderError, RecordStore, RunSummary,
    run_provider,
};
use serde_json::Value;

use crate::fields;
use crate::http::{FilePart, HttpRequest, HttpTransport, endpoint};

/// Default recognition service.
pub const DEFAULT_RECOGNITION_URL: &str = "https://api.wildlifeinsights.org/v1";

/// Variable naming the recognition API key.
pub const API_KEY_VARIABLE: &str = "WILDLIFE_API_KEY";

const LIST_KEYS: [&str; 4] = ["annotations", "predictions", "detections", "results"];

/// Settings for [`ImageRecognitionProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecognitionConfig {
    /// Bearer token for the service.
    pub api_key: Option<String>,
    /// Base URL; uploads go to `{base_url}/detect`.
    pub base_url: String,
}

impl Default for ImageRecognitionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_RECOGNITION_URL.to_owned(),
        }
    }
}

impl ImageRecognitionConfig {
    /// Default settings using `api_key`.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Override the service URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// An image to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// File name reported to the service.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub content_type: String,
    /// Image contents.
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Upload named `file_name`, guessing the MIME type from its extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_owned();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Image-recognition provider.
pub struct ImageRecognitionProvider<T> {
    transport: Arc<T>,
    config: ImageRecognitionConfig,
}

impl<T> std::fmt::Debug for ImageRecognitionProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRecognitionProvider")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> ImageRecognitionProvider<T> {
    /// Provider calling the service through `transport`.
    #[must_use]
    pub const fn new(transport: Arc<T>, config: ImageRecognitionConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch, normalize and store the detections for `image`.
    pub async fn run(&self, image: &ImageUpload, store: &dyn RecordStore) -> RunSummary {
        run_provider(self, image, store).await
    }

    /// Upload `image` and return its normalized detections.
    ///
    /// # Errors
    ///
    /// Fails like [`Provider::fetch`].
    pub async fn detect(&self, image: &ImageUpload) -> Result<Vec<Detection>, ProviderError> {
        let raw = self.fetch(image).await?;
        Ok(self.normalize(&raw))
    }
}

/// The detection with the highest confidence, if any.
///
/// Ties keep the earlier detection.
#[must_use]
pub fn best_detection(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().reduce(|best, candidate| {
        if candidate.confidence > best.confidence {
            candidate
        } else {
            best
        }
    })
}

fn detection_list(raw: &Value) -> &[Value] {
    if let Some(items) = raw.as_array() {
        return items;
    }
    LIST_KEYS
        .iter()
        .map(|key| fields::array(raw, key))
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}

fn classification(item: &Value) -> Classification {
    let taxonomy = item.get("taxonomy").unwrap_or(&Value::Null);
    let rank = |name: &str| fields::text(taxonomy, name).or_else(|| fields::text(item, name));
    Classification {
        class: rank("class"),
        order: rank("order"),
        family: rank("family"),
        genus: rank("genus"),
        species: rank("species"),
    }
}

fn detection(item: &Value) -> Option<Detection> {
    let taxonomy = classification(item);
    let species = taxonomy.species.clone();
    let label = fields::text(item, "label")
        .or_else(|| fields::text(item, "name"))
        .or_else(|| species.clone())?;
    let confidence = fields::number(item, "confidence")
        .or_else(|| fields::number(item, "score"))
        .unwrap_or(0.0);
    Some(Detection {
        label,
        species,
        confidence,
        taxonomy,
    })
}

#[async_trait]
impl<T: HttpTransport> Provider for ImageRecognitionProvider<T> {
    type Params = ImageUpload;
    type Raw = Value;
    type Item = Detection;

    fn source(&self) -> DataSource {
        DataSource::ImageRecognition
    }

    async fn fetch(&self, image: &ImageUpload) -> Result<Value, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredential {
                provider: DataSource::ImageRecognition,
                variable: API_KEY_VARIABLE,
            })?;
        let file = FilePart {
            field: "file".to_owned(),
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        };
        let request = HttpRequest::post_file(endpoint(&self.config.base_url, &["detect"])?, file)
            .with_header("Authorization", format!("Bearer {api_key}"));
        log::debug!(
            "uploading {} ({} bytes) for recognition",
            image.file_name,
            image.bytes.len()
        );
        Ok(self.transport.send(request).await?.json()?)
    }

    fn normalize(&self, raw: &Value) -> Vec<Detection> {
        detection_list(raw).iter().filter_map(detection).collect()
    }
}
