use crate::error::{ApiError, Result};
use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const HUGGINGFACE_API_BASE: &str = "https://api-inference.huggingface.co/models";
/// Fast model for comparing short place names.
const NAME_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// Multilingual model for preference descriptions.
const SEMANTIC_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

pub const EMBEDDING_DIM: usize = 384;

/// Text-to-vector seam of the ranking pipeline.
///
/// Both operations are infallible by contract: an embedding failure
/// degrades to a zero vector so one bad candidate never aborts a whole
/// ranking batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds place-name text with the fast name model.
    async fn embed_name(&self, text: &str) -> Vec<f32>;

    /// Embeds preference phrases or free text with the multilingual
    /// semantic model. Multiple phrases are joined before encoding.
    async fn embed_semantic(&self, texts: &[String]) -> Vec<f32>;
}

/// Cosine similarity of two embedding vectors, remapped from [-1, 1] to
/// [0, 1]. Degenerate input (zero vector, missing or mismatched
/// dimensions) is treated as a zero cosine and scores the neutral
/// midpoint 0.5, so a fallback embedding degrades a candidate instead of
/// disqualifying it.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    const NEUTRAL: f32 = 0.5;

    if a.len() != b.len() || a.is_empty() {
        return NEUTRAL;
    }

    let va = Array1::from_vec(a.to_vec());
    let vb = Array1::from_vec(b.to_vec());
    let norm = f32::sqrt(va.dot(&va)) * f32::sqrt(vb.dot(&vb));
    if norm == 0.0 {
        return NEUTRAL;
    }

    let cosine = va.dot(&vb) / norm;
    (cosine + 1.0) / 2.0
}

#[derive(Debug, Serialize)]
struct EncodeRequest {
    inputs: Vec<String>,
    options: EncodeOptions,
}

#[derive(Debug, Serialize)]
struct EncodeOptions {
    wait_for_model: bool,
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse(Vec<Vec<f32>>);

/// Embedding service backed by the HuggingFace inference API.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    client: Client,
    api_key: String,
}

impl RemoteEmbedder {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    async fn encode(&self, model: &str, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let request = EncodeRequest {
            inputs: texts,
            options: EncodeOptions {
                wait_for_model: true,
                use_cache: true,
            },
        };

        debug!("Encoding {} text(s) with {}", request.inputs.len(), model);
        let url = format!("{}/{}", HUGGINGFACE_API_BASE, model);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalServiceError(format!("Embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Embedding API error: {}",
                error_text
            )));
        }

        let embeddings: EncodeResponse = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(embeddings.0)
    }

    async fn encode_one_or_zero(&self, model: &str, text: String) -> Vec<f32> {
        match self.encode(model, vec![text]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => {
                error!("Embedding API returned an empty batch");
                vec![0.0; EMBEDDING_DIM]
            }
            Err(e) => {
                error!("Embedding failed, degrading to zero vector: {}", e);
                vec![0.0; EMBEDDING_DIM]
            }
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed_name(&self, text: &str) -> Vec<f32> {
        self.encode_one_or_zero(NAME_MODEL, text.to_string()).await
    }

    async fn embed_semantic(&self, texts: &[String]) -> Vec<f32> {
        self.encode_one_or_zero(SEMANTIC_MODEL, texts.join(". "))
            .await
    }
}
