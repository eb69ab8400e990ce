//! ============================================================================
//! Image Generator - Card art via the Grok image API
//! ============================================================================
//! Requests one image per draw and embeds it as a data URL. Names and
//! flavour text are composed locally. Any API problem is an error; no
//! placeholder item is ever produced.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::compose::compose_descriptor;
use super::GenerationProvider;
use crate::catalog::CatalogSlot;
use crate::config::{DEFAULT_IMAGE_ENDPOINT, DEFAULT_IMAGE_MODEL};
use crate::types::{ItemDescriptor, Rarity};

/// Remote image provider
pub struct ImageGenerator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl ImageGenerator {
    /// Create a generator against the default Grok endpoint
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, DEFAULT_IMAGE_ENDPOINT.to_string(), DEFAULT_IMAGE_MODEL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model,
        }
    }

    /// Request one image and return its base64 payload
    async fn request_image(&self, prompt: &str) -> Result<String> {
        let request = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            response_format: "b64_json".to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call image API: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Image API error {}: {}", status, body));
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse image response: {}", e))?;

        let b64 = image_response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| anyhow!("No image data in response"))?;

        validate_image_payload(&b64)?;
        Ok(b64)
    }
}

#[async_trait]
impl GenerationProvider for ImageGenerator {
    async fn generate(&self, rarity: Rarity, slot: &CatalogSlot) -> Result<ItemDescriptor> {
        info!("Generating {} card for {}", rarity, slot.slot_id);

        let b64 = self.request_image(&build_prompt(rarity, slot)).await?;
        let image_ref = format!("data:image/png;base64,{}", b64);

        let mut rng = rand::thread_rng();
        Ok(compose_descriptor(&mut rng, rarity, slot, image_ref))
    }
}

/// Decode the payload once to reject empty or corrupt images early
fn validate_image_payload(b64: &str) -> Result<()> {
    let bytes = STANDARD
        .decode(b64)
        .map_err(|e| anyhow!("Failed to decode base64 image: {}", e))?;
    if bytes.is_empty() {
        return Err(anyhow!("Image API returned an empty image"));
    }
    info!("Image generated: {} bytes", bytes.len());
    Ok(())
}

fn rarity_details(rarity: Rarity) -> &'static str {
    match rarity {
        Rarity::Common => "simple design, cute, everyday, pastel colors",
        Rarity::Rare => "frilly edges, small ribbons, cute pattern, soft texture, more detailed",
        Rarity::Epic => "elaborate lace, big satin ribbons, glowing aura, intricate embroidery, magical girl vibe",
        Rarity::Legendary => "masterpiece, jeweled accents, angel wing motif, sparkling particles, holy glow, cinematic lighting",
    }
}

fn build_prompt(rarity: Rarity, slot: &CatalogSlot) -> String {
    let subject = slot.blurb.as_deref().unwrap_or(&slot.display_name);
    format!(
        "A single cute collectible, flat lay product shot, no characters. \
         High quality anime art in soft pastel colors. Theme: {}. Details: {}. \
         Dreamy abstract background suitable for a game card. No text.",
        subject,
        rarity_details(rarity)
    )
}

// ============================================================================
// Grok Image API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    response_format: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_validate_payload() {
        assert!(validate_image_payload(&STANDARD.encode([137u8, 80, 78, 71])).is_ok());
        assert!(validate_image_payload("").is_err());
        assert!(validate_image_payload("not base64!!").is_err());
    }

    #[test]
    fn test_prompt_mentions_theme_and_tier() {
        let slot = Catalog::builtin().get("unicorn").unwrap();
        let prompt = build_prompt(Rarity::Epic, slot);
        assert!(prompt.contains("Unicorn"));
        assert!(prompt.contains("magical girl"));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"data":[{"b64_json":"aGVsbG8=","url":null}]}"#;
        let parsed: ImageResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].b64_json.as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let generator = ImageGenerator::with_endpoint(
            "key".to_string(),
            "http://127.0.0.1:9/images".to_string(),
            "model".to_string(),
        );
        let slot = Catalog::builtin().get("cloud").unwrap();
        assert!(generator.generate(Rarity::Common, slot).await.is_err());
    }
}
