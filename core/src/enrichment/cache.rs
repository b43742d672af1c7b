//! Content-addressed response cache.
//!
//! Keyed by SHA-256 over the model name, prompt and image bytes, so two
//! requests with identical content share one external call. Only
//! validated payloads are stored; failures are never cached.

use super::{payload::EnrichmentPayload, GenerationRequest};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, EnrichmentPayload>>,
    hits: AtomicUsize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex digest identifying the request content.
    pub fn key_for(model: &str, request: &GenerationRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.prompt.as_bytes());
        if let Some(image) = &request.image {
            hasher.update([1u8]);
            hasher.update(image.mime_type.as_bytes());
            hasher.update(&image.bytes);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<EnrichmentPayload> {
        let found = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: String, payload: EnrichmentPayload) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, payload);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ImageAttachment;

    fn request(prompt: &str, image: Option<&[u8]>) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            image: image.map(|b| ImageAttachment { mime_type: "image/jpeg".into(), bytes: b.to_vec() }),
        }
    }

    #[test]
    fn identical_content_same_key() {
        let a = ResponseCache::key_for("m", &request("hello", Some(b"img")));
        let b = ResponseCache::key_for("m", &request("hello", Some(b"img")));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn any_content_change_changes_key() {
        let base = ResponseCache::key_for("m", &request("hello", Some(b"img")));
        assert_ne!(base, ResponseCache::key_for("m", &request("hello!", Some(b"img"))));
        assert_ne!(base, ResponseCache::key_for("m", &request("hello", Some(b"img2"))));
        assert_ne!(base, ResponseCache::key_for("m", &request("hello", None)));
        assert_ne!(base, ResponseCache::key_for("other", &request("hello", Some(b"img"))));
    }
}
