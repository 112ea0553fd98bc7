//! Outbound RPC to a worker node: version listing and signed job
//! execution (SPEC_FULL.md §6.2). Stateless; every call here runs in a
//! background task spawned off the event loop, never on the loop itself.

use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::types::{RunRequest, RunResponse, Version, WorkerAddr};

/// The worker-facing RPC surface. `None` stands for "any failure" —
/// timeout, transport error, or signature mismatch — so the event loop
/// never has to distinguish failure modes (SPEC_FULL.md §6.2).
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn get_versions(&self, addr: &WorkerAddr) -> Option<Vec<Version>>;

    async fn run_job(
        &self,
        secret_key: &SigningKey,
        addr: &WorkerAddr,
        request: &RunRequest,
    ) -> Option<RunResponse>;
}

#[derive(Serialize)]
struct SignedEnvelope<'a> {
    payload: &'a serde_json::Value,
    signature: String,
}

#[derive(Deserialize)]
struct VersionsPayload {
    versions: Vec<String>,
}

/// Production `WorkerClient`: JSON over HTTPS via `reqwest`, with requests
/// signed by the pool's secret key and responses verified against the
/// target worker's advertised public key.
pub struct HttpWorkerClient {
    http: reqwest::Client,
}

impl HttpWorkerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client builder should not fail with static config"),
        }
    }

    fn sign(secret_key: &SigningKey, payload: &serde_json::Value) -> SignedEnvelope<'_> {
        let bytes = serde_json::to_vec(payload).expect("payload is always serializable JSON");
        let signature = secret_key.sign(&bytes);
        SignedEnvelope {
            payload,
            signature: hex::encode(signature.to_bytes()),
        }
    }

    fn verify(pubkey: &[u8; 32], body: &[u8], signature_hex: &str) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(pubkey) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_array);
        verifying_key.verify(body, &signature).is_ok()
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn get_versions(&self, addr: &WorkerAddr) -> Option<Vec<Version>> {
        let url = format!("https://{}/versions", addr.host);
        let resp = self.http.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            tracing::warn!(host = %addr.host, status = %resp.status(), "worker rejected version listing");
            return None;
        }
        let payload: VersionsPayload = resp.json().await.ok()?;
        Some(payload.versions.into_iter().map(Version::from).collect())
    }

    async fn run_job(
        &self,
        secret_key: &SigningKey,
        addr: &WorkerAddr,
        request: &RunRequest,
    ) -> Option<RunResponse> {
        let url = format!("https://{}/run", addr.host);
        let payload = serde_json::to_value(request).ok()?;
        let envelope = Self::sign(secret_key, &payload);

        let resp = self.http.post(&url).json(&envelope).send().await.ok()?;
        if !resp.status().is_success() {
            tracing::warn!(host = %addr.host, status = %resp.status(), "worker run request failed");
            return None;
        }

        let body = resp.bytes().await.ok()?;
        let signed: serde_json::Value = serde_json::from_slice(&body).ok()?;
        let signature = signed.get("signature")?.as_str()?;
        let payload = signed.get("payload")?;
        let payload_bytes = serde_json::to_vec(payload).ok()?;

        if !Self::verify(&addr.pubkey, &payload_bytes, signature) {
            tracing::warn!(host = %addr.host, "worker response failed signature verification");
            return None;
        }

        serde_json::from_value(payload.clone()).ok()
    }
}
