use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::Provider;
use crate::context::Context;

const DEFAULT_ENDPOINT: &str = "https://kms.us-east-1.amazonaws.com";

/// Remote KMS provider speaking the AWS KMS JSON protocol
/// (`TrentService.Encrypt` / `TrentService.Decrypt`).
///
/// Request signing is left to a fronting proxy; this type only
/// shapes the calls.
pub struct CloudKmsProvider {
    key_id: String,
    endpoint: Option<String>,
}

#[derive(Serialize)]
struct EncryptRequest<'a> {
    #[serde(rename = "KeyId")]
    key_id: &'a str,
    #[serde(rename = "Plaintext")]
    plaintext: String,
}

#[derive(Deserialize)]
struct EncryptResponse {
    #[serde(rename = "CiphertextBlob")]
    ciphertext_blob: String,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    #[serde(rename = "KeyId")]
    key_id: &'a str,
    #[serde(rename = "CiphertextBlob")]
    ciphertext_blob: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(rename = "Plaintext")]
    plaintext: String,
}

impl CloudKmsProvider {
    pub fn new(key_id: String, endpoint: Option<String>) -> Self {
        Self { key_id, endpoint }
    }

    fn base_url(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    fn call(
        &self,
        ctx: &Context,
        target: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<ureq::Response> {
        ctx.check()?;
        let mut req = ureq::post(self.base_url())
            .set("X-Amz-Target", target)
            .set("Content-Type", "application/x-amz-json-1.1");
        if let Some(remaining) = ctx.remaining() {
            req = req.timeout(remaining);
        }
        Ok(req.send_json(body)?)
    }
}

impl Provider for CloudKmsProvider {
    fn encrypt(&self, ctx: &Context, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let body = EncryptRequest {
            key_id: &self.key_id,
            plaintext: STANDARD.encode(plaintext),
        };
        let resp: EncryptResponse = self
            .call(ctx, "TrentService.Encrypt", serde_json::to_value(&body)?)?
            .into_json()?;
        Ok(STANDARD.decode(resp.ciphertext_blob)?)
    }

    fn decrypt(&self, ctx: &Context, ciphertext: &[u8]) -> anyhow::Result<Vec<u8>> {
        let body = DecryptRequest {
            key_id: &self.key_id,
            ciphertext_blob: STANDARD.encode(ciphertext),
        };
        let resp: DecryptResponse = self
            .call(ctx, "TrentService.Decrypt", serde_json::to_value(&body)?)?
            .into_json()?;
        Ok(STANDARD.decode(resp.plaintext)?)
    }
}
