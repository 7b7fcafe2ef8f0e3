//! BirdDog REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::codec::birddog::{BirdDogCodec, BirdDogRequest};
use crate::error::PtzError;
use crate::transport::http::{self, HttpTarget};
use crate::transport::{CodecClient, Link, TransportConfig};

/// BirdDog camera over its REST API.
pub type BirdDogClient = CodecClient<BirdDogCodec, BirdDogLink>;

impl BirdDogClient {
    pub fn connect(
        host: &str,
        port: u16,
        codec: BirdDogCodec,
        config: TransportConfig,
    ) -> Result<Self, PtzError> {
        let target = HttpTarget::new(host, port)?;
        Ok(CodecClient::new(
            format!("BirdDog {host}:{port}"),
            codec,
            BirdDogLink { target },
            config,
        ))
    }
}

pub struct BirdDogLink {
    target: HttpTarget,
}

#[async_trait]
impl Link for BirdDogLink {
    type Frame = BirdDogRequest;
    type Reply = Value;

    /// POST bodies are fire-and-check: only the status matters. GET
    /// replies must be JSON.
    async fn exchange(
        &mut self,
        frame: &BirdDogRequest,
        timeout: Duration,
    ) -> Result<Option<Value>, PtzError> {
        match frame {
            BirdDogRequest::Post { path, body } => {
                http::send(self.target.post(path).json(body), timeout).await?;
                Ok(None)
            }
            BirdDogRequest::Get { path } => {
                let response = http::send(self.target.get(path), timeout).await?;
                let body = http::text(response, timeout).await?;
                serde_json::from_str(&body)
                    .map(Some)
                    .map_err(|e| PtzError::Malformed(format!("{path}: {e}")))
            }
        }
    }
}
