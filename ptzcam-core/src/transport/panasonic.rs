//! Panasonic AW CGI client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::codec::panasonic::{AwFrame, PanasonicCodec};
use crate::error::PtzError;
use crate::transport::http::{self, HttpTarget};
use crate::transport::{CodecClient, Link, TransportConfig};

const CGI_PATH: &str = "cgi-bin/aw_ptz";

/// Panasonic AW camera over HTTP.
pub type PanasonicClient = CodecClient<PanasonicCodec, PanasonicLink>;

impl PanasonicClient {
    pub fn connect(
        host: &str,
        port: u16,
        credentials: Option<(String, Option<String>)>,
        config: TransportConfig,
    ) -> Result<Self, PtzError> {
        let mut target = HttpTarget::new(host, port)?;
        if let Some((user, password)) = credentials {
            target = target.with_basic_auth(user, password);
        }
        Ok(CodecClient::new(
            format!("Panasonic {host}:{port}"),
            PanasonicCodec::new(config.nudge),
            PanasonicLink { target },
            config,
        ))
    }
}

pub struct PanasonicLink {
    target: HttpTarget,
}

#[async_trait]
impl Link for PanasonicLink {
    type Frame = AwFrame;
    type Reply = String;

    async fn exchange(
        &mut self,
        frame: &AwFrame,
        timeout: Duration,
    ) -> Result<Option<String>, PtzError> {
        let command = match frame {
            AwFrame::Wait(pause) => {
                tokio::time::sleep(*pause).await;
                return Ok(None);
            }
            AwFrame::Command(command) => command,
        };
        let request = self
            .target
            .get(CGI_PATH)
            .query(&[("cmd", format!("#{command}").as_str()), ("res", "1")]);
        let response = http::send(request, timeout).await?;
        let body = http::text(response, timeout).await?;
        trace!("#{command} -> {body:?}");
        // `er1`..`er3`: busy, unsupported, out of range.
        if let Some(code) = body.trim().strip_prefix("er") {
            let code = code.parse::<u8>().unwrap_or(0);
            return Err(PtzError::Rejected(code));
        }
        Ok(Some(body))
    }
}
