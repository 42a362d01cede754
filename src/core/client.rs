use crate::domain::model::{Ack, Brightness, RegisterValue, RgbColor, StatusLed};
use crate::domain::ports::DeviceApi;
use crate::utils::error::{DeviceError, Result};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const OCTET_STREAM: &str = "application/octet-stream";

/// Typed client for one IcedEspresso board.
#[derive(Debug, Clone)]
pub struct IcedEspresso {
    base_url: Url,
    client: Client,
}

impl IcedEspresso {
    /// `host` is either a bare host (`192.168.178.90`, `cm2.local:8080`) or a full base URL.
    pub fn new(host: &str) -> Result<Self> {
        Self::with_timeout(host, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url_for(host)?,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("{} -> {}", path, status);

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self.send(path, self.client.get(url).query(query)).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| DeviceError::ResponseError {
            endpoint: path.to_string(),
            message: format!("{} (body: {})", e, String::from_utf8_lossy(&body)),
        })
    }

    async fn put_typed<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &T,
    ) -> Result<()> {
        let url = self.endpoint(path)?;
        let response = self
            .send(path, self.client.put(url).query(query).json(body))
            .await?;
        log_ack(path, response).await;
        Ok(())
    }

    async fn put_binary(&self, path: &str, query: &[(&str, String)], data: &[u8]) -> Result<()> {
        tracing::debug!("PUT {} ({} bytes)", path, data.len());
        let url = self.endpoint(path)?;
        let request = self
            .client
            .put(url)
            .query(query)
            .header(header::CONTENT_TYPE, OCTET_STREAM)
            .body(data.to_vec());
        let response = self.send(path, request).await?;
        log_ack(path, response).await;
        Ok(())
    }
}

fn base_url_for(host: &str) -> Result<Url> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(DeviceError::InvalidInput {
            message: "device host cannot be empty".to_string(),
        });
    }

    let mut raw = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    if !raw.ends_with('/') {
        raw.push('/');
    }

    Ok(Url::parse(&raw)?)
}

async fn log_ack(path: &str, response: Response) {
    // The firmware acks with a small JSON object; a 200 is all that matters.
    match response.json::<Ack>().await {
        Ok(ack) => tracing::debug!("{} ack: code={} message={}", path, ack.code, ack.message),
        Err(_) => tracing::debug!("{} ack without JSON body", path),
    }
}

#[async_trait::async_trait]
impl DeviceApi for IcedEspresso {
    async fn status_led_get(&self) -> Result<bool> {
        let led: StatusLed = self.get_typed("status_led", &[]).await?;
        Ok(led.state)
    }

    async fn status_led_put(&self, state: bool) -> Result<()> {
        self.put_typed("status_led", &[], &StatusLed { state }).await
    }

    async fn rgb_led_get(&self) -> Result<RgbColor> {
        self.get_typed("rgb_led", &[]).await
    }

    async fn rgb_led_put(&self, color: RgbColor) -> Result<()> {
        self.put_typed("rgb_led", &[], &color).await
    }

    async fn brightness_get(&self) -> Result<f64> {
        let level: Brightness = self.get_typed("brightness", &[]).await?;
        Ok(level.brightness)
    }

    async fn brightness_put(&self, brightness: f64) -> Result<()> {
        self.put_typed("brightness", &[], &Brightness { brightness })
            .await
    }

    async fn register_get(&self, address: u16) -> Result<u16> {
        let register: RegisterValue = self
            .get_typed("fpga/register", &[("address", address.to_string())])
            .await?;
        Ok(register.value)
    }

    async fn register_put(&self, address: u16, value: u16) -> Result<()> {
        tracing::debug!("register put, address:0x{:04x} value:0x{:04x}", address, value);
        self.put_typed(
            "fpga/register",
            &[("address", address.to_string())],
            &RegisterValue { value },
        )
        .await
    }

    async fn memory_get(&self, address: u16, length: u16) -> Result<Vec<u8>> {
        let query = [
            ("address", address.to_string()),
            ("length", length.to_string()),
        ];
        let data = self.get_bytes("fpga/memory", &query).await?;

        if data.len() != usize::from(length) {
            tracing::warn!(
                "memory read at 0x{:04x} asked for {} bytes, device sent {}",
                address,
                length,
                data.len()
            );
        }

        Ok(data)
    }

    async fn memory_put(&self, address: u16, data: &[u8]) -> Result<()> {
        self.put_binary("fpga/memory", &[("address", address.to_string())], data)
            .await
    }

    async fn fpga_bitstream_put(&self, bitstream: &[u8]) -> Result<()> {
        self.put_binary("fpga/bitstream", &[], bitstream).await
    }

    async fn bitmap_put(&self, bitmap: &[u8]) -> Result<()> {
        self.put_binary("bitmap", &[], bitmap).await
    }

    async fn dmx_put(&self, channels: &[u8]) -> Result<()> {
        self.put_binary("dmx", &[], channels).await
    }

    async fn ota(&self, image: &[u8]) -> Result<()> {
        tracing::info!("Uploading firmware image ({} bytes)", image.len());
        self.put_binary("ota", &[], image).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        self.get_typed(path, query).await
    }

    async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let url = self.endpoint(path)?;
        let response = self.send(path, self.client.get(url).query(query)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn put_bytes(&self, path: &str, query: &[(&str, String)], data: &[u8]) -> Result<()> {
        self.put_binary(path, query, data).await
    }

    async fn put_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        match body {
            Some(body) => self.put_typed(path, query, &body).await,
            None => {
                let url = self.endpoint(path)?;
                let response = self.send(path, self.client.put(url).query(query)).await?;
                log_ack(path, response).await;
                Ok(())
            }
        }
    }
}
