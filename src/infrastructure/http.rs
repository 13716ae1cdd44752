use crate::domain::ports::{ObjectStore, RateSource, RemittanceBackend, SettingsStore};
use crate::domain::rates::RateQuote;
use crate::domain::remittance::{
    ReceiptFile, RejectionCode, RemittanceReceipt, RemittanceRequest, Session,
};
use crate::domain::settings::SettingEntry;
use crate::error::{RemitError, Result};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the remittance API. Older deployments only send
/// `error`; newer ones send `code` and `message`.
#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "publicUrl")]
    public_url: String,
}

/// Client for the remittance HTTP API, implementing every remote port.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| RemitError::ValidationError(format!("invalid base_url: {err}")))?;
        // `join` drops the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url, http })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| RemitError::ValidationError(format!("invalid endpoint {path}: {err}")))
    }

    async fn error_from(res: reqwest::Response) -> RemitError {
        let status = res.status();
        let body = res.json::<ErrorResponse>().await.unwrap_or_default();
        error_from_parts(status, body)
    }
}

fn error_from_parts(status: StatusCode, body: ErrorResponse) -> RemitError {
    let message = body
        .message
        .or(body.error)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    match status.as_u16() {
        401 | 403 => RemitError::NoSession,
        400 | 409 | 422 => RemitError::Rejected {
            code: RejectionCode::classify(body.code.as_deref(), &message),
            message,
        },
        _ => RemitError::NetworkError(message),
    }
}

#[async_trait]
impl RateSource for HttpApi {
    async fn fetch_rates(&self, bypass_cache: bool) -> Result<Vec<RateQuote>> {
        let mut req = self.http.get(self.endpoint("rates")?);
        if bypass_cache {
            req = req.header(CACHE_CONTROL, "no-cache");
        }
        let res = req.send().await?;
        if res.status().is_success() {
            return Ok(res.json::<Vec<RateQuote>>().await?);
        }
        Err(Self::error_from(res).await)
    }
}

#[async_trait]
impl SettingsStore for HttpApi {
    async fn fetch_settings(&self) -> Result<Vec<SettingEntry>> {
        let res = self.http.get(self.endpoint("settings")?).send().await?;
        if res.status().is_success() {
            return Ok(res.json::<Vec<SettingEntry>>().await?);
        }
        Err(Self::error_from(res).await)
    }
}

#[async_trait]
impl ObjectStore for HttpApi {
    async fn upload(&self, file: &ReceiptFile, session: &Session) -> Result<String> {
        let res = self
            .http
            .post(self.endpoint("receipts")?)
            .bearer_auth(&session.access_token)
            .header(CONTENT_TYPE, file.content_type.as_str())
            .header("X-File-Name", file.file_name.as_str())
            .body(file.bytes.clone())
            .send()
            .await?;
        if res.status().is_success() {
            return Ok(res.json::<UploadResponse>().await?.public_url);
        }
        Err(Self::error_from(res).await)
    }
}

#[async_trait]
impl RemittanceBackend for HttpApi {
    async fn send(
        &self,
        request: &RemittanceRequest,
        session: &Session,
    ) -> Result<RemittanceReceipt> {
        let res = self
            .http
            .post(self.endpoint("remittances/send")?)
            .bearer_auth(&session.access_token)
            .header("Idempotency-Key", request.idempotency_key.to_string())
            .json(request)
            .send()
            .await?;
        if res.status().is_success() {
            return Ok(res.json::<RemittanceReceipt>().await?);
        }
        Err(Self::error_from(res).await)
    }
}
