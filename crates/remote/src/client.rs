//! reqwest implementation of [`RemoteApi`].

use std::io;
use std::path::Path;
use std::time::Duration;

use cloudsync_protocol::constants::{
    API_REQUEST_TIMEOUT, AUTOINIT, DOWNLOAD_USER_AGENT, PCS_BASE_URL, RETRY_ATTEMPTS,
    RTYPE_OVERWRITE, UPLOAD_REQUEST_TIMEOUT, XPAN_BASE_URL,
};
use cloudsync_protocol::messages::encode_block_list;
use cloudsync_protocol::{
    CreateResponse, FileMetasResponse, ListAllResponse, PrecreateResponse, SliceUploadResponse,
    SmallUploadResponse, VendorError,
};
use futures_util::TryStreamExt;
use reqwest::header::USER_AGENT;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use crate::api::{
    ApiFuture, ChunkUpload, CreateRequest, DownloadStream, PrecreateRequest, RemoteApi,
};
use crate::RemoteError;

/// Connection settings for [`XpanClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the metadata endpoints.
    pub xpan_base_url: String,
    /// Base URL of the upload endpoints.
    pub pcs_base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    /// Attempts per request for transport errors and 5xx answers.
    pub retry_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            xpan_base_url: XPAN_BASE_URL.to_string(),
            pcs_base_url: PCS_BASE_URL.to_string(),
            request_timeout: API_REQUEST_TIMEOUT,
            upload_timeout: UPLOAD_REQUEST_TIMEOUT,
            retry_attempts: RETRY_ATTEMPTS,
        }
    }
}

/// Status fields of an error body sent with a non-2xx answer.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errno: Option<i32>,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    error_msg: String,
}

/// xpan open API client.
pub struct XpanClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl XpanClient {
    pub fn new(config: ClientConfig) -> Result<Self, RemoteError> {
        // The read timeout also covers download bodies, which have no
        // overall deadline.
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .read_timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn xpan_url(&self, endpoint: &str) -> String {
        format!("{}/rest/2.0/xpan/{endpoint}", self.config.xpan_base_url)
    }

    fn pcs_url(&self, endpoint: &str) -> String {
        format!("{}/rest/2.0/pcs/{endpoint}", self.config.pcs_base_url)
    }

    /// Sends the request built by `build`, retrying transport failures and
    /// 5xx answers up to the configured number of attempts with no delay.
    async fn send(
        &self,
        op: &'static str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            let err = match build().send().await {
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    RemoteError::Status { status, body }
                }
                Ok(resp) => return Ok(resp),
                Err(e) => RemoteError::Http(e),
            };
            if !err.is_transient() {
                return Err(err);
            }
            warn!(op, attempt, error = %err, "request failed");
            last_err = Some(err);
        }
        Err(last_err.unwrap_or_else(|| RemoteError::Protocol(format!("{op}: no attempt made"))))
    }

    /// Decodes a JSON answer. Error bodies carrying a vendor status become
    /// [`RemoteError::Api`].
    async fn decode<T: DeserializeOwned>(op: &'static str, resp: Response) -> Result<T, RemoteError> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorBody>(&body) {
                if let Some(errno) = err.errno.filter(|n| *n != 0) {
                    return Err(VendorError::new(errno, err.errmsg).into());
                }
                if let Some(code) = err.error_code.filter(|n| *n != 0) {
                    return Err(VendorError::new(code, err.error_msg).into());
                }
            }
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if body.is_empty() {
            return Err(RemoteError::Protocol(format!("{op}: empty response body")));
        }
        debug!(op, bytes = body.len(), "response");
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let resp = self
            .send(op, || {
                self.http
                    .get(url)
                    .query(query)
                    .timeout(self.config.request_timeout)
            })
            .await?;
        Self::decode(op, resp).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        op: &'static str,
        url: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<T, RemoteError> {
        let resp = self
            .send(op, || {
                self.http
                    .post(url)
                    .query(query)
                    .form(form)
                    .timeout(self.config.request_timeout)
            })
            .await?;
        Self::decode(op, resp).await
    }

    /// Posts `data` as the multipart `file` field. The body is rebuilt for
    /// every attempt.
    async fn post_file<T: DeserializeOwned>(
        &self,
        op: &'static str,
        url: &str,
        query: &[(&str, String)],
        data: Vec<u8>,
    ) -> Result<T, RemoteError> {
        let resp = self
            .send(op, || {
                let part = Part::bytes(data.clone()).file_name("file");
                self.http
                    .post(url)
                    .query(query)
                    .multipart(Form::new().part("file", part))
                    .timeout(self.config.upload_timeout)
            })
            .await?;
        Self::decode(op, resp).await
    }
}

impl RemoteApi for XpanClient {
    fn list_all<'a>(
        &'a self,
        token: &'a str,
        path: &'a str,
        cursor: u64,
        limit: u32,
    ) -> ApiFuture<'a, ListAllResponse> {
        Box::pin(async move {
            let query = [
                ("method", "listall".to_string()),
                ("access_token", token.to_string()),
                ("path", path.to_string()),
                ("recursion", "1".to_string()),
                ("start", cursor.to_string()),
                ("limit", limit.to_string()),
            ];
            self.get_json("listall", &self.xpan_url("multimedia"), &query)
                .await
        })
    }

    fn precreate<'a>(
        &'a self,
        token: &'a str,
        request: &'a PrecreateRequest,
    ) -> ApiFuture<'a, PrecreateResponse> {
        Box::pin(async move {
            let query = [
                ("method", "precreate".to_string()),
                ("access_token", token.to_string()),
            ];
            let form = [
                ("path", request.path.clone()),
                ("size", request.size.to_string()),
                ("isdir", "0".to_string()),
                ("autoinit", AUTOINIT.to_string()),
                ("block_list", encode_block_list(&request.block_list)?),
                ("rtype", RTYPE_OVERWRITE.to_string()),
            ];
            self.post_form("precreate", &self.xpan_url("file"), &query, &form)
                .await
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        token: &'a str,
        chunk: &'a ChunkUpload,
    ) -> ApiFuture<'a, SliceUploadResponse> {
        Box::pin(async move {
            let data = tokio::fs::read(&chunk.chunk_path).await?;
            let query = [
                ("method", "upload".to_string()),
                ("access_token", token.to_string()),
                ("type", "tmpfile".to_string()),
                ("path", chunk.path.clone()),
                ("uploadid", chunk.upload_id.clone()),
                ("partseq", chunk.partseq.to_string()),
            ];
            debug!(path = %chunk.path, partseq = chunk.partseq, bytes = data.len(), "uploading chunk");
            self.post_file("superfile2", &self.pcs_url("superfile2"), &query, data)
                .await
        })
    }

    fn create<'a>(
        &'a self,
        token: &'a str,
        request: &'a CreateRequest,
    ) -> ApiFuture<'a, CreateResponse> {
        Box::pin(async move {
            let query = [
                ("method", "create".to_string()),
                ("access_token", token.to_string()),
            ];
            let form = [
                ("path", request.path.clone()),
                ("size", request.size.to_string()),
                ("isdir", "0".to_string()),
                ("uploadid", request.upload_id.clone()),
                ("block_list", encode_block_list(&request.block_list)?),
                ("rtype", RTYPE_OVERWRITE.to_string()),
            ];
            self.post_form("create", &self.xpan_url("file"), &query, &form)
                .await
        })
    }

    fn upload_small<'a>(
        &'a self,
        token: &'a str,
        remote_path: &'a str,
        local_path: &'a Path,
    ) -> ApiFuture<'a, SmallUploadResponse> {
        Box::pin(async move {
            let data = tokio::fs::read(local_path).await?;
            let query = [
                ("method", "upload".to_string()),
                ("ondup", "overwrite".to_string()),
                ("path", remote_path.to_string()),
                ("access_token", token.to_string()),
            ];
            self.post_file("upload", &self.pcs_url("file"), &query, data)
                .await
        })
    }

    fn file_metas<'a>(
        &'a self,
        token: &'a str,
        fs_ids: &'a [u64],
    ) -> ApiFuture<'a, FileMetasResponse> {
        Box::pin(async move {
            let query = [
                ("method", "filemetas".to_string()),
                ("access_token", token.to_string()),
                ("fsids", serde_json::to_string(fs_ids)?),
                ("dlink", "1".to_string()),
            ];
            self.get_json("filemetas", &self.xpan_url("multimedia"), &query)
                .await
        })
    }

    fn open_download<'a>(&'a self, token: &'a str, dlink: &'a str) -> ApiFuture<'a, DownloadStream> {
        Box::pin(async move {
            let mut url = Url::parse(dlink)
                .map_err(|e| RemoteError::Protocol(format!("invalid download link: {e}")))?;
            url.query_pairs_mut().append_pair("access_token", token);

            let resp = self
                .send("download", || {
                    self.http
                        .get(url.clone())
                        .header(USER_AGENT, DOWNLOAD_USER_AGENT)
                })
                .await?;

            let status = resp.status();
            if status != StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(RemoteError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let content_length = resp.content_length();
            let stream = resp.bytes_stream().map_err(io::Error::other);
            Ok(DownloadStream {
                content_length,
                body: Box::pin(StreamReader::new(stream)),
            })
        })
    }
}
