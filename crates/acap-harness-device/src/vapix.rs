// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! VAPIX HTTP client for the device under test
//!
//! Wraps the handful of device endpoints the harness needs: system readiness,
//! device properties, application list/upload/control, firmware reboot and the
//! application system log.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<(), acap_harness_device::DeviceError> {
//! use std::time::Duration;
//! use acap_harness_device::{AuthScheme, Credentials, DeviceClient};
//!
//! let client = DeviceClient::new(
//!     "192.168.0.90",
//!     Credentials::new("root", "pass"),
//!     AuthScheme::Digest,
//! )?;
//! if client.system_ready(Duration::from_secs(120)).await? {
//!     let log = client.read_app_log("acapruntimetest").await?;
//!     println!("{log}");
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::DeviceError;

/// Systemready API
pub const SYSTEM_READY_PATH: &str = "/axis-cgi/systemready.cgi";
/// Basic device info API
pub const DEVICE_INFO_PATH: &str = "/axis-cgi/basicdeviceinfo.cgi";
/// Installed applications
pub const APP_LIST_PATH: &str = "/axis-cgi/applications/list.cgi";
/// Application package upload
pub const APP_UPLOAD_PATH: &str = "/axis-cgi/applications/upload.cgi";
/// Application start/stop/remove
pub const APP_CONTROL_PATH: &str = "/axis-cgi/applications/control.cgi";
/// Firmware management API
pub const FIRMWARE_PATH: &str = "/axis-cgi/firmwaremanagement.cgi";
/// System log
pub const SYSTEM_LOG_PATH: &str = "/axis-cgi/admin/systemlog.cgi";

/// Timeout the device itself applies to a systemready request, in seconds
const SYSTEM_READY_DEVICE_TIMEOUT: u64 = 20;

/// Per-request timeout for the reboot call
const REBOOT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How requests to the device are authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP Basic authentication
    Basic,
    /// HTTP Digest authentication
    Digest,
}

/// Device account used for every request
#[derive(Clone)]
pub struct Credentials {
    /// Account name
    pub user: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials for `user`
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Envelope of a VAPIX JSON API reply
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    data: Option<T>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SystemReadyData {
    systemready: Option<String>,
    needsetup: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceInfoData {
    #[serde(rename = "propertyList")]
    property_list: Option<Map<String, Value>>,
}

/// Body of a device request
enum RequestBody<'a> {
    Empty,
    Json(&'a Value),
    Package { file_name: String, bytes: Vec<u8> },
}

/// HTTP client bound to one device
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    scheme: AuthScheme,
}

impl DeviceClient {
    /// Create a client for the device at `address`
    ///
    /// `address` is either a bare host (`192.168.0.90`, `cam.local:8080`),
    /// which is reached over plain HTTP, or a full `http://` / `https://` URL.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::InvalidAddress` if the address is not usable, or
    /// `DeviceError::Http` if the HTTP client cannot be built.
    pub fn new(
        address: &str,
        credentials: Credentials,
        scheme: AuthScheme,
    ) -> Result<Self, DeviceError> {
        let base_url = base_url(address)?;
        let http = reqwest::Client::builder().build()?;
        debug!(%base_url, ?scheme, "Created device client");
        Ok(Self {
            http,
            base_url,
            credentials,
            scheme,
        })
    }

    /// Base URL all endpoint paths are appended to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authentication scheme in use
    #[must_use]
    pub fn auth_scheme(&self) -> AuthScheme {
        self.scheme
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Ask the device whether it is up and configured
    ///
    /// Returns `true` only for HTTP 200 with `systemready == "yes"` and
    /// `needsetup == "no"`. A request that times out or cannot connect counts
    /// as "not ready".
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` for transport failures other than timeouts and
    /// refused connections.
    pub async fn system_ready(&self, request_timeout: Duration) -> Result<bool, DeviceError> {
        let body = json!({
            "apiVersion": "1.2",
            "method": "systemready",
            "params": { "timeout": SYSTEM_READY_DEVICE_TIMEOUT }
        });
        let response = match self
            .send(
                Method::POST,
                SYSTEM_READY_PATH,
                RequestBody::Json(&body),
                Some(request_timeout),
            )
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "Device did not respond to systemready");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "systemready not OK");
            return Ok(false);
        }
        let text = response.text().await?;
        let Ok(reply) = serde_json::from_str::<ApiReply<SystemReadyData>>(&text) else {
            debug!("systemready reply is not a JSON API reply");
            return Ok(false);
        };
        Ok(reply.data.is_some_and(|data| {
            data.systemready.as_deref() == Some("yes") && data.needsetup.as_deref() == Some("no")
        }))
    }

    /// Fetch the device property list (model, architecture, firmware, ...)
    ///
    /// Returns `None` if the device reports an error or omits the list.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the request cannot be made or the reply is not
    /// JSON.
    pub async fn device_info(&self) -> Result<Option<Map<String, Value>>, DeviceError> {
        let body = json!({ "apiVersion": "1.0", "method": "getAllProperties" });
        let response = self
            .send(Method::POST, DEVICE_INFO_PATH, RequestBody::Json(&body), None)
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(None);
        }
        let reply: ApiReply<DeviceInfoData> = serde_json::from_str(&response.text().await?)?;
        if reply.error.is_some() {
            return Ok(None);
        }
        Ok(reply.data.and_then(|data| data.property_list))
    }

    /// Check whether `app_name` shows up in the installed application list
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the request cannot be made.
    pub async fn is_app_installed(&self, app_name: &str) -> Result<bool, DeviceError> {
        let response = self
            .send(Method::POST, APP_LIST_PATH, RequestBody::Empty, None)
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(false);
        }
        Ok(response.text().await?.contains(app_name))
    }

    /// Ask the device to reboot
    ///
    /// Returns `true` if the device accepted the request.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the request cannot be made or the reply is not
    /// JSON.
    pub async fn reboot(&self) -> Result<bool, DeviceError> {
        let body = json!({ "apiVersion": "1.4", "method": "reboot" });
        let response = self
            .send(
                Method::POST,
                FIRMWARE_PATH,
                RequestBody::Json(&body),
                Some(REBOOT_REQUEST_TIMEOUT),
            )
            .await?;
        if response.status() != StatusCode::OK {
            return Ok(false);
        }
        let reply: ApiReply<Value> = serde_json::from_str(&response.text().await?)?;
        Ok(reply.error.is_none())
    }

    /// Read the part of the system log written by `app_name`
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::UnexpectedStatus` if the device does not answer
    /// with HTTP 200, or another `DeviceError` if the request fails.
    pub async fn read_app_log(&self, app_name: &str) -> Result<String, DeviceError> {
        let path = format!("{SYSTEM_LOG_PATH}?appname={app_name}");
        let response = self
            .send(Method::GET, &path, RequestBody::Empty, None)
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeviceError::UnexpectedStatus {
                endpoint: SYSTEM_LOG_PATH.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Upload an application package (`.eap`) to the device
    ///
    /// Returns `true` if the device accepted the package.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Io` if the package cannot be read, or another
    /// `DeviceError` if the request fails.
    pub async fn upload_package(&self, package: &Path) -> Result<bool, DeviceError> {
        let bytes = tokio::fs::read(package)
            .await
            .map_err(|source| DeviceError::Io {
                path: package.to_path_buf(),
                source,
            })?;
        let file_name = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.eap".to_string());
        debug!(package = %package.display(), size = bytes.len(), "Uploading package");

        let response = self
            .send(
                Method::POST,
                APP_UPLOAD_PATH,
                RequestBody::Package { file_name, bytes },
                None,
            )
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %text, "Package upload rejected");
            return Ok(false);
        }
        Ok(true)
    }

    /// Start, stop or remove an installed application
    ///
    /// Returns `true` if the device accepted the request.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the request cannot be made.
    pub async fn control_app(&self, action: &str, app_name: &str) -> Result<bool, DeviceError> {
        let path = format!("{APP_CONTROL_PATH}?action={action}&package={app_name}");
        let response = self
            .send(Method::POST, &path, RequestBody::Empty, None)
            .await?;
        if response.status() != StatusCode::OK {
            warn!(status = %response.status(), action, "Application control rejected");
            return Ok(false);
        }
        Ok(true)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn request(
        &self,
        method: &Method,
        url: &str,
        body: &RequestBody<'_>,
        timeout: Option<Duration>,
    ) -> RequestBuilder {
        let mut builder = self.http.request(method.clone(), url);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Package { file_name, bytes } => {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                builder.multipart(Form::new().part("file", part))
            }
        }
    }

    /// Send a request, answering a digest challenge if the scheme requires it
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody<'_>,
        timeout: Option<Duration>,
    ) -> Result<Response, DeviceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Device request");

        match self.scheme {
            AuthScheme::Basic => Ok(self
                .request(&method, &url, &body, timeout)
                .basic_auth(&self.credentials.user, Some(&self.credentials.password))
                .send()
                .await?),
            AuthScheme::Digest => {
                let first = self.request(&method, &url, &body, timeout).send().await?;
                if first.status() != StatusCode::UNAUTHORIZED {
                    return Ok(first);
                }
                let Some(challenge) = first
                    .headers()
                    .get(WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned)
                else {
                    return Ok(first);
                };

                let authorization = self.answer_challenge(&challenge, &method, path, &body)?;
                Ok(self
                    .request(&method, &url, &body, timeout)
                    .header(AUTHORIZATION, authorization)
                    .send()
                    .await?)
            }
        }
    }

    fn answer_challenge(
        &self,
        challenge: &str,
        method: &Method,
        path: &str,
        body: &RequestBody<'_>,
    ) -> Result<String, DeviceError> {
        let mut prompt =
            digest_auth::parse(challenge).map_err(|e| DeviceError::DigestAuth(e.to_string()))?;
        let user = self.credentials.user.as_str();
        let password = self.credentials.password.as_str();

        let context = if *method == Method::POST {
            let payload = match body {
                RequestBody::Json(value) => Some(serde_json::to_vec(value)?),
                RequestBody::Empty | RequestBody::Package { .. } => None,
            };
            digest_auth::AuthContext::new_post(user, password, path, payload)
        } else {
            digest_auth::AuthContext::new(user, password, path)
        };

        let answer = prompt
            .respond(&context)
            .map_err(|e| DeviceError::DigestAuth(e.to_string()))?;
        Ok(answer.to_header_string())
    }
}

/// Turn a configured device address into a base URL without trailing slash
fn base_url(address: &str) -> Result<String, DeviceError> {
    let address = address.trim();
    let candidate = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    let url = Url::parse(&candidate).map_err(|_| DeviceError::InvalidAddress {
        address: address.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DeviceError::InvalidAddress {
            address: address.to_string(),
        });
    }
    Ok(candidate.trim_end_matches('/').to_string())
}
