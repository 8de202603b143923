// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OAuth access tokens for the Cloud DNS API.
//!
//! A [`TokenSource`] either hands out a fixed token supplied at startup, or
//! obtains short-lived tokens from Google and caches each one until shortly
//! before it expires. Refreshing sources are found the way Google's
//! Application Default Credentials are:
//!
//! 1. the JSON credentials file named by `GOOGLE_APPLICATION_CREDENTIALS`
//! 2. the file left by `gcloud auth application-default login`
//! 3. the GCE metadata server
//!
//! A credentials file holds either a service account key, exchanged for a
//! token with a signed JWT assertion, or an `authorized_user` refresh token.

use crate::constants::{
    CLOUD_DNS_SCOPE, CREDENTIALS_ENV_VAR, GOOGLE_TOKEN_URI, JWT_ASSERTION_LIFETIME_SECS,
    METADATA_TOKEN_URL, TOKEN_EXPIRY_SKEW_SECS, WELL_KNOWN_CREDENTIALS_FILE,
};
use crate::errors::ProviderError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as HttpClient, RequestBuilder};
use ring::rand::SystemRandom;
use ring::signature::{RsaKeyPair, RSA_PKCS1_SHA256};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Contents of a Google credentials JSON file.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount {
        client_email: String,
        private_key: String,
        #[serde(default)]
        private_key_id: Option<String>,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        #[serde(default = "default_token_uri")]
        token_uri: String,
    },
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Signs JWT assertions with a service account key.
struct ServiceAccountSigner {
    client_email: String,
    key_id: Option<String>,
    key_pair: RsaKeyPair,
    token_uri: String,
}

impl ServiceAccountSigner {
    fn new(
        client_email: String,
        private_key_pem: &str,
        key_id: Option<String>,
        token_uri: String,
    ) -> Result<Self, ProviderError> {
        let der = pem_to_der(private_key_pem)?;
        let key_pair = RsaKeyPair::from_pkcs8(&der)
            .map_err(|e| ProviderError::Auth(format!("invalid service account key: {e}")))?;

        Ok(Self {
            client_email,
            key_id,
            key_pair,
            token_uri,
        })
    }

    /// Build the RS256 assertion exchanged for an access token.
    fn assertion(&self, issued_at: i64) -> Result<String, ProviderError> {
        let mut header = serde_json::json!({ "alg": "RS256", "typ": "JWT" });
        if let Some(kid) = &self.key_id {
            header["kid"] = serde_json::Value::from(kid.as_str());
        }
        let claims = serde_json::json!({
            "iss": self.client_email,
            "scope": CLOUD_DNS_SCOPE,
            "aud": self.token_uri,
            "iat": issued_at,
            "exp": issued_at + JWT_ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| ProviderError::Auth("failed to sign token assertion".to_string()))?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>, ProviderError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();
    STANDARD
        .decode(body)
        .map_err(|e| ProviderError::Auth(format!("invalid service account key encoding: {e}")))
}

struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
}

/// How a refreshing source obtains a new token.
enum TokenFlow {
    Metadata { url: String },
    ServiceAccount(ServiceAccountSigner),
    AuthorizedUser(AuthorizedUser),
}

// Keys and secrets never reach the logs.
impl fmt::Debug for TokenFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata { url } => f.debug_struct("Metadata").field("url", url).finish(),
            Self::ServiceAccount(signer) => f
                .debug_struct("ServiceAccount")
                .field("client_email", &signer.client_email)
                .finish_non_exhaustive(),
            Self::AuthorizedUser(user) => f
                .debug_struct("AuthorizedUser")
                .field("client_id", &user.client_id)
                .finish_non_exhaustive(),
        }
    }
}

impl TokenFlow {
    fn from_credentials(credentials: CredentialsFile) -> Result<Self, ProviderError> {
        match credentials {
            CredentialsFile::ServiceAccount {
                client_email,
                private_key,
                private_key_id,
                token_uri,
            } => ServiceAccountSigner::new(client_email, &private_key, private_key_id, token_uri)
                .map(Self::ServiceAccount),
            CredentialsFile::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => Ok(Self::AuthorizedUser(AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            })),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Metadata { .. } => "metadata server",
            Self::ServiceAccount(_) => "service account",
            Self::AuthorizedUser(_) => "authorized user",
        }
    }

    async fn fetch(&self, client: &HttpClient) -> Result<TokenResponse, ProviderError> {
        let request = match self {
            Self::Metadata { url } => client.get(url).header("Metadata-Flavor", "Google"),
            Self::ServiceAccount(signer) => {
                let assertion = signer.assertion(chrono::Utc::now().timestamp())?;
                form_post(
                    client,
                    &signer.token_uri,
                    &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                )
            }
            Self::AuthorizedUser(user) => form_post(
                client,
                &user.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", user.refresh_token.as_str()),
                ],
            ),
        };
        request_token(request, self.kind()).await
    }
}

fn form_post(client: &HttpClient, url: &str, fields: &[(&str, &str)]) -> RequestBuilder {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    client
        .post(url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
}

async fn request_token(request: RequestBuilder, kind: &str) -> Result<TokenResponse, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Auth(format!("{kind} token endpoint unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Auth(format!(
            "{kind} token endpoint returned HTTP {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| ProviderError::Auth(format!("invalid {kind} token response: {e}")))
}

#[derive(Debug)]
enum Inner {
    Static(String),
    Refreshing {
        client: HttpClient,
        flow: TokenFlow,
        cache: Mutex<Option<CachedToken>>,
    },
}

/// Source of bearer tokens for provider requests.
#[derive(Debug)]
pub struct TokenSource {
    inner: Inner,
}

impl TokenSource {
    /// Always hand out the given token.
    #[must_use]
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            inner: Inner::Static(token.into()),
        }
    }

    /// Fetch tokens from the GCE metadata server.
    #[must_use]
    pub fn metadata(client: HttpClient) -> Self {
        Self::metadata_at(client, METADATA_TOKEN_URL)
    }

    /// Fetch tokens from a metadata-compatible endpoint at `url`.
    #[must_use]
    pub fn metadata_at(client: HttpClient, url: impl Into<String>) -> Self {
        Self::refreshing(client, TokenFlow::Metadata { url: url.into() })
    }

    /// Exchange the credentials in a Google JSON credentials document for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] if the document is not a service account
    /// key or an `authorized_user` credential, or if its private key is unusable.
    pub fn from_credentials_json(client: HttpClient, json: &str) -> Result<Self, ProviderError> {
        let credentials: CredentialsFile = serde_json::from_str(json)
            .map_err(|e| ProviderError::Auth(format!("unsupported credentials file: {e}")))?;
        let flow = TokenFlow::from_credentials(credentials)?;
        Ok(Self::refreshing(client, flow))
    }

    /// Load a Google JSON credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] if the file cannot be read or holds
    /// unsupported credentials.
    pub async fn from_credentials_file(
        client: HttpClient,
        path: &Path,
    ) -> Result<Self, ProviderError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::Auth(format!("cannot read credentials file {}: {e}", path.display()))
        })?;
        Self::from_credentials_json(client, &json)
    }

    /// Find credentials the way Google's Application Default Credentials do.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] if a credentials file is named or present
    /// but cannot be used. Falling back to the metadata server never fails here.
    pub async fn application_default(client: HttpClient) -> Result<Self, ProviderError> {
        let explicit = std::env::var_os(CREDENTIALS_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        discover(client, explicit, well_known_credentials_path()).await
    }

    fn refreshing(client: HttpClient, flow: TokenFlow) -> Self {
        Self {
            inner: Inner::Refreshing {
                client,
                flow,
                cache: Mutex::new(None),
            },
        }
    }

    /// Return a valid access token, refreshing it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] when the token endpoint cannot be reached or
    /// answers with something other than a token.
    pub async fn token(&self) -> Result<String, ProviderError> {
        match &self.inner {
            Inner::Static(token) => Ok(token.clone()),
            Inner::Refreshing {
                client,
                flow,
                cache,
            } => {
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = flow.fetch(client).await?;
                let lifetime = Duration::from_secs(
                    fresh.expires_in.saturating_sub(TOKEN_EXPIRY_SKEW_SECS),
                );
                debug!(
                    source = flow.kind(),
                    expires_in = fresh.expires_in,
                    "Fetched access token"
                );

                let value = fresh.access_token;
                *cached = Some(CachedToken {
                    value: value.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(value)
            }
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    ///
    /// A fixed token is left alone.
    pub async fn invalidate(&self) {
        if let Inner::Refreshing { cache, .. } = &self.inner {
            cache.lock().await.take();
        }
    }
}

/// `$CLOUDSDK_CONFIG/<file>`, else `$HOME/.config/gcloud/<file>`.
fn well_known_credentials_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("CLOUDSDK_CONFIG")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("gcloud"))
        })?;
    Some(config_dir.join(WELL_KNOWN_CREDENTIALS_FILE))
}

async fn discover(
    client: HttpClient,
    explicit: Option<PathBuf>,
    well_known: Option<PathBuf>,
) -> Result<TokenSource, ProviderError> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "Using credentials file from {CREDENTIALS_ENV_VAR}");
        return TokenSource::from_credentials_file(client, &path).await;
    }

    if let Some(path) = well_known {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "Using gcloud application default credentials");
            return TokenSource::from_credentials_file(client, &path).await;
        }
    }

    info!("No credentials file found, using metadata server access tokens");
    Ok(TokenSource::metadata(client))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
