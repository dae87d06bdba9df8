//! Model hub authentication and file access.

use hf_hub::api::sync::{Api, ApiBuilder};
use llmserve_error::{ServeError, ServeErrorKind, ServeResult};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Environment variable holding the hub access token.
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// Hub credentials resolved at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HubAuth {
    token: Option<String>,
}

impl std::fmt::Debug for HubAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubAuth")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl HubAuth {
    /// Credentials from an optional token. Blank tokens count as absent.
    pub fn from_token(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Anonymous access.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether a token is available.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// The access token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Resolve hub credentials from the process environment or a `.env` file.
///
/// A missing token is not an error: hub access continues anonymously.
#[instrument]
pub fn hub_login() -> HubAuth {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env file");
    }

    let auth = HubAuth::from_token(std::env::var(HF_TOKEN_ENV).ok());
    if auth.is_authenticated() {
        info!("Hugging Face token found, using authenticated hub access");
    } else {
        warn!(
            env = HF_TOKEN_ENV,
            "No Hugging Face token found, continuing without login"
        );
    }
    auth
}

/// Blocking client for downloading files from the model hub.
#[derive(Debug, Clone)]
pub struct HubClient {
    api: Api,
}

impl HubClient {
    /// Create a hub client using `auth`.
    pub fn new(auth: &HubAuth) -> ServeResult<Self> {
        let api = ApiBuilder::new()
            .with_token(auth.token().map(str::to_string))
            .build()
            .map_err(|e| {
                ServeError::new(ServeErrorKind::Hub(format!(
                    "Failed to create hub API: {e}"
                )))
            })?;
        Ok(Self { api })
    }

    /// Download (or reuse from cache) `filename` from model repository `repo_id`.
    #[instrument(skip(self))]
    pub fn fetch(&self, repo_id: &str, filename: &str) -> ServeResult<PathBuf> {
        let path = self
            .api
            .model(repo_id.to_string())
            .get(filename)
            .map_err(|e| {
                ServeError::new(ServeErrorKind::Hub(format!(
                    "Failed to download {filename} from {repo_id}: {e}"
                )))
            })?;
        debug!(path = %path.display(), "Hub file available");
        Ok(path)
    }
}
