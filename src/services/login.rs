//! Login race client: claims a displayed ticket on behalf of a stored account.
//!
//! The claim is a three step exchange against the remote login service:
//! 1. `POST /{biz}/combo/panda/qrcode/scan` marks the ticket as scanned by our device
//! 2. `GET /auth/api/getGameToken` trades the account cookie for a short-lived game token
//! 3. `POST /{biz}/combo/panda/qrcode/confirm` confirms the login with that token
//!
//! Every failure, application-level or transport-level, is flattened into an
//! [`Outcome`]; callers never see an error type.

use crate::models::{Account, ApiSettings, GameId};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Capability: race a claim for `ticket`.
///
/// Blocking; the engine calls it off its scheduling thread.
#[cfg_attr(test, mockall::automock)]
pub trait LoginClient: Send + Sync {
    fn attempt(&self, ticket: &str, game: GameId, account: &Account) -> Outcome;
}

/// Step of the claim sequence, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStep {
    Scan,
    GameToken,
    Confirm,
}

impl fmt::Display for ClaimStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimStep::Scan => "scan",
            ClaimStep::GameToken => "get game token",
            ClaimStep::Confirm => "confirm",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{step} failed: {message} (retcode {retcode})")]
    Rejected {
        step: ClaimStep,
        retcode: i64,
        message: String,
    },

    #[error("{step} returned an unexpected response: {detail}")]
    Malformed { step: ClaimStep, detail: String },
}

/// Envelope shared by every endpoint of the login service.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    retcode: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl ApiResponse {
    fn ensure_ok(self, step: ClaimStep) -> Result<Self, LoginError> {
        if self.retcode == 0 {
            Ok(self)
        } else {
            let message = if self.message.is_empty() {
                "unknown error".to_string()
            } else {
                self.message
            };
            Err(LoginError::Rejected {
                step,
                retcode: self.retcode,
                message,
            })
        }
    }
}

/// HTTP implementation of [`LoginClient`].
pub struct MihoyoLoginClient {
    http: Client,
    sdk_base_url: String,
    takumi_base_url: String,
}

impl MihoyoLoginClient {
    /// Create a client from the `api` section of the settings.
    ///
    /// System proxies are ignored; ticket claims go direct.
    pub fn new(api: &ApiSettings) -> Result<Self, LoginError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-rpc-client_type", HeaderValue::from_static("2"));
        if let Ok(version) = HeaderValue::from_str(&api.app_version) {
            headers.insert("x-rpc-app_version", version);
        } else {
            tracing::warn!("Ignoring invalid app version header: {}", api.app_version);
        }

        let http = Client::builder()
            .user_agent(api.user_agent.clone())
            .default_headers(headers)
            .timeout(api.request_timeout())
            .no_proxy()
            .build()?;

        Ok(Self {
            http,
            sdk_base_url: api.sdk_base_url.trim_end_matches('/').to_string(),
            takumi_base_url: api.takumi_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn sdk_base_url(&self) -> &str {
        &self.sdk_base_url
    }

    pub fn takumi_base_url(&self) -> &str {
        &self.takumi_base_url
    }

    fn qrcode_url(&self, game: GameId, action: &str) -> String {
        format!(
            "{}/{}/combo/panda/qrcode/{}",
            self.sdk_base_url,
            game.biz(),
            action
        )
    }

    fn post(&self, url: &str, body: &Value) -> Result<ApiResponse, LoginError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()?
            .error_for_status()?
            .json::<ApiResponse>()?;
        Ok(response)
    }

    fn scan(&self, ticket: &str, game: GameId, device: &str) -> Result<(), LoginError> {
        let body = json!({
            "app_id": game.app_id(),
            "device": device,
            "ticket": ticket,
        });
        self.post(&self.qrcode_url(game, "scan"), &body)?
            .ensure_ok(ClaimStep::Scan)?;
        Ok(())
    }

    fn game_token(&self, account: &Account) -> Result<String, LoginError> {
        let response = self
            .http
            .get(format!("{}/auth/api/getGameToken", self.takumi_base_url))
            .header(reqwest::header::COOKIE, account.cookie.as_str())
            .send()?
            .error_for_status()?
            .json::<ApiResponse>()?
            .ensure_ok(ClaimStep::GameToken)?;

        response
            .data
            .as_ref()
            .and_then(|data| data.get("game_token"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| LoginError::Malformed {
                step: ClaimStep::GameToken,
                detail: "missing data.game_token".to_string(),
            })
    }

    fn confirm(
        &self,
        ticket: &str,
        game: GameId,
        device: &str,
        account: &Account,
        game_token: &str,
    ) -> Result<String, LoginError> {
        let raw = json!({ "uid": account.uid, "token": game_token }).to_string();
        let body = json!({
            "app_id": game.app_id(),
            "device": device,
            "ticket": ticket,
            "payload": {
                "proto": "Account",
                "raw": raw,
            },
        });
        let response = self
            .post(&self.qrcode_url(game, "confirm"), &body)?
            .ensure_ok(ClaimStep::Confirm)?;

        Ok(if response.message.is_empty() || response.message == "OK" {
            "login confirmed".to_string()
        } else {
            response.message
        })
    }

    fn claim(&self, ticket: &str, game: GameId, account: &Account) -> Result<String, LoginError> {
        // Fresh device id per claim
        let device = uuid::Uuid::new_v4().to_string();

        self.scan(ticket, game, &device)?;
        tracing::debug!("Ticket {} scanned, fetching game token", ticket);

        let game_token = self.game_token(account)?;
        tracing::debug!("Game token acquired, confirming ticket {}", ticket);

        self.confirm(ticket, game, &device, account, &game_token)
    }
}

impl LoginClient for MihoyoLoginClient {
    fn attempt(&self, ticket: &str, game: GameId, account: &Account) -> Outcome {
        match self.claim(ticket, game, account) {
            Ok(message) => {
                tracing::info!("Claimed ticket {} for {}", ticket, game);
                Outcome::success(message)
            }
            Err(e) => {
                tracing::warn!("Claim of ticket {} failed: {}", ticket, e);
                Outcome::failure(e.to_string())
            }
        }
    }
}
