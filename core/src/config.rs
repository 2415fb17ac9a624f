//! Executor configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::AjaxError;
use crate::transport::RedirectMode;

/// Redirect limit used when the config does not name one.
pub const DEFAULT_MAX_REDIRECTS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Who follows redirects: the transport (`follow`) or the executor (`manual`).
    pub redirects: RedirectMode,
    pub max_redirects: u32,
    /// Sent as `user-agent` unless the request sets its own.
    pub user_agent: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            redirects: RedirectMode::Follow,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
        }
    }
}

impl ExecutorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AjaxError> {
        Ok(serde_json::from_str(raw)?)
    }
}
