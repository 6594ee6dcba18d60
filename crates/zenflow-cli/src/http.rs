use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use zenflow_hub::TokenExchange;

/// Environment variable holding the account password for the authorize
/// exchange. The password stays out of the process arguments and the config
/// store; it is read once, at exchange time.
pub const PASSWORD_ENV: &str = "ZENFLOW_PASSWORD";

/// ureq-backed [`TokenExchange`] speaking basic auth.
#[derive(Debug)]
pub struct UreqTokenExchange {
    user_agent: String,
}

impl UreqTokenExchange {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl TokenExchange for UreqTokenExchange {
    fn exchange(&self, url: &str, user: &str, payload: &str) -> Result<String> {
        let password = std::env::var(PASSWORD_ENV)
            .with_context(|| format!("{PASSWORD_ENV} is not set; export it to authorize"))?;
        let credential = BASE64.encode(format!("{user}:{password}"));

        debug!("POST {url}");
        let response = ureq::post(url)
            .set("Authorization", &format!("Basic {credential}"))
            .set("User-Agent", &self.user_agent)
            .set("Content-Type", "application/json")
            .set("Accept", "application/vnd.github+json")
            .send_string(payload);

        // A denial comes back as a 4xx whose body still carries the hub's
        // message; hand the body up either way.
        let body = match response {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                debug!("authorization endpoint answered {status}");
                resp
            }
            Err(e) => return Err(e).context("authorization request failed"),
        };

        body.into_string()
            .context("failed to read authorization response")
    }
}
