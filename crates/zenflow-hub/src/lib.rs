//! Hub identity and credential resolution.
//!
//! A *hub* is a logical remote code-hosting endpoint. Each hub owns four
//! configuration attributes, stored in the global configuration scope under
//! keys derived here. The system default hub keeps its attributes under
//! legacy unnamespaced keys (`zenflow.token`, and the historically
//! unprefixed `github.user`); named hubs are uniformly namespaced under
//! `zenflow.hub.<hub>.*`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use zenflow_core::{ConfigStore, Scope};

/// Hub identifier assumed when nothing else is configured.
pub const SYSTEM_DEFAULT_HUB: &str = "github.com";
/// API endpoint substituted when a hub has no configured base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
/// User-Agent base substituted when a hub has no configured one.
pub const DEFAULT_USER_AGENT_BASE: &str = "Zenflow";

/// Global key naming the machine-wide default hub.
pub const DEFAULT_HUB_KEY: &str = "zenflow.default.hub";
/// Local key recording the repository's own selected hub.
pub const REPO_HUB_KEY: &str = "zenflow.hub";

const AUTH_NOTE: &str = "Zenflow";

/// One of the four configuration attributes a hub owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubAttribute {
    ApiBaseUrl,
    User,
    Token,
    UserAgentBase,
}

impl HubAttribute {
    pub const ALL: [HubAttribute; 4] = [
        Self::ApiBaseUrl,
        Self::User,
        Self::Token,
        Self::UserAgentBase,
    ];

    /// The attribute's base key, shared by every hub's derived key.
    pub fn base_key(self) -> &'static str {
        match self {
            Self::ApiBaseUrl => "api.base.url",
            Self::User => "github.user",
            Self::Token => "token",
            Self::UserAgentBase => "user.agent.base",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ApiBaseUrl => "API base URL",
            Self::User => "User",
            Self::Token => "Token",
            Self::UserAgentBase => "User Agent base",
        }
    }

    /// Built-in fallback, if the attribute has one. Credentials never do.
    fn builtin_default(self) -> Option<&'static str> {
        match self {
            Self::ApiBaseUrl => Some(DEFAULT_API_BASE_URL),
            Self::UserAgentBase => Some(DEFAULT_USER_AGENT_BASE),
            Self::User | Self::Token => None,
        }
    }
}

/// The credential-for-token HTTP exchange, one blocking call returning the
/// raw response body. The ureq-backed implementation lives in the CLI.
pub trait TokenExchange {
    fn exchange(&self, url: &str, user: &str, payload: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    scopes: Vec<&'a str>,
    note: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: Option<String>,
    message: Option<String>,
}

/// Result of an authorize exchange that completed an HTTP round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A token was issued and persisted.
    Authorized,
    /// The hub refused; the message is reported verbatim, nothing is stored.
    Denied(String),
}

/// Resolves hub names and their namespaced configuration attributes.
///
/// Attributes are never cached; every read goes to the store.
#[derive(Debug)]
pub struct HubConfigResolver<'a> {
    store: &'a dyn ConfigStore,
}

impl<'a> HubConfigResolver<'a> {
    pub fn new(store: &'a dyn ConfigStore) -> Self {
        Self { store }
    }

    /// The machine-wide default hub, or the system default when unset.
    pub fn default_hub(&self) -> String {
        self.store
            .get(DEFAULT_HUB_KEY, Scope::Global)
            .unwrap_or_else(|| SYSTEM_DEFAULT_HUB.to_string())
    }

    pub fn set_default_hub(&self, hub: &str) -> Result<()> {
        self.store.set(DEFAULT_HUB_KEY, Scope::Global, hub)
    }

    /// The hub recorded for the current repository, if any.
    pub fn repo_hub(&self) -> Option<String> {
        self.store.get(REPO_HUB_KEY, Scope::Local)
    }

    pub fn set_repo_hub(&self, hub: &str) -> Result<()> {
        self.store.set(REPO_HUB_KEY, Scope::Local, hub)
    }

    /// Resolves which hub applies. Precedence: an explicit concrete name is
    /// returned unchanged, with no existence check (an unknown hub surfaces
    /// later as absent attributes); the literal `default` means the default
    /// hub; otherwise the repository's recorded hub, then the default hub.
    pub fn select_hub(&self, explicit: Option<&str>) -> String {
        match explicit {
            Some("default") => self.default_hub(),
            Some(name) => name.to_string(),
            None => self.repo_hub().unwrap_or_else(|| self.default_hub()),
        }
    }

    /// Derives the configuration key for `(hub, attribute)`.
    ///
    /// The mapping is pure and total. For the system default hub every
    /// attribute but `user` gets the plain `zenflow.` prefix; `user` stays
    /// `github.user`, preserved as observed in the historical layout.
    pub fn key_for(&self, hub: &str, attribute: HubAttribute) -> String {
        if hub == SYSTEM_DEFAULT_HUB {
            match attribute {
                HubAttribute::User => attribute.base_key().to_string(),
                _ => format!("zenflow.{}", attribute.base_key()),
            }
        } else {
            format!("zenflow.hub.{hub}.{}", attribute.base_key())
        }
    }

    /// Reads an attribute; when absent and `use_builtin_default` is set,
    /// substitutes the attribute's built-in fallback. Credentials have none,
    /// regardless of the flag.
    pub fn attribute(
        &self,
        hub: &str,
        attribute: HubAttribute,
        use_builtin_default: bool,
    ) -> Option<String> {
        match self.store.get(&self.key_for(hub, attribute), Scope::Global) {
            Some(value) => Some(value),
            None if use_builtin_default => attribute.builtin_default().map(ToOwned::to_owned),
            None => None,
        }
    }

    pub fn set_attribute(&self, hub: &str, attribute: HubAttribute, value: &str) -> Result<()> {
        self.store
            .set(&self.key_for(hub, attribute), Scope::Global, value)
    }

    pub fn user(&self, hub: &str) -> Option<String> {
        self.attribute(hub, HubAttribute::User, false)
    }

    pub fn token(&self, hub: &str) -> Option<String> {
        self.attribute(hub, HubAttribute::Token, false)
    }

    pub fn api_base_url(&self, hub: &str, use_builtin_default: bool) -> Option<String> {
        self.attribute(hub, HubAttribute::ApiBaseUrl, use_builtin_default)
    }

    pub fn user_agent_base(&self, hub: &str, use_builtin_default: bool) -> Option<String> {
        self.attribute(hub, HubAttribute::UserAgentBase, use_builtin_default)
    }

    /// Exchanges the hub's configured user credential for an API token.
    ///
    /// A `token` in the response is persisted under the hub's token key. A
    /// `message` is reported verbatim as a denial; nothing is stored and
    /// nothing is retried.
    #[instrument(skip(self, exchange))]
    pub fn authorize(&self, hub: &str, exchange: &dyn TokenExchange) -> Result<AuthOutcome> {
        let user = self.user(hub).ok_or_else(|| {
            anyhow!(
                "no user configured for hub '{hub}' (set {})",
                self.key_for(hub, HubAttribute::User)
            )
        })?;
        let base = self
            .api_base_url(hub, true)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let url = format!("{base}/authorizations");
        let payload = serde_json::to_string(&AuthRequest {
            scopes: vec!["repo"],
            note: AUTH_NOTE,
        })
        .context("failed to encode authorization request")?;

        debug!("requesting authorization for {user}@{hub}");
        let body = exchange
            .exchange(&url, &user, &payload)
            .with_context(|| format!("authorization exchange with {url} failed"))?;
        let response: AuthResponse = serde_json::from_str(&body)
            .with_context(|| format!("unexpected authorization response from {url}"))?;

        if let Some(token) = response.token {
            self.set_attribute(hub, HubAttribute::Token, &token)?;
            return Ok(AuthOutcome::Authorized);
        }
        match response.message {
            Some(message) => Ok(AuthOutcome::Denied(message)),
            None => Err(anyhow!(
                "authorization response from {url} carried neither token nor message"
            )),
        }
    }
}

/// Extracts the hub name from a namespaced attribute key, e.g.
/// `zenflow.hub.acme.token` yields `acme`. Keys outside the hub attribute
/// namespace yield nothing; used to enumerate configured hubs.
pub fn hub_of_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix("zenflow.hub.")?;
    for attribute in HubAttribute::ALL {
        if let Some(prefix) = rest.strip_suffix(attribute.base_key()) {
            if let Some(hub) = prefix.strip_suffix('.') {
                if !hub.is_empty() {
                    return Some(hub);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use zenflow_core::MemoryConfigStore;

    /// Scripted exchange: records the request, replies with a canned body.
    struct ScriptedExchange {
        body: &'static str,
        seen: RefCell<Vec<(String, String, String)>>,
    }

    impl ScriptedExchange {
        fn replying(body: &'static str) -> Self {
            Self {
                body,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl TokenExchange for ScriptedExchange {
        fn exchange(&self, url: &str, user: &str, payload: &str) -> Result<String> {
            self.seen
                .borrow_mut()
                .push((url.to_string(), user.to_string(), payload.to_string()));
            Ok(self.body.to_string())
        }
    }

    #[test]
    fn named_hub_keys_are_uniformly_namespaced() {
        let store = MemoryConfigStore::default();
        let resolver = HubConfigResolver::new(&store);
        assert_eq!(
            resolver.key_for("my-hub", HubAttribute::ApiBaseUrl),
            "zenflow.hub.my-hub.api.base.url"
        );
        assert_eq!(
            resolver.key_for("my-hub", HubAttribute::User),
            "zenflow.hub.my-hub.github.user"
        );
        assert_eq!(resolver.key_for("my-hub", HubAttribute::Token), "zenflow.hub.my-hub.token");
        assert_eq!(
            resolver.key_for("my-hub", HubAttribute::UserAgentBase),
            "zenflow.hub.my-hub.user.agent.base"
        );
    }

    #[test]
    fn default_hub_keys_keep_the_legacy_layout() {
        let store = MemoryConfigStore::default();
        let resolver = HubConfigResolver::new(&store);
        assert_eq!(
            resolver.key_for(SYSTEM_DEFAULT_HUB, HubAttribute::ApiBaseUrl),
            "zenflow.api.base.url"
        );
        // The user key is historically unprefixed, even for the default hub.
        assert_eq!(resolver.key_for(SYSTEM_DEFAULT_HUB, HubAttribute::User), "github.user");
        assert_eq!(resolver.key_for(SYSTEM_DEFAULT_HUB, HubAttribute::Token), "zenflow.token");
        assert_eq!(
            resolver.key_for(SYSTEM_DEFAULT_HUB, HubAttribute::UserAgentBase),
            "zenflow.user.agent.base"
        );
    }

    #[test]
    fn default_hub_falls_back_to_the_system_default() {
        let store = MemoryConfigStore::default();
        assert_eq!(HubConfigResolver::new(&store).default_hub(), "github.com");

        let store = MemoryConfigStore::seeded(&[(Scope::Global, DEFAULT_HUB_KEY, "corp-hub")]);
        assert_eq!(HubConfigResolver::new(&store).default_hub(), "corp-hub");
    }

    #[test]
    fn explicit_hub_wins_without_existence_check() {
        let store = MemoryConfigStore::seeded(&[
            (Scope::Global, DEFAULT_HUB_KEY, "corp-hub"),
            (Scope::Local, REPO_HUB_KEY, "repo-hub"),
        ]);
        let resolver = HubConfigResolver::new(&store);
        assert_eq!(resolver.select_hub(Some("my-hub")), "my-hub");
    }

    #[test]
    fn the_literal_default_selects_the_default_hub() {
        let store = MemoryConfigStore::seeded(&[(Scope::Global, DEFAULT_HUB_KEY, "corp-hub")]);
        let resolver = HubConfigResolver::new(&store);
        assert_eq!(resolver.select_hub(Some("default")), "corp-hub");
    }

    #[test]
    fn absent_hub_prefers_the_repository_then_the_default() {
        let store = MemoryConfigStore::seeded(&[(Scope::Local, REPO_HUB_KEY, "repo-hub")]);
        assert_eq!(HubConfigResolver::new(&store).select_hub(None), "repo-hub");

        let store = MemoryConfigStore::default();
        assert_eq!(HubConfigResolver::new(&store).select_hub(None), "github.com");
    }

    #[test]
    fn attribute_fallbacks_apply_only_when_requested() {
        let store = MemoryConfigStore::default();
        let resolver = HubConfigResolver::new(&store);

        assert_eq!(
            resolver.api_base_url("test-hub", true).as_deref(),
            Some("https://api.github.com")
        );
        assert_eq!(resolver.api_base_url("test-hub", false), None);
        assert_eq!(
            resolver.user_agent_base("test-hub", true).as_deref(),
            Some("Zenflow")
        );

        // Credentials never fall back.
        assert_eq!(resolver.user("test-hub"), None);
        assert_eq!(resolver.attribute("test-hub", HubAttribute::Token, true), None);
    }

    #[test]
    fn stored_attributes_shadow_the_fallbacks() {
        let store = MemoryConfigStore::seeded(&[(
            Scope::Global,
            "zenflow.hub.test-hub.api.base.url",
            "https://git.example.com/api/v3",
        )]);
        let resolver = HubConfigResolver::new(&store);
        assert_eq!(
            resolver.api_base_url("test-hub", true).as_deref(),
            Some("https://git.example.com/api/v3")
        );
    }

    #[test]
    fn authorize_persists_an_issued_token() {
        let store = MemoryConfigStore::seeded(&[(
            Scope::Global,
            "zenflow.hub.acme.github.user",
            "alice",
        )]);
        let resolver = HubConfigResolver::new(&store);
        let exchange = ScriptedExchange::replying(r#"{"token":"T"}"#);

        let outcome = resolver.authorize("acme", &exchange).unwrap();
        assert_eq!(outcome, AuthOutcome::Authorized);
        assert_eq!(store.get("zenflow.hub.acme.token", Scope::Global).as_deref(), Some("T"));

        let seen = exchange.seen.borrow();
        let (url, user, payload) = &seen[0];
        assert_eq!(url, "https://api.github.com/authorizations");
        assert_eq!(user, "alice");
        assert_eq!(payload, r#"{"scopes":["repo"],"note":"Zenflow"}"#);
    }

    #[test]
    fn authorize_reports_a_denial_verbatim_and_writes_nothing() {
        let store = MemoryConfigStore::seeded(&[(
            Scope::Global,
            "zenflow.hub.acme.github.user",
            "alice",
        )]);
        let resolver = HubConfigResolver::new(&store);
        let exchange = ScriptedExchange::replying(r#"{"message":"bad creds"}"#);

        let outcome = resolver.authorize("acme", &exchange).unwrap();
        assert_eq!(outcome, AuthOutcome::Denied("bad creds".to_string()));
        assert_eq!(store.get("zenflow.hub.acme.token", Scope::Global), None);

        let seen = exchange.seen.borrow();
        assert_eq!(seen[0].1, "alice");
    }

    #[test]
    fn authorize_without_a_configured_user_never_exchanges() {
        let store = MemoryConfigStore::default();
        let resolver = HubConfigResolver::new(&store);
        let exchange = ScriptedExchange::replying(r#"{"token":"T"}"#);

        let err = resolver.authorize("acme", &exchange).expect_err("must fail");
        assert!(err.to_string().contains("zenflow.hub.acme.github.user"));
        assert!(exchange.seen.borrow().is_empty());
    }

    #[test]
    fn authorize_rejects_a_response_with_neither_field() {
        let store =
            MemoryConfigStore::seeded(&[(Scope::Global, "github.user", "alice")]);
        let resolver = HubConfigResolver::new(&store);
        let exchange = ScriptedExchange::replying(r#"{}"#);

        assert!(resolver.authorize("github.com", &exchange).is_err());
    }

    #[test]
    fn hub_of_key_recognizes_exactly_the_attribute_namespace() {
        assert_eq!(hub_of_key("zenflow.hub.acme.token"), Some("acme"));
        assert_eq!(hub_of_key("zenflow.hub.acme.api.base.url"), Some("acme"));
        assert_eq!(hub_of_key("zenflow.hub.git.example.com.github.user"), Some("git.example.com"));
        assert_eq!(hub_of_key("zenflow.hub.acme.color"), None);
        assert_eq!(hub_of_key("zenflow.token"), None);
        assert_eq!(hub_of_key("zenflow.hub..token"), None);
        assert_eq!(hub_of_key("github.user"), None);
    }
}
