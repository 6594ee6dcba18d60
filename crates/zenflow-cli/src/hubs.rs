use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use zenflow_core::Scope;
use zenflow_hub::{
    hub_of_key, AuthOutcome, HubAttribute, HubConfigResolver, SYSTEM_DEFAULT_HUB,
};

use crate::git::GitConfigStore;
use crate::http::UreqTokenExchange;

#[derive(Debug, Subcommand)]
pub enum HubsAction {
    /// Show every hub configured on this machine.
    List,
    /// Show the hub the current repository resolves to.
    Current,
    /// Show the default hub.
    ShowDefault,
    /// Set the default hub.
    SetDefault { hub: String },
    /// Show configuration details for a hub.
    Describe { hub: Option<String> },
    /// Set hub attributes.
    Config(ConfigArgs),
    /// Exchange the hub's user credential for an API token.
    Authorize {
        hub: Option<String>,
        /// Replace an already-stored token.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    pub hub: Option<String>,
    #[arg(long)]
    pub api_base_url: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub token: Option<String>,
    #[arg(long)]
    pub user_agent_base: Option<String>,
}

pub fn run(store: &GitConfigStore, action: HubsAction) -> Result<()> {
    let resolver = HubConfigResolver::new(store);
    match action {
        HubsAction::List => list(store, &resolver),
        HubsAction::Current => {
            let hub = resolver.select_hub(None);
            println!("This repository's hub is {}", hub_label(&resolver, &hub));
            Ok(())
        }
        HubsAction::ShowDefault => {
            println!("Default hub: {}", default_hub_label(&resolver.default_hub()));
            Ok(())
        }
        HubsAction::SetDefault { hub } => {
            resolver.set_default_hub(&hub)?;
            println!("Default hub is now {}", default_hub_label(&hub));
            Ok(())
        }
        HubsAction::Describe { hub } => describe(&resolver, hub.as_deref()),
        HubsAction::Config(args) => config(&resolver, &args),
        HubsAction::Authorize { hub, force } => authorize(&resolver, hub.as_deref(), force),
    }
}

fn list(store: &GitConfigStore, resolver: &HubConfigResolver<'_>) -> Result<()> {
    let default = resolver.default_hub();
    let mut named: Vec<String> = store
        .entries(Scope::Global)?
        .iter()
        .filter_map(|(key, _)| hub_of_key(key))
        .map(ToOwned::to_owned)
        .collect();
    named.sort();
    named.dedup();

    println!("Recognized hubs");
    println!("{}", hub_label(resolver, &default));
    for hub in named.iter().filter(|hub| **hub != default) {
        println!("{}", hub_label(resolver, hub));
    }
    Ok(())
}

fn describe(resolver: &HubConfigResolver<'_>, explicit: Option<&str>) -> Result<()> {
    let hub = resolver.select_hub(explicit);
    println!("Configuration details for hub {}", hub_label(resolver, &hub));
    println!(
        "{:<16} {:<36} {:<24} {}",
        "Parameter", "Config Key", "Stored Value", "Value (with defaults)"
    );
    for attribute in HubAttribute::ALL {
        let stored = resolver.attribute(&hub, attribute, false);
        let effective = resolver.attribute(&hub, attribute, true);
        println!(
            "{:<16} {:<36} {:<24} {}",
            attribute.label(),
            resolver.key_for(&hub, attribute),
            stored.as_deref().unwrap_or("-"),
            effective.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn config(resolver: &HubConfigResolver<'_>, args: &ConfigArgs) -> Result<()> {
    let hub = resolver.select_hub(args.hub.as_deref());
    let updates = [
        (HubAttribute::ApiBaseUrl, &args.api_base_url),
        (HubAttribute::User, &args.user),
        (HubAttribute::Token, &args.token),
        (HubAttribute::UserAgentBase, &args.user_agent_base),
    ];

    let mut touched = false;
    for (attribute, value) in updates {
        if let Some(value) = value {
            resolver.set_attribute(&hub, attribute, value)?;
            info!("set {} for {hub}", attribute.label());
            touched = true;
        }
    }

    if touched {
        println!("Configured {}", hub_label(resolver, &hub));
    } else {
        println!("Nothing to change for {}; pass at least one attribute flag", hub);
    }
    Ok(())
}

fn authorize(resolver: &HubConfigResolver<'_>, explicit: Option<&str>, force: bool) -> Result<()> {
    let hub = resolver.select_hub(explicit);

    if resolver.token(&hub).is_some() && !force {
        println!("Hub {hub} already has a token; re-run with --force to replace it");
        return Ok(());
    }

    let user_agent = format!(
        "{}/{}",
        resolver
            .user_agent_base(&hub, true)
            .unwrap_or_else(|| zenflow_hub::DEFAULT_USER_AGENT_BASE.to_string()),
        env!("CARGO_PKG_VERSION")
    );
    let exchange = UreqTokenExchange::new(user_agent);

    match resolver.authorize(&hub, &exchange)? {
        AuthOutcome::Authorized => println!("Authorized!"),
        AuthOutcome::Denied(message) => {
            println!("Something went wrong. Error from {hub} was: {message}");
        }
    }
    Ok(())
}

fn default_hub_label(hub: &str) -> String {
    if hub == SYSTEM_DEFAULT_HUB {
        format!("{hub} [system default]")
    } else {
        hub.to_string()
    }
}

fn hub_label(resolver: &HubConfigResolver<'_>, hub: &str) -> String {
    let mut label = hub.to_string();
    if hub == resolver.default_hub() {
        label.push_str(" [default]");
    }
    if resolver.repo_hub().as_deref() == Some(hub) {
        label.push_str(" [current]");
    }
    label
}
