use anyhow::Result;
use clap::Args;
use tracing::info;

use zenflow_core::config::{
    DEVELOPMENT_BRANCH_KEY, PRODUCTION_BRANCH_KEY, QA_BRANCH_KEY, RELEASE_BRANCH_KEY,
};
use zenflow_core::{ConfigStore, FlowRegistry, FlowSettings, Scope};
use zenflow_hub::HubConfigResolver;

use crate::git::GitConfigStore;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Branch new work is cut from.
    #[arg(long, default_value = "develop")]
    pub development_branch: String,
    /// Branch bugfixes are staged on.
    #[arg(long, default_value = "qa")]
    pub qa_branch: String,
    /// Branch releases ship from.
    #[arg(long, default_value = "main")]
    pub production_branch: String,
    /// Optional release staging branch; configuring one enables changelog
    /// rotation and version bumping for the release-tracking flows.
    #[arg(long)]
    pub release_branch: Option<String>,
    /// Hub this repository should publish to.
    #[arg(long)]
    pub hub: Option<String>,
}

/// Records the branch taxonomy in the repository's local configuration and
/// prints the flows it yields.
pub fn run(store: &GitConfigStore, args: &InitArgs) -> Result<()> {
    store.set(DEVELOPMENT_BRANCH_KEY, Scope::Local, &args.development_branch)?;
    store.set(QA_BRANCH_KEY, Scope::Local, &args.qa_branch)?;
    store.set(PRODUCTION_BRANCH_KEY, Scope::Local, &args.production_branch)?;
    if let Some(release) = &args.release_branch {
        store.set(RELEASE_BRANCH_KEY, Scope::Local, release)?;
    }
    if let Some(hub) = &args.hub {
        HubConfigResolver::new(store).set_repo_hub(hub)?;
    }
    info!("recorded branch taxonomy");

    // Building the registry here also validates any policy overrides early.
    let settings = FlowSettings::load(store);
    let registry = FlowRegistry::builtin(&settings)?;
    println!("Configured flows:");
    for flow in registry.definitions() {
        println!(
            "  {:<8} {} -> {} (changelog={}, version={})",
            flow.name, flow.source_branch, flow.deploy_branch, flow.changelog, flow.version_bump
        );
    }
    Ok(())
}
