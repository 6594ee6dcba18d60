use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zenflow_core::{BranchLifecycle, FlowDefinition, FlowRegistry, FlowSettings, VcsAdapter};
use zenflow_hub::HubConfigResolver;

mod git;
mod http;
mod hubs;
mod init;
mod styles;

#[allow(unused_imports)]
use styles as s;

/// The command-line interface for Zenflow.
#[derive(Debug, Parser)]
#[command(name = "zenflow")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(about = "Branching workflow automation for git teams")]
#[command(
    long_about = "Zenflow codifies a team's branch taxonomy into named flows
(feature, bugfix, hotfix, release) and drives each branch through a
start -> publish -> finish lifecycle, handling changelog rotation, version
bumps and release tags according to the flow's policies.

Common Commands:
  init                      Record the branch taxonomy for this repository
  bugfix start LABEL        Cut bugfix/LABEL from the development branch
  bugfix publish            Push the current branch to the selected hub
  bugfix finish             Merge, update changelog/version, tag, clean up
  hubs describe             Show the resolved hub's configuration
  hubs authorize            Exchange credentials for an API token
"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record the branch taxonomy for this repository.
    Init(init::InitArgs),
    /// Work on a feature branch.
    #[command(subcommand)]
    Feature(BranchAction),
    /// Work on a bugfix branch.
    #[command(subcommand)]
    Bugfix(BranchAction),
    /// Work on a hotfix branch.
    #[command(subcommand)]
    Hotfix(BranchAction),
    /// Work on a release branch.
    #[command(subcommand)]
    Release(BranchAction),
    /// Inspect and configure remote hubs.
    #[command(subcommand)]
    Hubs(hubs::HubsAction),
}

#[derive(Debug, Subcommand)]
enum BranchAction {
    /// Cut a new branch from the flow's source branch and check it out.
    Start { label: String },
    /// Push the branch to the selected hub's remote and track it.
    Publish {
        /// Branch label; defaults to the current branch.
        label: Option<String>,
        /// Hub to publish to (a hub name, or the literal `default`).
        #[arg(long)]
        hub: Option<String>,
    },
    /// Merge the branch into the flow's deploy branch, apply the flow's
    /// changelog and version policies, and delete the merged branch.
    Finish {
        /// Branch label; defaults to the current branch.
        label: Option<String>,
        /// Changelog entry describing the change.
        #[arg(long)]
        log: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    let root = std::env::current_dir().context("failed to resolve working directory")?;
    let store = git::GitConfigStore::new(&root);

    match cli.command {
        Command::Init(args) => init::run(&store, &args),
        Command::Hubs(action) => hubs::run(&store, action),
        Command::Feature(action) => run_flow(&store, &root, "feature", action),
        Command::Bugfix(action) => run_flow(&store, &root, "bugfix", action),
        Command::Hotfix(action) => run_flow(&store, &root, "hotfix", action),
        Command::Release(action) => run_flow(&store, &root, "release", action),
    }
}

fn run_flow(
    store: &git::GitConfigStore,
    root: &std::path::Path,
    flow_name: &str,
    action: BranchAction,
) -> Result<()> {
    let settings = FlowSettings::load(store);
    let registry = FlowRegistry::builtin(&settings)?;
    let flow = registry
        .get(flow_name)
        .ok_or_else(|| anyhow!("unknown flow '{flow_name}'"))?;

    let vcs = git::GitVcs::new(root);
    let lifecycle = BranchLifecycle::new(&vcs, root);

    match action {
        BranchAction::Start { label } => {
            let branch = lifecycle.start(flow, &label)?;
            println!("started {branch} from {}", flow.source_branch);
        }
        BranchAction::Publish { label, hub } => {
            let label = resolve_label(&vcs, flow, label)?;
            let hub = HubConfigResolver::new(store).select_hub(hub.as_deref());
            let branch = lifecycle.publish(flow, &label, &hub)?;
            println!("published {branch} to {hub}");
        }
        BranchAction::Finish { label, log } => {
            let label = resolve_label(&vcs, flow, label)?;
            let branch = lifecycle.finish(flow, &label, log.as_deref())?;
            println!("finished {branch} into {}", flow.deploy_branch);
        }
    }
    Ok(())
}

/// An omitted label falls back to the current branch, which must belong to
/// the flow being operated on.
fn resolve_label(
    vcs: &dyn VcsAdapter,
    flow: &FlowDefinition,
    label: Option<String>,
) -> Result<String> {
    if let Some(label) = label {
        return Ok(label);
    }
    let current = vcs.current_branch()?;
    current
        .strip_prefix(&format!("{}/", flow.name))
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            anyhow!(
                "current branch '{current}' does not belong to flow '{}'; pass a label",
                flow.name
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zenflow_core::vcs::VcsResult;
    use zenflow_core::{ChangelogPolicy, VersionBumpPolicy};

    #[derive(Debug)]
    struct FixedBranchVcs(&'static str);

    impl VcsAdapter for FixedBranchVcs {
        fn update(&self, _branch: &str) -> VcsResult<()> {
            Ok(())
        }
        fn create(&self, _branch: &str, _from: &str) -> VcsResult<()> {
            Ok(())
        }
        fn checkout(&self, _branch: &str) -> VcsResult<()> {
            Ok(())
        }
        fn push(&self, _branch: &str, _hub: &str) -> VcsResult<()> {
            Ok(())
        }
        fn track(&self, _branch: &str, _hub: &str) -> VcsResult<()> {
            Ok(())
        }
        fn merge(&self, _branch: &str, _into: &str) -> VcsResult<()> {
            Ok(())
        }
        fn commit(&self, _files: &[&str], _message: &str) -> VcsResult<()> {
            Ok(())
        }
        fn tag(&self, _name: &str, _message: &str) -> VcsResult<()> {
            Ok(())
        }
        fn delete(&self, _branch: &str) -> VcsResult<()> {
            Ok(())
        }
        fn current_branch(&self) -> VcsResult<String> {
            Ok(self.0.to_string())
        }
    }

    fn bugfix_flow() -> FlowDefinition {
        FlowDefinition {
            name: "bugfix".to_string(),
            source_branch: "develop".to_string(),
            deploy_branch: "qa".to_string(),
            changelog: ChangelogPolicy::None,
            version_bump: VersionBumpPolicy::None,
        }
    }

    #[test]
    fn explicit_label_is_preserved() {
        let vcs = FixedBranchVcs("feature/elsewhere");
        let label = resolve_label(&vcs, &bugfix_flow(), Some("login-crash".to_string())).unwrap();
        assert_eq!(label, "login-crash");
    }

    #[test]
    fn omitted_label_is_taken_from_the_current_branch() {
        let vcs = FixedBranchVcs("bugfix/login-crash");
        let label = resolve_label(&vcs, &bugfix_flow(), None).unwrap();
        assert_eq!(label, "login-crash");
    }

    #[test]
    fn current_branch_outside_the_flow_is_rejected() {
        let vcs = FixedBranchVcs("feature/search");
        let err = resolve_label(&vcs, &bugfix_flow(), None).expect_err("must fail");
        assert!(err.to_string().contains("does not belong to flow 'bugfix'"));
    }
}
