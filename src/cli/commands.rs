//! Command dispatch

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::application::services::{BatchReport, CancelFlag};
use crate::application::ApplicationError;
use crate::cli::args::{
    BatchArgs, Cli, Commands, ConfigCommands, LedgerCommands, MemberCommands, MembershipCommands,
    NodeCommands,
};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{MembershipId, NodeId, NodeParams, Owner, Period};
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::{InfraError, ServiceContainer};

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };
    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => cmd_config(cli, command),
        Commands::Init => cmd_init(cli),
        other => {
            let container = ServiceContainer::new(load_settings(cli)?)?;
            match other {
                Commands::Node { command } => cmd_node(&container, command),
                Commands::Member { command } => cmd_member(&container, command),
                Commands::Membership { command } => cmd_membership(&container, command),
                Commands::Ledger { command } => cmd_ledger(&container, command),
                Commands::Harvest(args) => cmd_batch(&container, args, false),
                Commands::Engage(args) => cmd_batch(&container, args, true),
                Commands::Init | Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
            }
        }
    }
}

fn local_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| CliError::Infra(InfraError::io("current directory", e))),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let dir = local_dir(cli)?;
    let mut settings = Settings::load(Some(&dir))?;
    if let Some(state) = &cli.state {
        settings.state_file = state.clone();
    }
    debug!(state_file = %settings.state_file.display(), "settings loaded");
    Ok(settings)
}

#[instrument(skip(cli))]
fn cmd_init(cli: &Cli) -> CliResult<()> {
    let settings = load_settings(cli)?;
    let container = ServiceContainer::initialize(settings)?;
    let root = container.nodes.info(container.store.read(|o| o.root())?)?;
    output::success(&format!(
        "planted {} ({}) in {}",
        root.node.name,
        root.node.id,
        container.store.location()
    ));
    Ok(())
}

fn parse_owner(c: &ServiceContainer, key: &str) -> CliResult<Owner> {
    match key.split_once(':') {
        Some(("node", k)) => Ok(Owner::Node(c.store.resolve_node(k)?)),
        Some(("member", k)) => Ok(Owner::Member(c.store.resolve_member(k)?)),
        _ => Err(CliError::InvalidArgs(format!(
            "owner must be node:<key> or member:<key>, got {}",
            key
        ))),
    }
}

fn resolve_membership(c: &ServiceContainer, node: NodeId, key: &str) -> CliResult<MembershipId> {
    c.memberships
        .offered(node)?
        .into_iter()
        .find(|m| m.name == key || m.id.to_string() == key)
        .map(|m| m.id)
        .ok_or_else(|| ApplicationError::NotFound(format!("membership {}", key)).into())
}

fn cmd_node(c: &ServiceContainer, command: &NodeCommands) -> CliResult<()> {
    match command {
        NodeCommands::Create {
            parent,
            name,
            founder,
            description,
            video,
            resource,
            fruit_basis,
            max_members,
            membership,
        } => {
            let parent = c.store.resolve_node(parent)?;
            let founder = c.store.resolve_member(founder)?;
            let params = NodeParams {
                name: name.clone(),
                description: description.clone(),
                video_url: video.clone(),
                mother: Some(parent),
                monthly_fruit_basis: Some(fruit_basis.unwrap_or(c.settings.monthly_fruit_basis)),
                max_members: Some(max_members.unwrap_or(c.settings.max_members)),
                resource_name: resource.clone(),
                memberships: membership.clone(),
            };
            let id = c.nodes.create_child(parent, &params, founder)?;
            output::action("Created", &format!("{} ({})", name, id));
        }
        NodeCommands::List => {
            for node in c.nodes.nodes()? {
                output::info(&format!(
                    "{}  {:<8} {}  ({})",
                    node.id,
                    node.status().to_string(),
                    node.name,
                    node.slug
                ));
            }
        }
        NodeCommands::Show { node } => {
            let info = c.nodes.info(c.store.resolve_node(node)?)?;
            output::header(&info.node.name);
            output::detail(&format!("id:        {}", info.node.id));
            output::detail(&format!("slug:      {}", info.node.slug));
            output::detail(&format!("status:    {}", info.status));
            output::detail(&format!("path:      {}", info.path.join(" / ")));
            output::detail(&format!("children:  {}", info.children.len()));
            output::detail(&format!("caretakers: {}", info.caretakers.iter().join(", ")));
            output::detail(&format!("members:   {}", info.members.len()));
            output::detail(&format!("accepting: {}", info.can_accept_members));
            for m in &info.memberships {
                output::detail(&format!(
                    "membership {}: fee {}, gain {}",
                    m.name, m.monthly_fee, m.monthly_gain
                ));
            }
            for (resource, amount) in &info.treasury {
                output::detail(&format!("treasury {}: {}", resource, amount));
            }
            if !info.node.description.is_empty() {
                output::info(&info.node.description);
            }
            if !info.video.is_empty() {
                output::info(&info.video);
            }
        }
        NodeCommands::Tree { node } => {
            let start = node
                .as_deref()
                .map(|k| c.store.resolve_node(k))
                .transpose()?;
            output::info(&c.nodes.tree(start)?);
        }
        NodeCommands::Status {
            node,
            manifested,
            growing,
        } => {
            let id = c.store.resolve_node(node)?;
            let status = c.nodes.set_status(id, *manifested, *growing)?;
            output::action("Status", &format!("{} is {}", node, status));
        }
        NodeCommands::Delete { node } => {
            let removed = c.nodes.destroy(c.store.resolve_node(node)?)?;
            output::action("Deleted", &format!("{} node(s)", removed.len()));
        }
        NodeCommands::Repair { node } => {
            let granted = c.nodes.ensure_capacities(c.store.resolve_node(node)?)?;
            output::action("Repaired", &format!("{} capacity(ies) granted", granted.len()));
        }
    }
    Ok(())
}

fn cmd_member(c: &ServiceContainer, command: &MemberCommands) -> CliResult<()> {
    match command {
        MemberCommands::Add { name, email } => {
            let id = c.memberships.register_member(name, email.clone())?;
            output::action("Registered", &format!("{} ({})", name, id));
        }
        MemberCommands::List => {
            for m in c.memberships.members()? {
                output::info(&format!(
                    "{}  {}  {}",
                    m.id,
                    m.name,
                    m.email.as_deref().unwrap_or("-")
                ));
            }
        }
        MemberCommands::Join {
            member,
            node,
            membership,
            payment_id,
        } => {
            let member_id = c.store.resolve_member(member)?;
            let node_id = c.store.resolve_node(node)?;
            let membership_id = resolve_membership(c, node_id, membership)?;
            c.memberships
                .join(member_id, node_id, membership_id, payment_id.clone())?;
            output::success(&format!("{} joined {} ({})", member, node, membership));
        }
        MemberCommands::Admit { node, member } => {
            let node_id = c.store.resolve_node(node)?;
            c.nodes.admit_member(node_id, c.store.resolve_member(member)?)?;
            output::success(&format!("{} is a member of {}", member, node));
        }
        MemberCommands::Cancel { node, member } => {
            let node_id = c.store.resolve_node(node)?;
            let revoked = c.memberships.cancel(node_id, c.store.resolve_member(member)?)?;
            output::action("Cancelled", &format!("{} role(s) revoked", revoked));
        }
        MemberCommands::Remove { node, member } => {
            let node_id = c.store.resolve_node(node)?;
            c.nodes.remove_member(node_id, c.store.resolve_member(member)?)?;
            output::action("Removed", &format!("{} from {}", member, node));
        }
    }
    Ok(())
}

fn cmd_membership(c: &ServiceContainer, command: &MembershipCommands) -> CliResult<()> {
    match command {
        MembershipCommands::Define {
            node,
            name,
            fee,
            gain,
        } => {
            let node_id = c.store.resolve_node(node)?;
            let id = c.memberships.define(node_id, name, *fee, *gain)?;
            output::action("Defined", &format!("{} on {} ({})", name, node, id));
        }
        MembershipCommands::List { node } => {
            for m in c.memberships.offered(c.store.resolve_node(node)?)? {
                output::info(&format!(
                    "{}  {}  fee {}  gain {}",
                    m.id, m.name, m.monthly_fee, m.monthly_gain
                ));
            }
        }
    }
    Ok(())
}

fn cmd_ledger(c: &ServiceContainer, command: &LedgerCommands) -> CliResult<()> {
    match command {
        LedgerCommands::Balance { owner } => {
            let owner = parse_owner(c, owner)?;
            output::header(&owner);
            for (resource, amount) in c.ledgers.balances(owner)? {
                output::detail(&format!("{}: {}", resource, amount));
            }
        }
        LedgerCommands::Transfer {
            from,
            to,
            amount,
            resource,
        } => {
            let resource = match resource {
                Some(r) => r.clone(),
                None => c.ledgers.base_resource_name()?,
            };
            c.ledgers.transfer(
                parse_owner(c, from)?,
                parse_owner(c, to)?,
                &resource,
                *amount,
            )?;
            output::success(&format!("{} {} from {} to {}", amount, resource, from, to));
        }
        LedgerCommands::Supply { resource } => {
            let resource = match resource {
                Some(r) => r.clone(),
                None => c.ledgers.base_resource_name()?,
            };
            output::info(&format!("{}: {}", resource, c.ledgers.total_supply(&resource)?));
        }
    }
    Ok(())
}

#[instrument(skip(c))]
fn cmd_batch(c: &ServiceContainer, args: &BatchArgs, engagement: bool) -> CliResult<()> {
    let period = args.period.unwrap_or_else(Period::current);
    let start = match &args.node {
        Some(key) => c.store.resolve_node(key)?,
        None => c.store.read(|o| o.root())?,
    };
    let cancel = CancelFlag::new();
    let report: BatchReport = if engagement {
        c.harvest.engagement_time(start, period, &cancel)?
    } else {
        c.harvest.harvest_time(start, period, &cancel)?
    };
    output::batch_report(&report);
    if report.is_clean() {
        Ok(())
    } else {
        Err(CliError::BatchIncomplete(format!(
            "{} failure(s) in {} {}",
            report.failures.len(),
            report.kind,
            report.period
        )))
    }
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::detail(&format!("global: {}", path.display())),
                None => output::warning("no global config directory on this platform"),
            }
            output::detail(&format!(
                "local:  {}",
                local_config_path(&local_dir(cli)?).display()
            ));
        }
        ConfigCommands::Init { global } => {
            let fs = RealFileSystem;
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("no global config directory on this platform".into())
                })?
            } else {
                local_config_path(&local_dir(cli)?)
            };
            if fs.exists(&path) {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            fs.ensure_parent(&path)
                .and_then(|_| fs.write(&path, &Settings::template()))
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::action("Created", &path.display());
        }
    }
    Ok(())
}
