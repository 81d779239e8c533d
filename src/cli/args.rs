//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::domain::{MembershipTerms, Period};

/// Hierarchical membership economy: node trees, fruit ledgers, admission and monthly harvest
#[derive(Parser, Debug)]
#[command(name = "orchard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// State file (overrides config)
    #[arg(short, long, global = true, env = "ORCHARD_STATE_FILE", value_hint = ValueHint::FilePath)]
    pub state: Option<PathBuf>,

    /// Directory holding the local .orchard.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plant a new orchard: root node, base currency and treasury
    Init,

    /// Create, inspect and retire nodes
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Register members and manage their node memberships
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },

    /// Membership terms offered by nodes
    Membership {
        #[command(subcommand)]
        command: MembershipCommands,
    },

    /// Balances and transfers
    Ledger {
        #[command(subcommand)]
        command: LedgerCommands,
    },

    /// Run the monthly harvest
    Harvest(BatchArgs),

    /// Run the monthly engagement batch
    Engage(BatchArgs),

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(clap::Args, Debug)]
pub struct BatchArgs {
    /// Period as YYYY-MM (default: current month)
    #[arg(short, long)]
    pub period: Option<Period>,

    /// Start node, id or slug (default: root)
    #[arg(short, long)]
    pub node: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Create a child node
    Create {
        /// Parent node, id or slug
        parent: String,
        /// Name of the new node
        name: String,
        /// Founding member (becomes caretaker)
        #[arg(short, long)]
        founder: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        video: Option<String>,
        /// Name of the node's own resource
        #[arg(short, long)]
        resource: Option<String>,
        #[arg(long)]
        fruit_basis: Option<i64>,
        #[arg(long)]
        max_members: Option<usize>,
        /// Membership terms as name:fee:gain (repeatable)
        #[arg(short, long, value_parser = parse_terms)]
        membership: Vec<MembershipTerms>,
    },

    /// List all nodes
    List,

    /// Show one node
    Show {
        node: String,
    },

    /// Show the hierarchy
    Tree {
        /// Start node (default: root)
        node: Option<String>,
    },

    /// Set the status flags (omitted flags are cleared)
    Status {
        node: String,
        #[arg(long)]
        manifested: bool,
        #[arg(long)]
        growing: bool,
    },

    /// Delete a node and everything below it
    Delete {
        node: String,
    },

    /// Give missing production capacities to all members
    Repair {
        node: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemberCommands {
    /// Register a member
    Add {
        name: String,
        #[arg(short, long)]
        email: Option<String>,
    },

    /// List members
    List,

    /// Pay for a membership and become a member
    Join {
        member: String,
        node: String,
        /// Membership name or id
        membership: String,
        #[arg(long)]
        payment_id: Option<String>,
    },

    /// Give the member role without payment
    Admit {
        node: String,
        member: String,
    },

    /// Drop all roles of a member on a node
    Cancel {
        node: String,
        member: String,
    },

    /// Remove a member from a node, including its production capacity
    Remove {
        node: String,
        member: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum MembershipCommands {
    /// Offer new terms on a node
    Define {
        node: String,
        name: String,
        #[arg(long)]
        fee: i64,
        #[arg(long)]
        gain: i64,
    },

    /// Terms offered by a node
    List {
        node: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommands {
    /// Show balances of node:<id|slug> or member:<id|name|email>
    Balance {
        owner: String,
    },

    /// Move resource between ledgers
    Transfer {
        from: String,
        to: String,
        amount: i64,
        /// Resource name (default: base currency)
        #[arg(short, long)]
        resource: Option<String>,
    },

    /// Net amount of a resource over all ledgers
    Supply {
        resource: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

/// Parse `name:fee:gain`.
fn parse_terms(s: &str) -> Result<MembershipTerms, String> {
    let parts: Vec<&str> = s.rsplitn(3, ':').collect();
    let [gain, fee, name] = parts.as_slice() else {
        return Err(format!("expected name:fee:gain, got: {}", s));
    };
    Ok(MembershipTerms {
        name: name.to_string(),
        monthly_fee: fee
            .parse()
            .map_err(|e| format!("invalid fee {:?}: {}", fee, e))?,
        monthly_gain: gain
            .parse()
            .map_err(|e| format!("invalid gain {:?}: {}", gain, e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_parse_terms_allows_colon_in_name() {
        let terms = parse_terms("gold: plus:10:120").unwrap();
        assert_eq!(terms.name, "gold: plus");
        assert_eq!(terms.monthly_fee, 10);
        assert_eq!(terms.monthly_gain, 120);
        assert!(parse_terms("gold:10").is_err());
    }

    #[test]
    fn test_harvest_period_is_parsed() {
        let cli = Cli::try_parse_from(["orchard", "harvest", "--period", "2024-03"]).unwrap();
        match cli.command {
            Some(Commands::Harvest(args)) => {
                assert_eq!(args.period, Some(Period::new(2024, 3).unwrap()))
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
