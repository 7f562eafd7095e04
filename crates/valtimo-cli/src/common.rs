//! Common types and utilities shared across commands

use clap::Parser;

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Only print errors")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    #[arg(long, global = true, help = "Emit logs as JSON lines on stderr")]
    pub log_json: bool,
}

impl GlobalOpts {
    /// Effective verbosity level
    /// - 0: warnings only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    ///
    /// The configured level applies when no flag is given.
    pub fn verbosity_level(&self, configured: u8) -> u8 {
        if self.quiet {
            0
        } else if self.verbose > 0 {
            self.verbose
        } else {
            configured
        }
    }
}
