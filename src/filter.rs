//! Scope filters deciding which processes end up in a snapshot.
//!
//! Scope names are matched case-insensitively. Unknown names fall back to
//! [`Filter::User`] instead of failing, so a typo on the command line still
//! yields the calling user's processes.

use nix::unistd::getuid;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProcError;
use crate::process::ProcessDescriptor;

/// Process membership scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Every process that parsed.
    All,
    /// Processes inside any user slice, whoever owns them.
    Global,
    /// Processes outside the user slice.
    System,
    /// The calling user's processes inside the user slice.
    #[default]
    User,
}

impl Filter {
    pub const ALL: [Filter; 4] = [Filter::All, Filter::Global, Filter::System, Filter::User];

    /// Resolves a scope name; anything unrecognized means [`Filter::User`].
    pub fn from_scope(scope: &str) -> Self {
        match scope.trim().to_ascii_lowercase().as_str() {
            "all" => Filter::All,
            "global" => Filter::Global,
            "system" => Filter::System,
            _ => Filter::User,
        }
    }

    pub fn scope(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Global => "global",
            Filter::System => "system",
            Filter::User => "user",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Filter::All => "all processes",
            Filter::Global => "processes inside any user slice",
            Filter::System => "processes inside system slice",
            Filter::User => "calling user processes",
        }
    }

    /// Applies the filter on behalf of the calling process' real uid.
    pub fn accepts(&self, outcome: &Result<ProcessDescriptor, ProcError>) -> bool {
        self.accepts_for(outcome, getuid().as_raw())
    }

    /// Applies the filter as if `caller_uid` were scanning.
    pub fn accepts_for(
        &self,
        outcome: &Result<ProcessDescriptor, ProcError>,
        caller_uid: u32,
    ) -> bool {
        let Ok(p) = outcome else {
            return false;
        };
        match self {
            Filter::All => true,
            Filter::Global => p.in_user_slice(),
            Filter::System => p.in_system_slice(),
            Filter::User => p.uid() == i64::from(caller_uid) && p.in_user_slice(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
