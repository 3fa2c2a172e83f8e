//! [`CommandGate`] – last safety interlock before the drive train.
//!
//! Every [`DirectionCommand`] the planner produces is passed through
//! [`CommandGate::verify`].  Registered [`Rule`]s are evaluated in order;
//! the first violation returns [`RoverError::CommandRejected`].
//! [`CommandGate::admit`] wraps that and substitutes the stop command, so a
//! rejected command never reaches the actuators.
//!
//! Two built-in rules are provided:
//! - [`FeasibleSectorRule`] – a full-throttle command must drive along a
//!   sector this tick's analysis marked feasible.
//! - [`NoDirectReversalRule`] – full throttle never flips sign from one
//!   command to the next; a brake has to come in between.
//!
//! # Example
//!
//! ```
//! use rover_kernel::gate::CommandGate;
//! use rover_kernel::gate::CommandProposal;
//! use rover_types::{DirectionCommand, Feasibility, SectorMap};
//!
//! let gate = CommandGate::with_default_rules();
//! let blocked = SectorMap::splat(Feasibility::BLOCKED);
//!
//! let proposal = CommandProposal {
//!     command: DirectionCommand::FULL_FORWARD,
//!     previous: DirectionCommand::STOP,
//!     feasibility: Some(&blocked),
//! };
//! assert!(gate.verify(&proposal).is_err());
//! assert!(gate.admit(&proposal).is_stop());
//! ```

use rover_types::{DirectionCommand, Feasibility, RoverError, SectorMap};
use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct CommandProposal<'a> {
    pub command: DirectionCommand,
    /// Command active during the previous tick.
    pub previous: DirectionCommand,
    /// This tick's feasibility map; `None` when the command was not produced
    /// by a fresh selection (brake or jam phases).
    pub feasibility: Option<&'a SectorMap<Feasibility>>,
}

/// A single invariant a command must satisfy.
pub trait Rule: Send + Sync {
    /// Name used in rejection messages.
    fn name(&self) -> &str;

    fn check(&self, proposal: &CommandProposal<'_>) -> Result<(), RoverError>;
}

// ────────────────────────────────────────────────────────────────────────────
// CommandGate
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine validating commands before dispatch.
#[derive(Default)]
pub struct CommandGate {
    rules: Vec<Box<dyn Rule>>,
}

impl CommandGate {
    /// A gate with no rules; admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate with [`FeasibleSectorRule`] and [`NoDirectReversalRule`].
    pub fn with_default_rules() -> Self {
        let mut gate = Self::new();
        gate.add_rule(Box::new(FeasibleSectorRule));
        gate.add_rule(Box::new(NoDirectReversalRule));
        gate
    }

    /// Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Returns the first rejection, or `Ok(())` when every rule passes.
    pub fn verify(&self, proposal: &CommandProposal<'_>) -> Result<(), RoverError> {
        for rule in &self.rules {
            rule.check(proposal)?;
        }
        Ok(())
    }

    /// The proposed command when it passes, the stop command otherwise.
    pub fn admit(&self, proposal: &CommandProposal<'_>) -> DirectionCommand {
        match self.verify(proposal) {
            Ok(()) => proposal.command,
            Err(e) => {
                warn!(error = %e, command = %proposal.command, "command gate substituted stop");
                DirectionCommand::STOP
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects full-throttle commands along a sector marked infeasible.
pub struct FeasibleSectorRule;

impl Rule for FeasibleSectorRule {
    fn name(&self) -> &str {
        "feasible_sector"
    }

    fn check(&self, proposal: &CommandProposal<'_>) -> Result<(), RoverError> {
        let (Some(sector), Some(map)) = (proposal.command.sector(), proposal.feasibility) else {
            return Ok(());
        };
        if map[sector].possible {
            Ok(())
        } else {
            Err(RoverError::CommandRejected {
                rule: self.name().to_string(),
                details: format!("sector {sector} is not feasible"),
            })
        }
    }
}

/// Rejects a full throttle whose direction is opposite to the previous full
/// throttle.
pub struct NoDirectReversalRule;

impl Rule for NoDirectReversalRule {
    fn name(&self) -> &str {
        "no_direct_reversal"
    }

    fn check(&self, proposal: &CommandProposal<'_>) -> Result<(), RoverError> {
        match (
            proposal.previous.throttle.drive_direction(),
            proposal.command.throttle.drive_direction(),
        ) {
            (Some(before), Some(after)) if before != after => Err(RoverError::CommandRejected {
                rule: self.name().to_string(),
                details: format!("{before:?} throttle followed directly by {after:?}"),
            }),
            _ => Ok(()),
        }
    }
}
