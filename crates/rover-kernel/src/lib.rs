//! `rover-kernel` – safety interlocks between the planner and the hardware.
//!
//! It does not plan; it refuses unsafe commands and isolates failing links.
//!
//! # Modules
//!
//! - [`gate`] – [`CommandGate`][gate::CommandGate]: rule engine every
//!   [`DirectionCommand`][rover_types::DirectionCommand] passes before it is
//!   applied.  Rejections become the stop command.
//! - [`breaker`] – [`CircuitBreaker`][breaker::CircuitBreaker]: latency
//!   budget, consecutive-failure threshold and cool-down for the oracle and
//!   actuator links.

pub mod breaker;
pub mod gate;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use gate::{CommandGate, CommandProposal, FeasibleSectorRule, NoDirectReversalRule, Rule};
