//! Error taxonomy and configuration validation.
//!
//! Only two things are errors here: a configuration that can never run
//! ([`BuildError`], raised fail-fast at build or submit time) and a run
//! aborted from outside ([`RunError::Halted`]). Everything else that looks
//! like a problem at runtime (stockout, full queue, busy fleet) is a modeled
//! delay and has no error type on purpose.

use crate::agv::Agv;
use crate::fixed::{Fixed64, SimTime};
use crate::id::{AgvId, ServerId, StoreId};
use crate::job::JobSpec;
use crate::server::{Server, ServerKind};
use crate::store::Store;
use slotmap::SlotMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A configuration the engine refuses to run.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("shop has no servers")]
    NoServers,

    #[error("server `{name}` has zero capacity")]
    ZeroServerCapacity { name: String },

    #[error("store `{name}` has zero bay capacity")]
    ZeroBayCapacity { name: String },

    #[error("invalid distribution for {what}")]
    InvalidSample { what: String },

    #[error("rework probability {value} of server `{name}` is outside [0, 1]")]
    InvalidReworkProbability { name: String, value: Fixed64 },

    #[error("ema alpha {alpha} is outside (0, 1]")]
    InvalidEmaAlpha { alpha: Fixed64 },

    #[error("workload norm missing for server `{name}`")]
    MissingNorm { name: String },

    #[error("check interval must be positive")]
    NonPositiveCheckInterval,

    #[error("allowance must be non-negative")]
    NegativeAllowance,

    #[error("job routing is empty")]
    EmptyRouting,

    #[error("job routing references an unknown server")]
    UnknownServer,

    #[error("material need references an unknown store")]
    UnknownStore,

    #[error("material need has zero quantity")]
    ZeroMaterialQuantity,

    #[error("job needs materials but the shop has no stores")]
    MaterialsWithoutStores,

    #[error("job needs materials but the shop has no vehicles")]
    MaterialsWithoutAgvs,

    #[error("inspection loopback {loopback} does not precede operation {op}")]
    LoopbackOutOfRange { loopback: usize, op: usize },
}

/// A run that did not reach its bound.
#[derive(Debug, Error, PartialEq)]
pub enum RunError {
    /// `interrupt()` was called. The heap is intact but the run is over.
    #[error("run interrupted at t={at}")]
    Halted { at: SimTime },

    /// The injected job source handed the engine a descriptor that can
    /// never run.
    #[error("job source produced an invalid job: {0}")]
    Source(#[from] BuildError),
}

// ---------------------------------------------------------------------------
// Spec validation
// ---------------------------------------------------------------------------

/// Fail-fast checks for a job descriptor against the built registries.
/// Shared between `ShopBuilder::build` (for pre-registered arrivals) and
/// `Engine::submit`.
pub fn validate_spec(
    spec: &JobSpec,
    servers: &SlotMap<ServerId, Server>,
    stores: &SlotMap<StoreId, Store>,
    agvs: &SlotMap<AgvId, Agv>,
) -> Result<(), BuildError> {
    if spec.operations.is_empty() {
        return Err(BuildError::EmptyRouting);
    }
    for (i, op) in spec.operations.iter().enumerate() {
        let Some(server) = servers.get(op.server) else {
            return Err(BuildError::UnknownServer);
        };
        if let ServerKind::Inspection { loopback, .. } = server.kind {
            if loopback > i {
                return Err(BuildError::LoopbackOutOfRange { loopback, op: i });
            }
        }
        if let Some(need) = &op.material {
            if need.quantity == 0 {
                return Err(BuildError::ZeroMaterialQuantity);
            }
            if stores.is_empty() {
                return Err(BuildError::MaterialsWithoutStores);
            }
            if agvs.is_empty() {
                return Err(BuildError::MaterialsWithoutAgvs);
            }
            if let Some(store) = need.store {
                if !stores.contains_key(store) {
                    return Err(BuildError::UnknownStore);
                }
            }
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
