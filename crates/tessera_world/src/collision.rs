//! Resolution of characters bumping into each other.

use crate::error::WorldResult;
use crate::types::{ActionResult, CharacterId};
use tessera_txn::Transaction;

/// Decides what happens when a character steps onto an occupied tile.
///
/// The resolver runs inside the mover's transaction and may change either
/// character through the world store. Returning [`ActionResult::Success`]
/// lets the attacker into the tile only if the defender is gone by then;
/// otherwise the move fails.
pub trait CollisionResolver: Send + Sync {
    /// Resolves `attacker` stepping onto the tile of `defender`.
    fn resolve(
        &self,
        txn: &Transaction,
        attacker: CharacterId,
        defender: CharacterId,
    ) -> WorldResult<ActionResult>;
}

/// Occupied tiles are simply blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingResolver;

impl CollisionResolver for BlockingResolver {
    fn resolve(
        &self,
        _txn: &Transaction,
        _attacker: CharacterId,
        _defender: CharacterId,
    ) -> WorldResult<ActionResult> {
        Ok(ActionResult::Fail)
    }
}
