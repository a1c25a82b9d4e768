use crate::{CallContext, Identity, Result, RpsError};
use serde::{Deserialize, Serialize};

/// Single-owner access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Identity,
}

impl Ownable {
    pub fn new(owner: Identity) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    pub fn is_owner(&self, caller: Identity) -> bool {
        self.owner == caller
    }

    pub fn ensure_owner(&self, caller: Identity) -> Result<()> {
        if !self.is_owner(caller) {
            return Err(RpsError::NotOwner(caller));
        }
        Ok(())
    }

    /// Hand ownership to `new_owner`, returning the previous owner.
    pub fn change_owner(&mut self, ctx: &CallContext, new_owner: Identity) -> Result<Identity> {
        ctx.ensure_non_payable()?;
        self.ensure_owner(ctx.caller)?;

        let previous = std::mem::replace(&mut self.owner, new_owner);
        tracing::info!("Ownership transferred from {} to {}", previous, new_owner);
        Ok(previous)
    }
}
