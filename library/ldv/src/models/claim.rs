// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exclusive claim on a bus or device (SDIO host claim, USB lock-for-reset).
//!
//! The token records which owner holds the claim. Operations that need the claim check that
//! the caller is that owner.

use super::{ResourceModel, ensure};
use crate::nondet::NondetSource;
use crate::violation::{Violation, ViolationKind};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use tracing::trace;

/// A claimant. Zero is reserved for "unclaimed", so owner ids are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(NonZeroU32);

impl OwnerId {
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(id) => Some(OwnerId(id)),
            None => None,
        }
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "owner {}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ClaimToken {
    name: String,
    holder: Option<OwnerId>,
}

impl ClaimToken {
    pub fn new(name: impl Into<String>) -> Self {
        ClaimToken { name: name.into(), holder: None }
    }

    pub fn holder(&self) -> Option<OwnerId> {
        self.holder
    }

    /// `sdio_claim_host`.
    pub fn claim(&mut self, owner: OwnerId) -> Result<(), Violation> {
        self.check_unclaimed(owner)?;
        self.holder = Some(owner);
        trace!(token = %self.name, %owner, "claim");
        Ok(())
    }

    /// `usb_lock_device_for_reset`: the claim may fail for reasons outside the driver's
    /// control. Returns whether it was taken. Calling it while the token is already claimed
    /// is a violation whatever the outcome would have been.
    pub fn try_claim(
        &mut self,
        owner: OwnerId,
        nondet: &mut dyn NondetSource,
    ) -> Result<bool, Violation> {
        self.check_unclaimed(owner)?;
        if nondet.any_bool() {
            self.holder = Some(owner);
            trace!(token = %self.name, %owner, "claim");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `sdio_release_host`.
    pub fn release(&mut self, owner: OwnerId) -> Result<(), Violation> {
        let checked = match self.holder {
            None => ensure(false, &self.name, ViolationKind::ReleaseWithoutAcquire, || {
                format!("release by {owner} of an unclaimed token")
            }),
            Some(holder) => ensure(holder == owner, &self.name, ViolationKind::StaleClaimUse, || {
                format!("release by {owner} of a token claimed by {holder}")
            }),
        };
        checked?;
        self.holder = None;
        trace!(token = %self.name, %owner, "release");
        Ok(())
    }

    /// Precondition of every operation that runs inside the claim (e.g. `sdio_readb`).
    pub fn check_context(&self, owner: OwnerId) -> Result<(), Violation> {
        ensure(self.holder == Some(owner), &self.name, ViolationKind::StaleClaimUse, || {
            match self.holder {
                Some(holder) => format!("used by {owner} while claimed by {holder}"),
                None => format!("used by {owner} without a claim"),
            }
        })
    }

    fn check_unclaimed(&self, owner: OwnerId) -> Result<(), Violation> {
        ensure(self.holder.is_none(), &self.name, ViolationKind::DoubleAcquire, || {
            format!("claim by {owner} of a token that is already claimed")
        })
    }
}

impl ResourceModel for ClaimToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_idle(&self) -> bool {
        self.holder.is_none()
    }

    fn describe_state(&self) -> String {
        match self.holder {
            Some(holder) => format!("claimed by {holder}"),
            None => "unclaimed".to_string(),
        }
    }

    fn reset(&mut self) {
        self.holder = None;
    }
}
