//! Per-account grid sessions
//!
//! Batches for one account must not interleave: placement and chain pushes
//! assume nobody else mutates the grid meanwhile. Each account gets its own
//! lock; different accounts never contend.

use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, Result};
use crate::grid::HexGridIndex;

static ACCOUNT_SESSIONS: Lazy<AccountSessions> = Lazy::new(AccountSessions::new);

type SharedGrid = Arc<Mutex<HexGridIndex>>;

/// Loaded at most once; concurrent first users of one account wait on it
type GridSlot = Arc<OnceCell<SharedGrid>>;

#[derive(Debug, Default)]
pub struct AccountSessions {
    grids: Mutex<HashMap<String, GridSlot>>,
}

impl AccountSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static AccountSessions {
        &ACCOUNT_SESSIONS
    }

    fn registry(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, GridSlot>>> {
        self.grids
            .lock()
            .map_err(|_| CoreError::InvalidState("session registry lock poisoned".to_string()))
    }

    /// Grid handle for `account`, loading it on first use.
    ///
    /// `load` runs outside the registry lock, so a slow load only holds up
    /// callers for the same account.
    pub fn grid_for<L>(&self, account: &str, load: L) -> Result<SharedGrid>
    where
        L: FnOnce() -> Result<HexGridIndex>,
    {
        let slot = {
            let mut grids = self.registry()?;
            Arc::clone(grids.entry(account.to_string()).or_default())
        };

        let loaded = slot.get_or_try_init(|| {
            let grid = load()?;
            log::debug!("Opened grid session for account {}", account);
            Ok(Arc::new(Mutex::new(grid)))
        });

        match loaded {
            Ok(grid) => Ok(Arc::clone(grid)),
            Err(e) => {
                // Forget the empty slot so the next caller retries the load
                let mut grids = self.registry()?;
                let unused = grids
                    .get(account)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.get().is_none());
                if unused {
                    grids.remove(account);
                }
                Err(e)
            }
        }
    }

    /// Run `f` while holding the account's single-writer lock
    pub fn with_account<L, F, T>(&self, account: &str, load: L, f: F) -> Result<T>
    where
        L: FnOnce() -> Result<HexGridIndex>,
        F: FnOnce(&mut HexGridIndex) -> Result<T>,
    {
        let grid = self.grid_for(account, load)?;
        let mut guard = grid.lock().map_err(|_| {
            CoreError::InvalidState(format!("grid lock for account {} poisoned", account))
        })?;
        f(&mut guard)
    }

    /// Forget an account's cached grid (next use reloads it)
    pub fn evict(&self, account: &str) -> bool {
        match self.grids.lock() {
            Ok(mut grids) => grids.remove(account).is_some(),
            Err(_) => false,
        }
    }

    /// Accounts with a loaded grid
    pub fn len(&self) -> usize {
        self.grids
            .lock()
            .map(|grids| grids.values().filter(|slot| slot.get().is_some()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
