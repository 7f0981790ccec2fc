// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Account registry.
//!
//! The [`Ledger`] owns every [`Account`] and maps account IDs to them.
//!
//! # Locking
//!
//! The ledger lock guards the ID → account map and nothing else. It is never
//! held while an account lock is taken: lookups clone the account handle out
//! of the map and release the ledger lock before the caller touches the
//! balance. No operation ever holds two locks at once.

use crate::account::Account;
use crate::base::AccountId;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to an account owned by a [`Ledger`].
pub type AccountHandle = Arc<Account>;

/// Registry of accounts keyed by [`AccountId`].
///
/// # Invariants
///
/// - Accounts are never removed.
/// - Re-creating an existing ID replaces the map entry. Handles to the
///   replaced account stay valid but are detached from the ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: Mutex<HashMap<AccountId, AccountHandle>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account and registers it under `id`, overwriting any
    /// existing entry.
    ///
    /// The returned account is visible to other threads as soon as this
    /// call releases the ledger lock.
    pub fn create_account(&self, id: AccountId, initial_balance: Decimal) -> AccountHandle {
        let account = Arc::new(Account::new(id, initial_balance));
        let replaced = self.accounts.lock().insert(id, Arc::clone(&account));

        if replaced.is_some() {
            log::warn!("account {id} re-created; previous account detached from the ledger");
        }
        account
    }

    /// Looks up an account. Never blocks on an account lock.
    pub fn get_account(&self, id: AccountId) -> Option<AccountHandle> {
        self.accounts.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.lock().is_empty()
    }

    /// Returns handles to every registered account, ordered by ID.
    ///
    /// Only the handles are copied under the ledger lock; reading balances
    /// afterwards takes each account's own lock.
    pub fn snapshot(&self) -> Vec<AccountHandle> {
        let mut accounts: Vec<AccountHandle> = self.accounts.lock().values().cloned().collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }
}
