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

//! Account management.
//!
//! Every [`Account`] owns its balance behind a private lock. Operations on
//! one account are serialized by that lock; operations on different accounts
//! never contend with each other.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use concurrent_ledger::{Account, AccountId};
//!
//! let account = Account::new(AccountId(1), dec!(100.00));
//! account.deposit(dec!(50.00));
//! assert!(account.withdraw(dec!(30.00)));
//! assert!(!account.withdraw(dec!(1000.00)));
//! assert_eq!(account.balance(), dec!(120.00));
//! ```

use crate::base::AccountId;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug)]
struct AccountData {
    balance: Decimal,
}

impl AccountData {
    /// Saturates at the bounds of `Decimal` instead of overflowing.
    fn deposit(&mut self, amount: Decimal) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Check-and-subtract. Leaves the balance untouched on failure.
    fn withdraw(&mut self, amount: Decimal) -> bool {
        if self.balance < amount {
            return false;
        }
        self.balance = self.balance.saturating_sub(amount);
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: withdrawal drove balance negative: {}",
            self.balance
        );
        true
    }
}

/// Ledger account.
///
/// The ID is fixed at construction and read without locking; the balance is
/// only ever touched while `inner` is held.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 4;

    /// Creates an account. The initial balance is not validated and may be negative.
    pub fn new(id: AccountId, initial_balance: Decimal) -> Self {
        Self {
            id,
            inner: Mutex::new(AccountData {
                balance: initial_balance,
            }),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    /// Adds `amount` to the balance unconditionally.
    pub fn deposit(&self, amount: Decimal) {
        self.inner.lock().deposit(amount);
    }

    /// Subtracts `amount` if the balance covers it.
    ///
    /// Returns `false` and leaves the balance unchanged otherwise. The check
    /// and the subtraction happen under a single lock acquisition.
    pub fn withdraw(&self, amount: Decimal) -> bool {
        self.inner.lock().withdraw(amount)
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let balance = self.balance().round_dp(Account::DECIMAL_PRECISION);
        let mut state = serializer.serialize_struct("Account", 2)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("balance", &balance)?;
        state.end()
    }
}
