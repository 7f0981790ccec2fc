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

//! Error types for ledger operations.

use crate::base::AccountId;
use thiserror::Error;

/// Negative outcomes of a ledger operation.
///
/// Neither is fatal: both are resolved inside the task that hit them and
/// surface as the result of that task's [`Report`](crate::Report).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Deposit, withdrawal or balance check referenced an unknown account
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    /// Withdrawal exceeds the current balance; the account is left untouched
    #[error("Insufficient balance in account {0}")]
    InsufficientBalance(AccountId),
}

impl LedgerError {
    /// Account the failed operation referenced.
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::AccountNotFound(id) | Self::InsufficientBalance(id) => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::AccountNotFound(AccountId(999)).to_string(),
            "Account 999 not found"
        );
        assert_eq!(
            LedgerError::InsufficientBalance(AccountId(1)).to_string(),
            "Insufficient balance in account 1"
        );
    }

    #[test]
    fn error_carries_account_id() {
        assert_eq!(
            LedgerError::AccountNotFound(AccountId(-3)).account_id(),
            AccountId(-3)
        );
        assert_eq!(
            LedgerError::InsufficientBalance(AccountId(7)).account_id(),
            AccountId(7)
        );
    }
}
