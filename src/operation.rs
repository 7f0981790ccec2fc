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

//! Operation requests and their outcomes.
//!
//! An [`Operation`] is what a caller submits; applying it to a [`Ledger`]
//! yields either an [`Outcome`] or a [`LedgerError`]. A [`Report`] wraps that
//! result together with the task that produced it.

use crate::base::{AccountId, TaskId};
use crate::error::LedgerError;
use crate::ledger::Ledger;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request against the ledger.
///
/// Requests carry no identifier of their own and are never retried or
/// deduplicated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operation {
    CreateAccount {
        customer_id: AccountId,
        initial_balance: Decimal,
    },
    Deposit {
        account_id: AccountId,
        amount: Decimal,
    },
    Withdraw {
        account_id: AccountId,
        amount: Decimal,
    },
    CheckBalance {
        account_id: AccountId,
    },
}

impl Operation {
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::CreateAccount { customer_id, .. } => *customer_id,
            Self::Deposit { account_id, .. } => *account_id,
            Self::Withdraw { account_id, .. } => *account_id,
            Self::CheckBalance { account_id } => *account_id,
        }
    }

    /// Runs the operation to completion on the calling thread.
    ///
    /// At most one lock is held at any time: the ledger lock for the lookup
    /// or insert, then the account lock for the balance access.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Deposit, withdrawal or balance check on an unknown ID.
    /// - [`LedgerError::InsufficientBalance`] - Withdrawal exceeds the balance.
    pub fn apply(self, ledger: &Ledger) -> Result<Outcome, LedgerError> {
        match self {
            Self::CreateAccount {
                customer_id,
                initial_balance,
            } => {
                ledger.create_account(customer_id, initial_balance);
                Ok(Outcome::AccountCreated {
                    account_id: customer_id,
                    balance: initial_balance,
                })
            }
            Self::Deposit { account_id, amount } => {
                let account = ledger
                    .get_account(account_id)
                    .ok_or(LedgerError::AccountNotFound(account_id))?;
                account.deposit(amount);
                Ok(Outcome::Deposited { account_id, amount })
            }
            Self::Withdraw { account_id, amount } => {
                let account = ledger
                    .get_account(account_id)
                    .ok_or(LedgerError::AccountNotFound(account_id))?;
                if !account.withdraw(amount) {
                    return Err(LedgerError::InsufficientBalance(account_id));
                }
                Ok(Outcome::Withdrew { account_id, amount })
            }
            Self::CheckBalance { account_id } => {
                let account = ledger
                    .get_account(account_id)
                    .ok_or(LedgerError::AccountNotFound(account_id))?;
                Ok(Outcome::Balance {
                    account_id,
                    balance: account.balance(),
                })
            }
        }
    }
}

/// Successful result of an [`Operation`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    AccountCreated {
        account_id: AccountId,
        balance: Decimal,
    },
    Deposited {
        account_id: AccountId,
        amount: Decimal,
    },
    Withdrew {
        account_id: AccountId,
        amount: Decimal,
    },
    Balance {
        account_id: AccountId,
        balance: Decimal,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountCreated {
                account_id,
                balance,
            } => write!(
                f,
                "Account created for customer {account_id} with initial balance {balance}"
            ),
            Self::Deposited { account_id, amount } => {
                write!(f, "Deposited {amount} to account {account_id}")
            }
            Self::Withdrew { account_id, amount } => {
                write!(f, "Withdrew {amount} from account {account_id}")
            }
            Self::Balance {
                account_id,
                balance,
            } => write!(f, "Balance for account {account_id} is {balance}"),
        }
    }
}

/// Result of one dispatched task, as delivered to a [`ReportSink`](crate::ReportSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub task: TaskId,
    /// Debug rendering of the worker thread's ID.
    pub thread: String,
    pub operation: Operation,
    pub result: Result<Outcome, LedgerError>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(outcome) => write!(f, "{outcome}"),
            Err(error) => write!(f, "{error}"),
        }
    }
}
