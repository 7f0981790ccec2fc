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

//! # Concurrent Ledger
//!
//! An in-memory ledger of independently lockable accounts, driven by
//! operations that each run on their own thread.
//!
//! ## Core Components
//!
//! - [`Account`]: Balance holder with its own private lock
//! - [`Ledger`]: Registry mapping [`AccountId`] to accounts, with a separate lock
//! - [`Dispatcher`]: Launches one thread per [`Operation`] and joins them at a barrier
//! - [`ReportSink`]: Serialized destination for per-task [`Report`]s
//! - [`LedgerError`]: Negative outcomes (unknown account, insufficient balance)
//!
//! ## Example
//!
//! ```
//! use concurrent_ledger::{AccountId, ChannelSink, Dispatcher, Ledger, Operation};
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(Ledger::new());
//! let (sink, reports) = ChannelSink::unbounded();
//! let dispatcher = Dispatcher::new(Arc::clone(&ledger), Arc::new(sink));
//!
//! dispatcher.submit(Operation::CreateAccount {
//!     customer_id: AccountId(1),
//!     initial_balance: dec!(100.0),
//! });
//! dispatcher.shutdown();
//!
//! dispatcher.submit(Operation::Deposit { account_id: AccountId(1), amount: dec!(50.0) });
//! dispatcher.submit(Operation::Withdraw { account_id: AccountId(1), amount: dec!(30.0) });
//! dispatcher.shutdown();
//!
//! assert_eq!(ledger.get_account(AccountId(1)).unwrap().balance(), dec!(120.0));
//! assert!(reports.try_iter().all(|report| report.is_success()));
//! ```
//!
//! ## Thread Safety
//!
//! Each account's balance is guarded by that account's own lock, and the
//! ledger's lock guards only the ID → account map. No operation holds both,
//! so unrelated accounts are mutated in parallel and no lock ordering
//! hazard exists.

pub mod account;
mod base;
mod dispatcher;
pub mod error;
mod ledger;
mod operation;
mod sink;

pub use account::Account;
pub use base::{AccountId, TaskId};
pub use dispatcher::{Dispatcher, ShutdownSummary, TaskState};
pub use error::LedgerError;
pub use ledger::{AccountHandle, Ledger};
pub use operation::{Operation, Outcome, Report};
pub use sink::{ChannelSink, ConsoleOptions, ConsoleSink, ReportSink};
