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

//! Ledger public API integration tests.

use concurrent_ledger::{AccountId, Ledger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn create_account_returns_usable_handle() {
    let ledger = Ledger::new();
    let account = ledger.create_account(AccountId(1), dec!(100.0));

    account.deposit(dec!(50.0));
    assert_eq!(
        ledger.get_account(AccountId(1)).unwrap().balance(),
        dec!(150.0)
    );
}

#[test]
fn get_unknown_account_returns_none() {
    let ledger = Ledger::new();
    ledger.create_account(AccountId(1), dec!(1.0));

    for _ in 0..3 {
        assert!(ledger.get_account(AccountId(999)).is_none());
    }
    assert_eq!(ledger.len(), 1);
}

#[test]
fn lookup_does_not_wait_for_account_lock_holders() {
    let ledger = Arc::new(Ledger::new());
    let account = ledger.create_account(AccountId(1), Decimal::ZERO);

    // Hammer the account from several threads while looking it up.
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let account = Arc::clone(&account);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    account.deposit(dec!(1));
                }
            })
        })
        .collect();

    for _ in 0..1_000 {
        assert!(ledger.get_account(AccountId(1)).is_some());
        assert!(ledger.get_account(AccountId(2)).is_none());
    }

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(account.balance(), dec!(4000));
}

#[test]
fn concurrent_creates_with_distinct_ids_keep_every_entry() {
    let ledger = Arc::new(Ledger::new());
    let barrier = Arc::new(Barrier::new(64));

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.create_account(AccountId(i), Decimal::from(i));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.len(), 64);
    for i in 0..64 {
        let account = ledger.get_account(AccountId(i)).unwrap();
        assert_eq!(account.balance(), Decimal::from(i));
    }
}

#[test]
fn concurrent_creates_with_same_id_leave_one_survivor() {
    let ledger = Arc::new(Ledger::new());
    let barrier = Arc::new(Barrier::new(32));

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.create_account(AccountId(7), Decimal::from(i))
            })
        })
        .collect();

    let created: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(ledger.len(), 1);
    let survivor = ledger.get_account(AccountId(7)).unwrap();
    let matches = created
        .iter()
        .filter(|account| Arc::ptr_eq(account, &survivor))
        .count();
    assert_eq!(matches, 1);
}

#[test]
fn identifier_resolves_to_same_instance_until_recreated() {
    let ledger = Ledger::new();
    let first = ledger.create_account(AccountId(1), dec!(1.0));

    for _ in 0..10 {
        assert!(Arc::ptr_eq(&first, &ledger.get_account(AccountId(1)).unwrap()));
    }
}

#[test]
fn snapshot_reflects_current_balances() {
    let ledger = Ledger::new();
    ledger.create_account(AccountId(2), dec!(20.0));
    ledger.create_account(AccountId(1), dec!(10.0));
    ledger.get_account(AccountId(1)).unwrap().deposit(dec!(5.0));

    let balances: Vec<_> = ledger
        .snapshot()
        .iter()
        .map(|account| (account.id(), account.balance()))
        .collect();

    assert_eq!(
        balances,
        vec![(AccountId(1), dec!(15.0)), (AccountId(2), dec!(20.0))]
    );
}
