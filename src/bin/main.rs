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

use clap::Parser;
use concurrent_ledger::{AccountId, ConsoleOptions, ConsoleSink, Dispatcher, Ledger, Operation};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::Arc;

/// Concurrent Ledger - Banking menu over a multi-threaded account ledger
///
/// Every operation runs on its own thread. Without a script the program
/// starts an interactive menu on stdin.
#[derive(Parser, Debug)]
#[command(name = "concurrent-ledger")]
#[command(about = "A concurrent in-memory ledger driven by a menu or a CSV script", long_about = None)]
struct Args {
    /// Path to a CSV script of operations
    ///
    /// Expected format: op,id,amount
    /// Ops: create, deposit, withdraw, balance, wait
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Disable ANSI colours in the output
    #[arg(long)]
    no_color: bool,

    /// Do not print the worker thread ID ahead of each result
    #[arg(long)]
    no_thread_banner: bool,

    /// Write final balances as CSV to stdout after all operations complete
    #[arg(long)]
    dump: bool,
}

const MENU: &str = "\n----------------------------------------\n\
                    Banking System Menu:\n\
                    1. Create Account\n\
                    2. Deposit\n\
                    3. Withdraw\n\
                    4. Check Balance\n\
                    5. Exit\n\
                    ----------------------------------------\n\
                    Enter your choice > ";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let options = ConsoleOptions {
        color: !args.no_color,
        thread_banner: !args.no_thread_banner,
    };

    let ledger = Arc::new(Ledger::new());
    let console = Arc::new(ConsoleSink::stdout(options));
    let dispatcher = Dispatcher::new(Arc::clone(&ledger), console.clone());

    match &args.script {
        Some(path) => {
            let file = match File::open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error opening file '{}': {}", path.display(), e);
                    process::exit(1);
                }
            };
            if let Err(e) = run_script(BufReader::new(file), &dispatcher) {
                dispatcher.shutdown();
                eprintln!("Error running script: {}", e);
                process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_menu(io::stdin().lock(), &console, &dispatcher) {
                dispatcher.shutdown();
                eprintln!("Error reading input: {}", e);
                process::exit(1);
            }
        }
    }

    // All tasks must finish before balances are read or the process exits.
    dispatcher.shutdown();

    if args.dump {
        if let Err(e) = write_accounts(&ledger, io::stdout()) {
            eprintln!("Error writing output: {}", e);
            process::exit(1);
        }
    }
}

/// Runs the interactive menu until the user exits or input ends.
///
/// Menu text and prompts go through the console lock so they never split a
/// task's report.
fn run_menu<R: BufRead, W: Write + Send>(
    mut input: R,
    console: &ConsoleSink<W>,
    dispatcher: &Dispatcher,
) -> io::Result<()> {
    loop {
        console.print(MENU);
        let Some(choice) = read_line(&mut input)? else {
            return Ok(());
        };

        let operation = match choice.trim() {
            "1" => {
                let Some(id) = prompt(&mut input, console, "Enter customer ID: ")? else {
                    return Ok(());
                };
                let Some(balance) = prompt(&mut input, console, "Enter initial balance: ")? else {
                    return Ok(());
                };
                Operation::CreateAccount {
                    customer_id: AccountId(id),
                    initial_balance: balance,
                }
            }
            "2" => {
                let Some(id) = prompt(&mut input, console, "Enter account ID: ")? else {
                    return Ok(());
                };
                let Some(amount) = prompt(&mut input, console, "Enter amount to deposit: ")? else {
                    return Ok(());
                };
                Operation::Deposit {
                    account_id: AccountId(id),
                    amount,
                }
            }
            "3" => {
                let Some(id) = prompt(&mut input, console, "Enter account ID: ")? else {
                    return Ok(());
                };
                let Some(amount) = prompt(&mut input, console, "Enter amount to withdraw: ")? else {
                    return Ok(());
                };
                Operation::Withdraw {
                    account_id: AccountId(id),
                    amount,
                }
            }
            "4" => {
                let Some(id) = prompt(&mut input, console, "Enter account ID: ")? else {
                    return Ok(());
                };
                Operation::CheckBalance {
                    account_id: AccountId(id),
                }
            }
            "5" => return Ok(()),
            _ => {
                console.print_error("Invalid choice. Please try again.");
                continue;
            }
        };

        dispatcher.submit(operation);
    }
}

/// Reads one line, returning `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Prompts until a value parses, returning `None` at end of input.
fn prompt<T: FromStr, R: BufRead, W: Write + Send>(
    input: &mut R,
    console: &ConsoleSink<W>,
    message: &str,
) -> io::Result<Option<T>> {
    loop {
        console.print(message);
        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        match line.trim().parse() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => console.print_error("Invalid input. Please try again."),
        }
    }
}

/// Raw CSV record of a script.
///
/// Fields: `op, id, amount`
#[derive(Debug, Deserialize)]
struct ScriptRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<i32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
}

#[derive(Debug, PartialEq)]
enum ScriptStep {
    Submit(Operation),
    /// Barrier: wait for every task submitted so far.
    Wait,
}

impl ScriptRecord {
    /// Converts the record into a script step.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_step(self) -> Option<ScriptStep> {
        let op = self.op.to_lowercase();
        if op == "wait" {
            return Some(ScriptStep::Wait);
        }

        let account_id = AccountId(self.id?);
        let operation = match op.as_str() {
            "create" => Operation::CreateAccount {
                customer_id: account_id,
                initial_balance: self.amount?,
            },
            "deposit" => Operation::Deposit {
                account_id,
                amount: self.amount?,
            },
            "withdraw" => Operation::Withdraw {
                account_id,
                amount: self.amount?,
            },
            "balance" => Operation::CheckBalance { account_id },
            _ => return None,
        };
        Some(ScriptStep::Submit(operation))
    }
}

/// Submits every operation of a CSV script to the dispatcher.
///
/// Rows are submitted in file order but run concurrently; a `wait` row
/// blocks until everything before it has completed. Malformed rows are
/// skipped with a warning. Returns the number of submitted operations.
///
/// # Example
///
/// ```csv
/// op,id,amount
/// create,1,100.0
/// wait,,
/// deposit,1,50.0
/// withdraw,1,30.0
/// balance,1,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
fn run_script<R: Read>(reader: R, dispatcher: &Dispatcher) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut submitted = 0;
    for result in rdr.deserialize::<ScriptRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                log::warn!("skipping malformed row: {e}");
                continue;
            }
        };

        match record.into_step() {
            Some(ScriptStep::Submit(operation)) => {
                dispatcher.submit(operation);
                submitted += 1;
            }
            Some(ScriptStep::Wait) => {
                dispatcher.shutdown();
            }
            None => log::warn!("skipping invalid script row"),
        }
    }

    Ok(submitted)
}

/// Writes every account's balance as CSV.
///
/// # CSV Format
///
/// Columns: `account, balance`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_accounts<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for account in ledger.snapshot() {
        wtr.serialize(&*account)?;
    }

    wtr.flush()?;
    Ok(())
}
