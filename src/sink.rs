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

//! Report sinks.
//!
//! Tasks hand their [`Report`] to a [`ReportSink`]. Sinks serialize delivery
//! so that one task's output is never interleaved with another's. This lock
//! is unrelated to the ledger and account locks and never held together with
//! them.

use crate::operation::Report;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::io::{self, Write};

const BLUE_BOLD: &str = "\x1b[1;34m";
const RED_BOLD: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// Destination for task results.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: Report);
}

/// Rendering options for [`ConsoleSink`].
#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
    /// Wrap banners and failures in ANSI colour codes.
    pub color: bool,
    /// Print a `::thread <id> ::` line ahead of each report.
    pub thread_banner: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            color: true,
            thread_banner: true,
        }
    }
}

/// Writes human-readable reports to a shared writer.
///
/// All output, reports and anything passed to [`ConsoleSink::print`], goes
/// through one mutex, so each write lands as a single unit.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
    options: ConsoleOptions,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(options: ConsoleOptions) -> Self {
        Self::new(io::stdout(), options)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, options: ConsoleOptions) -> Self {
        Self {
            out: Mutex::new(out),
            options,
        }
    }

    /// Writes raw text under the output lock.
    pub fn print(&self, text: &str) {
        self.write_locked(text);
    }

    /// Writes one line under the output lock, in red when colour is enabled.
    pub fn print_error(&self, line: &str) {
        if self.options.color {
            self.write_locked(&format!("{RED_BOLD}{line}{RESET}\n"));
        } else {
            self.write_locked(&format!("{line}\n"));
        }
    }

    /// Consumes the sink and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn render(&self, report: &Report) -> String {
        let mut text = String::new();
        let color = self.options.color;

        if self.options.thread_banner {
            if color {
                text.push_str(&format!("{BLUE_BOLD}::thread {} ::{RESET}\n", report.thread));
            } else {
                text.push_str(&format!("::thread {} ::\n", report.thread));
            }
        }

        if color && !report.is_success() {
            text.push_str(&format!("{RED_BOLD}{report}{RESET}\n"));
        } else {
            text.push_str(&format!("{report}\n"));
        }
        text
    }

    fn write_locked(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            log::warn!("failed to write report: {e}");
        }
    }
}

impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    fn report(&self, report: Report) {
        let text = self.render(&report);
        self.write_locked(&text);
    }
}

/// Forwards reports over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Report>,
}

impl ChannelSink {
    /// Creates a sink backed by an unbounded channel, plus its receiving end.
    pub fn unbounded() -> (Self, Receiver<Report>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn report(&self, report: Report) {
        if let Err(e) = self.tx.send(report) {
            log::warn!("report for task {} dropped: receiver gone", e.0.task);
        }
    }
}
