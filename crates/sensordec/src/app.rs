//! Message reporting
//!
//! Every message which passes the `--vendor` filter is printed
//! with a UTC timestamp and then recorded in the
//! [`SensorTracker`]. The tracker's report follows: a full state
//! dump for a new transmitter, or only the changed bits for a
//! known one. When the input is exhausted, the receiver is
//! flushed and the summary is printed.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use log::{debug, info};
use num_complex::Complex;
use sensor345::{SensorMessage, SensorReceiver};

use crate::cli::Args;
use crate::tracker::{format_time, SensorTracker};

/// Run the application
///
/// Decodes messages from the `input` iterator, which returns
/// each complex sample from some input source until it is
/// exhausted, with a fully-initialized `receiver`. Reports are
/// written to standard output.
pub fn run<I>(args: &Args, receiver: &mut SensorReceiver, input: I) -> io::Result<()>
where
    I: Iterator<Item = Complex<f32>>,
{
    let stdout = io::stdout();
    let mut reporter = Reporter::new(args, stdout.lock());

    for msg in receiver.iter(input) {
        reporter.report(&msg, Utc::now())?;
    }

    // flush all data samples out of the decoder
    if let Some(lastmsg) = receiver.flush() {
        reporter.report(&lastmsg, Utc::now())?;
    }

    let stats = receiver.stats();
    info!(
        "decoder: {} syncs, {} messages, {} CRC errors, {} zero txids, {} bad channels, {} invalid pairs, {} truncated",
        stats.syncs,
        stats.messages,
        stats.crc_errors,
        stats.zero_txids,
        stats.bad_channels,
        stats.invalid_pairs,
        stats.truncated
    );

    reporter.finish()
}

/// Writes reports and keeps the tracker
struct Reporter<W: Write> {
    out: W,
    tracker: SensorTracker,
    args: Args,
}

impl<W: Write> Reporter<W> {
    fn new(args: &Args, out: W) -> Self {
        Self {
            out,
            tracker: SensorTracker::new(),
            args: args.clone(),
        }
    }

    // print and track one message
    fn report(&mut self, msg: &SensorMessage, at: DateTime<Utc>) -> io::Result<()> {
        if !self.args.wants_vendor(msg.vendor()) {
            debug!("ignoring message from {}", msg.vendor());
            return Ok(());
        }

        let update = self.tracker.push(msg, at);
        if self.args.quiet {
            return Ok(());
        }

        writeln!(self.out, "[{}] {}", format_time(&at), msg)?;
        writeln!(self.out, "{}", update)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    // print the summary, if wanted
    fn finish(mut self) -> io::Result<()> {
        if self.args.quiet || self.args.no_summary {
            return Ok(());
        }
        self.tracker.write_summary(&mut self.out)?;
        self.out.flush()
    }
}
