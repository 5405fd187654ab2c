use std::io;

use anyhow::{anyhow, Context};
use byteorder::{NativeEndian, ReadBytesExt};
use clap::Parser;
use log::{info, LevelFilter};
use num_complex::Complex;

use sensor345::{FilterConfig, SensorReceiverBuilder, TapSpec};

mod app;
mod cli;
mod tracker;

use cli::{Args, CliError};

fn main() {
    match sensordec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn sensordec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // create the decoder
    let mut rx = SensorReceiverBuilder::new(args.rate)
        .with_translation(args.translate)
        .with_if_filter(
            FilterConfig::lowpass(args.if_cutoff, TapSpec::Count(args.if_taps))
                .with_decimation(args.if_decimation),
        )
        .with_baseband_stages(&[
            FilterConfig::highpass(args.hp_cutoff, TapSpec::Count(args.hp_taps)),
            FilterConfig::lowpass(args.lp_cutoff, TapSpec::Count(args.lp_taps))
                .with_decimation(args.lp_decimation),
        ])
        .with_pulse_width(args.pulse_width())
        .with_manchester_policy(args.manchester_policy.into())
        .build()
        .context("Unable to configure the receiver")?;

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let mut inbuf = file_setup(&args, stdin_handle)?;

    // processing: read cf32 from the input source
    app::run(
        &args,
        &mut rx,
        std::iter::from_fn(|| read_cf32(&mut inbuf)),
    )
    .context("Unable to write to standard output")?;

    Ok(())
}

// one interleaved I/Q pair, or None at end of input
fn read_cf32<R: io::Read>(inbuf: &mut R) -> Option<Complex<f32>> {
    let re = inbuf.read_f32::<NativeEndian>().ok()?;
    let im = inbuf.read_f32::<NativeEndian>().ok()?;
    Some(Complex::new(re, im))
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("sensor345", log_filter)
            .filter_module("sensordec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("sensor decoder reading standard input");
        if !is_terminal(&std::io::stdin()) {
            Ok(Box::new(io::BufReader::new(stdin)))
        } else {
            Err(anyhow!(
                "cowardly refusing to read IQ samples from a terminal.

Pipe a source of cf32 samples from rx_sdr, a GNU Radio File
Sink, or similar into this program."
            ))
        }
    } else {
        info!("sensor decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
