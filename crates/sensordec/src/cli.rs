use std::fmt::Display;

use clap::{error::ErrorKind, value_parser, CommandFactory, Parser, ValueEnum};

use sensor345::{ManchesterPolicy, Vendor};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts complex baseband samples in cf32 format (interleaved native-endian f32 I and Q), at the given sampling --rate, and decodes any 345 MHz security sensor messages that are present.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts complex baseband samples in cf32 format (interleaved native-endian f32 I and Q), at the given sampling --rate, and decodes any 345 MHz security sensor messages that are present. This is the format of the GNU Radio File Sink.

Tune your receiver so that the sensor band at 345 MHz lies --translate Hz away from the center of the capture. With the defaults, tune to 344.93 MHz and sample at 200 kSa/s.

    rx_sdr -f 344930000 -s 200000 -F CF32 - \
        | sensordec

Each valid message is printed with a UTC timestamp. The first message from each transmitter prints every state bit. Later messages print only the bits which changed. A summary of every transmitter is printed when the input ends.

Nothing is stored. These sensors are not secure, and this program is not an alarm panel.
"#;

const ADVANCED: &str = "Advanced Receiver Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even sensor messages
    #[arg(short, long)]
    pub quiet: bool,

    /// Sampling rate (Hz)
    ///
    /// Set to the sampling rate of your IQ source. The default
    /// filters were designed for 200 kSa/s.
    #[arg(short, long, default_value_t = 200_000)]
    pub rate: u32,

    /// Input file (or "-" for stdin)
    ///
    /// The input must be complex float (cf32), native-endian,
    /// at --rate.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Frequency translation (Hz)
    ///
    /// The negative of the sensor band's offset from the center
    /// of the capture.
    #[arg(short, long, default_value_t = -70_000, allow_negative_numbers = true)]
    pub translate: i32,

    /// Report only messages from this vendor
    ///
    /// One of: honeywell, 2gig, vivint, vivint-init, unknown
    #[arg(long, value_parser = parse_vendor)]
    pub vendor: Option<Vendor>,

    /// Do not print the sensor summary at end of input
    #[arg(long)]
    pub no_summary: bool,

    /// Nominal pulse width (µs)
    #[arg(long, default_value_t = 130.0)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub pulse_width_us: f32,

    /// IF filter cutoff (Hz)
    #[arg(long, default_value_t = 20_000)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub if_cutoff: u32,

    /// IF filter taps (odd)
    #[arg(long, default_value_t = 11)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub if_taps: usize,

    /// IF filter decimation
    #[arg(long, default_value_t = 4)]
    #[arg(value_parser = value_parser!(u32).range(1..=64))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub if_decimation: u32,

    /// Baseband highpass cutoff (Hz)
    #[arg(long, default_value_t = 1530)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub hp_cutoff: u32,

    /// Baseband highpass taps (odd)
    #[arg(long, default_value_t = 15)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub hp_taps: usize,

    /// Baseband lowpass cutoff (Hz)
    #[arg(long, default_value_t = 9800)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub lp_cutoff: u32,

    /// Baseband lowpass taps (odd)
    #[arg(long, default_value_t = 5)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub lp_taps: usize,

    /// Baseband lowpass decimation
    #[arg(long, default_value_t = 2)]
    #[arg(value_parser = value_parser!(u32).range(1..=64))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub lp_decimation: u32,

    /// Action on invalid Manchester pairs
    #[arg(long, value_enum, default_value_t = PairPolicy::Skip)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub manchester_policy: PairPolicy,
}

/// Action on invalid Manchester pairs
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairPolicy {
    /// Drop one half-symbol and keep decoding
    Skip,

    /// Abandon the frame
    Abort,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }

    /// Nominal pulse width (s)
    pub fn pulse_width(&self) -> f32 {
        self.pulse_width_us * 1.0e-6
    }

    /// True if messages from `vendor` should be reported
    pub fn wants_vendor(&self, vendor: Vendor) -> bool {
        self.vendor.map_or(true, |v| v == vendor)
    }
}

impl From<PairPolicy> for ManchesterPolicy {
    fn from(policy: PairPolicy) -> ManchesterPolicy {
        match policy {
            PairPolicy::Skip => ManchesterPolicy::SkipHalfSymbol,
            PairPolicy::Abort => ManchesterPolicy::AbortFrame,
        }
    }
}

// vendor names are case-insensitive, but must be known
fn parse_vendor(s: &str) -> Result<Vendor, String> {
    s.parse::<Vendor>()
        .map_err(|_| format!("unknown vendor \"{}\"", s))
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["sensordec"]).expect("parse failed");
        assert!(args.input_is_stdin());
        assert_eq!(200_000, args.rate);
        assert_eq!(-70_000, args.translate);
        assert_eq!(PairPolicy::Skip, args.manchester_policy);
        assert!(args.wants_vendor(Vendor::Honeywell));
        assert!((args.pulse_width() - 130.0e-6).abs() < 1.0e-9);
    }

    #[test]
    fn test_options() {
        let args = Args::try_parse_from([
            "sensordec",
            "--translate",
            "-50000",
            "--vendor",
            "2GIG",
            "--manchester-policy",
            "abort",
        ])
        .expect("parse failed");
        assert_eq!(-50_000, args.translate);
        assert!(args.wants_vendor(Vendor::TwoGig));
        assert!(!args.wants_vendor(Vendor::Honeywell));
        assert_eq!(
            ManchesterPolicy::AbortFrame,
            ManchesterPolicy::from(args.manchester_policy)
        );

        assert!(Args::try_parse_from(["sensordec", "--vendor", "acme"]).is_err());
    }
}
