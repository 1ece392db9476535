//! `hash-trace` command line.
//!
//! `extract` builds the table from a source tree, `decode` turns hash-coded
//! output back into text, either from stdin or from a program it runs.
//! Diagnostics go to stderr so decoded output can be piped.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use hash_trace::{
    CanonicalMessage, ColorMode, ProcessSource, ReaderSource, TraceDecoder, TraceExtractor,
    TraceLevel, TraceTable,
};

/// Hashed-string trace extraction and decoding
#[derive(Parser, Debug)]
#[command(name = "hash-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a source tree and write trace.csv
    Extract {
        /// Root of the source tree
        root: PathBuf,

        /// Existing directory that receives trace.csv
        output: PathBuf,

        /// Source file extension to scan (repeatable, defaults to .cpp and .h)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },

    /// Decode hash-coded lines from stdin or from a program's stdout
    Decode {
        /// Table written by `extract`
        table: PathBuf,

        /// How to treat [:N] colour marks in messages
        #[arg(long, value_enum, default_value_t = ColorArg::Keep)]
        color: ColorArg,

        /// Program (and its arguments) whose output is decoded
        #[arg(last = true, value_name = "APP")]
        app: Vec<String>,
    },

    /// Print the hash of a single message
    Hash {
        /// info, warning or error; anything else adds no prefix
        level: String,

        /// Message text
        text: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorArg {
    Keep,
    Ansi,
    Strip,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Keep => ColorMode::Keep,
            ColorArg::Ansi => ColorMode::Ansi,
            ColorArg::Strip => ColorMode::Strip,
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {l} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .context("invalid logging configuration")?;
    log4rs::init_config(config).context("logger already initialised")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Extract {
            root,
            output,
            extensions,
        } => {
            let extractor = if extensions.is_empty() {
                TraceExtractor::default()
            } else {
                TraceExtractor::new(extensions)
            };
            extractor.extract(&root, &output)?;
        }

        Commands::Decode { table, color, app } => {
            let table = TraceTable::load(&table)?;
            let decoder = TraceDecoder::new(table).with_color_mode(color.into());
            let stdout = io::stdout();
            let mut out = stdout.lock();

            match app.split_first() {
                Some((program, args)) => {
                    let source = ProcessSource::new(program.as_str()).args(args.iter().cloned());
                    decoder.run(source, &mut out)?;
                }
                None => {
                    let source = ReaderSource::new(io::stdin().lock());
                    decoder.run(source, &mut out)?;
                }
            }
        }

        Commands::Hash { level, text } => {
            let message = CanonicalMessage::new(TraceLevel::from_method(&level), &text);
            println!("{};{}", message.hash(), message);
        }
    }

    Ok(())
}
