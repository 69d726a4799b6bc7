use clap::{Parser as ClapParser, Subcommand};
use std::process;

use garnet::{ContextCreateInfo, MutableString, RubyContext, RubyResult, encoding};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long)]
    verbose: bool,

    /// Encoding of the text arguments
    #[arg(long, help = "Default encoding for literals (UTF-8)")]
    encoding: Option<String>,

    /// Legacy encoding for byte offsets
    #[arg(long)]
    kcode: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate characters of FROM into TO
    Tr { from: String, to: String, text: String },
    /// Translate, then squeeze runs of translated characters
    TrS { from: String, to: String, text: String },
    /// Delete characters selected by every spec
    Delete {
        #[arg(long = "spec", required = true)]
        specs: Vec<String>,
        text: String,
    },
    /// Collapse runs of repeated characters
    Squeeze {
        #[arg(long = "spec")]
        specs: Vec<String>,
        text: String,
    },
    /// Count characters selected by every spec
    Count {
        #[arg(long = "spec", required = true)]
        specs: Vec<String>,
        text: String,
    },
    Inspect { text: String },
    Dump { text: String },
    /// Re-encode TEXT and print the bytes in hex
    Transcode {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        text: String,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn context(cli: &Cli) -> RubyResult<RubyContext> {
    let default_encoding = cli.encoding.as_deref().map(encoding::require).transpose()?;
    let kcode = cli.kcode.as_deref().map(encoding::require).transpose()?;
    Ok(RubyContext::new(ContextCreateInfo {
        default_encoding,
        kcode,
        detect_literal_ascii: false,
    }))
}

fn strings(context: &RubyContext, texts: &[String]) -> RubyResult<Vec<MutableString>> {
    texts.iter().map(|text| context.string_literal(text)).collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run(cli: &Cli) -> RubyResult<String> {
    let context = context(cli)?;
    let literal = |text: &str| context.string_literal(text);
    Ok(match &cli.command {
        Command::Tr { from, to, text } => {
            literal(text)?.tr(&literal(from)?, &literal(to)?)?.to_string()
        }
        Command::TrS { from, to, text } => {
            literal(text)?.tr_s(&literal(from)?, &literal(to)?)?.to_string()
        }
        Command::Delete { specs, text } => {
            literal(text)?.delete(&strings(&context, specs)?)?.to_string()
        }
        Command::Squeeze { specs, text } => {
            literal(text)?.squeeze(&strings(&context, specs)?)?.to_string()
        }
        Command::Count { specs, text } => {
            literal(text)?.count(&strings(&context, specs)?)?.to_string()
        }
        Command::Inspect { text } => literal(text)?.inspect().to_string(),
        Command::Dump { text } => literal(text)?.dump().to_string(),
        Command::Transcode { from, to, text } => {
            let (source, target) = encoding::converter(from, to)?;
            let mut string = MutableString::literal_in(text, source)?;
            string.transcode(target)?;
            hex(&string.to_bytes()?)
        }
    })
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("{}: {}", err.class_name(), err);
            process::exit(1);
        }
    }
}
