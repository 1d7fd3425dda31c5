// Licensed under the Apache-2.0 license

//! `rnn`: decode register addresses and values against a register
//! database, or generate C headers from it.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use registers_rnn::util::parse_num;
use registers_rnn::{
    generate_headers, load_schema, write_headers, Colors, Decoder, LoadConfig, Schema,
    SearchPath, VariantContext,
};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rnn",
    author,
    version,
    about = "Decode register addresses and values, or generate C headers"
)]
struct Cli {
    /// Colon-separated database search path (overrides RNN_PATH)
    #[arg(long, global = true, value_name = "DIRS")]
    path: Option<String>,

    /// Select a variant before decoding
    #[arg(long = "variant", global = true, value_name = "ENUM=VALUE", value_parser = parse_variant)]
    variants: Vec<(String, String)>,

    /// Highlight output with terminal colors
    #[arg(long, global = true)]
    color: bool,

    /// Log more (repeat for debug and trace output)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Name the register at an address, optionally decoding a value
    Addr {
        db: PathBuf,
        domain: String,
        #[arg(value_parser = parse_u64)]
        addr: u64,
        /// Match registers as written rather than read
        #[arg(long)]
        write: bool,
        /// Value transferred, decoded with the register's type
        #[arg(long, value_parser = parse_u64)]
        value: Option<u64>,
    },
    /// Decode a value as a named enum, bitset, spectype or builtin type
    Value {
        db: PathBuf,
        type_name: String,
        #[arg(value_parser = parse_u64)]
        value: u64,
        /// Width of the value in bits
        #[arg(long, default_value_t = 32)]
        width: u32,
    },
    /// Print the offset of a register path like `CTX[1].RING[0].BASE`
    Lookup {
        db: PathBuf,
        domain: String,
        name: String,
    },
    /// Print the name of an enum value
    Enum {
        db: PathBuf,
        name: String,
        #[arg(value_parser = parse_u64)]
        value: u64,
    },
    /// Write one C header per database file
    Headers {
        #[arg(required = true)]
        db: Vec<PathBuf>,
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,
    },
}

fn parse_u64(text: &str) -> Result<u64, String> {
    parse_num(text).ok_or_else(|| format!("invalid number \"{text}\""))
}

fn parse_variant(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((varset, variant)) if !varset.is_empty() && !variant.is_empty() => {
            Ok((varset.to_string(), variant.to_string()))
        }
        _ => Err(format!("expected ENUM=VALUE, got \"{text}\"")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    if !run(cli)? {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns false when the database had errors.
fn run(cli: Cli) -> Result<bool> {
    let mut config = LoadConfig::from_env();
    if let Some(path) = &cli.path {
        config = config.with_search_path(SearchPath::new(path));
    }
    let colors = if cli.color {
        Colors::ansi()
    } else {
        Colors::none()
    };

    let files = match &cli.command {
        Command::Addr { db, .. }
        | Command::Value { db, .. }
        | Command::Lookup { db, .. }
        | Command::Enum { db, .. } => std::slice::from_ref(db),
        Command::Headers { db, .. } => db.as_slice(),
    };
    let schema = load_schema(&config, files)?;
    for diag in &schema.diagnostics {
        eprintln!("{diag}");
    }

    let mut ctx = VariantContext::new();
    for (varset, variant) in &cli.variants {
        ctx.select(&schema, varset, variant)?;
    }
    let dec = Decoder::new(&schema).with_colors(colors);

    match &cli.command {
        Command::Addr {
            domain,
            addr,
            write,
            value,
            ..
        } => {
            let dom = find_domain(&schema, domain)?;
            match value {
                Some(value) => {
                    println!("{}", dec.decode_register(&mut ctx, dom, *addr, *write, *value))
                }
                None => println!("{}", dec.decode_address(&ctx, dom, *addr, *write).name),
            }
        }
        Command::Value {
            type_name,
            value,
            width,
            ..
        } => {
            let ti = schema
                .named_type(type_name, *width)
                .with_context(|| format!("unknown type {type_name}"))?;
            println!("{}", dec.decode_value(&mut ctx, &ti, *value));
        }
        Command::Lookup { domain, name, .. } => {
            let dom = find_domain(&schema, domain)?;
            match dec.lookup_register_offset(&ctx, dom, name) {
                Some(offset) => println!("{offset:#x}"),
                None => bail!("no register named {name} in {domain}"),
            }
        }
        Command::Enum { name, value, .. } => match dec.decode_enum(&ctx, name, *value) {
            Some(val) => println!("{val}"),
            None => bail!("{value:#x} is not a value of enum {name}"),
        },
        Command::Headers { out, .. } => {
            let headers = generate_headers(&schema)?;
            for path in write_headers(&headers, out)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(!schema.failed)
}

fn find_domain<'s>(
    schema: &'s Schema,
    name: &str,
) -> Result<&'s registers_rnn::types::Domain> {
    schema
        .find_domain(name)
        .with_context(|| format!("domain {name} doesn't exist in database"))
}
