// Licensed under the Apache-2.0 license

//! Register database loader, decoder and C header generator.
//!
//! A register database describes the address spaces of a device: domains
//! holding registers, arrays and stripes, with bitfields, enums and named
//! types, some of them present only on certain hardware variants.
//!
//! ## Usage
//!
//! ```no_run
//! use registers_rnn::{load_schema, Decoder, LoadConfig, VariantContext};
//!
//! let schema = load_schema(&LoadConfig::from_env(), &["adreno.xml"]).unwrap();
//! let mut ctx = VariantContext::new();
//! ctx.select(&schema, "chip", "A6XX").unwrap();
//!
//! let dom = schema.find_domain("A6XX").unwrap();
//! let dec = Decoder::new(&schema);
//! println!("{}", dec.decode_register(&mut ctx, dom, 0x8e00, true, 0x1234));
//! ```
//!
//! ## Module Organization
//!
//! - [`tree`]: markup document parsing
//! - [`types`]: the database data model
//! - [`config`]: search path, loader settings and output colors
//! - [`error`]: load and decode errors
//! - [`variant`]: variant selection used while decoding
//! - `loader`: building a [`Database`](types::Database) from files
//! - `resolve`: turning a database into an immutable [`Schema`]
//! - `decode`: addresses to names, raw values to text
//! - `headergen`: C headers with offsets, masks and accessors
//! - `session`: the [`Rnn`] convenience wrapper

pub mod config;
pub mod error;
pub mod tree;
pub mod types;
pub mod util;
pub mod variant;

mod decode;
mod headergen;
mod loader;
mod resolve;
mod session;

pub use config::{Colors, LoadConfig, SchemaValidator, SearchPath};
pub use decode::{DecodedName, Decoder};
pub use error::{DecodeError, Diagnostic, LoadError, TreeError};
pub use headergen::{generate_headers, write_headers, GeneratedHeader};
pub use loader::Loader;
pub use resolve::{resolve, Schema};
pub use session::{RegInfo, Rnn};
pub use variant::VariantContext;

use std::path::Path;

/// Load every file in `paths` into one database and resolve it.
///
/// Soft errors leave [`Database::failed`](types::Database::failed) set on
/// the returned schema.
pub fn load_schema<P: AsRef<Path>>(config: &LoadConfig, paths: &[P]) -> Result<Schema, LoadError> {
    let loader = Loader::new(config.clone());
    let mut db = types::Database::new();
    for path in paths {
        loader.load(&mut db, path)?;
    }
    resolve(db)
}
