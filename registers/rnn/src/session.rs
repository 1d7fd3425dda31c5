// Licensed under the Apache-2.0 license

//! One-stop decoding session for tools that inspect register traces.
//!
//! [`Rnn`] bundles a resolved schema, the variant selection and the output
//! colors, plus the domain addresses are decoded against.

use crate::config::{Colors, LoadConfig};
use crate::decode::Decoder;
use crate::loader::Loader;
use crate::resolve::{resolve, Schema};
use crate::types::{Database, Domain, TypeInfo};
use crate::variant::VariantContext;
use anyhow::{anyhow, bail, Result};
use std::path::Path;

/// What [`Rnn::reginfo`] knows about an address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegInfo {
    pub name: String,
    /// Register width in bits.
    pub width: u32,
    pub typeinfo: Option<TypeInfo>,
}

#[derive(Debug)]
pub struct Rnn {
    schema: Schema,
    ctx: VariantContext,
    colors: Colors,
    domain: Option<usize>,
}

impl Rnn {
    /// Load and resolve `file`, then select `variant` of `variant_enum`
    /// when both are given.
    ///
    /// Soft load errors are logged and leave [`Rnn::failed`] set.
    pub fn load(
        config: &LoadConfig,
        file: impl AsRef<Path>,
        variant_enum: Option<&str>,
        variant: Option<&str>,
    ) -> Result<Self> {
        let mut db = Database::new();
        Loader::new(config.clone()).load(&mut db, file)?;
        let mut rnn = Self::from_schema(resolve(db)?);
        if rnn.schema.failed {
            log::warn!(
                "database loaded with {} error(s)",
                rnn.schema.diagnostics.len()
            );
        }
        if let (Some(varset), Some(variant)) = (variant_enum, variant) {
            rnn.select_variant(varset, variant)?;
        }
        Ok(rnn)
    }

    pub fn from_schema(schema: Schema) -> Self {
        Self {
            schema,
            ctx: VariantContext::new(),
            colors: Colors::none(),
            domain: None,
        }
    }

    pub fn with_colors(mut self, colors: Colors) -> Self {
        self.colors = colors;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn context(&self) -> &VariantContext {
        &self.ctx
    }

    pub fn failed(&self) -> bool {
        self.schema.failed
    }

    pub fn select_variant(&mut self, varset: &str, variant: &str) -> Result<()> {
        self.ctx.select(&self.schema, varset, variant)?;
        Ok(())
    }

    /// Decode addresses against domain `name` from now on.
    pub fn set_domain(&mut self, name: &str) -> Result<()> {
        match self.schema.domains.iter().position(|d| d.name == name) {
            Some(idx) => {
                self.domain = Some(idx);
                Ok(())
            }
            None => bail!("domain {name} doesn't exist in database"),
        }
    }

    fn domain(&self) -> Result<&Domain> {
        self.domain
            .and_then(|idx| self.schema.domains.get(idx))
            .ok_or_else(|| anyhow!("no domain selected"))
    }

    fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.schema).with_colors(self.colors)
    }

    /// Name of the register at `addr`, error-marked hex when nothing
    /// matches.
    pub fn regname(&self, addr: u64, write: bool) -> Result<String> {
        let domain = self.domain()?;
        Ok(self.decoder().decode_address(&self.ctx, domain, addr, write).name)
    }

    /// Offset of the register named `name`.
    pub fn regbase(&self, name: &str) -> Result<Option<u64>> {
        let domain = self.domain()?;
        Ok(self.decoder().lookup_register_offset(&self.ctx, domain, name))
    }

    pub fn enumname(&self, name: &str, value: u64) -> Option<String> {
        self.decoder().decode_enum(&self.ctx, name, value)
    }

    /// Name, width and type of the register at `addr`, if one matches.
    pub fn reginfo(&self, addr: u64, write: bool) -> Result<Option<RegInfo>> {
        let domain = self.domain()?;
        let decoded = self.decoder().decode_address(&self.ctx, domain, addr, write);
        if decoded.error.is_some() {
            return Ok(None);
        }
        Ok(Some(RegInfo {
            name: decoded.name,
            width: decoded.width,
            typeinfo: decoded.typeinfo.cloned(),
        }))
    }

    /// Render `raw` as a value of `ti`, applying `addvariant` selections to
    /// the session.
    pub fn decode_value(&mut self, ti: &TypeInfo, raw: u64) -> String {
        let decoder = Decoder::new(&self.schema).with_colors(self.colors);
        decoder.decode_value(&mut self.ctx, ti, raw)
    }

    /// `NAME <= value` or `NAME => value` for an access to `addr`.
    pub fn decode_register(&mut self, addr: u64, write: bool, value: u64) -> Result<String> {
        let idx = self.domain.ok_or_else(|| anyhow!("no domain selected"))?;
        let decoder = Decoder::new(&self.schema).with_colors(self.colors);
        let domain = &self.schema.domains[idx];
        Ok(decoder.decode_register(&mut self.ctx, domain, addr, write, value))
    }
}
