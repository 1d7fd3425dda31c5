// Licensed under the Apache-2.0 license

//! Decoding raw addresses and values against a resolved [`Schema`].
//!
//! This module contains:
//! - [`Decoder`], the read-only decoding entry point
//! - [`DecodedName`], the result of matching an address
//!
//! The implementation is split across submodules:
//! - `value`: rendering field values by type
//! - `float`: IEEE half precision conversion
//!
//! ## Address matching
//!
//! ```text
//! domain.subelems ── first match wins, declaration order
//!   ├── reg     offset + stride*idx + residual     NAME[idx] / NAME_HI / NAME+0x..
//!   ├── stripe  tried for idx = 0, 1, ...          unnamed: indices carried down
//!   │                                              named:   NAME[idx].inner
//!   └── array   idx from arithmetic or offsets[]   NAME[idx].inner / NAME[idx]+0x..
//! ```

mod float;
mod value;

use crate::config::Colors;
use crate::error::DecodeError;
use crate::resolve::Schema;
use crate::types::*;
use crate::util::{c_hex, parse_num};
use crate::variant::VariantContext;

/// Result of [`Decoder::decode_address`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedName<'a> {
    pub name: String,
    /// Type of the matched register, if a register matched.
    pub typeinfo: Option<&'a TypeInfo>,
    /// Width of the matched register in bits, 0 if none matched.
    pub width: u32,
    pub error: Option<DecodeError>,
}

/// A matched element: rendered name plus the register it landed in.
struct Hit<'a> {
    name: String,
    reg: Option<&'a Reg>,
}

/// One `NAME[idx]...` component of a register path.
#[derive(Clone)]
struct Segment<'t> {
    name: &'t str,
    indices: Vec<&'t str>,
}

fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    path.split('.')
        .map(|part| {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            let mut indices = Vec::new();
            while !rest.is_empty() {
                let close = rest.find(']')?;
                indices.push(rest.get(1..close)?.trim());
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return None;
                }
            }
            (!name.is_empty()).then_some(Segment { name, indices })
        })
        .collect()
}

/// Decodes addresses and values of one schema.
#[derive(Clone, Copy, Debug)]
pub struct Decoder<'a> {
    schema: &'a Schema,
    colors: Colors,
}

impl<'a> Decoder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            colors: Colors::none(),
        }
    }

    pub fn with_colors(mut self, colors: Colors) -> Self {
        self.colors = colors;
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    fn paint(&self, color: &str, text: impl std::fmt::Display) -> String {
        format!("{color}{text}{}", self.colors.reset)
    }

    fn err_hex(&self, val: u64) -> String {
        self.paint(self.colors.err, c_hex(val))
    }

    //=========================================================================
    // Address to name
    //=========================================================================

    /// Name the register at `addr` in `domain`.
    ///
    /// Unmatched addresses come back as error-marked hex with
    /// [`DecodeError::NoAddressMatch`].
    pub fn decode_address(
        &self,
        ctx: &VariantContext,
        domain: &'a Domain,
        addr: u64,
        write: bool,
    ) -> DecodedName<'a> {
        let hit = if ctx.matches(self.schema, &domain.varinfo) {
            self.try_match(ctx, &domain.subelems, addr, write, domain.width.max(1), &[])
        } else {
            None
        };
        match hit {
            Some(hit) => DecodedName {
                name: hit.name,
                typeinfo: hit.reg.map(|r| &r.typeinfo),
                width: hit.reg.map_or(0, |r| r.width),
                error: None,
            },
            None => DecodedName {
                name: self.err_hex(addr),
                typeinfo: None,
                width: 0,
                error: Some(DecodeError::NoAddressMatch(addr)),
            },
        }
    }

    /// Whether any register of `domain` covers `addr`.
    pub fn check_address(
        &self,
        ctx: &VariantContext,
        domain: &'a Domain,
        addr: u64,
        write: bool,
    ) -> bool {
        self.decode_address(ctx, domain, addr, write).error.is_none()
    }

    /// Decode both the register name and the value written to or read from
    /// it, as `NAME <= value` (writes) or `NAME => value` (reads).
    pub fn decode_register(
        &self,
        ctx: &mut VariantContext,
        domain: &'a Domain,
        addr: u64,
        write: bool,
        value: u64,
    ) -> String {
        let decoded = self.decode_address(ctx, domain, addr, write);
        let rendered = match decoded.typeinfo {
            Some(ti) => self.decode_value(ctx, ti, value),
            None => self.paint(self.colors.num, c_hex(value)),
        };
        let arrow = if write { "<=" } else { "=>" };
        format!("{} {arrow} {rendered}", decoded.name)
    }

    fn index_str(&self, ctx: &VariantContext, elem: &Delem, idx: u64) -> String {
        let symbolic = elem.index_enum.and_then(|e| {
            self.schema.enums[e]
                .values
                .iter()
                .find(|v| v.value == Some(idx) && ctx.matches(self.schema, &v.varinfo))
        });
        match symbolic {
            Some(v) => format!("[{}]", self.paint(self.colors.eval, &v.name)),
            None => format!("[{}]", self.paint(self.colors.num, idx)),
        }
    }

    /// Instances of a repeated element at or below `addr`, as
    /// `(index, base offset)`.
    fn instances<'e>(
        elem: &'e Delem,
        addr: u64,
    ) -> Box<dyn Iterator<Item = (u64, u64)> + 'e> {
        match &elem.placement {
            Placement::Fixed(offset) => {
                let (offset, stride, length) = (*offset, elem.stride, elem.length);
                let count = if stride == 0 { 1 } else { u64::MAX };
                Box::new(
                    (0..count)
                        .take_while(move |i| length == 0 || *i < length)
                        .map_while(move |i| {
                            let base = stride.checked_mul(i)?.checked_add(offset)?;
                            (base <= addr).then_some((i, base))
                        }),
                )
            }
            Placement::Table(offsets) => Box::new(
                offsets
                    .iter()
                    .enumerate()
                    .filter(move |(_, base)| **base <= addr)
                    .map(|(i, base)| (i as u64, *base)),
            ),
            Placement::Dynamic(_) | Placement::DynamicTable(_) => Box::new(std::iter::empty()),
        }
    }

    fn try_match(
        &self,
        ctx: &VariantContext,
        elems: &'a [Delem],
        addr: u64,
        write: bool,
        unit: u32,
        carried: &[String],
    ) -> Option<Hit<'a>> {
        for elem in elems {
            if elem.placement.is_dynamic() || !ctx.matches(self.schema, &elem.varinfo) {
                continue;
            }
            let hit = match &elem.kind {
                DelemKind::Reg(reg) => self.match_reg(ctx, elem, reg, addr, write, unit, carried),
                DelemKind::Stripe(subs) => {
                    self.match_stripe(ctx, elem, subs, addr, write, unit, carried)
                }
                DelemKind::Array(subs) => {
                    self.match_array(ctx, elem, subs, addr, write, unit, carried)
                }
                DelemKind::UseGroup(_) => None,
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn match_reg(
        &self,
        ctx: &VariantContext,
        elem: &'a Delem,
        reg: &'a Reg,
        addr: u64,
        write: bool,
        unit: u32,
        carried: &[String],
    ) -> Option<Hit<'a>> {
        if !reg.access.allows(write) {
            return None;
        }
        let offset = elem.base_offset();
        let rel = addr.checked_sub(offset)?;
        let (idx, residual) = match elem.stride {
            0 => (0, rel),
            stride => (rel / stride, rel % stride),
        };
        if residual >= u64::from((reg.width / unit).max(1)) {
            return None;
        }
        if elem.length != 0 && idx >= elem.length {
            return None;
        }

        let mut name = self.paint(self.colors.rname, elem.name.as_deref().unwrap_or(""));
        name.extend(carried.iter().cloned());
        if elem.length != 1 {
            name.push_str(&self.index_str(ctx, elem, idx));
        }
        if residual == 1 && reg.typeinfo.is_address() {
            name.push_str("_HI");
        } else if residual != 0 {
            name.push('+');
            name.push_str(&self.err_hex(residual));
        }
        Some(Hit {
            name,
            reg: Some(reg),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn match_stripe(
        &self,
        ctx: &VariantContext,
        elem: &'a Delem,
        subs: &'a [Delem],
        addr: u64,
        write: bool,
        unit: u32,
        carried: &[String],
    ) -> Option<Hit<'a>> {
        for (idx, base) in Self::instances(elem, addr) {
            let rel = addr - base;
            let hit = match &elem.name {
                None => {
                    let mut inner = carried.to_vec();
                    if elem.length != 1 {
                        inner.push(self.index_str(ctx, elem, idx));
                    }
                    self.try_match(ctx, subs, rel, write, unit, &inner)
                }
                Some(name) => self.try_match(ctx, subs, rel, write, unit, &[]).map(|hit| {
                    let mut full = self.paint(self.colors.rname, name);
                    full.extend(carried.iter().cloned());
                    if elem.length != 1 {
                        full.push_str(&self.index_str(ctx, elem, idx));
                    }
                    Hit {
                        name: format!("{full}.{}", hit.name),
                        reg: hit.reg,
                    }
                }),
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn match_array(
        &self,
        ctx: &VariantContext,
        elem: &'a Delem,
        subs: &'a [Delem],
        addr: u64,
        write: bool,
        unit: u32,
        carried: &[String],
    ) -> Option<Hit<'a>> {
        let (idx, base) = match &elem.placement {
            Placement::Fixed(offset) => {
                let rel = addr.checked_sub(*offset)?;
                let idx = match elem.stride {
                    0 => 0,
                    stride => rel / stride,
                };
                if elem.length != 0 && idx >= elem.length {
                    return None;
                }
                (idx, offset + elem.stride * idx)
            }
            Placement::Table(offsets) => offsets
                .iter()
                .enumerate()
                .find(|(_, base)| **base <= addr && addr - **base < elem.stride)
                .map(|(i, base)| (i as u64, *base))?,
            Placement::Dynamic(_) | Placement::DynamicTable(_) => return None,
        };

        let mut prefix = self.paint(self.colors.rname, elem.name.as_deref().unwrap_or(""));
        prefix.extend(carried.iter().cloned());
        prefix.push_str(&self.index_str(ctx, elem, idx));

        let rel = addr - base;
        Some(match self.try_match(ctx, subs, rel, write, unit, &[]) {
            Some(hit) => Hit {
                name: format!("{prefix}.{}", hit.name),
                reg: hit.reg,
            },
            None => Hit {
                name: format!("{prefix}+{}", self.err_hex(rel)),
                reg: None,
            },
        })
    }

    //=========================================================================
    // Name to address
    //=========================================================================

    /// Offset of the register named by `path` (`NAME[idx].CHILD...`).
    ///
    /// Indices may be decimal, hex or a value name of the element's index
    /// enum. A trailing `_HI` on an address register names its upper half.
    pub fn lookup_register_offset(
        &self,
        ctx: &VariantContext,
        domain: &Domain,
        path: &str,
    ) -> Option<u64> {
        let mut segments = parse_path(path.trim())?;
        if let Some((offset, _)) = self.lookup(ctx, &domain.subelems, &segments) {
            return Some(offset);
        }

        let last = segments.last_mut()?;
        last.name = last.name.strip_suffix("_HI")?;
        let (offset, leaf) = self.lookup(ctx, &domain.subelems, &segments)?;
        let is_address = leaf.as_reg().is_some_and(|r| r.typeinfo.is_address());
        is_address.then_some(offset + 1)
    }

    fn parse_index(&self, elem: &Delem, text: &str) -> Option<u64> {
        parse_num(text).or_else(|| {
            let en = &self.schema.enums[elem.index_enum?];
            en.values.iter().find(|v| v.name == text)?.value
        })
    }

    fn lookup<'e>(
        &self,
        ctx: &VariantContext,
        elems: &'e [Delem],
        path: &[Segment],
    ) -> Option<(u64, &'e Delem)> {
        let (seg, rest) = path.split_first()?;
        elems
            .iter()
            .filter(|elem| !elem.placement.is_dynamic() && ctx.matches(self.schema, &elem.varinfo))
            .find_map(|elem| match &elem.name {
                None => self.lookup_transparent(ctx, elem, seg, rest),
                Some(name) if name == seg.name => self.lookup_named(ctx, elem, seg, rest),
                Some(_) => None,
            })
    }

    /// Unnamed stripes consume the leading index of the segment when they
    /// repeat, and are otherwise invisible in the path.
    fn lookup_transparent<'e>(
        &self,
        ctx: &VariantContext,
        elem: &'e Delem,
        seg: &Segment,
        rest: &[Segment],
    ) -> Option<(u64, &'e Delem)> {
        let (idx, remaining) = if elem.length != 1 {
            let (first, remaining) = seg.indices.split_first()?;
            (self.parse_index(elem, first)?, remaining)
        } else {
            (0, seg.indices.as_slice())
        };
        if elem.length != 0 && idx >= elem.length {
            return None;
        }
        let base = elem.placement.offset_of(idx, elem.stride)?;
        let mut path = Vec::with_capacity(rest.len() + 1);
        path.push(Segment {
            name: seg.name,
            indices: remaining.to_vec(),
        });
        path.extend(rest.iter().cloned());
        self.lookup(ctx, elem.subelems(), &path)
            .map(|(off, leaf)| (base + off, leaf))
    }

    fn lookup_named<'e>(
        &self,
        ctx: &VariantContext,
        elem: &'e Delem,
        seg: &Segment,
        rest: &[Segment],
    ) -> Option<(u64, &'e Delem)> {
        let indexed = elem.length != 1 || matches!(elem.kind, DelemKind::Array(_));
        let idx = match (indexed, seg.indices.as_slice()) {
            (true, [idx]) => self.parse_index(elem, idx)?,
            (false, []) => 0,
            _ => return None,
        };
        if elem.length != 0 && idx >= elem.length {
            return None;
        }
        let base = elem.placement.offset_of(idx, elem.stride)?;
        match &elem.kind {
            DelemKind::Reg(_) if rest.is_empty() => Some((base, elem)),
            DelemKind::Array(subs) | DelemKind::Stripe(subs) if !rest.is_empty() => self
                .lookup(ctx, subs, rest)
                .map(|(off, leaf)| (base + off, leaf)),
            _ => None,
        }
    }

    //=========================================================================
    // Enums
    //=========================================================================

    /// Name of the first value of enum `name` equal to `value` that exists
    /// under `ctx`.
    pub fn decode_enum(&self, ctx: &VariantContext, name: &str, value: u64) -> Option<String> {
        let en = self.schema.find_enum(name)?;
        en.values
            .iter()
            .find(|v| v.value == Some(value) && ctx.matches(self.schema, &v.varinfo))
            .map(|v| v.name.clone())
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
