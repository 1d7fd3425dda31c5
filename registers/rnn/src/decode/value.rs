// Licensed under the Apache-2.0 license

//! Rendering field values by type.

use super::float::half_to_f64;
use super::*;
use crate::util::c_float;

/// Type details that survive a hop through a spectype.
#[derive(Clone, Copy)]
struct Render<'t> {
    kind: &'t TypeKind,
    radix: u32,
    addvariant: bool,
    /// Bit width of the (shifted) field, for sign handling.
    width: u32,
}

impl Decoder<'_> {
    /// Render `raw` as a value of type `ti` without touching `ctx`.
    pub fn format_value(&self, ctx: &VariantContext, ti: &TypeInfo, raw: u64) -> String {
        let mut scratch = ctx.clone();
        self.decode_value(&mut scratch, ti, raw)
    }

    /// Render `raw` as a value of type `ti`.
    ///
    /// The field `[low, high]` is extracted and shifted left by `shr`. Bits
    /// outside the field are appended as an error-marked ` | 0x..` suffix.
    /// Enum values of `addvariant` types are selected in `ctx` as soon as
    /// they are decoded.
    pub fn decode_value(&self, ctx: &mut VariantContext, ti: &TypeInfo, raw: u64) -> String {
        let mask = ti.mask();
        let field = ((raw & mask) >> ti.low.min(63))
            .checked_shl(ti.shr)
            .unwrap_or(0);
        let render = Render {
            kind: &ti.kind,
            radix: ti.radix.unwrap_or(0),
            addvariant: ti.addvariant,
            width: (ti.width() + ti.shr).min(64),
        };
        let mut out = self.render(ctx, render, field);
        if let Err(err) = Self::check_value(ti, raw) {
            log::debug!("{err}");
            out.push_str(" | ");
            out.push_str(&self.err_hex(raw & !mask));
        }
        out
    }

    /// Fails with [`DecodeError::ValueOutOfRange`] when `raw` has bits set
    /// outside the range of `ti`.
    pub fn check_value(ti: &TypeInfo, raw: u64) -> Result<(), DecodeError> {
        let mask = ti.mask();
        if raw & !mask != 0 {
            return Err(DecodeError::ValueOutOfRange { value: raw, mask });
        }
        Ok(())
    }

    fn render(&self, ctx: &mut VariantContext, r: Render, field: u64) -> String {
        let c = &self.colors;
        match r.kind {
            TypeKind::Enum(idx) => {
                let values = &self.schema.enums[*idx].values;
                self.render_enum(ctx, values, Some(*idx), r.addvariant, field)
            }
            TypeKind::InlineEnum { source, values } => {
                self.render_enum(ctx, values, *source, r.addvariant, field)
            }
            TypeKind::Bitset(idx) => {
                let fields = &self.schema.bitsets[*idx].bitfields;
                self.render_bitset(ctx, fields, field)
            }
            TypeKind::InlineBitset(fields) => self.render_bitset(ctx, fields, field),
            TypeKind::Spectype(idx) => {
                let st = &self.schema.spectypes[*idx].typeinfo;
                let inner = Render {
                    kind: &st.kind,
                    radix: st.radix.unwrap_or(r.radix),
                    addvariant: r.addvariant || st.addvariant,
                    width: r.width,
                };
                self.render(ctx, inner, field)
            }
            TypeKind::Hex | TypeKind::Unresolved { .. } => self.paint(c.num, c_hex(field)),
            TypeKind::UInt => self.paint(c.num, field),
            TypeKind::Int => self.paint(c.num, sign_extend(field, r.width)),
            TypeKind::Boolean => match field {
                0 => self.paint(c.eval, "FALSE"),
                1 => self.paint(c.eval, "TRUE"),
                _ => self.err_hex(field),
            },
            TypeKind::Fixed => {
                let scale = 2f64.powi(r.radix as i32);
                let val = sign_extend(field, r.width) as f64 / scale;
                self.paint(c.num, c_float(val))
            }
            TypeKind::UFixed => {
                let scale = 2f64.powi(r.radix as i32);
                self.paint(c.num, c_float(field as f64 / scale))
            }
            TypeKind::A3xxRegId => {
                let comp = ['x', 'y', 'z', 'w'][(field & 3) as usize];
                self.paint(c.num, format!("r{}.{comp}", field >> 2))
            }
            TypeKind::Float => {
                let val = match r.width {
                    64 => f64::from_bits(field),
                    32 => f64::from(f32::from_bits(field as u32)),
                    16 => half_to_f64(field as u16),
                    _ => return self.err_hex(field),
                };
                self.paint(c.num, c_float(val))
            }
        }
    }

    fn render_enum(
        &self,
        ctx: &mut VariantContext,
        values: &[Value],
        source: Option<EnumIdx>,
        addvariant: bool,
        field: u64,
    ) -> String {
        let found = values
            .iter()
            .find(|v| v.value == Some(field) && ctx.matches(self.schema, &v.varinfo));
        let Some(val) = found else {
            return self.err_hex(field);
        };
        if addvariant {
            if let Some(venum) = source {
                if let Some(pos) = self.schema.enums[venum].value_position(&val.name) {
                    log::debug!(
                        "selecting {} variant {}",
                        self.schema.enums[venum].name,
                        val.name
                    );
                    ctx.select_index(venum, pos);
                }
            }
        }
        self.paint(self.colors.eval, &val.name)
    }

    fn render_bitset(&self, ctx: &mut VariantContext, fields: &[Bitfield], field: u64) -> String {
        let c = &self.colors;
        let mut parts = Vec::new();
        let mut covered = 0u64;
        for bf in fields {
            if !ctx.matches(self.schema, &bf.varinfo) {
                continue;
            }
            let submask = bf.typeinfo.mask();
            covered |= submask;
            let bits = field & submask;
            if bf.is_unknown() {
                if bits != 0 {
                    let val = bits >> bf.typeinfo.low;
                    parts.push(format!("{} = {}", self.paint(c.rname, &bf.name), self.err_hex(val)));
                }
            } else if bf.typeinfo.is_boolean() {
                if bits != 0 {
                    parts.push(self.paint(c.modifier, &bf.name));
                }
            } else {
                let val = self.decode_value(ctx, &bf.typeinfo, bits);
                parts.push(format!("{} = {val}", self.paint(c.rname, &bf.name)));
            }
        }
        let leftover = field & !covered;
        if leftover != 0 {
            parts.push(self.err_hex(leftover));
        }
        if parts.is_empty() {
            "{ 0 }".to_string()
        } else {
            format!("{{ {} }}", parts.join(" | "))
        }
    }
}

/// Two's-complement interpretation of the low `width` bits of `val`.
fn sign_extend(val: u64, width: u32) -> i128 {
    if width == 0 || width > 64 {
        return i128::from(val);
    }
    let val = i128::from(val);
    if val & (1 << (width - 1)) != 0 {
        val - (1i128 << width)
    } else {
        val
    }
}
