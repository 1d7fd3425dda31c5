// Licensed under the Apache-2.0 license

//! C header generation from a resolved [`Schema`].
//!
//! ## Generated Code Structure
//!
//! ```text
//! enum chip {                                   non-inline enums
//! 	A6XX = 0x00000006,
//! };
//!
//! #define REG_GPU_CNTL            0x00000010    fixed offsets
//! #define GPU_CNTL_MODE__MASK     0x000000f0    typed fields
//! #define GPU_CNTL_MODE__SHIFT    4
//! static inline uint32_t GPU_CNTL_MODE(uint32_t val)
//! { ... }
//! #define GPU_CNTL_ENABLE         0x00000001    boolean fields
//!
//! static inline uint32_t REG_GPU_CTX_X(uint32_t i0) { return 0x00000100 + 0x10*i0; }
//! #define GPU_CTX__ESIZE          0x00000010    repeated elements
//! #define GPU_CTX__LEN            0x00000004
//! ```
//!
//! Every definition goes to the header of the database file it was declared
//! in; elements copied from a group go to the file that used the group.

mod output;

pub use output::{write_headers, GeneratedHeader};

use crate::resolve::Schema;
use crate::types::*;
use std::collections::HashSet;
use std::fmt::{self, Write};

/// Render every non-empty header of `schema`, in file load order.
pub fn generate_headers(schema: &Schema) -> anyhow::Result<Vec<GeneratedHeader>> {
    let mut emitter = Emitter {
        schema,
        bodies: vec![String::new(); schema.files.len()],
        helpers: HashSet::new(),
    };
    emitter.emit_all()?;
    Ok(emitter
        .bodies
        .into_iter()
        .zip(&schema.files)
        .filter(|(body, _)| !body.is_empty())
        .map(|(body, file)| GeneratedHeader::for_source(file, body))
        .collect())
}

/// Offset accumulated from the enclosing elements.
#[derive(Clone, Debug, Default)]
struct Frame {
    base: u64,
    /// Largest value the non-constant terms add to `base`, when known.
    span: u64,
    /// Full name of the innermost named enclosing element.
    owner: Option<String>,
    /// Non-constant terms of the offset sum.
    terms: Vec<String>,
    /// Index parameter declarations, outermost first.
    params: Vec<String>,
}

struct Emitter<'a> {
    schema: &'a Schema,
    bodies: Vec<String>,
    /// Offset helpers already written, per file.
    helpers: HashSet<(FileIdx, String)>,
}

/// Hex constant, zero-padded to 32 or 64 bits.
fn c_const(val: u64) -> String {
    if val > u64::from(u32::MAX) {
        format!("{val:#018x}ull")
    } else {
        format!("{val:#010x}")
    }
}

fn define(out: &mut String, name: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(out, "#define {name:<47} {value}")
}

impl<'a> Emitter<'a> {
    fn out(&mut self, file: FileIdx) -> &mut String {
        if file >= self.bodies.len() {
            self.bodies.resize(file + 1, String::new());
        }
        &mut self.bodies[file]
    }

    fn emit_all(&mut self) -> fmt::Result {
        let schema = self.schema;
        for en in schema.enums.iter().filter(|e| !e.inline && !e.varinfo.dead) {
            self.emit_enum(en)?;
        }
        for bs in schema.bitsets.iter().filter(|b| !b.inline && !b.varinfo.dead) {
            for bf in &bs.bitfields {
                self.emit_field(bs.loc.file, bf)?;
            }
            writeln!(self.out(bs.loc.file))?;
        }
        for dom in schema.domains.iter().filter(|d| !d.varinfo.dead) {
            if let Some(size) = dom.size {
                let name = format!("{}__SIZE", dom.fullname);
                define(self.out(dom.loc.file), &name, c_const(size))?;
            }
            for elem in &dom.subelems {
                self.walk(elem, &Frame::default())?;
            }
        }
        Ok(())
    }

    fn emit_enum(&mut self, en: &Enum) -> fmt::Result {
        let out = self.out(en.loc.file);
        writeln!(out, "enum {} {{", en.fullname)?;
        for val in en.values.iter().filter(|v| !v.varinfo.dead) {
            if let Some(value) = val.value {
                writeln!(out, "\t{} = {},", val.fullname, value)?;
            }
        }
        writeln!(out, "}};\n")
    }

    //=========================================================================
    // Elements
    //=========================================================================

    fn walk(&mut self, elem: &Delem, outer: &Frame) -> fmt::Result {
        if elem.varinfo.dead {
            return Ok(());
        }
        let file = elem.loc.file;
        let mut frame = outer.clone();
        let param = (elem.length != 1).then(|| {
            let p = format!("i{}", frame.params.len());
            let ty = self.index_type(elem);
            frame.params.push(format!("{ty} {p}"));
            p
        });

        match (&elem.placement, &param) {
            (Placement::Fixed(offset), None) => frame.base += offset,
            (Placement::Fixed(offset), Some(p)) => {
                frame.base += offset;
                let last = elem.length.saturating_sub(1);
                frame.span = frame.span.saturating_add(elem.stride.saturating_mul(last));
                frame.terms.push(format!("{:#x}*{p}", elem.stride));
            }
            (Placement::Table(offsets), None) => {
                frame.base += offsets.first().copied().unwrap_or(0);
            }
            (Placement::Table(offsets), Some(p)) => {
                let top = offsets.iter().copied().max().unwrap_or(0);
                frame.span = frame.span.saturating_add(top);
                let cases: Vec<String> = offsets.iter().map(|o| c_const(*o)).collect();
                let wide = top > u64::from(u32::MAX);
                let helper = self.emit_offset_helper(elem, &frame, &cases, wide)?;
                frame.terms.push(format!("{helper}({p})"));
            }
            (Placement::Dynamic(expr), None) => frame.terms.push(format!("({expr})")),
            (Placement::Dynamic(expr), Some(p)) => {
                frame.terms.push(format!("({expr})"));
                frame.terms.push(format!("{:#x}*{p}", elem.stride));
            }
            (Placement::DynamicTable(exprs), None) => {
                if let Some(expr) = exprs.first() {
                    frame.terms.push(format!("({expr})"));
                }
            }
            (Placement::DynamicTable(exprs), Some(p)) => {
                let cases: Vec<String> = exprs.iter().map(|e| format!("({e})")).collect();
                let helper = self.emit_offset_helper(elem, &frame, &cases, false)?;
                frame.terms.push(format!("{helper}({p})"));
            }
        }

        if let Some(name) = &elem.fullname {
            frame.owner = Some(name.clone());
            self.emit_offset(file, name, &frame)?;
            if elem.length != 1 {
                let out = self.out(file);
                define(out, &format!("{name}__ESIZE"), c_const(elem.stride))?;
                if elem.length != 0 {
                    define(out, &format!("{name}__LEN"), c_const(elem.length))?;
                }
            }
        }

        match &elem.kind {
            DelemKind::Reg(reg) => {
                if let Some(name) = &elem.fullname {
                    self.emit_type(file, name, &reg.typeinfo)?;
                }
                writeln!(self.out(file))?;
            }
            DelemKind::Array(subs) | DelemKind::Stripe(subs) => {
                for sub in subs {
                    self.walk(sub, &frame)?;
                }
            }
            DelemKind::UseGroup(_) => {}
        }
        Ok(())
    }

    /// The index enum of `elem`, if it can name C constants.
    fn index_enum(&self, elem: &Delem) -> Option<&'a Enum> {
        let schema = self.schema;
        let en = &schema.enums[elem.index_enum?];
        let named = !en.inline && !en.fullname.is_empty();
        (named && en.values.iter().any(|v| v.value.is_some())).then_some(en)
    }

    fn index_type(&self, elem: &Delem) -> String {
        match self.index_enum(elem) {
            Some(en) => format!("enum {}", en.fullname),
            None => "uint32_t".to_string(),
        }
    }

    fn emit_offset(&mut self, file: FileIdx, name: &str, frame: &Frame) -> fmt::Result {
        let out = self.out(file);
        let reg = format!("REG_{name}");
        if frame.terms.is_empty() {
            return define(out, &reg, c_const(frame.base));
        }
        let params = if frame.params.is_empty() {
            "void".to_string()
        } else {
            frame.params.join(", ")
        };
        let ty = if frame.base.saturating_add(frame.span) > u64::from(u32::MAX) {
            "uint64_t"
        } else {
            "uint32_t"
        };
        writeln!(
            out,
            "static inline {ty} {reg}({params}) {{ return {} + {}; }}",
            c_const(frame.base),
            frame.terms.join(" + ")
        )
    }

    /// Switch over the index of an irregularly placed element; returns the
    /// helper's name. Unnamed elements are keyed by their enclosing element
    /// and source line, and each helper is written once per file.
    fn emit_offset_helper(
        &mut self,
        elem: &Delem,
        frame: &Frame,
        cases: &[String],
        wide: bool,
    ) -> Result<String, fmt::Error> {
        let key = match (&elem.fullname, &frame.owner) {
            (Some(name), _) => name.clone(),
            (None, Some(owner)) => format!("{owner}_L{}", elem.loc.line),
            (None, None) => format!("L{}", elem.loc.line),
        };
        let helper = format!("__offset_{key}");
        if !self.helpers.insert((elem.loc.file, helper.clone())) {
            return Ok(helper);
        }
        let ty = self.index_type(elem);
        let ret = if wide { "uint64_t" } else { "uint32_t" };
        let labels: Vec<String> = (0..cases.len() as u64)
            .map(|i| self.index_label(elem, i))
            .collect();

        let out = self.out(elem.loc.file);
        writeln!(out, "static inline {ret} {helper}({ty} idx)")?;
        writeln!(out, "{{")?;
        writeln!(out, "\tswitch (idx) {{")?;
        for (label, offset) in labels.iter().zip(cases) {
            writeln!(out, "\t\tcase {label}: return {offset};")?;
        }
        writeln!(out, "\t\tdefault: assert(!\"invalid index\"); return 0;")?;
        writeln!(out, "\t}}")?;
        writeln!(out, "}}")?;
        Ok(helper)
    }

    fn index_label(&self, elem: &Delem, idx: u64) -> String {
        self.index_enum(elem)
            .and_then(|en| {
                en.values
                    .iter()
                    .find(|v| v.value == Some(idx) && !v.varinfo.dead && !v.fullname.is_empty())
                    .map(|v| v.fullname.clone())
            })
            .unwrap_or_else(|| idx.to_string())
    }

    //=========================================================================
    // Types and fields
    //=========================================================================

    /// Definitions for the type of a register named `name`.
    fn emit_type(&mut self, file: FileIdx, name: &str, ti: &TypeInfo) -> fmt::Result {
        match &ti.kind {
            TypeKind::InlineBitset(fields) => {
                for bf in fields {
                    self.emit_field(file, bf)?;
                }
                Ok(())
            }
            TypeKind::InlineEnum { values, .. } => self.emit_values(file, values),
            TypeKind::Bitset(_) | TypeKind::Hex | TypeKind::Unresolved { .. } => Ok(()),
            TypeKind::Boolean => define(self.out(file), name, c_const(ti.mask())),
            _ => self.emit_scalar(file, name, ti),
        }
    }

    fn emit_field(&mut self, file: FileIdx, bf: &Bitfield) -> fmt::Result {
        if bf.varinfo.dead {
            return Ok(());
        }
        let ti = &bf.typeinfo;
        if ti.is_boolean() {
            return define(self.out(file), &bf.fullname, c_const(ti.mask()));
        }
        self.emit_scalar(file, &bf.fullname, ti)?;
        match &ti.kind {
            TypeKind::InlineEnum { values, .. } => self.emit_values(file, values),
            TypeKind::InlineBitset(fields) => {
                for sub in fields {
                    self.emit_field(file, sub)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn emit_values(&mut self, file: FileIdx, values: &[Value]) -> fmt::Result {
        let out = self.out(file);
        for val in values.iter().filter(|v| !v.varinfo.dead) {
            if let Some(value) = val.value {
                define(out, &val.fullname, c_const(value))?;
            }
        }
        Ok(())
    }

    /// `__MASK`/`__SHIFT` definitions and a checked packing accessor.
    fn emit_scalar(&mut self, file: FileIdx, name: &str, ti: &TypeInfo) -> fmt::Result {
        let (kind, radix) = match &ti.kind {
            TypeKind::Spectype(idx) => {
                let st = &self.schema.spectypes[*idx].typeinfo;
                (st.kind.clone(), ti.radix.or(st.radix))
            }
            kind => (kind.clone(), ti.radix),
        };
        let wide = ti.high >= 32;
        let uint = if wide { "uint64_t" } else { "uint32_t" };
        let param = match &kind {
            TypeKind::Fixed | TypeKind::UFixed | TypeKind::Float => "float".to_string(),
            TypeKind::Enum(idx) => format!("enum {}", self.schema.enums[*idx].fullname),
            TypeKind::Int if wide => "int64_t".to_string(),
            TypeKind::Int => "int32_t".to_string(),
            _ => uint.to_string(),
        };
        let scale = 1u64 << radix.unwrap_or(0).min(63);
        let expr = match &kind {
            TypeKind::Fixed => {
                let cast = if wide { "int64_t" } else { "int32_t" };
                format!("(({cast})(val * {scale}.0))")
            }
            TypeKind::UFixed => format!("(({uint})(val * {scale}.0))"),
            TypeKind::Float if ti.width() == 16 => "_mesa_float_to_half(val)".to_string(),
            TypeKind::Float => "fui(val)".to_string(),
            _ if ti.shr > 0 => format!("(val >> {})", ti.shr),
            _ => "val".to_string(),
        };
        let integral = param != "float";

        let out = self.out(file);
        define(out, &format!("{name}__MASK"), c_const(ti.mask()))?;
        define(out, &format!("{name}__SHIFT"), ti.low)?;
        writeln!(out, "static inline {uint} {name}({param} val)")?;
        writeln!(out, "{{")?;
        if integral && ti.shr > 0 && ti.shr < 64 {
            writeln!(out, "\tassert(!(val & {:#x}));", (1u64 << ti.shr) - 1)?;
        }
        if let Some(min) = ti.min {
            writeln!(out, "\tassert(val >= {min});")?;
        }
        if let Some(max) = ti.max {
            writeln!(out, "\tassert(val <= {max});")?;
        }
        if let Some(align) = ti.align.filter(|_| integral) {
            writeln!(out, "\tassert(!(val % {align}));")?;
        }
        writeln!(
            out,
            "\treturn (({uint})({expr}) << {name}__SHIFT) & {name}__MASK;"
        )?;
        writeln!(out, "}}")
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
