// Licensed under the Apache-2.0 license

use super::*;
use crate::error::LoadError;
use crate::resolve::resolve;
use crate::Loader;
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn load(text: &str) -> Schema {
    let _ = SimpleLogger::new().with_level(LevelFilter::Warn).init();
    let mut db = Database::new();
    Loader::default().load_str(&mut db, "test.xml", text).unwrap();
    resolve(db).unwrap()
}

fn schema(text: &str) -> Schema {
    let schema = load(text);
    assert!(!schema.failed, "{:?}", schema.diagnostics);
    schema
}

fn reg<'s>(schema: &'s Schema, domain: &str, name: &str) -> &'s Reg {
    fn find<'s>(elems: &'s [Delem], name: &str) -> Option<&'s Reg> {
        elems.iter().find_map(|e| match &e.kind {
            DelemKind::Reg(r) if e.name.as_deref() == Some(name) => Some(r),
            _ => find(e.subelems(), name),
        })
    }
    find(&schema.find_domain(domain).unwrap().subelems, name).unwrap()
}

fn field<'s>(reg: &'s Reg, name: &str) -> &'s TypeInfo {
    match &reg.typeinfo.kind {
        TypeKind::InlineBitset(fields) => &fields.iter().find(|f| f.name == name).unwrap().typeinfo,
        other => panic!("not a bitset: {other:?}"),
    }
}

const CHIPS: &str = r#"
<enum name="chip" bare="yes">
    <value name="A" value="0"/>
    <value name="B" value="1"/>
    <value name="C" value="2"/>
    <value name="D" value="3"/>
</enum>"#;

//=============================================================================
// Values
//=============================================================================

#[test]
fn test_uint_field() {
    let s = schema(
        r#"<database>
<domain name="D" width="32">
    <reg32 name="NAME" offset="0x10">
        <bitfield name="FOO" low="4" high="7" type="uint"/>
    </reg32>
</domain>
</database>"#,
    );
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let name = reg(&s, "D", "NAME");
    let foo = field(name, "FOO");
    assert_eq!(dec.format_value(&ctx, foo, 0x73 & foo.mask()), "7");
    assert_eq!(dec.format_value(&ctx, foo, 0x73), "7 | 0x3");
    assert_eq!(dec.format_value(&ctx, &name.typeinfo, 0x70), "{ FOO = 7 }");
    assert_eq!(dec.format_value(&ctx, &name.typeinfo, 0x73), "{ FOO = 7 | 0x3 }");
}

#[test]
fn test_inline_enum_field() {
    let s = schema(
        r#"<database>
<enum name="color" inline="yes">
    <value name="RED" value="0"/>
    <value name="GREEN" value="1"/>
</enum>
<domain name="D" width="32">
    <reg32 name="R" offset="0"><bitfield name="C" low="0" high="1" type="color"/></reg32>
</domain>
</database>"#,
    );
    let ctx = VariantContext::new();
    let c = field(reg(&s, "D", "R"), "C");
    assert_eq!(Decoder::new(&s).format_value(&ctx, c, 0b01), "GREEN");
    assert_eq!(Decoder::new(&s).format_value(&ctx, c, 0b10), "0x2");
    let ansi = Decoder::new(&s).with_colors(Colors::ansi());
    assert_eq!(ansi.format_value(&ctx, c, 0b10), "\x1b[1;31m0x2\x1b[0m");
    assert_eq!(ansi.format_value(&ctx, c, 0b00), "\x1b[1;35mRED\x1b[0m");
}

#[test]
fn test_scalar_types() {
    let s = schema(
        r#"<database>
<spectype name="coord" type="fixed" radix="4"/>
<domain name="D" width="32">
    <reg32 name="FX" offset="0" type="fixed" radix="8" low="0" high="15"/>
    <reg32 name="UFX" offset="4" type="ufixed" radix="8" low="0" high="15"/>
    <reg32 name="FLT" offset="8" type="float"/>
    <reg32 name="HALF" offset="0xc" type="float" low="0" high="15"/>
    <reg64 name="DBL" offset="0x10" type="float"/>
    <reg32 name="INT" offset="0x18" type="int" low="0" high="7"/>
    <reg32 name="UINT" offset="0x1c" type="uint"/>
    <reg32 name="ID" offset="0x20" type="a3xx_regid" low="0" high="7"/>
    <reg32 name="FLAG" offset="0x24" type="boolean" low="0" high="1"/>
    <reg32 name="SPEC" offset="0x28" type="coord" low="0" high="7"/>
    <reg32 name="SHIFTED" offset="0x2c" type="uint" low="0" high="3" shr="2"/>
    <reg32 name="ODD" offset="0x30" type="float" low="0" high="7"/>
</domain>
</database>"#,
    );
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let fmt = |name: &str, raw: u64| dec.format_value(&ctx, &reg(&s, "D", name).typeinfo, raw);

    assert_eq!(fmt("FX", 0xfe80), "-1.500000");
    assert_eq!(fmt("FX", 0x0180), "1.500000");
    assert_eq!(fmt("UFX", 0xfe80), "254.500000");
    assert_eq!(fmt("FLT", 0x3fc0_0000), "1.500000");
    assert_eq!(fmt("FLT", 0xff80_0000), "-inf");
    assert_eq!(fmt("HALF", 0xbc00), "-1.000000");
    assert_eq!(fmt("DBL", 0x4004_0000_0000_0000), "2.500000");
    assert_eq!(fmt("INT", 0xff), "-1");
    assert_eq!(fmt("INT", 0x7f), "127");
    assert_eq!(fmt("UINT", 0xffff_ffff), "4294967295");
    assert_eq!(fmt("ID", 0x15), "r5.y");
    assert_eq!(fmt("FLAG", 1), "TRUE");
    assert_eq!(fmt("FLAG", 0), "FALSE");
    assert_eq!(fmt("FLAG", 2), "0x2");
    assert_eq!(fmt("SPEC", 0x18), "1.500000");
    assert_eq!(fmt("SHIFTED", 0x3), "12");
    assert_eq!(fmt("ODD", 0x12), "0x12");
}

#[test]
fn test_spectype_cycle_renders_hex() {
    let s = load(
        r#"<database>
<spectype name="a" type="b"/>
<spectype name="b" type="a"/>
<domain name="D" width="32">
    <reg32 name="R" offset="0" type="a"/>
    <reg32 name="S" offset="4">
        <bitfield name="F" low="0" high="7" type="b"/>
    </reg32>
</domain>
</database>"#,
    );
    assert!(s.failed);
    assert!(s
        .diagnostics
        .iter()
        .all(|d| matches!(d.error, LoadError::UnresolvedTypeReference { .. })));
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    assert_eq!(dec.format_value(&ctx, &reg(&s, "D", "R").typeinfo, 0x1234), "0x1234");
    assert_eq!(dec.format_value(&ctx, &reg(&s, "D", "S").typeinfo, 0x2a), "{ F = 0x2a }");
}

#[test]
fn test_bitset_rendering() {
    let s = schema(
        r#"<database>
<bitset name="cntl">
    <bitfield name="EN" pos="0"/>
    <bitfield name="UNK4" pos="4"/>
    <bitfield name="MODE" low="8" high="9">
        <value name="FIRST" value="1"/>
        <value name="SECOND" value="2"/>
    </bitfield>
    <bitfield name="COUNT" low="12" high="15" type="uint"/>
</bitset>
<domain name="D" width="32">
    <reg32 name="CNTL" offset="0" type="cntl"/>
</domain>
</database>"#,
    );
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let ti = &reg(&s, "D", "CNTL").typeinfo;
    assert_eq!(dec.format_value(&ctx, ti, 0x0), "{ MODE = 0 | COUNT = 0 }");
    assert_eq!(dec.format_value(&ctx, ti, 0x1), "{ EN | MODE = 0 | COUNT = 0 }");
    assert_eq!(
        dec.format_value(&ctx, ti, 0x3211),
        "{ EN | UNK4 = 0x1 | MODE = SECOND | COUNT = 3 }"
    );
    assert_eq!(
        dec.format_value(&ctx, ti, 0x10_0101),
        "{ EN | MODE = FIRST | COUNT = 0 | 0x100000 }"
    );
}

#[test]
fn test_empty_bitset() {
    let s = schema(
        r#"<database>
<domain name="D" width="32">
    <reg32 name="R" offset="0">
        <bitfield name="A" pos="0"/>
        <bitfield name="UNK1" pos="1"/>
    </reg32>
</domain>
</database>"#,
    );
    let ti = &reg(&s, "D", "R").typeinfo;
    assert_eq!(Decoder::new(&s).format_value(&VariantContext::new(), ti, 0), "{ 0 }");
}

#[test]
fn test_addvariant_selects() {
    let s = schema(&format!(
        r#"<database>{CHIPS}
<domain name="D" width="32" varset="chip">
    <reg32 name="ID" offset="0" type="chip" addvariant="yes"/>
    <reg32 name="OLD" offset="4" variants="A-B"/>
    <reg32 name="NEW" offset="4" variants="C-"/>
</domain>
</database>"#
    ));
    let dec = Decoder::new(&s);
    let dom = s.find_domain("D").unwrap();
    let id = &reg(&s, "D", "ID").typeinfo;
    let mut ctx = VariantContext::new();

    assert_eq!(dec.format_value(&ctx, id, 2), "C");
    assert_eq!(ctx.selected(0), None);

    assert_eq!(dec.decode_value(&mut ctx, id, 2), "C");
    assert_eq!(ctx.selected(0), Some(2));
    assert_eq!(dec.decode_address(&ctx, dom, 4, false).name, "NEW");

    assert_eq!(dec.decode_value(&mut ctx, id, 0), "A");
    assert_eq!(dec.decode_address(&ctx, dom, 4, false).name, "OLD");
}

//=============================================================================
// Addresses
//=============================================================================

const LAYOUT: &str = r#"<database>
<enum name="ctx_id">
    <value name="GMEM" value="0"/>
    <value name="SYSMEM" value="1"/>
</enum>
<domain name="D" width="8">
    <reg32 name="CNTL" offset="0" access="r"/>
    <reg32 name="DOORBELL" offset="4" access="w"/>
    <reg64 name="BASE" offset="8"/>
    <array name="REGS" offset="0x10" stride="4" length="4">
        <reg32 name="VAL" offset="0"/>
    </array>
    <array name="WIDE" offset="0x40" stride="8" length="2">
        <reg32 name="LO" offset="0"/>
    </array>
    <stripe offset="0x100" stride="0x10" length="2">
        <reg32 name="X" offset="4"/>
    </stripe>
    <stripe name="S" offset="0x200" stride="0x10" length="2">
        <reg32 name="Y" offset="0"/>
    </stripe>
    <array name="CTX" offsets="0x300,0x380" stride="0x20" index="ctx_id">
        <reg32 name="Z" offset="8"/>
        <reg32 name="RING" offset="0x10" length="2"/>
    </array>
    <array name="DYN" doffset="some_base()" stride="4" length="2">
        <reg32 name="W" offset="0"/>
    </array>
</domain>
<domain name="G" width="32">
    <reg64 name="PTR" offset="0x10" type="waddress"/>
    <reg64 name="PLAIN" offset="0x20"/>
</domain>
</database>"#;

#[test]
fn test_array_address() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("D").unwrap();

    let hit = dec.decode_address(&ctx, dom, 0x14, false);
    assert_eq!(hit.name, "REGS[1].VAL");
    assert_eq!(hit.width, 32);
    assert!(hit.typeinfo.is_some());
    assert_eq!(hit.error, None);

    assert_eq!(dec.decode_address(&ctx, dom, 0x15, false).name, "REGS[1].VAL+0x1");

    let miss = dec.decode_address(&ctx, dom, 0x4c, false);
    assert_eq!(miss.name, "WIDE[1]+0x4");
    assert_eq!(miss.typeinfo, None);
}

#[test]
fn test_no_match() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("D").unwrap();
    let miss = dec.decode_address(&ctx, dom, 0x30, false);
    assert_eq!(miss.name, "0x30");
    assert_eq!(miss.error, Some(DecodeError::NoAddressMatch(0x30)));
    assert!(!dec.check_address(&ctx, dom, 0x30, false));
    assert!(dec.check_address(&ctx, dom, 0x10, false));
}

#[test]
fn test_access_direction() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("D").unwrap();
    assert_eq!(dec.decode_address(&ctx, dom, 0, false).name, "CNTL");
    assert!(!dec.check_address(&ctx, dom, 0, true));
    assert_eq!(dec.decode_address(&ctx, dom, 4, true).name, "DOORBELL");
    assert!(!dec.check_address(&ctx, dom, 4, false));
}

#[test]
fn test_stripes_and_indices() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("D").unwrap();
    let name = |addr| dec.decode_address(&ctx, dom, addr, false).name;

    assert_eq!(name(0x104), "X[0]");
    assert_eq!(name(0x114), "X[1]");
    assert_eq!(name(0x210), "S[1].Y");
    assert_eq!(name(0x308), "CTX[GMEM].Z");
    assert_eq!(name(0x388), "CTX[SYSMEM].Z");
    assert_eq!(name(0x394), "CTX[SYSMEM].RING[1]");
    assert_eq!(name(0x3a0), "0x3a0");
}

#[test]
fn test_address_high_half() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("G").unwrap();
    assert_eq!(dec.decode_address(&ctx, dom, 0x10, false).name, "PTR");
    assert_eq!(dec.decode_address(&ctx, dom, 0x11, false).name, "PTR_HI");
    assert_eq!(dec.decode_address(&ctx, dom, 0x21, false).name, "PLAIN+0x1");

    assert_eq!(dec.lookup_register_offset(&ctx, dom, "PTR_HI"), Some(0x11));
    assert_eq!(dec.lookup_register_offset(&ctx, dom, "PLAIN_HI"), None);
}

#[test]
fn test_lookup_register_offset() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    let dom = s.find_domain("D").unwrap();
    let lookup = |path| dec.lookup_register_offset(&ctx, dom, path);

    assert_eq!(lookup("CNTL"), Some(0));
    assert_eq!(lookup("REGS[1].VAL"), Some(0x14));
    assert_eq!(lookup("REGS[0x3].VAL"), Some(0x1c));
    assert_eq!(lookup("REGS[4].VAL"), None);
    assert_eq!(lookup("X[1]"), Some(0x114));
    assert_eq!(lookup("S[1].Y"), Some(0x210));
    assert_eq!(lookup("CTX[SYSMEM].Z"), Some(0x388));
    assert_eq!(lookup("CTX[1].RING[1]"), Some(0x394));
    assert_eq!(lookup("DYN[0].W"), None);
    assert_eq!(lookup("NOPE"), None);
    assert_eq!(lookup("REGS[1"), None);
    assert_eq!(lookup("REGS.VAL"), None);
}

#[test]
fn test_round_trip() {
    let s = schema(LAYOUT);
    let dec = Decoder::new(&s);
    let ctx = VariantContext::new();
    for dom in &s.domains {
        for addr in 0..0x400u64 {
            let hit = dec.decode_address(&ctx, dom, addr, false);
            let hit = if hit.error.is_some() {
                dec.decode_address(&ctx, dom, addr, true)
            } else {
                hit
            };
            if hit.error.is_some() || hit.name.contains('+') {
                continue;
            }
            assert_eq!(
                dec.lookup_register_offset(&ctx, dom, &hit.name),
                Some(addr),
                "{}",
                hit.name
            );
        }
    }
}

#[test]
fn test_variant_filtering() {
    let s = schema(&format!(
        r#"<database>{CHIPS}
<domain name="D" width="32" varset="chip">
    <reg32 name="R" offset="0" variants="A-C"/>
</domain>
</database>"#
    ));
    let dec = Decoder::new(&s);
    let dom = s.find_domain("D").unwrap();
    let mut ctx = VariantContext::new();
    assert!(!dec.check_address(&ctx, dom, 0, false));

    ctx.select(&s, "chip", "B").unwrap();
    assert_eq!(dec.decode_address(&ctx, dom, 0, false).name, "R");
    assert_eq!(dec.lookup_register_offset(&ctx, dom, "R"), Some(0));

    ctx.select(&s, "chip", "D").unwrap();
    assert!(!dec.check_address(&ctx, dom, 0, false));
    assert_eq!(dec.lookup_register_offset(&ctx, dom, "R"), None);
}

#[test]
fn test_decode_register_and_enum() {
    let s = schema(&format!(
        r#"<database>{CHIPS}
<domain name="D" width="32">
    <reg32 name="NAME" offset="0x10">
        <bitfield name="FOO" low="4" high="7" type="uint"/>
    </reg32>
</domain>
</database>"#
    ));
    let dec = Decoder::new(&s);
    let dom = s.find_domain("D").unwrap();
    let mut ctx = VariantContext::new();
    assert_eq!(
        dec.decode_register(&mut ctx, dom, 0x10, true, 0x70),
        "NAME <= { FOO = 7 }"
    );
    assert_eq!(dec.decode_register(&mut ctx, dom, 0x14, false, 0x70), "0x14 => 0x70");
    assert_eq!(dec.decode_enum(&ctx, "chip", 2).as_deref(), Some("C"));
    assert_eq!(dec.decode_enum(&ctx, "chip", 9), None);
    assert_eq!(dec.decode_enum(&ctx, "nope", 0), None);
}

#[test]
fn test_path_parsing() {
    let segs = parse_path("A[1][GMEM].B").unwrap();
    assert_eq!(segs.len(), 2);
    assert_eq!(segs[0].name, "A");
    assert_eq!(segs[0].indices, ["1", "GMEM"]);
    assert!(segs[1].indices.is_empty());
    assert!(parse_path("A[1]x").is_none());
    assert!(parse_path("[1]").is_none());
}
