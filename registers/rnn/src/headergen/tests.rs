// Licensed under the Apache-2.0 license

use super::*;
use crate::resolve::resolve;
use crate::Loader;

fn headers(files: &[(&str, &str)]) -> Vec<GeneratedHeader> {
    let mut db = Database::new();
    for (name, text) in files {
        Loader::default().load_str(&mut db, name, text).unwrap();
    }
    let schema = resolve(db).unwrap();
    assert!(!schema.failed, "{:?}", schema.diagnostics);
    generate_headers(&schema).unwrap()
}

fn single(text: &str) -> String {
    let all = headers(&[("gpu.xml", text)]);
    assert_eq!(all.len(), 1);
    all[0].body.clone()
}

fn has_define(body: &str, name: &str, value: &str) -> bool {
    body.lines().any(|line| {
        let mut words = line.split_whitespace();
        words.next() == Some("#define") && words.next() == Some(name) && words.next() == Some(value)
    })
}

#[test]
fn test_register_and_fields() {
    let body = single(
        r#"<database>
<domain name="GPU" width="32" bare="yes" size="0x1000">
    <reg32 name="CNTL" offset="0x10">
        <bitfield name="ENABLE" pos="0" type="boolean"/>
        <bitfield name="MODE" low="4" high="7" type="uint" max="9"/>
        <bitfield name="ADDR" low="8" high="15" shr="2"/>
    </reg32>
</domain>
</database>"#,
    );
    assert!(has_define(&body, "GPU__SIZE", "0x00001000"));
    assert!(has_define(&body, "REG_CNTL", "0x00000010"));
    assert!(has_define(&body, "CNTL_ENABLE", "0x00000001"));
    assert!(!body.contains("CNTL_ENABLE__MASK"));
    assert!(has_define(&body, "CNTL_MODE__MASK", "0x000000f0"));
    assert!(has_define(&body, "CNTL_MODE__SHIFT", "4"));
    assert!(body.contains("static inline uint32_t CNTL_MODE(uint32_t val)"));
    assert!(body.contains("\tassert(val <= 9);"));
    assert!(body.contains("\treturn ((uint32_t)(val) << CNTL_MODE__SHIFT) & CNTL_MODE__MASK;"));
    assert!(body.contains("\tassert(!(val & 0x3));"));
    assert!(body.contains("\treturn ((uint32_t)((val >> 2)) << CNTL_ADDR__SHIFT) & CNTL_ADDR__MASK;"));
}

#[test]
fn test_enums() {
    let body = single(
        r#"<database>
<enum name="fmt">
    <value name="R8" value="0"/>
    <value name="RG8" value="1"/>
</enum>
<enum name="swap" inline="yes">
    <value name="WZYX" value="0"/>
    <value name="XYZW" value="3"/>
</enum>
<domain name="GPU" width="32" bare="yes">
    <reg32 name="R" offset="0">
        <bitfield name="FMT" low="0" high="3" type="fmt"/>
        <bitfield name="SWAP" low="4" high="5" type="swap"/>
    </reg32>
</domain>
</database>"#,
    );
    assert!(body.contains("enum fmt {\n\tfmt_R8 = 0,\n\tfmt_RG8 = 1,\n};"));
    assert!(!body.contains("enum swap"));
    assert!(body.contains("static inline uint32_t R_FMT(enum fmt val)"));
    assert!(body.contains("static inline uint32_t R_SWAP(uint32_t val)"));
    assert!(has_define(&body, "R_SWAP_XYZW", "0x00000003"));
}

#[test]
fn test_shared_bitset() {
    let body = single(
        r#"<database>
<bitset name="pkt" bare="yes">
    <bitfield name="OP" low="0" high="6"/>
    <bitfield name="SCALE" low="8" high="15" type="ufixed" radix="4"/>
    <bitfield name="GAIN" low="16" high="31" type="fixed" radix="8"/>
</bitset>
<domain name="GPU" width="32" bare="yes">
    <reg32 name="A" offset="0" type="pkt"/>
    <reg32 name="B" offset="1" type="pkt"/>
</domain>
</database>"#,
    );
    assert_eq!(body.matches("#define OP__MASK").count(), 1);
    assert!(body.contains("static inline uint32_t SCALE(float val)"));
    assert!(body.contains("((uint32_t)(val * 16.0))"));
    assert!(body.contains("((int32_t)(val * 256.0))"));
    assert!(!body.contains("A_OP"));
    assert!(has_define(&body, "REG_B", "0x00000001"));
}

#[test]
fn test_wide_field() {
    let body = single(
        r#"<database>
<domain name="GPU" width="32" bare="yes">
    <reg64 name="BASE" offset="0x20">
        <bitfield name="ADDR" low="12" high="47" type="uint"/>
    </reg64>
</domain>
</database>"#,
    );
    assert!(has_define(&body, "BASE_ADDR__MASK", "0x0000fffffffff000ull"));
    assert!(body.contains("static inline uint64_t BASE_ADDR(uint64_t val)"));
}

#[test]
fn test_indexed_offsets() {
    let body = single(
        r#"<database>
<enum name="ctx_id">
    <value name="SYS" value="0"/>
    <value name="GMEM" value="1"/>
</enum>
<domain name="GPU" width="32" bare="yes">
    <array name="CTX" offset="0x100" stride="0x10" length="4">
        <reg32 name="X" offset="0x2"/>
        <array name="RING" offset="0x8" stride="2" length="2">
            <reg32 name="Y" offset="1"/>
        </array>
    </array>
    <array name="BANK" offsets="0x400,0x480,0x500" length="3" stride="4" index="ctx_id">
        <reg32 name="Z" offset="0"/>
    </array>
    <stripe name="PIPE" doffset="REG_PIPE_BASE" length="1">
        <reg32 name="W" offset="4"/>
    </stripe>
</domain>
</database>"#,
    );
    assert!(body.contains("static inline uint32_t REG_CTX(uint32_t i0) { return 0x00000100 + 0x10*i0; }"));
    assert!(has_define(&body, "CTX__ESIZE", "0x00000010"));
    assert!(has_define(&body, "CTX__LEN", "0x00000004"));
    assert!(body.contains("static inline uint32_t REG_CTX_X(uint32_t i0) { return 0x00000102 + 0x10*i0; }"));
    assert!(body.contains(
        "static inline uint32_t REG_CTX_RING_Y(uint32_t i0, uint32_t i1) { return 0x00000109 + 0x10*i0 + 0x2*i1; }"
    ));

    assert!(body.contains("static inline uint32_t __offset_BANK(enum ctx_id idx)"));
    assert!(body.contains("\t\tcase ctx_id_SYS: return 0x00000400;"));
    assert!(body.contains("\t\tcase ctx_id_GMEM: return 0x00000480;"));
    assert!(body.contains("\t\tcase 2: return 0x00000500;"));
    assert!(body.contains("static inline uint32_t REG_BANK_Z(enum ctx_id i0) { return 0x00000000 + __offset_BANK(i0); }"));

    assert!(body.contains("static inline uint32_t REG_PIPE_W(void) { return 0x00000004 + (REG_PIPE_BASE); }"));
}

#[test]
fn test_group_with_table_stripe_used_twice() {
    let body = single(
        r#"<database>
<group name="g">
    <stripe offsets="0x0,0x40" length="2" stride="4">
        <reg32 name="X" offset="0"/>
    </stripe>
</group>
<domain name="GPU" width="32" bare="yes">
    <array name="A" offset="0x1000" stride="0x100" length="2">
        <use-group name="g"/>
    </array>
    <array name="B" offset="0x2000" stride="0x100" length="2">
        <use-group name="g"/>
    </array>
</domain>
</database>"#,
    );
    assert_eq!(body.matches("static inline uint32_t __offset_A_L3(uint32_t idx)").count(), 1);
    assert_eq!(body.matches("static inline uint32_t __offset_B_L3(uint32_t idx)").count(), 1);
    assert!(!body.contains("__offset_L3"));
    assert!(body.contains("__offset_A_L3(i1)"));
    assert!(body.contains("__offset_B_L3(i1)"));
    assert!(body.contains("\t\tcase 1: return 0x00000040;"));
}

#[test]
fn test_index_enum_without_names() {
    let body = single(
        r#"<database>
<enum name="lane" inline="yes"><value name="L0" value="0"/></enum>
<enum name="empty"/>
<domain name="GPU" width="32" bare="yes">
    <array name="P" offsets="0x10,0x30" length="2" stride="4" index="lane">
        <reg32 name="X" offset="0"/>
    </array>
    <array name="Q" offsets="0x100,0x180" length="2" stride="4" index="empty">
        <reg32 name="Y" offset="0"/>
    </array>
</domain>
</database>"#,
    );
    assert!(body.contains("static inline uint32_t __offset_P(uint32_t idx)"));
    assert!(body.contains("static inline uint32_t __offset_Q(uint32_t idx)"));
    assert!(body.contains("\t\tcase 0: return 0x00000010;"));
    assert!(body.contains("\t\tcase 1: return 0x00000180;"));
    assert!(!body.contains("case :"));
    assert!(!body.contains("enum lane"));
}

#[test]
fn test_signed_and_wide_accessors() {
    let body = single(
        r#"<database>
<domain name="GPU" width="32" bare="yes">
    <reg32 name="BIAS" offset="0">
        <bitfield name="VAL" low="0" high="7" type="int"/>
    </reg32>
    <array name="HI" offset="0x100000000" stride="0x10" length="4">
        <reg32 name="X" offset="0"/>
    </array>
    <array name="BIG" offset="0" stride="0x80000000" length="4">
        <reg32 name="Y" offset="4"/>
    </array>
</domain>
</database>"#,
    );
    assert!(body.contains("static inline uint32_t BIAS_VAL(int32_t val)"));
    assert!(body.contains("static inline uint64_t REG_HI_X(uint32_t i0) { return 0x0000000100000000ull + 0x10*i0; }"));
    assert!(body.contains("static inline uint64_t REG_BIG_Y(uint32_t i0) { return 0x00000004 + 0x80000000*i0; }"));
}

#[test]
fn test_dead_nodes_skipped() {
    let body = single(
        r#"<database>
<enum name="chip" bare="yes">
    <value name="A" value="0"/>
    <value name="B" value="1"/>
</enum>
<domain name="GPU" width="32" bare="yes" varset="chip">
    <reg32 name="ONLY_A" offset="0" variants="A"/>
    <stripe variants="A">
        <reg32 name="NEVER" offset="1" variants="B"/>
    </stripe>
</domain>
</database>"#,
    );
    assert!(body.contains("ONLY_A"));
    assert!(!body.contains("NEVER"));
}

#[test]
fn test_headers_per_source_file() {
    let all = headers(&[
        (
            "common.xml",
            r#"<database>
<enum name="fmt"><value name="R8" value="0"/></enum>
<group name="status_regs">
    <reg32 name="STATUS" offset="0"/>
</group>
</database>"#,
        ),
        (
            "gpu.xml",
            r#"<database>
<domain name="GPU" width="32" bare="yes">
    <use-group name="status_regs"/>
    <reg32 name="CNTL" offset="4"/>
</domain>
</database>"#,
        ),
    ]);
    let names: Vec<_> = all.iter().map(|h| h.file_name.as_str()).collect();
    assert_eq!(names, ["common.xml.h", "gpu.xml.h"]);
    assert!(all[0].body.contains("enum fmt"));
    assert!(!all[0].body.contains("STATUS"));
    assert!(has_define(&all[1].body, "REG_STATUS", "0x00000000"));
    assert!(has_define(&all[1].body, "REG_CNTL", "0x00000004"));
}

#[test]
fn test_render_and_write() {
    let header = GeneratedHeader::for_source(
        std::path::Path::new("xml/a6xx.xml"),
        "#define REG_X 0x00000000\n".to_string(),
    );
    assert_eq!(header.file_name, "a6xx.xml.h");
    assert_eq!(header.guard, "A6XX_XML_H");
    assert_eq!(
        header.render(),
        "#ifndef A6XX_XML_H\n#define A6XX_XML_H\n\n#define REG_X 0x00000000\n\n#endif /* A6XX_XML_H */\n"
    );

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("include");
    let written = write_headers(&[header.clone()], &out).unwrap();
    assert_eq!(written, [out.join("a6xx.xml.h")]);
    assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), header.render());
}
