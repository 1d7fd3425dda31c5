// Licensed under the Apache-2.0 license

//! Utility functions for attribute parsing, name joining and formatting.

/// Parses a numeric attribute.
///
/// Text containing an `x` is read as hexadecimal (with or without a `0x`
/// prefix), everything else as decimal.
///
/// # Examples
/// ```
/// use registers_rnn::util::parse_num;
/// assert_eq!(parse_num("0x10"), Some(16));
/// assert_eq!(parse_num("42"), Some(42));
/// assert_eq!(parse_num("4z"), None);
/// ```
pub fn parse_num(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.contains(['x', 'X']) {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        u64::from_str_radix(digits, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Parses a boolean attribute (`yes`/`no`, `true`/`false`, `1`/`0`).
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Joins an optional prefix and a name with an underscore.
///
/// # Examples
/// ```
/// use registers_rnn::util::join_name;
/// assert_eq!(join_name(Some("A6XX"), "RB_CNTL"), "A6XX_RB_CNTL");
/// assert_eq!(join_name(None, "RB_CNTL"), "RB_CNTL");
/// ```
pub fn join_name(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}_{name}"),
        _ => name.to_string(),
    }
}

/// Formats a value the way C's `%#x` does: `0` for zero, `0x..` otherwise.
///
/// # Examples
/// ```
/// use registers_rnn::util::c_hex;
/// assert_eq!(c_hex(0), "0");
/// assert_eq!(c_hex(0x1f), "0x1f");
/// ```
pub fn c_hex(val: u64) -> String {
    if val == 0 {
        "0".to_string()
    } else {
        format!("{val:#x}")
    }
}

/// Formats a float the way C's `%f` does.
pub fn c_float(val: f64) -> String {
    if val.is_nan() {
        "nan".to_string()
    } else if val.is_infinite() {
        if val < 0.0 { "-inf" } else { "inf" }.to_string()
    } else {
        format!("{val:.6}")
    }
}

/// Derives an include guard from a file name: the basename, uppercased,
/// with every non-alphanumeric character replaced by `_`.
///
/// # Examples
/// ```
/// use registers_rnn::util::include_guard;
/// assert_eq!(include_guard("xml/a6xx.xml"), "A6XX_XML");
/// ```
pub fn include_guard(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_num() {
        assert_eq!(parse_num("0"), Some(0));
        assert_eq!(parse_num("0x1234"), Some(0x1234));
        assert_eq!(parse_num("0XFF"), Some(0xff));
        assert_eq!(parse_num("ffx"), None);
        assert_eq!(parse_num(" 12 "), Some(12));
        assert_eq!(parse_num("12a"), None);
        assert_eq!(parse_num(""), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_c_float() {
        assert_eq!(c_float(-1.5), "-1.500000");
        assert_eq!(c_float(f64::INFINITY), "inf");
        assert_eq!(c_float(f64::NEG_INFINITY), "-inf");
        assert_eq!(c_float(f64::NAN), "nan");
    }

    #[test]
    fn test_include_guard() {
        assert_eq!(include_guard("adreno/a6xx-common.xml"), "A6XX_COMMON_XML");
        assert_eq!(include_guard("mdp5.xml"), "MDP5_XML");
    }
}
