//! Positional (printf-style) message formatting
//!
//! Log calls take a format string with `%` conversion specifiers and a slice of
//! [`FormatArg`]s. Formatting never fails: a specifier that does not fit its
//! argument, a missing argument or a surplus argument is rendered inline as a
//! marker such as `%!d(string=abc)`, `%!d(MISSING)` or `%!(EXTRA int=1)`, so
//! the message is always delivered.
//!
//! Supported verbs: `%v %s %q %d %b %o %x %X %c %e %E %f %F %g %G %t %T %%`,
//! with the flags `- + # 0` and space, a decimal width and a `.precision`.

use std::fmt::Write as _;

/// A single positional argument for [`sprintf`]
#[derive(Debug, Clone, PartialEq)]
pub enum FormatArg {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Char(char),
    Json(serde_json::Value),
    Nil,
}

impl FormatArg {
    /// Wrap any `Display` value as a string argument
    pub fn display<T: std::fmt::Display + ?Sized>(value: &T) -> Self {
        FormatArg::Str(value.to_string())
    }

    /// Type name used in mismatch markers
    pub fn type_name(&self) -> &'static str {
        match self {
            FormatArg::Str(_) => "string",
            FormatArg::Int(_) => "int",
            FormatArg::Uint(_) => "uint",
            FormatArg::Float(_) => "float64",
            FormatArg::Bool(_) => "bool",
            FormatArg::Char(_) => "char",
            FormatArg::Json(_) => "json",
            FormatArg::Nil => "<nil>",
        }
    }

    /// Plain rendering, as produced by `%v` without flags
    fn plain(&self) -> String {
        format_verb('v', &Conversion::default(), self).unwrap_or_default()
    }

    /// `type=value` rendering used inside mismatch markers
    fn describe(&self) -> String {
        match self {
            FormatArg::Nil => "<nil>".to_string(),
            other => format!("{}={}", other.type_name(), other.plain()),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for FormatArg {
            fn from(v: $t) -> Self {
                FormatArg::Int(v as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for FormatArg {
            fn from(v: $t) -> Self {
                FormatArg::Uint(v as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for FormatArg {
    fn from(v: f32) -> Self {
        FormatArg::Float(v as f64)
    }
}

impl From<f64> for FormatArg {
    fn from(v: f64) -> Self {
        FormatArg::Float(v)
    }
}

impl From<bool> for FormatArg {
    fn from(v: bool) -> Self {
        FormatArg::Bool(v)
    }
}

impl From<char> for FormatArg {
    fn from(v: char) -> Self {
        FormatArg::Char(v)
    }
}

impl From<&str> for FormatArg {
    fn from(v: &str) -> Self {
        FormatArg::Str(v.to_string())
    }
}

impl From<String> for FormatArg {
    fn from(v: String) -> Self {
        FormatArg::Str(v)
    }
}

impl From<&String> for FormatArg {
    fn from(v: &String) -> Self {
        FormatArg::Str(v.clone())
    }
}

impl From<serde_json::Value> for FormatArg {
    fn from(v: serde_json::Value) -> Self {
        FormatArg::Json(v)
    }
}

impl<T: Into<FormatArg>> From<Option<T>> for FormatArg {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FormatArg::Nil)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Conversion {
    minus: bool,
    plus: bool,
    sharp: bool,
    zero: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Widths and precisions above this are rejected with a marker
const MAX_WIDTH: usize = 1_000_000;

/// Format `format` with positional `args`
///
/// # Example
///
/// ```
/// use qlog::{sprintf, FormatArg};
///
/// let out = sprintf("%s has %d items", &["cart".into(), 3.into()]);
/// assert_eq!(out, "cart has 3 items");
///
/// let out = sprintf("value %d", &[FormatArg::from("x")]);
/// assert_eq!(out, "value %!d(string=x)");
/// ```
pub fn sprintf(format: &str, args: &[FormatArg]) -> String {
    let bytes = format.as_bytes();
    let mut out = String::with_capacity(format.len() + 16);
    let mut next_arg = 0;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i] != b'%' {
            i += 1;
        }
        out.push_str(&format[start..i]);
        if i >= bytes.len() {
            break;
        }
        i += 1; // skip '%'

        let mut conv = Conversion::default();
        while i < bytes.len() {
            match bytes[i] {
                b'-' => conv.minus = true,
                b'+' => conv.plus = true,
                b'#' => conv.sharp = true,
                b'0' => conv.zero = true,
                b' ' => conv.space = true,
                _ => break,
            }
            i += 1;
        }
        conv.width = parse_number(bytes, &mut i);
        if conv.width.is_some_and(|w| w > MAX_WIDTH) {
            out.push_str("%!(BADWIDTH)");
            conv.width = None;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            conv.precision = Some(parse_number(bytes, &mut i).unwrap_or(0));
            if conv.precision.is_some_and(|p| p > MAX_WIDTH) {
                out.push_str("%!(BADPREC)");
                conv.precision = None;
            }
        }

        let Some(verb) = format[i..].chars().next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        i += verb.len_utf8();

        if verb == '%' {
            out.push('%');
            continue;
        }

        let Some(arg) = args.get(next_arg) else {
            let _ = write!(out, "%!{}(MISSING)", verb);
            continue;
        };
        next_arg += 1;

        match format_verb(verb, &conv, arg) {
            Some(rendered) => out.push_str(&rendered),
            None => {
                let _ = write!(out, "%!{}({})", verb, arg.describe());
            }
        }
    }

    if next_arg < args.len() {
        let extra = args[next_arg..]
            .iter()
            .map(FormatArg::describe)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, "%!(EXTRA {})", extra);
    }

    out
}

fn parse_number(bytes: &[u8], i: &mut usize) -> Option<usize> {
    let start = *i;
    let mut value: usize = 0;
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add((bytes[*i] - b'0') as usize);
        *i += 1;
    }
    (*i > start).then_some(value)
}

/// Render one argument, or `None` when the verb does not apply to it
fn format_verb(verb: char, conv: &Conversion, arg: &FormatArg) -> Option<String> {
    if verb == 'T' {
        return Some(pad(arg.type_name().to_string(), conv));
    }

    match arg {
        FormatArg::Str(s) => match verb {
            'v' | 's' => Some(pad(truncate(s, conv.precision), conv)),
            'q' => Some(pad(format!("{:?}", truncate(s, conv.precision)), conv)),
            'x' => Some(pad(hex_bytes(s, false), conv)),
            'X' => Some(pad(hex_bytes(s, true), conv)),
            _ => None,
        },
        FormatArg::Int(n) => format_integer(verb, conv, *n < 0, n.unsigned_abs()),
        FormatArg::Uint(n) => format_integer(verb, conv, false, *n),
        FormatArg::Char(c) => match verb {
            'v' | 's' | 'c' => Some(pad(c.to_string(), conv)),
            'q' => Some(pad(format!("{:?}", c), conv)),
            _ => format_integer(verb, conv, false, *c as u64),
        },
        FormatArg::Float(f) => format_float(verb, conv, *f),
        FormatArg::Bool(b) => match verb {
            'v' | 't' => Some(pad(b.to_string(), conv)),
            _ => None,
        },
        FormatArg::Json(value) => match verb {
            'v' | 's' => Some(pad(value.to_string(), conv)),
            _ => None,
        },
        FormatArg::Nil => match verb {
            'v' => Some(pad("<nil>".to_string(), conv)),
            _ => None,
        },
    }
}

fn format_integer(verb: char, conv: &Conversion, negative: bool, magnitude: u64) -> Option<String> {
    let (digits, prefix) = match verb {
        'v' | 'd' => (magnitude.to_string(), ""),
        'b' => (format!("{:b}", magnitude), "0b"),
        'o' => (format!("{:o}", magnitude), "0"),
        'x' => (format!("{:x}", magnitude), "0x"),
        'X' => (format!("{:X}", magnitude), "0X"),
        'c' => {
            let c = u32::try_from(magnitude)
                .ok()
                .filter(|_| !negative)
                .and_then(char::from_u32)
                .unwrap_or('\u{FFFD}');
            return Some(pad(c.to_string(), conv));
        }
        'q' => {
            let c = u32::try_from(magnitude)
                .ok()
                .filter(|_| !negative)
                .and_then(char::from_u32)
                .unwrap_or('\u{FFFD}');
            return Some(pad(format!("{:?}", c), conv));
        }
        _ => return None,
    };

    let mut digits = digits;
    if let Some(precision) = conv.precision.filter(|p| *p > digits.len()) {
        digits.insert_str(0, &"0".repeat(precision - digits.len()));
    }
    let prefix = if conv.sharp { prefix } else { "" };
    let head = format!("{}{}", sign(negative, conv), prefix);
    Some(pad_numeric(head, digits, conv, conv.precision.is_none()))
}

fn format_float(verb: char, conv: &Conversion, value: f64) -> Option<String> {
    let negative = value.is_sign_negative() && !value.is_nan();
    let abs = value.abs();

    if value.is_nan() || value.is_infinite() {
        if !matches!(verb, 'v' | 'e' | 'E' | 'f' | 'F' | 'g' | 'G') {
            return None;
        }
        let body = if value.is_nan() {
            "NaN".to_string()
        } else {
            let s = if negative { "-" } else if conv.plus { "+" } else { "" };
            format!("{}Inf", s)
        };
        return Some(pad(body, conv));
    }

    let body = match verb {
        'f' | 'F' => format!("{:.*}", conv.precision.unwrap_or(6), abs),
        'e' => exponent_form(abs, conv.precision.unwrap_or(6), false),
        'E' => exponent_form(abs, conv.precision.unwrap_or(6), true),
        'v' | 'g' => general_form(abs, conv.precision, false),
        'G' => general_form(abs, conv.precision, true),
        _ => return None,
    };
    let head = sign(negative, conv).to_string();
    Some(pad_numeric(head, body, conv, true))
}

/// `d.dddde±dd`
fn exponent_form(abs: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, abs);
    fix_exponent(&raw, upper)
}

/// `%g`: shortest representation, switching to exponent form for very
/// small or large magnitudes
fn general_form(abs: f64, precision: Option<usize>, upper: bool) -> String {
    if abs == 0.0 {
        return "0".to_string();
    }
    match precision {
        None => {
            let exp = decimal_exponent(&format!("{:e}", abs));
            if !(-4..6).contains(&exp) {
                fix_exponent(&format!("{:e}", abs), upper)
            } else {
                format!("{}", abs)
            }
        }
        Some(p) => {
            let p = p.max(1);
            let sci = format!("{:.*e}", p - 1, abs);
            let exp = decimal_exponent(&sci);
            if exp < -4 || exp >= p as i32 {
                let (mantissa, _) = sci.split_once('e').unwrap_or((&sci, "0"));
                let mantissa = trim_fraction(mantissa);
                fix_exponent(&format!("{}e{}", mantissa, exp), upper)
            } else {
                let decimals = (p as i32 - 1 - exp).max(0) as usize;
                trim_fraction(&format!("{:.*}", decimals, abs)).to_string()
            }
        }
    }
}

fn decimal_exponent(sci: &str) -> i32 {
    sci.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

/// Rewrite Rust's `1.5e3` as `1.5e+03`
fn fix_exponent(raw: &str, upper: bool) -> String {
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let marker = if upper { 'E' } else { 'e' };
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}{}{}{:02}", mantissa, marker, sign, exp.abs())
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn sign(negative: bool, conv: &Conversion) -> &'static str {
    if negative {
        "-"
    } else if conv.plus {
        "+"
    } else if conv.space {
        " "
    } else {
        ""
    }
}

fn truncate(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    }
}

fn hex_bytes(s: &str, upper: bool) -> String {
    s.bytes().fold(String::with_capacity(s.len() * 2), |mut acc, b| {
        if upper {
            let _ = write!(acc, "{:02X}", b);
        } else {
            let _ = write!(acc, "{:02x}", b);
        }
        acc
    })
}

fn pad(s: String, conv: &Conversion) -> String {
    let len = s.chars().count();
    let Some(width) = conv.width.filter(|w| *w > len) else {
        return s;
    };
    let fill = width - len;
    if conv.minus {
        format!("{}{}", s, " ".repeat(fill))
    } else if conv.zero {
        format!("{}{}", "0".repeat(fill), s)
    } else {
        format!("{}{}", " ".repeat(fill), s)
    }
}

/// Pad a number, placing zero fill between the sign/prefix and the digits
fn pad_numeric(head: String, digits: String, conv: &Conversion, zero_allowed: bool) -> String {
    let len = head.chars().count() + digits.chars().count();
    match conv.width.filter(|w| *w > len) {
        Some(width) if conv.zero && zero_allowed && !conv.minus => {
            format!("{}{}{}", head, "0".repeat(width - len), digits)
        }
        _ => {
            let no_zero = Conversion { zero: false, ..*conv };
            pad(format!("{}{}", head, digits), &no_zero)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: Vec<FormatArg>) -> Vec<FormatArg> {
        list
    }

    #[test]
    fn test_plain_verbs() {
        assert_eq!(sprintf("%s-%d", &args(vec!["a".into(), 7.into()])), "a-7");
        assert_eq!(sprintf("%v %v", &args(vec![true.into(), 2.5.into()])), "true 2.5");
        assert_eq!(sprintf("%t", &[false.into()]), "false");
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_width_and_flags() {
        assert_eq!(sprintf("[%5d]", &[42.into()]), "[   42]");
        assert_eq!(sprintf("[%-5d]", &[42.into()]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[(-42).into()]), "[-0042]");
        assert_eq!(sprintf("[%+d]", &[42.into()]), "[+42]");
        assert_eq!(sprintf("[%6s]", &["ab".into()]), "[    ab]");
        assert_eq!(sprintf("[%.2s]", &["abcdef".into()]), "[ab]");
    }

    #[test]
    fn test_oversized_width_and_precision() {
        assert_eq!(sprintf("%99999999999999999999d", &[1.into()]), "%!(BADWIDTH)1");
        assert_eq!(sprintf("[%1000001s]", &["a".into()]), "[%!(BADWIDTH)a]");
        assert_eq!(sprintf("%.99999999999d", &[7.into()]), "%!(BADPREC)7");
        assert_eq!(sprintf("%.2000000f", &[1.5.into()]), "%!(BADPREC)1.500000");
        assert_eq!(sprintf("%.8d", &[42.into()]), "00000042");
    }

    #[test]
    fn test_bases() {
        assert_eq!(sprintf("%x %X %o %b", &[255.into(), 255.into(), 8.into(), 5.into()]), "ff FF 10 101");
        assert_eq!(sprintf("%#x", &[255.into()]), "0xff");
        assert_eq!(sprintf("%x", &["hi".into()]), "6869");
        assert_eq!(sprintf("%c", &[65.into()]), "A");
    }

    #[test]
    fn test_floats() {
        assert_eq!(sprintf("%.2f", &[3.14159.into()]), "3.14");
        assert_eq!(sprintf("%f", &[1.5.into()]), "1.500000");
        assert_eq!(sprintf("%e", &[1234.5678.into()]), "1.234568e+03");
        assert_eq!(sprintf("%g", &[1000000.0.into()]), "1e+06");
        assert_eq!(sprintf("%g", &[0.5.into()]), "0.5");
        assert_eq!(sprintf("%.3g", &[3.14159.into()]), "3.14");
        assert_eq!(sprintf("%v", &[f64::NAN.into()]), "NaN");
    }

    #[test]
    fn test_quote() {
        assert_eq!(sprintf("%q", &["a\"b".into()]), "\"a\\\"b\"");
        assert_eq!(sprintf("%q", &['x'.into()]), "'x'");
    }

    #[test]
    fn test_type_verb() {
        assert_eq!(sprintf("%T %T", &[1.into(), "s".into()]), "int string");
    }

    #[test]
    fn test_wrong_type() {
        assert_eq!(sprintf("value %d", &["not-a-number".into()]), "value %!d(string=not-a-number)");
        assert_eq!(sprintf("%t", &[1.into()]), "%!t(int=1)");
        assert_eq!(sprintf("%s", &[FormatArg::Nil]), "%!s(<nil>)");
    }

    #[test]
    fn test_missing_and_extra() {
        assert_eq!(sprintf("%s and %s", &["one".into()]), "one and %!s(MISSING)");
        assert_eq!(sprintf("done", &[1.into(), "x".into()]), "done%!(EXTRA int=1, string=x)");
    }

    #[test]
    fn test_trailing_percent() {
        assert_eq!(sprintf("50%", &[]), "50%!(NOVERB)");
    }

    #[test]
    fn test_unknown_verb() {
        assert_eq!(sprintf("%z", &[1.into()]), "%!z(int=1)");
    }

    #[test]
    fn test_option_and_json() {
        let none: Option<i32> = None;
        assert_eq!(sprintf("%v %v", &[none.into(), Some(3).into()]), "<nil> 3");
        assert_eq!(sprintf("%v", &[serde_json::json!({"a": 1}).into()]), r#"{"a":1}"#);
    }

    #[test]
    fn test_unicode_passthrough() {
        assert_eq!(sprintf("héllo %s ✓", &["wörld".into()]), "héllo wörld ✓");
    }
}
