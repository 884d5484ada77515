//! Message template interpolation
//!
//! Two strategies turn a template plus named arguments into text:
//!
//! - [`InterpolatorKind::Percent`]: `%(name)conv` tokens with printf-like
//!   conversions (`s`, `r`, `d`, `i`, `f`, `F`, `e`, `E`, `x`, `X`, `o`),
//!   flags (`-`, `+`, space, `0`, `#`), width and precision. A `%` that is not
//!   followed by `(` is copied verbatim.
//! - [`InterpolatorKind::Brace`]: `{name}` tokens where the name consists of
//!   ASCII alphanumerics, `_` and `.`. Anything else in braces is copied
//!   verbatim.
//!
//! Both are pure: the same template and arguments always yield the same text.

use crate::core::args::{FieldValue, LogArgs};
use crate::core::error::{LoggerError, Result};
use serde::{Deserialize, Serialize};

/// Template placeholder style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolatorKind {
    #[default]
    Percent,
    Brace,
}

impl InterpolatorKind {
    pub fn interpolate(&self, template: &str, args: &LogArgs) -> Result<String> {
        match self {
            InterpolatorKind::Percent => interpolate_percent(template, args),
            InterpolatorKind::Brace => interpolate_brace(template, args),
        }
    }
}

/// Expand `%(name)conv` tokens
pub fn interpolate_percent(template: &str, args: &LogArgs) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let Some(named) = after.strip_prefix('(') else {
            out.push('%');
            rest = after;
            continue;
        };

        let close = named
            .find(')')
            .ok_or_else(|| LoggerError::format(template, "unterminated argument name"))?;
        let name = &named[..close];
        let tail = &named[close + 1..];

        let (spec, consumed) = ConversionSpec::parse(tail).ok_or_else(|| {
            LoggerError::format(template, format!("invalid conversion for argument '{}'", name))
        })?;
        let value = args.get(name).ok_or_else(|| {
            LoggerError::format(template, format!("missing argument '{}'", name))
        })?;
        let rendered = spec.render(value).ok_or_else(|| {
            LoggerError::format(
                template,
                format!(
                    "argument '{}' is not valid for conversion '{}'",
                    name, spec.conversion
                ),
            )
        })?;

        out.push_str(&rendered);
        rest = &tail[consumed..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Expand `{name}` tokens
pub fn interpolate_brace(template: &str, args: &LogArgs) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find('}') {
            Some(close) if is_brace_token(&after[..close]) => {
                let name = &after[..close];
                let value = args.get(name).ok_or_else(|| {
                    LoggerError::format(template, format!("missing argument '{}'", name))
                })?;
                out.push_str(&value.to_string());
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn is_brace_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Default)]
struct ConversionSpec {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl ConversionSpec {
    /// Parse flags, width, precision and conversion character.
    ///
    /// Returns the spec and the number of bytes consumed.
    fn parse(input: &str) -> Option<(Self, usize)> {
        let mut spec = ConversionSpec::default();
        let mut chars = input.char_indices().peekable();

        while let Some(&(_, c)) = chars.peek() {
            match c {
                '-' => spec.left_align = true,
                '0' => spec.zero_pad = true,
                '+' => spec.plus_sign = true,
                ' ' => spec.space_sign = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }

        while let Some(&(_, c)) = chars.peek() {
            let Some(d) = c.to_digit(10) else { break };
            spec.width = spec.width.checked_mul(10)?.checked_add(d as usize)?;
            chars.next();
        }

        if chars.peek().is_some_and(|&(_, c)| c == '.') {
            chars.next();
            let mut precision = 0usize;
            while let Some(&(_, c)) = chars.peek() {
                let Some(d) = c.to_digit(10) else { break };
                precision = precision.checked_mul(10)?.checked_add(d as usize)?;
                chars.next();
            }
            spec.precision = Some(precision);
        }

        let (idx, conversion) = chars.next()?;
        if !matches!(
            conversion,
            's' | 'r' | 'd' | 'i' | 'u' | 'f' | 'F' | 'e' | 'E' | 'x' | 'X' | 'o'
        ) {
            return None;
        }
        spec.conversion = conversion;
        Some((spec, idx + conversion.len_utf8()))
    }

    fn render(&self, value: &FieldValue) -> Option<String> {
        let (negative, body) = match self.conversion {
            's' => {
                let text = value.to_string();
                return Some(self.pad("", self.truncate(text), false));
            }
            'r' => {
                let text = match value {
                    FieldValue::String(s) => format!("{:?}", s),
                    other => other.to_string(),
                };
                return Some(self.pad("", self.truncate(text), false));
            }
            'd' | 'i' | 'u' => {
                let n = value.as_i64()?;
                (n < 0, n.unsigned_abs().to_string())
            }
            'x' | 'X' | 'o' => {
                let n = value.as_i64()?;
                let magnitude = n.unsigned_abs();
                let digits = match self.conversion {
                    'x' => format!("{:x}", magnitude),
                    'X' => format!("{:X}", magnitude),
                    _ => format!("{:o}", magnitude),
                };
                let prefix = match (self.alternate, self.conversion) {
                    (false, _) => "",
                    (true, 'x') => "0x",
                    (true, 'X') => "0X",
                    (true, _) => "0o",
                };
                (n < 0, format!("{}{}", prefix, digits))
            }
            'f' | 'F' => {
                let x = value.as_f64()?;
                let precision = self.precision.unwrap_or(6);
                let body = if x.is_finite() {
                    format!("{:.*}", precision, x.abs())
                } else if x.is_nan() {
                    "nan".to_string()
                } else {
                    "inf".to_string()
                };
                let body = if self.conversion == 'F' {
                    body.to_uppercase()
                } else {
                    body
                };
                (x.is_sign_negative() && !x.is_nan(), body)
            }
            'e' | 'E' => {
                let x = value.as_f64()?;
                let precision = self.precision.unwrap_or(6);
                let body = exponent_notation(x.abs(), precision);
                let body = if self.conversion == 'E' {
                    body.to_uppercase()
                } else {
                    body
                };
                (x.is_sign_negative() && !x.is_nan(), body)
            }
            _ => return None,
        };

        let sign = if negative {
            "-"
        } else if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        };
        Some(self.pad(sign, body, true))
    }

    fn truncate(&self, text: String) -> String {
        match self.precision {
            Some(p) => text.chars().take(p).collect(),
            None => text,
        }
    }

    fn pad(&self, sign: &str, body: String, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let fill = self.width - len;
        if self.left_align {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if self.zero_pad && numeric {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }
}

/// `1.5e+03` style exponent with at least two exponent digits
fn exponent_notation(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return if x.is_nan() { "nan".into() } else { "inf".into() };
    }
    let raw = format!("{:.*e}", precision, x);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}e{:+03}", mantissa, exp)
        }
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, FieldValue)]) -> LogArgs {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_percent_string_substitution() {
        let a = args(&[("foo", "bar".into())]);
        assert_eq!(interpolate_percent("%(foo)s", &a).unwrap(), "bar");
    }

    #[test]
    fn test_percent_zero_padded_integer() {
        let a = args(&[("Bond", 7.into())]);
        assert_eq!(interpolate_percent("%(Bond)03d", &a).unwrap(), "007");
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_percent_float_precision() {
        let a = args(&[("PI", 3.14159265.into())]);
        assert_eq!(interpolate_percent("%(PI).2f", &a).unwrap(), "3.14");
    }

    #[test]
    fn test_percent_literal_percent_value() {
        let a = args(&[("pct", "%".into())]);
        assert_eq!(interpolate_percent("%(pct)s", &a).unwrap(), "%");
    }

    #[test]
    fn test_percent_key_is_percent_sign() {
        let a = args(&[("%", "foo".into())]);
        assert_eq!(interpolate_percent("%(%)s", &a).unwrap(), "foo");
    }

    #[test]
    fn test_percent_without_paren_passes_through() {
        let a = args(&[("n", 5.into())]);
        assert_eq!(
            interpolate_percent("100% of %(n)d jobs, 50%s", &a).unwrap(),
            "100% of 5 jobs, 50%s"
        );
        assert_eq!(interpolate_percent("no tokens", &LogArgs::new()).unwrap(), "no tokens");
    }

    #[test]
    fn test_percent_missing_argument() {
        let err = interpolate_percent("%(user)s logged in", &LogArgs::new()).unwrap_err();
        assert!(matches!(err, LoggerError::Format { .. }));
        assert!(err.to_string().contains("missing argument 'user'"));
    }

    #[test]
    fn test_percent_invalid_numeric_conversion() {
        let a = args(&[("count", "many".into())]);
        assert!(interpolate_percent("%(count)d", &a).is_err());
        assert!(interpolate_percent("%(count)f", &a).is_err());
    }

    #[test]
    fn test_percent_malformed_tokens() {
        let a = args(&[("x", 1.into())]);
        assert!(interpolate_percent("%(x", &a).is_err());
        assert!(interpolate_percent("%(x)", &a).is_err());
        assert!(interpolate_percent("%(x)q", &a).is_err());
    }

    #[test]
    fn test_percent_flags_and_width() {
        let a = args(&[
            ("n", (-42).into()),
            ("s", "ab".into()),
            ("h", 255.into()),
            ("big", 1234.5.into()),
        ]);
        assert_eq!(interpolate_percent("[%(n)6d]", &a).unwrap(), "[   -42]");
        assert_eq!(interpolate_percent("[%(n)06d]", &a).unwrap(), "[-00042]");
        assert_eq!(interpolate_percent("[%(n)-6d]", &a).unwrap(), "[-42   ]");
        assert_eq!(interpolate_percent("[%(s)5s]", &a).unwrap(), "[   ab]");
        assert_eq!(interpolate_percent("[%(s)-5s]", &a).unwrap(), "[ab   ]");
        assert_eq!(interpolate_percent("[%(s).1s]", &a).unwrap(), "[a]");
        assert_eq!(interpolate_percent("%(h)x %(h)#X", &a).unwrap(), "ff 0XFF");
        assert_eq!(interpolate_percent("%(big)+.1f", &a).unwrap(), "+1234.5");
        assert_eq!(interpolate_percent("%(big).2e", &a).unwrap(), "1.23e+03");
    }

    #[test]
    fn test_percent_repr_quotes_strings() {
        let a = args(&[("s", "hi".into()), ("n", 3.into())]);
        assert_eq!(interpolate_percent("%(s)r %(n)r", &a).unwrap(), "\"hi\" 3");
    }

    #[test]
    fn test_brace_substitution() {
        let a = args(&[("foo", "bar".into()), ("user.id", 9.into())]);
        assert_eq!(interpolate_brace("{foo}", &a).unwrap(), "bar");
        assert_eq!(interpolate_brace("id={user.id}!", &a).unwrap(), "id=9!");
    }

    #[test]
    fn test_brace_without_tokens_unchanged() {
        let template = "plain text with } and { and {} and {not a token}";
        assert_eq!(interpolate_brace(template, &LogArgs::new()).unwrap(), template);
    }

    #[test]
    fn test_brace_json_like_text_passes_through() {
        let a = args(&[("v", 1.into())]);
        assert_eq!(
            interpolate_brace(r#"{"a":{v}}"#, &a).unwrap(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn test_brace_missing_argument() {
        assert!(interpolate_brace("{missing}", &LogArgs::new()).is_err());
    }

    #[test]
    fn test_kind_dispatch() {
        let a = args(&[("x", "y".into())]);
        assert_eq!(InterpolatorKind::Percent.interpolate("%(x)s", &a).unwrap(), "y");
        assert_eq!(InterpolatorKind::Brace.interpolate("{x}", &a).unwrap(), "y");
    }
}
