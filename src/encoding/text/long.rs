use crate::errors::*;

/// Parses the text form of a 64-bit integer.
///
/// The text is split on `.`; empty segments are skipped and the remaining segments are
/// parsed as decimal `i64`s and OR-ed together. A segment that is not decimal is retried as
/// hexadecimal if it carries its own `0x` prefix or the whole text starts with `0x`.
/// Hexadecimal segments are read as unsigned 64-bit patterns.
///
/// # Errors
///
/// Returns an [`ErrorKind::Corrupt`] error if a segment is neither decimal nor hexadecimal.
///
/// # Example
///
/// ```
/// use graphwire::encoding::text::parse_long;
///
/// assert_eq!(parse_long("-12.").unwrap(), -12);
/// assert_eq!(parse_long("1.2.4.8.").unwrap(), 15);
/// assert_eq!(parse_long("0xff").unwrap(), 255);
/// assert_eq!(parse_long("").unwrap(), 0);
/// ```
pub fn parse_long(s: &str) -> Result<i64> {
    let hex_text = has_hex_prefix(s);
    s.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(0i64, |acc, segment| {
            parse_segment(segment, hex_text).map(|v| acc | v)
        })
}

fn has_hex_prefix(s: &str) -> bool { s.starts_with("0x") || s.starts_with("0X") }

fn parse_segment(segment: &str, hex_text: bool) -> Result<i64> {
    if let Ok(v) = segment.parse::<i64>() {
        return Ok(v);
    }
    let own_prefix = has_hex_prefix(segment);
    if own_prefix || hex_text {
        let digits = if own_prefix { &segment[2..] } else { segment };
        if let Ok(v) = u64::from_str_radix(digits, 16) {
            return Ok(v as i64);
        }
    }
    Err(WireError::corrupt(format!("invalid long segment {:?}", segment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal() {
        assert_eq!(parse_long("0.").unwrap(), 0);
        assert_eq!(parse_long("-5.").unwrap(), -5);
        assert_eq!(parse_long("42").unwrap(), 42);
        assert_eq!(parse_long("-9223372036854775808.").unwrap(), i64::min_value());
        assert_eq!(parse_long("9223372036854775807.").unwrap(), i64::max_value());
    }

    #[test]
    fn segments_are_or_ed() {
        assert_eq!(parse_long("1.2.4.8.").unwrap(), 15);
        assert_eq!(parse_long("..3..").unwrap(), 3);
        assert_eq!(parse_long("").unwrap(), 0);
    }

    #[test]
    fn hexadecimal() {
        assert_eq!(parse_long("0xff").unwrap(), 255);
        assert_eq!(parse_long("0XFF.").unwrap(), 255);
        assert_eq!(parse_long("1.0x10.").unwrap(), 17);
        assert_eq!(parse_long("0x1.ff").unwrap(), 0xff);
        assert_eq!(parse_long("0xffffffffffffffff").unwrap(), -1);
    }

    #[test]
    fn invalid() {
        assert!(parse_long("ff").unwrap_err().is_corrupt());
        assert!(parse_long("1.x").unwrap_err().is_corrupt());
        assert!(parse_long("0x").unwrap_err().is_corrupt());
        assert!(parse_long("12a.").unwrap_err().is_corrupt());
    }
}
