use std::net::Ipv4Addr;

use crate::core::types::NormalizedHost;

/// Canonicalize a hostname so that numeric encodings of the same IPv4
/// address compare equal.
///
/// The input is lowercased and trimmed and any surrounding brackets are
/// removed. The result is then split on `.` into one to four components,
/// each read as hexadecimal (`0x` prefix), octal (leading zero, no 8 or 9)
/// or decimal:
///
/// - a single component up to `u32::MAX` is expanded into four octets
///   (`2130706433` becomes `127.0.0.1`);
/// - two to four components, each at most 255, are joined verbatim.
///   Shorthand such as `127.1` is *not* padded to four octets.
///
/// Anything else is returned lowercased and trimmed. Normalization is
/// idempotent.
///
/// # Examples
/// ```
/// use tilegate::admission::normalize;
///
/// assert_eq!(normalize("0x7F.0.0.1").as_str(), "127.0.0.1");
/// assert_eq!(normalize("[::1]").as_str(), "::1");
/// assert_eq!(normalize(" Example.COM ").as_str(), "example.com");
/// ```
pub fn normalize(hostname: &str) -> NormalizedHost {
    let mut host = hostname.trim().to_lowercase();

    while let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        host = inner.trim().to_string();
    }

    match numeric_form(&host) {
        Some(canonical) => NormalizedHost::new(canonical),
        None => NormalizedHost::new(host),
    }
}

fn numeric_form(host: &str) -> Option<String> {
    let parts: Vec<&str> = host.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }

    let nums = parts
        .iter()
        .map(|part| parse_component(part))
        .collect::<Option<Vec<u64>>>()?;

    match nums.as_slice() {
        [single] => {
            let value = u32::try_from(*single).ok()?;
            Some(Ipv4Addr::from(value).to_string())
        }
        _ if nums.iter().all(|&n| n <= 255) => Some(
            nums.iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join("."),
        ),
        _ => None,
    }
}

fn parse_component(part: &str) -> Option<u64> {
    if let Some(hex) = part.strip_prefix("0x") {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok();
    }

    if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
        let octal = part.len() > 1 && part.starts_with('0') && !part.contains(|c| c == '8' || c == '9');
        let radix = if octal { 8 } else { 10 };
        return u64::from_str_radix(part, radix).ok();
    }

    None
}
