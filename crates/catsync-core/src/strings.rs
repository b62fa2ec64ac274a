//! String comparison helpers shared by the projection, the codec and the
//! diff engine.
//!
//! Catalog values come from three sources (the remote service, snapshots and
//! spreadsheet exports) that disagree on how "no value" is spelled, so every
//! comparison treats `None` and `""` as the same thing.

use rust_decimal::Decimal;

#[must_use]
pub fn is_blank(s: Option<&str>) -> bool {
    s.is_none_or(str::is_empty)
}

/// Equality where a missing value and an empty string are interchangeable.
#[must_use]
pub fn same_str(a: Option<&str>, b: Option<&str>) -> bool {
    match (is_blank(a), is_blank(b)) {
        (true, true) => true,
        (false, false) => a == b,
        _ => false,
    }
}

/// Boolean equality as a spreadsheet sees it: blank means `false` and case
/// is ignored.
#[must_use]
pub fn same_boolean(a: Option<&str>, b: Option<&str>) -> bool {
    let relax = |s: Option<&str>| match s {
        Some(v) if !v.is_empty() => v.to_ascii_lowercase(),
        _ => "false".to_string(),
    };
    relax(a) == relax(b)
}

/// Numeric equality when both sides parse as decimals (`"10"` == `"10.00"`),
/// falling back to [`same_str`] otherwise.
#[must_use]
pub fn same_number(a: Option<&str>, b: Option<&str>) -> bool {
    let parse = |s: Option<&str>| s.and_then(|v| v.trim().parse::<Decimal>().ok());
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => x == y,
        _ => same_str(a, b),
    }
}

/// `"NextSlug"` → `"next_slug"`.
///
/// Used to match private field names across sources that capitalise them
/// differently (`NextSlug`, `nextSlug`, `next_slug`).
#[must_use]
pub fn camel_to_underscore(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev.is_some() {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// True when two field names refer to the same field once case style is
/// normalised.
#[must_use]
pub fn same_field_name(a: &str, b: &str) -> bool {
    camel_to_underscore(a) == camel_to_underscore(b)
}
