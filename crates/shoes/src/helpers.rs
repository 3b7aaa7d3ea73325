// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Formatting helpers available to views as filters.
//!
//! | Filter          | Example                                       |
//! |-----------------|-----------------------------------------------|
//! | `widow`         | `{{ title\|widow }}`                          |
//! | `query`         | `{{ url\|query({"page": 2}) }}`               |
//! | `number_format` | `{{ count\|number_format }}` → `1,234,000`    |
//! | `slug`          | `{{ title\|slug }}` → `hello-world`           |

/// Joins the last two words with a non-breaking space so a title never
/// ends with a single word on its own line.
pub fn widow(text: &str) -> String {
    match text.rfind(' ') {
        Some(idx) => format!("{}&nbsp;{}", &text[..idx], &text[idx + 1..]),
        None => text.to_string(),
    }
}

/// Appends URL-encoded `params` to `url`'s query string.
pub fn query<K, V>(url: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if params.is_empty() {
        return url.to_string();
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .finish();

    let separator = if !url.contains('?') {
        "?"
    } else if url.ends_with('?') || url.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{}{}{}", url, separator, encoded)
}

/// Formats a number with thousands separators. `None` formats as `0`.
pub fn number_format(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return "0".to_string();
    };

    let text = if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    };

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

/// Parses text for [`number_format`], ignoring surrounding whitespace and
/// existing separators.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().replace(',', "").parse().ok()
}

/// Lowercases `text` and collapses every run of non-alphanumeric characters
/// into a single `-`, trimming dashes from both ends.
pub fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
