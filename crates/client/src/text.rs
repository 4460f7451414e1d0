//! Plain-text helpers for presenting upload results.

use reqwest::StatusCode;

const KB: u128 = 1024;
const MB: u128 = 1024 * 1024;
const GB: u128 = 1024 * 1024 * 1024;

/// Removes HTML markup from `html`.
///
/// `<br>`, `<p>`, `<h1>`, `<h2>` and `<h3>` become line breaks and the
/// contents of `<style>` are dropped. Crude by nature: malformed markup or
/// stray `<` characters outside tags are not handled.
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut tag_name = String::new();
    let mut in_tag = false;
    let mut name_ended = false;
    let mut skip_contents = false;

    for ch in html.chars() {
        if !in_tag && ch == '<' {
            in_tag = true;
            name_ended = false;
            continue;
        }

        if in_tag {
            if matches!(ch, '/' | ' ' | '>') {
                name_ended = true;
            }
            if !name_ended {
                tag_name.push(ch);
            }
            if ch == '>' {
                in_tag = false;
                if ["br", "p", "h1", "h2", "h3"]
                    .iter()
                    .any(|t| tag_name.eq_ignore_ascii_case(t))
                {
                    out.push('\n');
                }
                skip_contents = tag_name.eq_ignore_ascii_case("style");
                tag_name.clear();
            }
            continue;
        }

        if !skip_contents {
            out.push(ch);
        }
    }
    out
}

/// Formats a byte count for display: `1 byte`, `517 bytes`, `14 KB`,
/// `323.4 MB`, `1.42 GB`. Values round half up.
pub fn file_size_as_str(size: u64) -> String {
    let size = u128::from(size);
    if size < KB {
        return if size == 1 {
            "1 byte".to_string()
        } else {
            format!("{size} bytes")
        };
    }
    if size < MB {
        return format!("{} KB", div_half_up(size, KB));
    }
    if size < GB {
        let tenths = div_half_up(size * 10, MB);
        return format!("{}.{} MB", tenths / 10, tenths % 10);
    }
    let hundredths = div_half_up(size * 100, GB);
    format!("{}.{:02} GB", hundredths / 100, hundredths % 100)
}

fn div_half_up(n: u128, d: u128) -> u128 {
    (n + d / 2) / d
}

/// Status code followed by its reason phrase, e.g. `403 Forbidden`.
pub fn status_code_text(code: u16) -> String {
    match StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("{code} {reason}"),
        None => format!("{code} <unknown status code>"),
    }
}
