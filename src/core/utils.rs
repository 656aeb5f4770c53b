use std::collections::BTreeSet;
use std::time::Duration;

/// Characters stripped from titles before they become file names.
const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Longest title kept in a file name (in characters).
const MAX_TITLE_CHARS: usize = 120;

/// Formats a byte count with binary units and two decimals.
///
/// # Example
///
/// ```
/// use clipdrop::core::utils::human_bytes;
///
/// assert_eq!(human_bytes(52_428_800), "50.00 MB");
/// ```
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

/// Formats a duration as "1d, 2h, 3m, 4s", skipping zero components.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let parts = [
        (total / 86_400, "d"),
        (total % 86_400 / 3_600, "h"),
        (total % 3_600 / 60, "m"),
        (total % 60, "s"),
    ];

    let rendered: Vec<String> = parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if rendered.is_empty() {
        "0s".to_string()
    } else {
        rendered.join(", ")
    }
}

/// Turns a media title into something safe to use as a file name.
///
/// Path separators and characters reserved on common filesystems are removed,
/// control characters become spaces, and the result is trimmed and shortened.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let cleaned = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');
    let shortened: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
    let shortened = shortened.trim_end();

    if shortened.is_empty() {
        "untitled".to_string()
    } else {
        shortened.to_string()
    }
}

/// Parses a playlist selection such as "1-3,7" into sorted 1-based indices.
///
/// "0" selects every entry. Indices outside `1..=total` and unparsable parts
/// are dropped, so an empty result means the selection was invalid.
pub fn parse_range_string(input: &str, total: usize) -> Vec<usize> {
    let input = input.trim();
    if input == "0" {
        return (1..=total).collect();
    }

    let mut indices = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) else {
                continue;
            };
            indices.extend(start.max(1)..=end.min(total));
        } else if let Ok(index) = part.parse::<usize>() {
            indices.insert(index);
        }
    }

    indices.into_iter().filter(|index| (1..=total).contains(index)).collect()
}

/// Extracts the retry-after delay (in seconds) from a Telegram error string.
pub fn extract_retry_after(error_str: &str) -> Option<u64> {
    let lower = error_str.to_lowercase();

    if let Some(pos) = lower.find("retry after ") {
        let after = &lower[pos + 12..];
        let num: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(secs) = num.parse() {
            return Some(secs);
        }
    }

    if let Some(pos) = lower.find("retry_after") {
        let after = &lower[pos + 11..];
        let num: String = after
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(secs) = num.parse() {
            return Some(secs);
        }
    }

    None
}

/// Shortens text to `max_chars` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}
