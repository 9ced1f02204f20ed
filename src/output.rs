//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;

use crate::store::{EmbeddingRecord, SearchHit};

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize record id (yellow)
pub fn colorize_id(id: u64, use_color: bool) -> String {
    if use_color {
        id.to_string().yellow().to_string()
    } else {
        id.to_string()
    }
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize distance (dimmed)
pub fn colorize_distance(distance: f32, use_color: bool) -> String {
    let text = format!("{:.4}", distance);
    if use_color {
        text.dimmed().to_string()
    } else {
        text
    }
}

/// Single-line preview of a stored text, at most `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

fn source_label(record: &EmbeddingRecord, use_color: bool) -> String {
    match (&record.metadata.filename, record.metadata.chunk_number) {
        (Some(file), Some(chunk)) => format!(" {}#{}", colorize_path(file, use_color), chunk),
        (Some(file), None) => format!(" {}", colorize_path(file, use_color)),
        _ => String::new(),
    }
}

/// Format one record line for `texts`.
pub fn format_record(record: &EmbeddingRecord, use_color: bool) -> String {
    format!(
        "{}{}  {}",
        colorize_id(record.id, use_color),
        source_label(record, use_color),
        preview(&record.text, 100)
    )
}

/// Format one hit line for `search`.
pub fn format_hit(rank: usize, hit: &SearchHit, use_color: bool) -> String {
    format!(
        "{:>3}. [{}] {}{}  {}",
        rank,
        colorize_distance(hit.distance, use_color),
        colorize_id(hit.record.id, use_color),
        source_label(&hit.record, use_color),
        preview(&hit.record.text, 100)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordMetadata;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview("abcdefgh", 3), "abc...");
    }

    #[test]
    fn record_line_without_color() {
        let record = EmbeddingRecord {
            id: 7,
            text: "hello\nworld".to_string(),
            vector: Vec::new(),
            metadata: RecordMetadata {
                filename: Some("notes.txt".to_string()),
                chunk_number: Some(2),
                created_at: 0,
            },
        };
        assert_eq!(format_record(&record, false), "7 notes.txt#2  hello world");

        let hit = SearchHit { record, distance: 0.5 };
        assert_eq!(format_hit(1, &hit, false), "  1. [0.5000] 7 notes.txt#2  hello world");
    }
}
