//! Spreadsheet destination entity

use chrono::{DateTime, Utc};

/// An external spreadsheet that receives the mirrored daily snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: i32,
    /// Opaque spreadsheet id (the `/d/<id>/` part of a Google Sheets URL).
    pub destination_id: String,
    pub created_at: DateTime<Utc>,
}

/// Accepts either a bare spreadsheet id or a full Google Sheets URL.
pub fn extract_spreadsheet_id(input: &str) -> Option<String> {
    let input = input.trim();
    let id = match input.find("/d/") {
        Some(pos) => input[pos + 3..].split(['/', '?', '#']).next().unwrap_or_default(),
        None => input,
    };

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| id.to_string())
}
