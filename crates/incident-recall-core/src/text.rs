//! Canonical text builders.
//!
//! Embedding text (what gets stored) and query text (what gets searched
//! with) are built the same way for every caller so that vectors for the
//! same record are comparable across runs.

use crate::models::{FragmentCandidate, Incident, IncidentCandidate, RunbookFragment};

/// `"Title: {title}\nDescription: {description}"`, trimmed.
///
/// Returns `None` if both title and description are blank.
pub fn incident_embedding_text(incident: &Incident) -> Option<String> {
    labelled_text(&incident.title, "Description", &incident.description)
}

/// `"Title: {title}\nContent: {content}"`, trimmed.
///
/// Returns `None` if both title and content are blank.
pub fn fragment_embedding_text(fragment: &RunbookFragment) -> Option<String> {
    labelled_text(&fragment.title, "Content", &fragment.content)
}

/// Query text for an incident-shaped candidate.
///
/// Title and description lines, then `Severity:` and `Status:` lines when
/// those are present. Returns `None` if title and description are both
/// blank.
pub fn incident_query_text(candidate: &IncidentCandidate) -> Option<String> {
    let mut text = labelled_text(&candidate.title, "Description", &candidate.description)?;
    push_line(&mut text, "Severity", candidate.severity.as_deref());
    push_line(&mut text, "Status", candidate.status.as_deref());
    Some(text)
}

/// Query text for a fragment-shaped candidate.
///
/// Title and content lines, then a `Tags:` line listing non-blank tags.
/// Returns `None` if title and content are both blank.
pub fn fragment_query_text(candidate: &FragmentCandidate) -> Option<String> {
    let mut text = labelled_text(&candidate.title, "Content", &candidate.content)?;
    let tags: Vec<&str> = candidate
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        push_line(&mut text, "Tags", Some(&tags.join(", ")));
    }
    Some(text)
}

/// Truncate `text` to at most `max_chars` characters, appending `...`
/// when anything was cut. Never splits a UTF-8 sequence.
pub fn truncate_snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut snippet = text[..cut].trim_end().to_string();
            snippet.push_str("...");
            snippet
        }
    }
}

fn labelled_text(title: &str, body_label: &str, body: &str) -> Option<String> {
    let title = title.trim();
    let body = body.trim();
    if title.is_empty() && body.is_empty() {
        return None;
    }
    let text = format!("Title: {}\n{}: {}", title, body_label, body);
    Some(text.trim().to_string())
}

fn push_line(text: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        text.push('\n');
        text.push_str(label);
        text.push_str(": ");
        text.push_str(value);
    }
}
