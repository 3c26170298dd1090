use serde::{Deserialize, Deserializer};
use std::collections::HashSet;

/// A chunk the backend used as evidence for an answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Citation {
    pub filename: String,
    #[serde(default, deserialize_with = "chunk_id_as_string")]
    pub chunk_id: String,
    #[serde(default, deserialize_with = "score_or_zero")]
    pub score: f32,
}

impl Citation {
    pub fn token(&self) -> String {
        format!("[{}#{}]", self.filename, self.chunk_id)
    }
}

// The backend emits integer chunk ids; older builds sent strings.
fn chunk_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn score_or_zero<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a raw citation list, skipping entries that do not fit the shape.
pub fn parse_lenient(values: Vec<serde_json::Value>) -> Vec<Citation> {
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

/// Drops repeated `(filename, chunk_id)` pairs, keeping the first occurrence.
pub fn dedup(citations: &[Citation]) -> Vec<&Citation> {
    let mut seen = HashSet::new();
    citations
        .iter()
        .filter(|&c| seen.insert((c.filename.as_str(), c.chunk_id.as_str())))
        .collect()
}

/// Renders `Sources: [a.pdf#1], [b.pdf#2]`, or `None` when there is nothing to cite.
pub fn format_sources(citations: &[Citation]) -> Option<String> {
    let tokens: Vec<String> = dedup(citations).into_iter().map(Citation::token).collect();
    if tokens.is_empty() {
        None
    } else {
        Some(format!("Sources: {}", tokens.join(", ")))
    }
}

/// Appends the sources line to an answer, separated by a blank line.
pub fn with_sources(answer: &str, citations: &[Citation]) -> String {
    match format_sources(citations) {
        Some(sources) => format!("{}\n\n{}", answer, sources).trim().to_string(),
        None => answer.trim().to_string(),
    }
}
