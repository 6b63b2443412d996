// src/evaluator/parser.rs — Parse judge responses into a bounded score
//
// Accepted shapes, tried in order:
//   1. a JSON object with a numeric "score" (and optional "reason")
//   2. a `SCORE: <n>` line, optionally followed by `REASON: ...`
//   3. a looser score line (`Score out of 1: 0.2`, `SCORE (0-1): 0.9`):
//      the first number after the last colon on a line mentioning "score"
//   4. the first standalone decimal token anywhere in the text
// A token outside [0, 1] is rejected, never clamped: it means the judge
// ignored the format, not that the answer is borderline.

use serde::{Deserialize, Serialize};

/// Parsed judge output.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub raw: String,
    pub score: f32,
    pub rationale: Option<String>,
}

/// Why a judge response could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ParseFailure {
    #[error("empty response")]
    Empty,
    #[error("no numeric score found")]
    NoScore,
    #[error("score '{token}' is outside [0, 1]")]
    OutOfRange { token: String },
}

/// What to do with a response that does not contain a valid score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// Surface `JudgeError::ScoreParsing` to the caller.
    #[default]
    Error,
    /// Record a failing verdict with score 0.0 and say why in the rationale.
    FailClosed,
}

const SCORE_LABELS: &[&str] = &["score"];
const REASON_LABELS: &[&str] = &["reason", "rationale", "reasoning", "explanation"];

/// Extract a score in [0, 1] and an optional rationale from raw judge text.
pub fn extract(raw: &str) -> Result<Judgment, ParseFailure> {
    if raw.trim().is_empty() {
        return Err(ParseFailure::Empty);
    }

    if let Some(found) = extract_json(raw) {
        let (score, rationale) = found?;
        return Ok(judgment(raw, score, rationale));
    }

    let lines: Vec<&str> = raw.lines().collect();
    let score_lines: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| strip_label(line, SCORE_LABELS).map(|rest| (i, rest)))
        .collect();

    if !score_lines.is_empty() {
        for (index, rest) in &score_lines {
            if let Some(token) = first_numeric_token(rest) {
                let score = parse_token(token)?;
                return Ok(judgment(raw, score, rationale_from_lines(&lines, *index)));
            }
        }
        return Err(ParseFailure::NoScore);
    }

    if let Some((index, token)) = loose_score_token(&lines) {
        let score = parse_token(token)?;
        return Ok(judgment(raw, score, rationale_from_lines(&lines, index)));
    }

    let token = first_numeric_token(raw).ok_or(ParseFailure::NoScore)?;
    let score = parse_token(token)?;
    let rest = raw.trim();
    let rationale = if rest == token {
        None
    } else {
        Some(rest.to_string())
    };
    Ok(judgment(raw, score, rationale))
}

fn judgment(raw: &str, score: f32, rationale: Option<String>) -> Judgment {
    Judgment {
        raw: raw.to_string(),
        score,
        rationale: rationale.filter(|r| !r.trim().is_empty()),
    }
}

/// Try the span between the first `{` and the last `}` as JSON.
/// `None` means "not a JSON answer"; `Some(Err)` means JSON with a bad score.
fn extract_json(raw: &str) -> Option<Result<(f32, Option<String>), ParseFailure>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&raw[start..=end]).ok()?;
    let obj = value.as_object()?;
    let score_value = obj.get("score")?;

    let parsed = match score_value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) if (0.0..=1.0).contains(&v) => Ok(v as f32),
            _ => Err(ParseFailure::OutOfRange {
                token: n.to_string(),
            }),
        },
        serde_json::Value::String(s) => match first_numeric_token(s) {
            Some(token) => parse_token(token),
            None => Err(ParseFailure::NoScore),
        },
        _ => Err(ParseFailure::NoScore),
    };

    let rationale = REASON_LABELS
        .iter()
        .find_map(|key| obj.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.trim().to_string());

    Some(parsed.map(|score| (score, rationale)))
}

/// If `line` is `<label>: rest` for one of `labels`, return `rest`.
/// Tolerates list markers, headings and `**bold**` around the label.
fn strip_label(line: &str, labels: &[&str]) -> Option<String> {
    let cleaned = line.replace("**", "");
    let cleaned = cleaned
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '#' || c.is_whitespace());
    let (head, rest) = cleaned.split_once(':')?;
    let head = head.trim();
    if labels.iter().any(|l| head.eq_ignore_ascii_case(l)) {
        Some(rest.trim().to_string())
    } else {
        None
    }
}

/// A line that mentions "score" under a non-standard label, with a number
/// after its last colon. Numbers inside the label itself are ignored.
fn loose_score_token<'a>(lines: &[&'a str]) -> Option<(usize, &'a str)> {
    lines.iter().enumerate().find_map(|(i, line)| {
        if !line.to_ascii_lowercase().contains("score") {
            return None;
        }
        let (_, rest) = line.rsplit_once(':')?;
        first_numeric_token(rest).map(|token| (i, token))
    })
}

/// Rationale from a `REASON:` line and its continuation, or else every
/// non-score line.
fn rationale_from_lines(lines: &[&str], score_index: usize) -> Option<String> {
    let reason_at = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| strip_label(line, REASON_LABELS).map(|rest| (i, rest)));

    let mut parts: Vec<String> = Vec::new();
    match reason_at {
        Some((index, first)) => {
            parts.push(first);
            for line in &lines[index + 1..] {
                if strip_label(line, SCORE_LABELS).is_some() {
                    break;
                }
                parts.push(line.trim().to_string());
            }
        }
        None => {
            for (i, line) in lines.iter().enumerate() {
                if i != score_index {
                    parts.push(line.trim().to_string());
                }
            }
        }
    }

    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn parse_token(token: &str) -> Result<f32, ParseFailure> {
    let normalized = if let Some(rest) = token.strip_prefix("-.") {
        format!("-0.{rest}")
    } else if let Some(rest) = token.strip_prefix('.') {
        format!("0.{rest}")
    } else {
        token.to_string()
    };

    let value: f32 = normalized.parse().map_err(|_| ParseFailure::NoScore)?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ParseFailure::OutOfRange {
            token: token.to_string(),
        })
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// First standalone decimal token: `[-]digits[.digits]` or `[-].digits`,
/// not glued to a word or to another number (so `gpt-4o` and `1.2.3` are skipped).
pub(crate) fn first_numeric_token(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let prev_ok = start == 0 || !(is_word_byte(bytes[start - 1]) || bytes[start - 1] == b'.');

        let mut j = start;
        if bytes[j] == b'-' {
            j += 1;
        }
        let int_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let int_len = j - int_start;

        let mut frac_len = 0;
        if j + 1 < bytes.len() && bytes[j] == b'.' && bytes[j + 1].is_ascii_digit() {
            j += 1;
            let frac_start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            frac_len = j - frac_start;
        }

        if int_len + frac_len == 0 {
            i += 1;
            continue;
        }

        let next_ok = j == bytes.len()
            || !(is_word_byte(bytes[j])
                || (bytes[j] == b'.' && j + 1 < bytes.len() && bytes[j + 1].is_ascii_digit()));

        if prev_ok && next_ok {
            return Some(&text[start..j]);
        }
        i = j.max(start + 1);
    }

    None
}
