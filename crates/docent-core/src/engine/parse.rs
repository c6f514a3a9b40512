//! Model output parsing: locate a JSON object, validate it against the
//! answer schema, and normalize field values.

use serde_json::{Map, Value};

use crate::answer::{Answer, StructuredAnswer};
use crate::config::ResponseMode;

/// Word stems that mark a rejection on their own.
const REJECTION_STEMS: [&str; 5] = ["reject", "deny", "deni", "declin", "refus"];
/// Word stems that mark an approval unless negated.
const APPROVAL_STEMS: [&str; 6] = ["approv", "accept", "eligib", "cover", "valid", "allow"];
/// Approval stems carrying a negating prefix ("ineligible", "uncovered").
const NEGATED_APPROVAL_STEMS: [&str; 13] = [
    "unapprov",
    "disapprov",
    "nonapprov",
    "unaccept",
    "nonaccept",
    "ineligib",
    "noneligib",
    "uncover",
    "noncover",
    "invalid",
    "nonvalid",
    "disallow",
    "unallow",
];
const NEGATIONS: [&str; 17] = [
    "not", "no", "never", "non", "cannot", "neither", "nor", "isn't", "aren't", "wasn't",
    "weren't", "doesn't", "don't", "didn't", "won't", "can't", "shouldn't",
];
/// How many words before an approval stem a negation still applies.
const NEGATION_WINDOW: usize = 2;
const UNSPECIFIED_AMOUNTS: [&str; 4] = ["not specified", "not mentioned", "n/a", "na"];

/// Source clauses shorter than this are treated as missing.
pub const MIN_SOURCE_CLAUSE_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOutput {
    Valid(Answer),
    Invalid { raw: String, reason: String },
}

impl ParsedOutput {
    /// Resolve to an answer, substituting the fallback for invalid output.
    #[must_use]
    pub fn into_answer(self, mode: ResponseMode) -> Answer {
        match self {
            Self::Valid(answer) => answer,
            Self::Invalid { raw, .. } => fallback(raw, mode),
        }
    }
}

#[must_use]
pub fn fallback(raw: String, mode: ResponseMode) -> Answer {
    match mode {
        ResponseMode::Structured => Answer::Structured(StructuredAnswer::fallback(raw)),
        ResponseMode::PlainText => Answer::Plain(raw),
    }
}

#[must_use]
pub fn parse_output(raw: &str, mode: ResponseMode) -> ParsedOutput {
    match validate(raw, mode) {
        Ok(answer) => ParsedOutput::Valid(answer),
        Err(reason) => ParsedOutput::Invalid {
            raw: raw.to_owned(),
            reason,
        },
    }
}

fn validate(raw: &str, mode: ResponseMode) -> Result<Answer, String> {
    let mut first_error = None;
    for candidate in json_candidates(raw) {
        match validate_candidate(candidate, mode) {
            Ok(answer) => return Ok(answer),
            Err(reason) => {
                first_error.get_or_insert(reason);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| "no JSON object found".to_owned()))
}

fn validate_candidate(json: &str, mode: ResponseMode) -> Result<Answer, String> {
    let value: Value = serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(obj) = value else {
        return Err("top-level JSON value is not an object".into());
    };

    match mode {
        ResponseMode::Structured => validate_structured(&obj).map(Answer::Structured),
        ResponseMode::PlainText => validate_plain(&obj).map(Answer::Plain),
    }
}

fn validate_structured(obj: &Map<String, Value>) -> Result<StructuredAnswer, String> {
    for key in ["decision", "amount", "justification", "source_clause"] {
        if !obj.contains_key(key) {
            return Err(format!("missing required field `{key}`"));
        }
    }

    let justification = match obj.get("justification") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_owned(),
        _ => return Err("field `justification` must be a non-empty string".into()),
    };

    Ok(StructuredAnswer {
        decision: nullable_string(obj, "decision")?,
        amount: nullable_string(obj, "amount")?,
        justification,
        source_clause: nullable_string(obj, "source_clause")?,
    })
}

fn validate_plain(obj: &Map<String, Value>) -> Result<String, String> {
    match obj.get("answer") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_owned()),
        Some(_) => Err("field `answer` must be a non-empty string".into()),
        None => Err("missing required field `answer`".into()),
    }
}

/// Strings are trimmed; blank strings become `None`.
fn nullable_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_owned()))
        }
        Some(_) => Err(format!("field `{key}` must be a string or null")),
    }
}

/// Balanced `{...}` spans, one per opening brace, in order of their start.
///
/// Every `{` is tried, so a stray brace in surrounding prose does not hide
/// the object after it. Braces inside JSON strings are ignored.
fn json_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{')
        .filter_map(|(start, _)| balanced_object(&text[start..]))
}

/// The balanced object at the start of `text`, which must begin with `{`.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Map a free-form decision onto `Approved`/`Rejected` when it carries a
/// known verdict word; anything else is returned trimmed.
///
/// Rejection wins: a rejection word, a prefixed approval word ("ineligible",
/// "unacceptable") or an approval word within two words of a negation
/// ("not approved", "can't be covered") all yield `Rejected`.
#[must_use]
pub fn normalize_decision(decision: &str) -> String {
    let lower = decision.trim().to_lowercase().replace('\u{2019}', "'");
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .collect();

    let negated_at = |i: usize| {
        words[i.saturating_sub(NEGATION_WINDOW)..i]
            .iter()
            .any(|w| NEGATIONS.contains(w))
    };

    let rejected = words.iter().enumerate().any(|(i, w)| {
        starts_with_any(w, &REJECTION_STEMS)
            || starts_with_any(w, &NEGATED_APPROVAL_STEMS)
            || (starts_with_any(w, &APPROVAL_STEMS) && negated_at(i))
    });
    if rejected {
        return "Rejected".into();
    }
    if words.iter().any(|w| starts_with_any(w, &APPROVAL_STEMS)) {
        return "Approved".into();
    }
    decision.trim().to_owned()
}

fn starts_with_any(word: &str, stems: &[&str]) -> bool {
    stems.iter().any(|s| word.starts_with(s))
}

#[must_use]
pub fn normalize_amount(amount: Option<String>) -> Option<String> {
    amount.filter(|a| !UNSPECIFIED_AMOUNTS.contains(&a.trim().to_lowercase().as_str()))
}

/// Text up to the first period, with the period restored.
#[must_use]
pub fn first_sentence(text: &str) -> Option<String> {
    let head = text.split('.').next().unwrap_or_default().trim();
    (!head.is_empty()).then(|| format!("{head}."))
}
