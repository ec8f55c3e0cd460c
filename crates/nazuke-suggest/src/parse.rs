use std::sync::LazyLock;

use nazuke_core::{clamp_overall, NameCandidate, ResponseFormat, ScoreCategory, Scores};
use regex::Regex;
use serde_json::{Map, Value};

/// Separator between candidate blocks in a delimited reply.
pub const DELIMITER: &str = "---";

/// Keys under which a JSON reply may carry its candidate array.
pub const ARRAY_KEYS: [&str; 2] = ["names", "candidates"];

const READING_KEYS: [&str; 3] = ["yomi", "reading", "読み"];
const RATIONALE_KEYS: [&str; 3] = ["reason", "rationale", "理由"];
const OVERALL_KEYS: [&str; 3] = ["overall", "total", "総合"];

/// Something the extractor skipped or could not read. None of these abort extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractWarning {
    #[error("reply is not valid JSON: {0}")]
    MalformedDocument(String),
    #[error("reply has no `names` array")]
    MissingArray,
    #[error("element {index} is not an object")]
    NotAnObject { index: usize },
    #[error("element {index} is missing field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("unparsable fragment {index}: no name after the name label")]
    UnparsableFragment { index: usize },
}

/// Result of one extraction: candidates in reply order, plus what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub candidates: Vec<NameCandidate>,
    pub warnings: Vec<ExtractWarning>,
}

impl Extraction {
    fn failed(warning: ExtractWarning) -> Self {
        Self {
            candidates: vec![],
            warnings: vec![warning],
        }
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Turn a raw model reply into validated candidates.
///
/// Never fails: malformed input yields fewer candidates and more warnings.
/// Out-of-range or missing scores are clamped or defaulted silently.
pub fn extract(raw_reply: &str, format: ResponseFormat) -> Extraction {
    match format {
        ResponseFormat::DelimitedText => extract_delimited(raw_reply),
        ResponseFormat::StructuredJson => extract_json(raw_reply),
    }
}

// --- Delimited text ---

static NAME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:名前|(?i:\bname))\s*[：:]").unwrap());

static NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:名前|(?i:\bname))\s*[：:][ \t\x{3000}]*([^\r\n]*)").unwrap()
});

static READING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:読み|ヨミ|(?i:\breading|\byomi))\s*[：:][ \t\x{3000}]*([^\r\n]*)").unwrap()
});

static RATIONALE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:理由|(?i:\breason|\brationale))\s*[：:]\s*(.*)").unwrap()
});

static OVERALL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&score_line_pattern(r"総合|(?i:overall|total)")).unwrap());

/// Trailing reading in parentheses, e.g. `光（ヒカル）`.
static TRAILING_READING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(]\s*([^（()）]+?)\s*[）)]\s*$").unwrap());

/// A JSON string that is nothing but a score, e.g. `"80"`, `"80点"`, `" 75 pt "`.
static SCORE_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?[0-9]+(?:\.[0-9]+)?)\s*(?:点|(?i:pts?|points?))?\s*$").unwrap()
});

/// A labeled score line. The label must open the line (after bullets or
/// markup) and the number must be followed by a unit marker or the line end,
/// so prose such as "The form: 3 strokes" is not read as a score.
fn score_line_pattern(labels: &str) -> String {
    format!(
        r"(?m)^[\s・*#\-]*(?:{labels})\**\s*[：:]\s*([+-]?[0-9]+(?:\.[0-9]+)?)\s*(?:点|(?i:pts?|points?)|$)"
    )
}

static SCORE_LINES: LazyLock<Vec<(ScoreCategory, Regex)>> = LazyLock::new(|| {
    ScoreCategory::ALL
        .into_iter()
        .map(|cat| {
            let labels = match cat {
                ScoreCategory::Sound => r"響き|(?i:sound)",
                ScoreCategory::Form => r"字形|(?i:form)",
                ScoreCategory::Originality => r"独創性?|(?i:originality)",
                ScoreCategory::Readability => r"可読性?|(?i:readability)",
                ScoreCategory::Intent => r"願い|(?i:intent|wish)",
            };
            (cat, Regex::new(&score_line_pattern(labels)).unwrap())
        })
        .collect()
});

fn extract_delimited(raw: &str) -> Extraction {
    let mut out = Extraction::default();

    for (index, fragment) in raw
        .split(DELIMITER)
        .filter(|f| NAME_MARKER.is_match(f))
        .enumerate()
    {
        match parse_fragment(fragment) {
            Some(candidate) => out.candidates.push(candidate),
            None => out
                .warnings
                .push(ExtractWarning::UnparsableFragment { index: index + 1 }),
        }
    }

    out
}

fn parse_fragment(fragment: &str) -> Option<NameCandidate> {
    let display_name = NAME_LINE
        .captures(fragment)
        .map(|c| clean_name(&c[1]))
        .filter(|name| !name.is_empty())?;

    let normalized = normalize_digits(fragment);
    let mut scores = Scores::default();
    for (cat, re) in SCORE_LINES.iter() {
        if let Some(value) = re
            .captures(&normalized)
            .and_then(|c| c[1].parse::<f64>().ok())
        {
            scores.set(*cat, value);
        }
    }

    let overall = OVERALL_LINE
        .captures(&normalized)
        .and_then(|c| c[1].parse::<f64>().ok())
        .and_then(clamp_overall)
        .unwrap_or_else(|| scores.mean());

    let reading = trailing_reading(&display_name).or_else(|| {
        READING_LINE
            .captures(fragment)
            .map(|c| clean_name(&c[1]))
            .filter(|r| !r.is_empty())
    });

    let source = fragment.trim().to_string();
    let rationale = RATIONALE_BLOCK
        .captures(fragment)
        .map(|c| c[1].trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| source.clone());

    Some(NameCandidate {
        display_name,
        reading,
        scores,
        overall,
        rationale,
        source_fragment: source,
    })
}

/// Strip surrounding whitespace and stray Markdown emphasis from a name.
fn clean_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c.is_whitespace())
        .to_string()
}

fn trailing_reading(name: &str) -> Option<String> {
    TRAILING_READING
        .captures(name)
        .map(|c| c[1].trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Fold full-width digits, signs and decimal points to ASCII.
fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '－' | '−' | '‐' => '-',
            '＋' => '+',
            '．' => '.',
            _ => c,
        })
        .collect()
}

// --- Structured JSON ---

fn extract_json(raw: &str) -> Extraction {
    let doc = match parse_document(raw) {
        Ok(doc) => doc,
        Err(e) => return Extraction::failed(ExtractWarning::MalformedDocument(e)),
    };

    let Some(elements) = ARRAY_KEYS
        .iter()
        .find_map(|key| doc.get(*key).and_then(Value::as_array))
    else {
        return Extraction::failed(ExtractWarning::MissingArray);
    };

    let mut out = Extraction::default();
    for (i, element) in elements.iter().enumerate() {
        let index = i + 1;
        let Some(obj) = element.as_object() else {
            out.warnings.push(ExtractWarning::NotAnObject { index });
            continue;
        };
        match parse_element(obj, element) {
            Some(candidate) => out.candidates.push(candidate),
            None => out.warnings.push(ExtractWarning::MissingField {
                index,
                field: "name",
            }),
        }
    }
    out
}

/// Parse the reply as JSON, retrying on the outermost `{...}` when the model
/// wrapped the document in a code fence or commentary.
fn parse_document(raw: &str) -> Result<Value, String> {
    let first_err = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(doc) => return Ok(doc),
        Err(e) => e.to_string(),
    };
    extract_json_object(raw)
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .ok_or(first_err)
}

/// Extract the JSON object substring from raw LLM output.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

fn parse_element(obj: &Map<String, Value>, element: &Value) -> Option<NameCandidate> {
    let display_name = string_field(obj, &["name"])?;

    let score_source = obj
        .get("scores")
        .and_then(Value::as_object)
        .unwrap_or(obj);

    let scores = read_scores(score_source);

    let overall = OVERALL_KEYS
        .iter()
        .find_map(|key| {
            lookup(obj, key)
                .or_else(|| lookup(score_source, key))
                .and_then(numeric_value)
        })
        .and_then(clamp_overall)
        .unwrap_or_else(|| scores.mean());

    Some(NameCandidate {
        display_name,
        reading: string_field(obj, &READING_KEYS),
        scores,
        overall,
        rationale: string_field(obj, &RATIONALE_KEYS).unwrap_or_default(),
        source_fragment: element.to_string(),
    })
}

/// Map every recognised key to its category. A canonical key beats an alias
/// for the same category.
fn read_scores(source: &Map<String, Value>) -> Scores {
    let mut scores = Scores::default();
    let mut canonical_seen = [false; ScoreCategory::ALL.len()];
    for (key, value) in source {
        let Some(cat) = ScoreCategory::from_key(key) else {
            continue;
        };
        let Some(value) = numeric_value(value) else {
            continue;
        };
        let is_canonical = key.trim().eq_ignore_ascii_case(cat.key());
        let slot = &mut canonical_seen[cat as usize];
        if is_canonical || !*slot {
            scores.set(cat, value);
            *slot |= is_canonical;
        }
    }
    scores
}

/// Key lookup that tolerates ASCII case drift (`Sound`, `HIBIKI`).
fn lookup<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| lookup(obj, key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Numbers are taken as-is; strings only when the whole value is a score.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let normalized = normalize_digits(s);
            SCORE_STRING
                .captures(&normalized)
                .and_then(|c| c[1].parse::<f64>().ok())
        }
        _ => None,
    }
}
