use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("not valid json: {0}")]
    Parse(String),

    #[error("top-level value is not an object")]
    NotAnObject,

    #[error("missing required key `{0}`")]
    MissingKey(String),
}

/// Remove fenced code-block wrapping that providers like to add around
/// JSON payloads.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Locate the outermost balanced object literal in free text. String
/// contents and escapes are honored so braces inside values do not
/// throw off the depth count.
pub fn extract_object(raw: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&raw[start?..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a structured provider response: strip delimiter wrapping, fall
/// back to balanced-object extraction, then validate the required
/// top-level keys.
pub fn parse_structured(raw: &str, required_keys: &[String]) -> Result<Value, NormalizeError> {
    let stripped = strip_fences(raw);

    let value: Value = match serde_json::from_str(stripped) {
        Ok(value) => value,
        Err(strict_err) => {
            let candidate =
                extract_object(stripped).ok_or_else(|| NormalizeError::Parse(strict_err.to_string()))?;
            serde_json::from_str(candidate).map_err(|e| NormalizeError::Parse(e.to_string()))?
        }
    };

    let object = value.as_object().ok_or(NormalizeError::NotAnObject)?;
    for key in required_keys {
        if !object.contains_key(key) {
            return Err(NormalizeError::MissingKey(key.clone()));
        }
    }

    Ok(value)
}
