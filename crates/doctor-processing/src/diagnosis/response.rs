//! Parsing of raw model answers into a [`Diagnosis`].

use crate::error::DiagnosisError;
use crate::types::Diagnosis;

/// Parse a raw model answer.
///
/// Tolerates markdown code fences and prose around the JSON object, then
/// requires the object to carry all three contract fields with the right
/// types. Unknown extra fields are ignored.
pub fn parse_diagnosis(raw: &str) -> Result<Diagnosis, DiagnosisError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DiagnosisError::EmptyResponse);
    }

    let unfenced = strip_code_fences(trimmed);
    let object = first_json_object(&unfenced).ok_or(DiagnosisError::NoJsonObject)?;
    Ok(serde_json::from_str(object)?)
}

/// Drop a surrounding ```` ```json ```` / ```` ``` ```` fence, keeping any text outside it.
fn strip_code_fences(content: &str) -> String {
    let Some(open) = content.find("```") else {
        return content.to_string();
    };

    let after_open = &content[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line
    let body_start = after_open.find('\n').map_or(0, |idx| idx + 1);
    let body = &after_open[body_start..];

    match body.rfind("```") {
        Some(close) => body[..close].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// The first balanced `{...}` in `content`, honoring JSON string escapes.
fn first_json_object(content: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = content[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(content, start) {
            return Some(&content[start..end]);
        }
        search_from = start + 1;
    }
    None
}

fn balanced_object_end(content: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID: &str = r#"{
        "diagnosis_summary": "Age has outliers; city is mostly empty.",
        "strategies_defined": [
            {"column": "city", "issue": "Missing 60%", "action": "Drop"},
            {"column": "age", "issue": "Outliers", "action": "Cap with IQR"}
        ],
        "generated_python_code": "import pandas as pd\ndef clean_data(df):\n    return df.drop(columns=['city'])"
    }"#;

    #[test]
    fn test_parse_bare_json() {
        let diagnosis = parse_diagnosis(VALID).unwrap();
        assert_eq!(diagnosis.strategies.len(), 2);
        assert_eq!(diagnosis.strategies[0].column, "city");
        assert!(diagnosis.code.contains("def clean_data"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse_diagnosis(&fenced).unwrap(), parse_diagnosis(VALID).unwrap());

        let bare_fence = format!("```\n{VALID}\n```");
        assert_eq!(parse_diagnosis(&bare_fence).unwrap(), parse_diagnosis(VALID).unwrap());
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let chatty = format!("Here is the diagnosis you asked for:\n\n{VALID}\n\nLet me know!");
        assert_eq!(parse_diagnosis(&chatty).unwrap(), parse_diagnosis(VALID).unwrap());
    }

    #[test]
    fn test_braces_inside_code_strings() {
        let raw = r#"{"diagnosis_summary": "ok", "strategies_defined": [],
            "generated_python_code": "def clean_data(df):\n    m = {\"a\": 1}\n    return df"}"#;
        let diagnosis = parse_diagnosis(raw).unwrap();
        assert!(diagnosis.code.contains("{\"a\": 1}"));
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(parse_diagnosis("   \n"), Err(DiagnosisError::EmptyResponse)));
    }

    #[test]
    fn test_no_json_object() {
        assert!(matches!(
            parse_diagnosis("I cannot help with that."),
            Err(DiagnosisError::NoJsonObject)
        ));
        assert!(matches!(
            parse_diagnosis("{ unterminated"),
            Err(DiagnosisError::NoJsonObject)
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let raw = r#"{"diagnosis_summary": "ok", "strategies_defined": []}"#;
        assert!(matches!(parse_diagnosis(raw), Err(DiagnosisError::Malformed(_))));

        let raw = r#"{"diagnosis_summary": "ok", "generated_python_code": "x"}"#;
        assert!(matches!(parse_diagnosis(raw), Err(DiagnosisError::Malformed(_))));
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let raw = r#"{"diagnosis_summary": "ok", "strategies_defined": "none", "generated_python_code": ""}"#;
        assert!(matches!(parse_diagnosis(raw), Err(DiagnosisError::Malformed(_))));
    }

    #[test]
    fn test_strip_code_fences_without_fence() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }
}
