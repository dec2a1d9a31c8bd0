use log::warn;
use serde_json::{Map, Value};

use crate::error::ExtractionError;
use crate::extractors::dedupe_names;

const PRIMARY_KEYS: &[&str] = &["medications", "medicamentos"];

/// Parse the completion content into a deduplicated list of names.
///
/// The content must be a JSON object. The `medications` array is preferred;
/// otherwise the first other key holding an array of strings is used.
pub fn parse_medications(content: &str) -> Result<Vec<String>, ExtractionError> {
    let json = strip_code_fence(content);
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ExtractionError::MalformedResponse(format!("content is not JSON: {}", e)))?;

    let object = value.as_object().ok_or_else(|| {
        ExtractionError::MalformedResponse("content is not a JSON object".to_string())
    })?;

    let names = primary_array(object)
        .or_else(|| recover_array(object))
        .ok_or_else(|| {
            ExtractionError::MalformedResponse("no medications array in response".to_string())
        })?;

    Ok(dedupe_names(
        names.iter().filter_map(Value::as_str).map(str::to_string),
    ))
}

fn primary_array(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    PRIMARY_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
}

fn recover_array(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    let (key, array) = object.iter().find_map(|(key, value)| {
        value
            .as_array()
            .filter(|items| !items.is_empty() && items.iter().all(Value::is_string))
            .map(|items| (key, items))
    })?;
    warn!("Recovered medication list from unexpected key '{}'", key);
    Some(array)
}

/// Models sometimes wrap JSON in a Markdown code block despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_and_dedupes() {
        let names =
            parse_medications(r#"{"medications":["Amoxicilina","amoxicilina","Paracetamol"]}"#)
                .unwrap();
        assert_eq!(names, vec!["Amoxicilina", "Paracetamol"]);
    }

    #[test]
    fn test_accepts_spanish_key() {
        let names = parse_medications(r#"{"medicamentos":[" Ibuprofeno ",""]}"#).unwrap();
        assert_eq!(names, vec!["Ibuprofeno"]);
    }

    #[test]
    fn test_ignores_non_string_entries() {
        let names = parse_medications(r#"{"medications":["Omeprazol", 20, null, {"x":1}]}"#)
            .unwrap();
        assert_eq!(names, vec!["Omeprazol"]);
    }

    #[test]
    fn test_recovers_from_other_key() {
        let names =
            parse_medications(r#"{"count": 2, "drugs": ["Loratadina", "Cetirizina"]}"#).unwrap();
        assert_eq!(names, vec!["Loratadina", "Cetirizina"]);
    }

    #[test]
    fn test_recovery_follows_document_order() {
        let names = parse_medications(
            r#"{"result": ["Ibuprofeno", "Omeprazol"], "dosis": ["400mg", "20mg"]}"#,
        )
        .unwrap();
        assert_eq!(names, vec!["Ibuprofeno", "Omeprazol"]);
    }

    #[test]
    fn test_recovery_skips_non_string_arrays() {
        let result = parse_medications(r#"{"doses": [500, 250]}"#);
        assert!(matches!(result, Err(ExtractionError::MalformedResponse(_))));
    }

    #[test]
    fn test_strips_markdown_fence() {
        let names = parse_medications("```json\n{\"medications\":[\"Naproxeno\"]}\n```").unwrap();
        assert_eq!(names, vec!["Naproxeno"]);
    }

    #[test]
    fn test_rejects_non_json() {
        let result = parse_medications("Amoxicilina, Paracetamol");
        assert!(matches!(result, Err(ExtractionError::MalformedResponse(_))));

        let result = parse_medications(r#"["Amoxicilina"]"#);
        assert!(matches!(result, Err(ExtractionError::MalformedResponse(_))));
    }

    #[test]
    fn test_empty_array_is_ok() {
        let names = parse_medications(r#"{"medications":[]}"#).unwrap();
        assert!(names.is_empty());
    }
}
