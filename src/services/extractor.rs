use serde_json::Value;

use crate::error::AnalysisError;
use crate::models::LabelAnalysisResult;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Turns a raw model completion into a validated analysis result.
pub fn parse_analysis(raw: &str) -> Result<LabelAnalysisResult, AnalysisError> {
    let json = locate_json(raw);

    let value: Value = serde_json::from_str(json).map_err(|e| {
        log::error!("❌ Failed to parse model response: {}", raw);
        AnalysisError::Parse {
            raw: raw.to_string(),
            source: e,
        }
    })?;

    validate_sections(&value)?;

    serde_json::from_value(value).map_err(|e| AnalysisError::Schema(e.to_string()))
}

/// Picks the part of the completion that should hold the JSON object.
///
/// A ```json fence wins. Otherwise everything from the first `{` to the last
/// `}` is taken as-is, without balancing braces, so prose containing braces
/// around the object will confuse it. With neither, the whole text is returned.
pub fn locate_json(raw: &str) -> &str {
    if let Some(inner) = fenced_block(raw) {
        return inner;
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find(JSON_FENCE)?;
    let body = &raw[open + JSON_FENCE.len()..];
    let close = body.find(FENCE)?;

    let inner = &body[..close];
    let inner = inner.strip_prefix("\r\n").or_else(|| inner.strip_prefix('\n')).unwrap_or(inner);
    let inner = inner.strip_suffix("\r\n").or_else(|| inner.strip_suffix('\n')).unwrap_or(inner);
    Some(inner)
}

fn validate_sections(value: &Value) -> Result<(), AnalysisError> {
    let object = value
        .as_object()
        .ok_or_else(|| AnalysisError::Schema("expected a JSON object".to_string()))?;

    for section in LabelAnalysisResult::SECTIONS {
        match object.get(section) {
            Some(Value::Object(_)) => {}
            Some(_) => {
                return Err(AnalysisError::Schema(format!(
                    "section `{}` must be an object",
                    section
                )))
            }
            None => {
                return Err(AnalysisError::Schema(format!(
                    "missing required section `{}`",
                    section
                )))
            }
        }
    }

    Ok(())
}
