use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const NOT_VISIBLE: &str = "Not visible";
pub const NONE_IDENTIFIED: &str = "None identified";
pub const CANNOT_BE_DETERMINED: &str = "Cannot be determined from image";

/// Image as received from the caller, before any encoding.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }
}

/// What a caller can show right after an upload is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePreview {
    pub media_type: String,
    pub byte_len: usize,
    pub fingerprint: String,
}

/// Base64 payload of an accepted image, ready for the inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub media_type: String,
    pub data: String,
    pub fingerprint: String,
}

/// Sampling parameters sent with every analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub prompt: &'static str,
    pub image: EncodedImage,
    pub generation: GenerationConfig,
}

// ---------------------------------------------------------------------------
// Label analysis result
//
// Field names follow the JSON schema the model is asked to emit, so the same
// structs deserialize the completion and serialize the API response.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelAnalysisResult {
    pub nutrition: NutritionInfo,
    pub ingredients: IngredientAnalysis,
    pub health_impact: HealthImpact,
    pub biosafety_ethics: BiosafetyEthics,
    pub user_guidance: UserGuidance,
}

impl LabelAnalysisResult {
    /// Top-level sections that must be present in every completion.
    pub const SECTIONS: [&'static str; 5] = [
        "nutrition",
        "ingredients",
        "healthImpact",
        "biosafetyEthics",
        "userGuidance",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionInfo {
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub calories: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub sugar: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub fat: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub saturated_fat: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub carbohydrates: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub protein: String,
    #[serde(default = "not_visible", deserialize_with = "label_value")]
    pub sodium: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientAnalysis {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub additives: Vec<Additive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Additive {
    pub name: String,
    #[serde(default = "cannot_be_determined")]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthImpact {
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub long_term_risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosafetyEthics {
    #[serde(default = "none_identified")]
    pub safety_issues: Vec<String>,
    #[serde(default = "none_identified")]
    pub additives_concerns: Vec<String>,
    #[serde(default = "none_identified")]
    pub ethical_issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGuidance {
    #[serde(default)]
    pub who_should_limit: Vec<String>,
    #[serde(default = "cannot_be_determined")]
    pub safe_consumption: String,
}

/// A successful analysis together with the attempt that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub attempt: u64,
    pub analyzed_at: DateTime<Utc>,
    pub result: LabelAnalysisResult,
}

fn not_visible() -> String {
    NOT_VISIBLE.to_string()
}

fn cannot_be_determined() -> String {
    CANNOT_BE_DETERMINED.to_string()
}

fn none_identified() -> Vec<String> {
    vec![NONE_IDENTIFIED.to_string()]
}

/// Nutrition values are strings, but models sometimes emit bare numbers.
fn label_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null(()) => not_visible(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_nested_fields_get_placeholders() {
        let json = r#"{
            "nutrition": {"calories": "560 kcal"},
            "ingredients": {},
            "healthImpact": {"pros": ["rich in flavanols"]},
            "biosafetyEthics": {"ethicalIssues": []},
            "userGuidance": {"whoShouldLimit": ["children"]}
        }"#;

        let result: LabelAnalysisResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.nutrition.calories, "560 kcal");
        assert_eq!(result.nutrition.sodium, NOT_VISIBLE);
        assert_eq!(result.nutrition.saturated_fat, NOT_VISIBLE);
        assert!(result.ingredients.ingredients.is_empty());
        assert_eq!(result.biosafety_ethics.safety_issues, vec![NONE_IDENTIFIED]);
        assert!(result.biosafety_ethics.ethical_issues.is_empty());
        assert_eq!(result.user_guidance.safe_consumption, CANNOT_BE_DETERMINED);
    }

    #[test]
    fn test_numeric_nutrition_values_become_text() {
        let json = r#"{"calories": 546, "sugar": 24.5, "fat": null}"#;
        let nutrition: NutritionInfo = serde_json::from_str(json).unwrap();

        assert_eq!(nutrition.calories, "546");
        assert_eq!(nutrition.sugar, "24.5");
        assert_eq!(nutrition.fat, NOT_VISIBLE);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(value["topK"], 32);
        assert_eq!(value["maxOutputTokens"], 4096);
    }
}
