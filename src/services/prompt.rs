use crate::models::{CANNOT_BE_DETERMINED, NONE_IDENTIFIED, NOT_VISIBLE};

/// Instruction sent alongside every label photo.
///
/// The schema block must stay in sync with [`crate::models::LabelAnalysisResult`].
pub const ANALYSIS_PROMPT: &str = r#"You are an expert food safety and nutrition analyst. Analyze the food label image provided and extract/analyze the following information. Return your response in the exact JSON format specified below.

Analyze the image and provide:

1. NUTRITION INFORMATION - Extract all nutritional values visible on the label
2. INGREDIENT ANALYSIS - List all ingredients and explain any additives/preservatives
3. HEALTH IMPACT - Provide pros, cons, and potential long-term health risks
4. BIOSAFETY & ETHICS - Identify any food safety concerns, additive concerns, or ethical/transparency issues
5. USER GUIDANCE - Specify who should limit consumption and safe consumption advice

Return your response in this exact JSON format:
{
  "nutrition": {
    "calories": "value or 'Not visible'",
    "sugar": "value or 'Not visible'",
    "fat": "value or 'Not visible'",
    "saturatedFat": "value or 'Not visible'",
    "carbohydrates": "value or 'Not visible'",
    "protein": "value or 'Not visible'",
    "sodium": "value or 'Not visible'"
  },
  "ingredients": {
    "ingredients": ["ingredient1", "ingredient2", "..."],
    "additives": [
      {"name": "additive name", "explanation": "what it is and its purpose"}
    ]
  },
  "healthImpact": {
    "pros": ["benefit1", "benefit2"],
    "cons": ["concern1", "concern2"],
    "longTermRisks": ["risk1", "risk2"]
  },
  "biosafetyEthics": {
    "safetyIssues": ["issue1 or 'None identified'"],
    "additivesConcerns": ["concern1 or 'None identified'"],
    "ethicalIssues": ["issue1 or 'None identified'"]
  },
  "userGuidance": {
    "whoShouldLimit": ["group1", "group2"],
    "safeConsumption": "advice for safe consumption"
  }
}

If any information is not visible or cannot be determined from the image, use appropriate default values like "Not visible" or "Cannot be determined from image"."#;

pub fn build_prompt() -> &'static str {
    // Fallback literals the model is told to use must match the model defaults.
    debug_assert!(ANALYSIS_PROMPT.contains(NOT_VISIBLE));
    debug_assert!(ANALYSIS_PROMPT.contains(NONE_IDENTIFIED));
    debug_assert!(ANALYSIS_PROMPT.contains(CANNOT_BE_DETERMINED));
    ANALYSIS_PROMPT
}
