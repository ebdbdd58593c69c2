/// Instruction sent with the image to the vision backend.
pub const VISION_PROMPT: &str = r#"Analyze this medicine package or label image.
First, check if the image is clear enough to read the text. If not, respond with a JSON object where "isImageClear" is false.

If the image is clear, extract and return the following information in JSON format:
{
  "isImageClear": true,
  "name": "Medicine name",
  "description": "Medicine description/purpose",
  "ingredients": ["ingredient1", "ingredient2"],
  "price": "Price or price range",
  "availability": "Availability information",
  "precautions": ["precaution1", "precaution2"],
  "alternatives": ["alternative1", "alternative2"]
}

Only return valid JSON. No commentary or explanation."#;

/// Build the text-backend prompt around OCR output.
pub fn build_text_prompt(extracted_text: &str) -> String {
    // Quotes in OCR output would close the delimiter early.
    let text = extracted_text.trim().replace('"', "'");
    format!(
        r#"Analyze this text from a medicine package and extract the following information:

Text from image: "{text}"

Please return ONLY JSON with the following structure:
{{
  "name": "Medicine name",
  "description": "Medicine description/purpose",
  "ingredients": ["ingredient1", "ingredient2"],
  "price": "Price or price range",
  "availability": "Availability information",
  "precautions": ["precaution1", "precaution2"],
  "alternatives": ["alternative1", "alternative2"]
}}

Only return valid JSON. No commentary or explanation."#
    )
}
