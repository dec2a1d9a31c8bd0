/// The system prompt used for extracting medication names from OCR text.
///
/// The prompt is loaded from `prompt.txt` at compile time using the
/// `include_str!` macro, making it easy to edit without dealing with
/// Rust string syntax.
pub const MEDICATION_EXTRACTION_PROMPT: &str = include_str!("prompt.txt");

/// Build the user message, embedding the raw OCR text between delimiters.
pub fn build_user_message(ocr_text: &str) -> String {
    format!(
        "Extract ONLY the medication names from the following OCR text (it may contain errors):\n\n---\n{}\n---\n\nReturn only the JSON object with the medications array, without any explanation.",
        ocr_text
    )
}
