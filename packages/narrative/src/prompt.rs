//! Prompt text for interpretation requests.

use risk_index_engine::InterpretationRequest;

/// Instructions sent as the system prompt with every request.
pub const SYSTEM_PROMPT: &str = "You write the one-paragraph interpretation shown next to a \
composite geopolitical risk index. You receive the index as JSON: its value from 0 to 100, \
its band, day-over-day and week-over-week trends (null when unavailable), the weighted \
components, and the top driving alerts. Write two to four plain sentences for an analyst \
audience. State the level and direction, name what is driving it, and mention when history \
is insufficient. Do not invent events that are not in the drivers. Do not use markdown.";

/// User prompt carrying the result as pretty JSON.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if the request cannot be serialized.
pub fn user_prompt(request: &InterpretationRequest) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Interpret today's {} reading.\n\n{}",
        request.family_name,
        serde_json::to_string_pretty(request)?
    ))
}
