// Shared prompt fragments.
// The assistant pipeline defines its own prompt template in assistant/prompts.rs;
// this file contains cross-cutting instructions reused by any prompt.

/// Instruction that keeps answers anchored to supplied context.
pub const GROUNDING_INSTRUCTION: &str = "\
    Base your answer ONLY on the provided real-time information, the reference records, \
    and your general knowledge of disaster management best practices. \
    Do NOT invent figures, warnings, or events that are not in the provided information. \
    If context is missing for part of the request, say so clearly and still give general advice.";

/// Instruction for safety-critical phrasing.
pub const SAFETY_INSTRUCTION: &str = "\
    When giving safety advice, make it clear, concise, and actionable. \
    Prioritize the safety of people over property. \
    Point to official emergency services for life-threatening situations.";
