// Assistant prompt template.
// Placeholders are filled by `pipeline::build_prompt`.

pub const ASSISTANT_ROLE: &str =
    "You are an AI assistant specialized in Indian disaster management and safety procedures.";

pub const ASSISTANT_PROMPT_TEMPLATE: &str = "\
Role: {role}
Current Time: {current_time}
Location Context: {location_info}

Relevant Real-time Information:
{realtime_context}

Reference Records:
{reference_records}

User's Request: {user_request}

Task: Respond directly and accurately to the user's request. {grounding_instruction} {safety_instruction}
Response:";

pub const NO_REALTIME_CONTEXT: &str =
    "No specific real-time context was retrieved for this query.";

pub const NO_REFERENCE_RECORDS: &str = "No matching reference records were found.";
