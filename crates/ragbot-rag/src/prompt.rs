//! Prompt composition

pub const TASK_STATEMENT: &str = "Your Task: Provide a concise and informative response to the user's query, drawing on the provided context.";

pub const GUIDELINES: &str = "Guidelines:
1. Relevance: Focus directly on the user's question.
2. Conciseness: Avoid unnecessary details.
3. Accuracy: Ensure factual correctness.
4. Clarity: Use clear language.
5. Contextual Awareness: Use general knowledge if context is insufficient.
6. Honesty: State if you lack information.";

pub const RESPONSE_FORMAT: &str = "Response Format:
- Direct answer
- Brief explanation (if necessary)
- Citation (if relevant)
- Conclusion";

/// Merge retrieved context and the user's query into one prompt
///
/// Both inputs are interpolated verbatim.
pub fn compose_prompt(context: &str, user_text: &str) -> String {
    format!(
        "{TASK_STATEMENT}\n\nContext: {context}\n\nUser Query: {user_text}\n\n{GUIDELINES}\n\n{RESPONSE_FORMAT}"
    )
}
