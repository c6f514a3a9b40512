use docent_llm::Message;

use crate::config::ResponseMode;

pub const STRUCTURED_PREAMBLE: &str = "\
You are a meticulous document analyst. Answer the question using only the \
document context you are given. Quote exact periods, amounts, percentages and \
conditions when the document states them, and never speculate.

Respond with a single JSON object and nothing else, using exactly these keys:
{
  \"decision\": \"short verdict or direct answer (for example Approved or Rejected), or null\",
  \"amount\": \"amount, limit or quantity stated in the document, or null\",
  \"justification\": \"explanation grounded in the context, citing the relevant terms\",
  \"source_clause\": \"verbatim quote of the clause supporting the answer, or null\"
}

If the context does not contain the answer, say so in the justification and \
set the other fields to null.";

pub const PLAIN_PREAMBLE: &str = "\
You are a meticulous document analyst. Answer the question using only the \
document context you are given. Quote exact periods, amounts, percentages and \
conditions when the document states them, and never speculate.

Respond with a single JSON object and nothing else:
{\"answer\": \"complete answer to the question\"}

If the context does not contain the answer, say so in the answer.";

#[must_use]
pub fn preamble(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::Structured => STRUCTURED_PREAMBLE,
        ResponseMode::PlainText => PLAIN_PREAMBLE,
    }
}

/// System preamble followed by one user turn carrying context and question.
#[must_use]
pub fn build_messages(mode: ResponseMode, context: &str, question: &str) -> Vec<Message> {
    vec![
        Message::system(preamble(mode)),
        Message::user(format!(
            "DOCUMENT CONTEXT:\n{context}\n\nQUESTION: {question}"
        )),
    ]
}
