//! Prompt assembly and lenient parsing of generator output
//!
//! Every mode asks the model for a JSON object whose claims carry
//! `{"chunk_id", "page"}` citations. Parsing tolerates markdown fences and
//! chatter around the object, and accepts the shapes the modes ask for
//! (`bullets`, `claims`, `steps`, or `answer` plus `citations`).

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use policy_types::{Citation, Claim};
use regex::Regex;
use serde_json::Value;

use crate::collaborators::{GenerationMode, GenerationRequest, RetrievedUnit};
use crate::text::split_sentences;

lazy_static! {
    static ref FENCED_JSON_RE: Regex = Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").unwrap();
}

/// Sampling temperature used for every mode
pub const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// `---\nChunk {id} (page {n}):\n{text}\n` blocks joined by blank lines
pub fn build_context(units: &[RetrievedUnit]) -> String {
    units
        .iter()
        .map(|u| format!("---\nChunk {} (page {}):\n{}\n", u.unit_id, u.page_number, u.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

const CITATION_RULES: &str = "Use ONLY the provided chunks. Every item must cite the chunks it \
relies on as {\"chunk_id\": \"<id>\", \"page\": <page>} using the exact id and page shown in the \
chunk header. Do not invent chunk ids or pages. Output ONLY a valid JSON object.";

pub fn build_prompt(request: &GenerationRequest) -> ChatPrompt {
    let context = request.context();
    let question = request.question.as_deref().unwrap_or_default();
    let section = request
        .section
        .map(|s| s.display_name())
        .unwrap_or("the policy");

    match request.mode {
        GenerationMode::Summary => ChatPrompt {
            system: format!(
                "You are a policy document summarizer. {}\nRespond with keys \"present\" (true if \
                 the section's information is in the chunks) and \"bullets\" (at most {} items, each \
                 with \"text\" and \"citations\"). Write short, plain-language sentences.",
                CITATION_RULES, request.max_bullets
            ),
            user: format!("Summarize {} using:\n{}", section, context),
        },
        GenerationMode::SectionDetail => ChatPrompt {
            system: format!(
                "You are a policy document summarizer producing a detailed section overview. {}\n\
                 Respond with keys \"present\" and \"bullets\" (at most {} items, each with \"text\" \
                 and \"citations\").",
                CITATION_RULES, request.max_bullets
            ),
            user: format!(
                "Give a detailed overview of {}.\nQuestion: {}\nChunks:\n{}",
                section, question, context
            ),
        },
        GenerationMode::Qa => ChatPrompt {
            system: format!(
                "You are a Q&A system for an insurance policy. {}\nRespond with key \"claims\": one \
                 item per answer sentence, each with \"text\" and \"citations\". Respond with \
                 {{\"claims\": []}} when the chunks do not answer the question.",
                CITATION_RULES
            ),
            user: format!("Context:\n{}\n\nQuestion: {}", context, question),
        },
        GenerationMode::Scenario => ChatPrompt {
            system: format!(
                "You generate hypothetical cost scenarios from an insurance policy. {}\nRespond with \
                 keys \"steps\" (each with \"step_number\", \"text\" and \"citations\") and \
                 \"not_found\" (true when the chunks do not cover the scenario).",
                CITATION_RULES
            ),
            user: format!(
                "Scenario type: {}\nContext:\n{}\nScenario: {}",
                request.scenario_type.as_deref().unwrap_or("General"),
                context,
                question
            ),
        },
    }
}

/// Extracts the JSON object from a model reply
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let candidate = match FENCED_JSON_RE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if end > start => &trimmed[start..=end],
            _ => trimmed,
        },
    };
    serde_json::from_str(candidate).ok()
}

/// Turns a model reply into raw claims. Citations are taken as given;
/// nothing here decides whether they are real.
pub fn parse_claims(raw: &str, request: &GenerationRequest) -> Result<Vec<Claim>> {
    let value = extract_json(raw).ok_or_else(|| anyhow!("Generator reply is not a JSON object"))?;
    let section_id = request.section.map(|s| s.id().to_string());

    let declined = value.get("present").and_then(Value::as_bool) == Some(false)
        || value.get("not_found").and_then(Value::as_bool) == Some(true);
    if declined {
        return Ok(Vec::new());
    }

    let items = ["bullets", "claims", "steps"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array));

    let mut claims: Vec<Claim> = match items {
        Some(items) => items.iter().filter_map(claim_from_item).collect(),
        None => match value.get("answer").and_then(Value::as_str) {
            // A bare answer is split so each sentence is validated on its own
            Some(answer) => {
                let citations = citations_from(value.get("citations"));
                split_sentences(answer)
                    .into_iter()
                    .map(|sentence| Claim::new(sentence, citations.clone()))
                    .collect()
            }
            None => Vec::new(),
        },
    };

    if let Some(id) = section_id {
        claims = claims.into_iter().map(|c| c.with_section(id.clone())).collect();
    }
    Ok(claims)
}

fn claim_from_item(item: &Value) -> Option<Claim> {
    let (text, citations) = match item {
        Value::String(text) => (text.as_str(), Vec::new()),
        Value::Object(_) => (
            item.get("text").and_then(Value::as_str)?,
            citations_from(item.get("citations")),
        ),
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(Claim::new(text, citations))
}

fn citations_from(value: Option<&Value>) -> Vec<Citation> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|c| {
            let unit_id = c
                .get("chunk_id")
                .or_else(|| c.get("unit_id"))
                .and_then(Value::as_str)?;
            // A missing page can never match a unit
            let page = c
                .get("page")
                .or_else(|| c.get("page_number"))
                .and_then(page_number)
                .unwrap_or(0);
            Some(Citation::new(unit_id, page))
        })
        .collect()
}

fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::CanonicalSection;
    use pretty_assertions::assert_eq;

    fn unit(id: &str, page: u32, text: &str) -> RetrievedUnit {
        RetrievedUnit {
            unit_id: id.to_string(),
            page_number: page,
            sequence_index: 0,
            text: text.to_string(),
            similarity: 0.5,
        }
    }

    #[test]
    fn test_context_format() {
        let ctx = build_context(&[unit("c_1_0", 1, " Deductible $500 "), unit("c_2_0", 2, "Copay $20")]);
        assert_eq!(
            ctx,
            "---\nChunk c_1_0 (page 1):\nDeductible $500\n\n---\nChunk c_2_0 (page 2):\nCopay $20"
        );
    }

    #[test]
    fn test_prompts_mention_mode_specifics() {
        let units = vec![unit("c_1_0", 1, "Deductible $500")];
        let summary = build_prompt(&GenerationRequest::summary(CanonicalSection::CostSummary, units.clone(), 6));
        assert!(summary.user.starts_with("Summarize Cost Summary"));
        assert!(summary.system.contains("at most 6 items"));

        let scenario = build_prompt(&GenerationRequest::scenario("What if I visit the ER?", "ER visit", units));
        assert!(scenario.system.contains("\"steps\""));
        assert!(scenario.user.contains("Scenario type: ER visit"));
    }

    #[test]
    fn test_parse_fenced_bullets() {
        let raw = "Here you go:\n```json\n{\"present\": true, \"bullets\": [{\"text\": \"Deductible is $500.\", \"citations\": [{\"chunk_id\": \"c_1_0\", \"page\": 1}, {\"chunk_id\": \"c_1_0\", \"page\": 1}]}]}\n```";
        let request = GenerationRequest::summary(CanonicalSection::CostSummary, vec![], 6);
        let claims = parse_claims(raw, &request).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].claimed_citations, vec![Citation::new("c_1_0", 1)]);
        assert_eq!(claims[0].section_id.as_deref(), Some("cost_summary"));
    }

    #[test]
    fn test_parse_not_present() {
        let request = GenerationRequest::summary(CanonicalSection::PlanSnapshot, vec![], 6);
        let claims = parse_claims(r#"{"present": false, "bullets": []}"#, &request).unwrap();
        assert!(claims.is_empty());
    }

    #[test]
    fn test_parse_answer_splits_sentences() {
        let raw = r#"Sure! {"answer": "The deductible is $500. It resets every January.", "citations": [{"chunk_id": "c_3_1", "page": "3"}]}"#;
        let claims = parse_claims(raw, &GenerationRequest::qa("deductible?", vec![])).unwrap();
        assert_eq!(claims.len(), 2);
        assert_eq!(claims[1].text, "It resets every January.");
        assert_eq!(claims[1].claimed_citations, vec![Citation::new("c_3_1", 3)]);
        assert_eq!(claims[0].section_id, None);
    }

    #[test]
    fn test_parse_steps_and_missing_page() {
        let raw = r#"{"steps": [{"step_number": 1, "text": "You pay the $250 ER copay.", "citations": [{"chunk_id": "c_4_0"}]}], "not_found": false}"#;
        let claims = parse_claims(raw, &GenerationRequest::scenario("q", "ER visit", vec![])).unwrap();
        assert_eq!(claims[0].claimed_citations, vec![Citation::new("c_4_0", 0)]);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_claims("I cannot help with that.", &GenerationRequest::qa("q", vec![])).is_err());
    }
}
