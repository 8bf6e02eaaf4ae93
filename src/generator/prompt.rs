use crate::error::DeckResult;
use crate::language::{require_language_pair, LanguagePairConfig};
use crate::models::{GenerationRequest, SENTENCES_PER_SET};

/// 构造例句生成 prompt（同一请求总是得到同一段文本）
pub fn build_prompt(request: &GenerationRequest) -> DeckResult<String> {
    let pair = require_language_pair(&request.language_pair)?;
    Ok(render(request, pair))
}

fn json_str(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn render(request: &GenerationRequest, pair: &LanguagePairConfig) -> String {
    let target = pair.target_language_name;
    let source = pair.source_language_name;
    let word = request.word_or_phrase.trim();
    let topic = request.topic.trim();

    let mut prompt = format!(
        "Create {n} short example sentences for a {level} learner that use the {target} word or phrase \"{word}\".\n\
         Topic: {topic}.\n\
         Every \"sentence\" must be written in {target}. Every \"translation\" must be its {source} translation.\n\
         Difficulty: {guidance}\n",
        n = SENTENCES_PER_SET,
        level = request.difficulty.as_str(),
        guidance = request.difficulty.guidance(),
    );

    if let Some(sig) = pair.target_signature() {
        prompt.push_str(&format!("{} sentences: {}\n", target, sig.prompt_hint));
    }
    if let Some(sig) = pair.source_signature() {
        prompt.push_str(&format!("{} translations: {}\n", source, sig.prompt_hint));
    }
    prompt.push_str("\"context\" briefly explains, in ");
    prompt.push_str(source);
    prompt.push_str(", when the sentence would be used.\n");

    prompt.push_str(
        "Respond with ONLY valid JSON (no markdown fences, no commentary) in exactly this shape:\n",
    );
    prompt.push_str("{\n");
    prompt.push_str(&format!("    \"language_pair\": {},\n", json_str(pair.code)));
    prompt.push_str(&format!("    \"topic\": {},\n", json_str(topic)));
    prompt.push_str(&format!("    \"word\": {},\n", json_str(word)));
    prompt.push_str("    \"sentences\": [\n");
    for id in 1..=SENTENCES_PER_SET {
        let sep = if id == SENTENCES_PER_SET { "" } else { "," };
        prompt.push_str(&format!(
            "        {{\"id\": {}, \"sentence\": \"\", \"translation\": \"\", \"context\": \"\", \"tags\": []}}{}\n",
            id, sep
        ));
    }
    prompt.push_str("    ]\n}");
    prompt
}
