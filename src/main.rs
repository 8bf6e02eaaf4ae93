use std::io::Read;
use std::sync::Arc;

use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use sentence_deck_lib::accepted::AcceptedSets;
use sentence_deck_lib::config::AppConfig;
use sentence_deck_lib::generator::cache::GeneratorCache;
use sentence_deck_lib::language::require_language_pair;
use sentence_deck_lib::llm::{ChatCompletionClient, TextCompletion};
use sentence_deck_lib::packager::Packager;
use sentence_deck_lib::tts::build_synthesizer;

/// 词条来自命令行参数；没有参数时从 stdin 逐行读取
fn read_words() -> anyhow::Result<Vec<String>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Ok(args);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.lines().map(str::to_string).collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let cfg = AppConfig::from_env_and_file()?;
    let pair = require_language_pair(&cfg.generation.language_pair)?;
    let words = read_words()?;

    let llm_cfg = cfg.llm.clone();
    let cache = GeneratorCache::new(move |api_key| {
        let mut llm_cfg = llm_cfg.clone();
        llm_cfg.api_key = Some(api_key.to_string());
        Ok(Arc::new(ChatCompletionClient::new(&llm_cfg)?) as Arc<dyn TextCompletion>)
    });
    let generator = cache.get_or_build(cfg.api_key()?, pair.code)?;

    let report = generator
        .generate_batch_report(
            &words,
            pair.code,
            cfg.generation.difficulty,
            &cfg.generation.topic,
        )
        .await;

    let mut accepted = AcceptedSets::new();
    accepted.extend(report.sets);
    accepted.select_all();
    if accepted.is_empty() {
        anyhow::bail!("no sentence sets were generated ({} failures)", report.failures.len());
    }

    let packager = Packager::new(build_synthesizer(&cfg.tts)?);
    let artifact = packager.build_deck(accepted.selected(), pair.code).await?;
    let path = artifact.write_to(&cfg.output.dir, cfg.output.file_name.as_deref())?;

    let labels: Vec<String> = (0..accepted.len()).filter_map(|i| accepted.label(i)).collect();
    let summary = json!({
        "path": path.display().to_string(),
        "mime_type": artifact.mime_type(),
        "artifact": artifact,
        "accepted": labels,
        "failures": report.failures,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
