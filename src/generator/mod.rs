//! 例句生成器
//!
//! 单个词条：prompt → 调用模型 → 解析 → 校验；解析失败或校验失败时
//! 整轮重来，最多 `MAX_ATTEMPTS` 次。传输错误不重试。
//! 批处理按输入顺序逐个处理，单个词条失败只记录警告，不影响其它词条。

pub mod cache;
pub mod parser;
pub mod prompt;
pub mod validator;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{DeckError, DeckResult};
use crate::language::{require_language_pair, LanguagePairConfig};
use crate::llm::TextCompletion;
use crate::models::{Difficulty, GenerationRequest, SentenceSet};

/// 固定采样温度
pub const TEMPERATURE: f32 = 0.7;
/// 输出长度上限
pub const MAX_TOKENS: u32 = 500;
/// 单个词条最多完整尝试次数
pub const MAX_ATTEMPTS: usize = 3;

/// 批处理中失败的词条
#[derive(Debug, Serialize)]
pub struct ItemFailure {
    pub word: String,
    pub error: DeckError,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    /// 成功的例句集合，保持输入顺序
    pub sets: Vec<SentenceSet>,
    pub failures: Vec<ItemFailure>,
}

pub struct Generator {
    llm: Arc<dyn TextCompletion>,
}

impl Generator {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(&self, request: &GenerationRequest) -> DeckResult<String> {
        prompt::build_prompt(request)
    }

    pub async fn invoke(&self, prompt: &str) -> DeckResult<String> {
        self.llm
            .complete(prompt, TEMPERATURE, MAX_TOKENS)
            .await
            .map_err(|e| match e {
                DeckError::Transport(_) => e,
                other => DeckError::Transport(other.to_string()),
            })
    }

    pub fn parse(&self, raw: &str, request: &GenerationRequest) -> DeckResult<SentenceSet> {
        parser::parse(raw, request)
    }

    pub fn validate(&self, set: &SentenceSet) -> bool {
        match require_language_pair(&set.language_pair) {
            Ok(pair) => validator::validate(set, pair),
            Err(_) => false,
        }
    }

    /// 一次完整尝试
    async fn attempt(
        &self,
        request: &GenerationRequest,
        pair: &LanguagePairConfig,
    ) -> DeckResult<SentenceSet> {
        let prompt = self.build_prompt(request)?;
        let raw = self.invoke(&prompt).await?;
        let set = self.parse(&raw, request)?;
        validator::check(&set, pair)?;
        Ok(set)
    }

    /// 生成单个词条，返回具体失败原因
    pub async fn try_generate(&self, request: &GenerationRequest) -> DeckResult<SentenceSet> {
        let word = request.word_or_phrase.trim();
        if word.is_empty() {
            return Err(DeckError::InvalidInput("word or phrase is empty".to_string()));
        }
        let pair = require_language_pair(&request.language_pair)?;

        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::ZERO)
            .with_max_times(MAX_ATTEMPTS - 1);

        let result = (move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("[Generator] '{}' 第 {}/{} 次尝试", word, n, MAX_ATTEMPTS);
            self.attempt(request, pair).await
        })
        .retry(&backoff)
        .when(|e: &DeckError| e.is_retryable())
        .notify(|e: &DeckError, _: Duration| {
            warn!("[Generator] '{}' 尝试失败，准备重试: {}", word, e);
        })
        .await;

        match result {
            Ok(set) => Ok(set),
            Err(e) if e.is_retryable() => Err(DeckError::ExhaustedRetries {
                word: word.to_string(),
                attempts: attempts.load(Ordering::SeqCst),
                last_error: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn generate_one(&self, request: &GenerationRequest) -> Option<SentenceSet> {
        match self.try_generate(request).await {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(
                    "[Generator] 词条 '{}' 生成失败: {}",
                    request.word_or_phrase.trim(),
                    e
                );
                None
            }
        }
    }

    pub async fn generate_batch<S: AsRef<str>>(
        &self,
        words: &[S],
        language_pair: &str,
        difficulty: Difficulty,
        topic: &str,
    ) -> Vec<SentenceSet> {
        self.generate_batch_report(words, language_pair, difficulty, topic)
            .await
            .sets
    }

    /// 批量生成，同时返回失败词条
    pub async fn generate_batch_report<S: AsRef<str>>(
        &self,
        words: &[S],
        language_pair: &str,
        difficulty: Difficulty,
        topic: &str,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let words: Vec<&str> = words
            .iter()
            .map(|w| w.as_ref().trim())
            .filter(|w| !w.is_empty())
            .collect();
        info!(
            "[Generator] 开始批量生成：{} 个词条，语言对 {}，难度 {}",
            words.len(),
            language_pair,
            difficulty
        );

        for word in words {
            let request = GenerationRequest::new(word, language_pair, difficulty, topic);
            match self.try_generate(&request).await {
                Ok(set) => report.sets.push(set),
                Err(error) => {
                    warn!("[Generator] 词条 '{}' 生成失败: {}", word, error);
                    report.failures.push(ItemFailure {
                        word: word.to_string(),
                        error,
                    });
                }
            }
        }

        info!(
            "[Generator] 批量生成完成：成功 {}，失败 {}",
            report.sets.len(),
            report.failures.len()
        );
        report
    }
}
