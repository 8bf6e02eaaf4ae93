//! 生成器缓存：配置元组 (api_key, language_pair) 不变时复用同一个生成器，
//! 变化时重建。

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::Generator;
use crate::error::DeckResult;
use crate::llm::TextCompletion;

type CompletionFactory = dyn Fn(&str) -> DeckResult<Arc<dyn TextCompletion>> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    api_key: String,
    language_pair: String,
}

pub struct GeneratorCache {
    factory: Box<CompletionFactory>,
    slot: Mutex<Option<(CacheKey, Arc<Generator>)>>,
}

impl GeneratorCache {
    /// `factory` 接收 API key，返回文本生成客户端
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> DeckResult<Arc<dyn TextCompletion>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    pub fn get_or_build(&self, api_key: &str, language_pair: &str) -> DeckResult<Arc<Generator>> {
        let key = CacheKey {
            api_key: api_key.trim().to_string(),
            language_pair: language_pair.trim().to_string(),
        };
        let mut slot = self.slot.lock().unwrap_or_else(|p| {
            warn!("[GeneratorCache] Mutex poisoned, recovering");
            p.into_inner()
        });

        if let Some((cached_key, generator)) = slot.as_ref() {
            if *cached_key == key {
                return Ok(generator.clone());
            }
        }

        debug!(
            "[GeneratorCache] 配置变化，重建生成器（语言对 {}）",
            key.language_pair
        );
        let llm = (self.factory)(&key.api_key)?;
        let generator = Arc::new(Generator::new(llm));
        *slot = Some((key, generator.clone()));
        Ok(generator)
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedCompletion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cache() -> (GeneratorCache, Arc<AtomicUsize>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let cache = GeneratorCache::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedCompletion::new(vec![])) as Arc<dyn TextCompletion>)
        });
        (cache, builds)
    }

    #[test]
    fn test_reuses_generator_for_same_key() {
        let (cache, builds) = counting_cache();
        let a = cache.get_or_build("sk-1", "tr-de").unwrap();
        let b = cache.get_or_build("sk-1 ", "tr-de").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rebuilds_on_key_or_pair_change() {
        let (cache, builds) = counting_cache();
        cache.get_or_build("sk-1", "tr-de").unwrap();
        cache.get_or_build("sk-2", "tr-de").unwrap();
        cache.get_or_build("sk-2", "tr-en").unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 3);

        cache.invalidate();
        cache.get_or_build("sk-2", "tr-en").unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 4);
    }
}
