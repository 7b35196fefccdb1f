// 模型名称映射
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

/// 图像生成的逻辑模型 ID，上游没有原生图像端点
pub const IMAGE_MODEL: &str = "dall-e-3";

/// 共享的映射快照：读多写少，重载时整体替换
pub type SharedMapping = Arc<RwLock<Arc<ModelMapping>>>;

/// 模型映射表 (调用方模型名 -> 上游模型名) 及其反向表
#[derive(Debug, Clone, Default)]
pub struct ModelMapping {
    forward: BTreeMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ModelMapping {
    /// 由正向映射构建，同时生成反向映射
    ///
    /// 多个 key 指向同一个上游 ID 时，按 key 排序后最后一个胜出。
    pub fn new(forward: BTreeMap<String, String>) -> Self {
        let mut reverse = HashMap::with_capacity(forward.len());
        for (source, target) in forward.iter() {
            reverse.insert(target.clone(), source.clone());
        }
        Self { forward, reverse }
    }

    /// 从 JSON 文件加载；任何失败只记录警告并返回空映射
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(mapping) => {
                tracing::info!(
                    "Loaded {} model mapping(s) from {}",
                    mapping.len(),
                    path.display()
                );
                mapping
            }
            Err(e) => {
                tracing::warn!(
                    "模型映射加载失败 ({}): {}; continuing with identity mapping",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let forward: BTreeMap<String, String> =
            serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self::new(forward))
    }

    /// 解析模型名
    /// 优先级：精确映射 > 已是上游 ID > 原样透传
    pub fn resolve(&self, name: &str) -> String {
        if let Some(target) = self.forward.get(name) {
            tracing::debug!("[Router] 精确映射: {} -> {}", name, target);
            return target.clone();
        }

        if self.reverse.contains_key(name) {
            tracing::debug!("[Router] {} is already an upstream model id", name);
        }

        name.to_string()
    }

    /// 所有已知的逻辑模型 ID (正向 key 与反向 key 的并集，去重并排序)
    pub fn model_ids(&self) -> Vec<String> {
        let ids: BTreeSet<&String> = self.forward.keys().chain(self.reverse.keys()).collect();
        ids.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// 包装成可共享的快照
pub fn shared(mapping: ModelMapping) -> SharedMapping {
    Arc::new(RwLock::new(Arc::new(mapping)))
}

/// 读取当前快照；锁只在克隆指针期间持有
pub async fn snapshot(mapping: &SharedMapping) -> Arc<ModelMapping> {
    mapping.read().await.clone()
}

/// 重新加载映射文件并整体替换快照
///
/// 文件缺失或格式错误时保留当前快照。返回生效中的条目数。
pub async fn reload(mapping: &SharedMapping, path: &Path) -> usize {
    let fresh = match ModelMapping::try_load(path) {
        Ok(fresh) => Arc::new(fresh),
        Err(e) => {
            let kept = snapshot(mapping).await.len();
            tracing::warn!(
                "模型映射重载失败 ({}): {}; keeping previous mapping ({} entries)",
                path.display(),
                e,
                kept
            );
            return kept;
        }
    };

    let count = fresh.len();
    {
        let mut current = mapping.write().await;
        *current = fresh;
    }
    tracing::info!("模型映射已全量热更新 ({} entries)", count);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> ModelMapping {
        let mut forward = BTreeMap::new();
        forward.insert("gpt-4o".to_string(), "upstream-large".to_string());
        forward.insert("gpt-4o-mini".to_string(), "upstream-small".to_string());
        forward.insert(IMAGE_MODEL.to_string(), "upstream-large".to_string());
        ModelMapping::new(forward)
    }

    #[test]
    fn test_resolve_mapped_key() {
        let mapping = sample();
        assert_eq!(mapping.resolve("gpt-4o"), "upstream-large");
        assert_eq!(mapping.resolve("gpt-4o-mini"), "upstream-small");
        assert_eq!(mapping.resolve("dall-e-3"), "upstream-large");
    }

    #[test]
    fn test_resolve_upstream_id_and_unknown_are_identity() {
        let mapping = sample();
        assert_eq!(mapping.resolve("upstream-small"), "upstream-small");
        assert_eq!(mapping.resolve("totally-unknown"), "totally-unknown");
        assert_eq!(ModelMapping::default().resolve("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_reverse_collision_keeps_one() {
        let mapping = sample();
        // "dall-e-3" 与 "gpt-4o" 都指向 upstream-large，排序后 gpt-4o 最后写入
        assert_eq!(mapping.reverse.len(), 2);
        assert_eq!(mapping.reverse.get("upstream-large").unwrap(), "gpt-4o");
    }

    #[test]
    fn test_model_ids_union_sorted() {
        let ids = sample().model_ids();
        assert_eq!(
            ids,
            vec![
                "dall-e-3",
                "gpt-4o",
                "gpt-4o-mini",
                "upstream-large",
                "upstream-small"
            ]
        );
    }

    #[test]
    fn test_load_missing_and_malformed_files_are_soft() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelMapping::load(&dir.path().join("missing.json")).is_empty());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "[1, 2, 3]").unwrap();
        assert!(ModelMapping::load(bad.path()).is_empty());

        let mut wrong_types = tempfile::NamedTempFile::new().unwrap();
        write!(wrong_types, r#"{{"gpt-4o": 42}}"#).unwrap();
        assert!(ModelMapping::load(wrong_types.path()).is_empty());
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"gpt-4": "upstream-pro", "claude-3": "upstream-pro"}}"#).unwrap();

        let mapping = ModelMapping::load(file.path());
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.resolve("gpt-4"), "upstream-pro");
        assert_eq!(mapping.resolve("upstream-pro"), "upstream-pro");
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a": "b"}}"#).unwrap();

        let state = shared(ModelMapping::default());
        let before = snapshot(&state).await;
        assert_eq!(reload(&state, file.path()).await, 1);

        // 旧快照不受影响
        assert_eq!(before.resolve("a"), "a");
        assert_eq!(snapshot(&state).await.resolve("a"), "b");
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let state = shared(sample());

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "{{not json").unwrap();
        assert_eq!(reload(&state, bad.path()).await, 3);
        assert_eq!(snapshot(&state).await.resolve("gpt-4o"), "upstream-large");

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(reload(&state, &dir.path().join("gone.json")).await, 3);
        assert_eq!(snapshot(&state).await.resolve("gpt-4o-mini"), "upstream-small");
    }
}
