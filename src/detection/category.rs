// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 类别过滤 (Category allow-list)
//!
//! 用户可随时整体替换允许的类别集合. 每一帧在解析开始时取一次快照,
//! 替换只对下一帧可见.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// 界面上提供的默认类别
pub const DEFAULT_CATEGORIES: [&str; 5] =
    ["Stair", "door", "exit sign", "men restroom", "women restroom"];

/// 类别名规范化: 空白 → 下划线, 转小写
pub fn normalize_category(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// 已规范化的类别集合; 空集合表示不过滤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySelection {
    names: HashSet<String>,
}

impl CategorySelection {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize_category(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// 不过滤
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 标签是否允许通过 (标签先规范化再比较)
    pub fn allows(&self, label: &str) -> bool {
        self.names.is_empty() || self.names.contains(&normalize_category(label))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// 跨线程共享的类别集合
///
/// UI 线程调用 [`SharedCategories::replace`], 工作线程每帧调用
/// [`SharedCategories::snapshot`]. 锁内只交换 `Arc`, 不会阻塞推理.
#[derive(Debug, Clone, Default)]
pub struct SharedCategories {
    inner: Arc<RwLock<Arc<CategorySelection>>>,
}

impl SharedCategories {
    pub fn new(selection: CategorySelection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(selection))),
        }
    }

    pub fn snapshot(&self) -> Arc<CategorySelection> {
        // 锁内只有一次 Arc 赋值, 中毒时数据依然完整
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, selection: CategorySelection) {
        log::debug!("类别过滤更新: {} 项", selection.len());
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(selection);
    }

    /// 规范化后整体替换
    pub fn set_selected<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.replace(CategorySelection::new(names));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_category("exit sign"), "exit_sign");
        assert_eq!(normalize_category("Men Restroom"), "men_restroom");
        assert_eq!(normalize_category("  Stair "), "stair");
        assert_eq!(normalize_category("door"), "door");
    }

    #[test]
    fn test_empty_selection_allows_everything() {
        let sel = CategorySelection::all();
        for label in ["door", "exit sign", "anything", ""] {
            assert!(sel.allows(label));
        }
    }

    #[test]
    fn test_selection_filters_by_normalized_label() {
        let sel = CategorySelection::new(["Exit Sign", "door"]);
        assert_eq!(sel.len(), 2);
        assert!(sel.allows("exit sign"));
        assert!(sel.allows("exit_sign"));
        assert!(sel.allows("Door"));
        assert!(!sel.allows("stair"));
    }

    #[test]
    fn test_default_categories_normalize() {
        let sel = CategorySelection::new(DEFAULT_CATEGORIES);
        let mut names: Vec<_> = sel.names().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["door", "exit_sign", "men_restroom", "stair", "women_restroom"]
        );
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_swap() {
        let shared = SharedCategories::new(CategorySelection::new(["door"]));
        let before = shared.snapshot();
        shared.set_selected(["stair"]);
        let after = shared.snapshot();

        assert!(before.allows("door"));
        assert!(!before.allows("stair"));
        assert!(after.allows("stair"));
        assert!(!after.allows("door"));
    }

    #[test]
    fn test_swap_from_other_thread() {
        let shared = SharedCategories::default();
        let ui = shared.clone();
        std::thread::spawn(move || ui.set_selected(["door"]))
            .join()
            .unwrap();
        assert!(!shared.snapshot().allows("stair"));
    }
}
