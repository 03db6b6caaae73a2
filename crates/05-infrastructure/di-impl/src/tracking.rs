//! UI 界面跟踪
//!
//! 按界面类型记录存在、可见和暂停的界面实例，以及已知的碎片。
//! 容器不拥有这些对象的生命周期，只在转换时注入或注出它们的字段。

use dashmap::DashMap;
use di_abstractions::InjectionTarget;
use std::any::TypeId;
use std::sync::Arc;
use tracing::debug;

type Surface = Arc<dyn InjectionTarget>;

/// 界面所在的跟踪集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceSet {
    /// 已创建尚未销毁
    Existing,
    /// 可见
    Active,
    /// 已暂停
    Paused,
}

/// 界面跟踪表
#[derive(Default)]
pub struct SurfaceTracker {
    existing: DashMap<TypeId, Surface>,
    active: DashMap<TypeId, Surface>,
    paused: DashMap<TypeId, Surface>,
    fragments: DashMap<TypeId, Surface>,
}

impl SurfaceTracker {
    /// 创建空的跟踪表
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, set: SurfaceSet) -> &DashMap<TypeId, Surface> {
        match set {
            SurfaceSet::Existing => &self.existing,
            SurfaceSet::Active => &self.active,
            SurfaceSet::Paused => &self.paused,
        }
    }

    /// 加入集合，同类型的旧界面被替换
    pub fn add(&self, set: SurfaceSet, surface: Surface) {
        let surface_type = surface.target_type();
        if let Some(previous) = self.set(set).insert(surface_type.id, surface) {
            debug!(
                "界面类型 {} 已在 {:?} 集合中 (旧实例: {})",
                surface_type,
                set,
                previous.target_type()
            );
        }
        self.log_statistics();
    }

    /// 从集合移除
    pub fn remove(&self, set: SurfaceSet, surface: &Surface) {
        let surface_type = surface.target_type();
        if self.set(set).remove(&surface_type.id).is_none() {
            debug!("界面类型 {} 不在 {:?} 集合中", surface_type, set);
        }
        self.log_statistics();
    }

    /// 集合是否包含该类型的界面
    pub fn contains(&self, set: SurfaceSet, type_id: TypeId) -> bool {
        self.set(set).contains_key(&type_id)
    }

    /// 可见界面
    pub fn active(&self, type_id: TypeId) -> Option<Surface> {
        self.active.get(&type_id).map(|entry| Arc::clone(entry.value()))
    }

    /// 所有可见界面
    pub fn active_surfaces(&self) -> Vec<Surface> {
        self.active
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// 集合大小
    pub fn count(&self, set: SurfaceSet) -> usize {
        self.set(set).len()
    }

    /// 记录一个已知碎片
    pub fn add_fragment(&self, fragment: Surface) {
        let fragment_type = fragment.target_type();
        debug!("记录碎片: {}", fragment_type);
        self.fragments.insert(fragment_type.id, fragment);
    }

    /// 移除已知碎片
    pub fn remove_fragment(&self, type_id: TypeId) -> Option<Surface> {
        self.fragments.remove(&type_id).map(|(_, fragment)| fragment)
    }

    /// 所有已知碎片
    pub fn fragments(&self) -> Vec<Surface> {
        self.fragments
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// 丢弃所有已知碎片
    pub fn clear_fragments(&self) {
        self.fragments.clear();
    }

    fn log_statistics(&self) {
        debug!(
            "界面统计: 存在 {}, 可见 {}, 暂停 {}",
            self.existing.len(),
            self.active.len(),
            self.paused.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{Injectable, InjectionPoints};

    struct MainScreen;

    impl Injectable for MainScreen {
        fn injection_points() -> InjectionPoints<Self> {
            InjectionPoints::new()
        }
    }

    struct DetailScreen;

    impl Injectable for DetailScreen {
        fn injection_points() -> InjectionPoints<Self> {
            InjectionPoints::new()
        }
    }

    #[test]
    fn sets_are_keyed_by_surface_type() {
        let tracker = SurfaceTracker::new();
        let first: Surface = Arc::new(MainScreen);
        let second: Surface = Arc::new(MainScreen);

        tracker.add(SurfaceSet::Active, Arc::clone(&first));
        tracker.add(SurfaceSet::Active, Arc::clone(&second));
        tracker.add(SurfaceSet::Active, Arc::new(DetailScreen));

        assert_eq!(tracker.count(SurfaceSet::Active), 2);
        let current = tracker.active(TypeId::of::<MainScreen>()).unwrap();
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[test]
    fn removal_only_touches_one_set() {
        let tracker = SurfaceTracker::new();
        let screen: Surface = Arc::new(MainScreen);

        tracker.add(SurfaceSet::Existing, Arc::clone(&screen));
        tracker.add(SurfaceSet::Active, Arc::clone(&screen));
        tracker.remove(SurfaceSet::Active, &screen);
        tracker.remove(SurfaceSet::Paused, &screen);

        assert!(tracker.contains(SurfaceSet::Existing, TypeId::of::<MainScreen>()));
        assert!(tracker.active_surfaces().is_empty());
    }

    #[test]
    fn fragments_are_tracked_separately() {
        let tracker = SurfaceTracker::new();
        tracker.add_fragment(Arc::new(DetailScreen));

        assert_eq!(tracker.fragments().len(), 1);
        assert!(tracker.remove_fragment(TypeId::of::<DetailScreen>()).is_some());
        assert!(tracker.fragments().is_empty());
    }
}
