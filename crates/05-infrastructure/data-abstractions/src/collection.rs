//! 延迟加载集合
//!
//! [`LazyCollection`] 在第一次被访问时调用加载器，把结果追加到自己持有的序列中，
//! 之后表现为普通的可变序列，修改不会再次触发加载。加载和状态切换在同一把
//! 实例锁内完成，读者不会看到“已加载但数据为空”的中间状态。
//!
//! 同一个 [`SharedLoader`] 上建立的多个视图（包括类型转换后的 [`LazyMorphicCollection`]）
//! 共享一次加载；各自独立构造的集合互不协调。

use crate::reference::LoadState;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// 集合数据加载器
pub trait LazyLoader<T>: Send + Sync {
    /// 加载全部数据
    fn load_data(&self) -> Vec<T>;
}

impl<T, F> LazyLoader<T> for F
where
    F: Fn() -> Vec<T> + Send + Sync,
{
    fn load_data(&self) -> Vec<T> {
        self()
    }
}

struct PendingLoad<S> {
    loader: Box<dyn LazyLoader<S>>,
    data: OnceCell<Vec<S>>,
}

/// 可被多个视图共享的加载器
pub struct SharedLoader<S> {
    pending: Arc<PendingLoad<S>>,
}

impl<S> SharedLoader<S> {
    /// 包装加载器
    pub fn new(loader: impl LazyLoader<S> + 'static) -> Self {
        Self {
            pending: Arc::new(PendingLoad {
                loader: Box::new(loader),
                data: OnceCell::new(),
            }),
        }
    }

    /// 共享加载的状态
    pub fn state(&self) -> LoadState {
        if self.pending.data.get().is_some() {
            LoadState::Loaded
        } else {
            LoadState::Armed
        }
    }

    fn load(&self) -> &[S] {
        self.pending.data.get_or_init(|| {
            trace!("执行共享集合加载");
            self.pending.loader.load_data()
        })
    }
}

impl<S> Clone for SharedLoader<S> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<S> fmt::Debug for SharedLoader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLoader")
            .field("state", &self.state())
            .finish()
    }
}

enum Source<T, S> {
    Owned(Box<dyn LazyLoader<T>>),
    Shared(SharedLoader<S>, fn(&S) -> T),
    Detached,
}

struct Slot<T> {
    state: LoadState,
    data: Vec<T>,
}

/// 延迟加载集合
///
/// `S` 为加载器产出的元素类型，默认与 `T` 相同。
pub struct LazyCollection<T, S = T> {
    source: Source<T, S>,
    slot: Mutex<Slot<T>>,
}

/// 把加载器产出的 `U` 以 `T` 的形式暴露的集合视图
pub type LazyMorphicCollection<T, U> = LazyCollection<T, U>;

impl<T> LazyCollection<T> {
    /// 用加载器创建集合
    pub fn new(loader: impl LazyLoader<T> + 'static) -> Self {
        Self::armed(Source::Owned(Box::new(loader)))
    }

    /// 已经物化的集合，不会调用任何加载器
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            source: Source::Detached,
            slot: Mutex::new(Slot {
                state: LoadState::Loaded,
                data,
            }),
        }
    }
}

impl<T: Clone> LazyCollection<T> {
    /// 共享加载器上的同类型视图
    pub fn shared(loader: &SharedLoader<T>) -> Self {
        Self::armed(Source::Shared(loader.clone(), T::clone))
    }
}

impl<T, U> LazyCollection<T, U> {
    /// 共享加载器上经过类型转换的视图
    pub fn morphic(loader: &SharedLoader<U>, convert: fn(&U) -> T) -> Self {
        Self::armed(Source::Shared(loader.clone(), convert))
    }

    /// 用独立的加载器创建转换视图
    pub fn morphic_from(loader: impl LazyLoader<U> + 'static, convert: fn(&U) -> T) -> Self {
        Self::morphic(&SharedLoader::new(loader), convert)
    }

    fn armed(source: Source<T, U>) -> Self {
        Self {
            source,
            slot: Mutex::new(Slot {
                state: LoadState::Armed,
                data: Vec::new(),
            }),
        }
    }

    fn materialized(&self) -> MutexGuard<'_, Slot<T>> {
        let mut slot = self.slot.lock();
        if slot.state == LoadState::Armed {
            let loaded: Vec<T> = match &self.source {
                Source::Owned(loader) => loader.load_data(),
                Source::Shared(loader, convert) => loader.load().iter().map(convert).collect(),
                Source::Detached => Vec::new(),
            };
            trace!("延迟集合物化, 元素数: {}", loaded.len());
            slot.data.extend(loaded);
            slot.state = LoadState::Loaded;
        }
        slot
    }

    /// 当前加载状态
    pub fn state(&self) -> LoadState {
        self.slot.lock().state
    }

    /// 元素数量
    pub fn len(&self) -> usize {
        self.materialized().data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.materialized().data.is_empty()
    }

    /// 追加元素
    pub fn push(&self, item: T) {
        self.materialized().data.push(item);
    }

    /// 在指定位置插入元素
    ///
    /// # Panics
    ///
    /// `index > len` 时 panic，与 `Vec::insert` 一致。
    pub fn insert(&self, index: usize, item: T) {
        self.materialized().data.insert(index, item);
    }

    /// 替换指定位置的元素，返回旧值
    ///
    /// # Panics
    ///
    /// `index >= len` 时 panic。
    pub fn set(&self, index: usize, item: T) -> T {
        std::mem::replace(&mut self.materialized().data[index], item)
    }

    /// 移除指定位置的元素
    pub fn remove(&self, index: usize) -> Option<T> {
        let mut slot = self.materialized();
        (index < slot.data.len()).then(|| slot.data.remove(index))
    }

    /// 清空
    pub fn clear(&self) {
        self.materialized().data.clear();
    }

    /// 追加多个元素
    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.materialized().data.extend(items);
    }

    /// 只保留满足条件的元素
    pub fn retain(&self, keep: impl FnMut(&T) -> bool) {
        self.materialized().data.retain(keep);
    }

    /// 在锁内读取整个序列
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.materialized().data)
    }

    /// 在锁内修改整个序列
    pub fn write<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.materialized().data)
    }

    /// 取出全部元素
    pub fn into_vec(self) -> Vec<T> {
        drop(self.materialized());
        self.slot.into_inner().data
    }
}

impl<T: Clone, U> LazyCollection<T, U> {
    /// 读取指定位置的元素
    pub fn get(&self, index: usize) -> Option<T> {
        self.materialized().data.get(index).cloned()
    }

    /// 复制全部元素
    pub fn to_vec(&self) -> Vec<T> {
        self.materialized().data.clone()
    }

    /// 复制区间内的元素，区间越界时截断
    pub fn sub_list(&self, range: Range<usize>) -> Vec<T> {
        let slot = self.materialized();
        let end = range.end.min(slot.data.len());
        let start = range.start.min(end);
        slot.data[start..end].to_vec()
    }
}

impl<T: PartialEq, U> LazyCollection<T, U> {
    /// 是否包含元素
    pub fn contains(&self, item: &T) -> bool {
        self.materialized().data.contains(item)
    }

    /// 元素第一次出现的位置
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.materialized().data.iter().position(|x| x == item)
    }

    /// 元素最后一次出现的位置
    pub fn last_index_of(&self, item: &T) -> Option<usize> {
        self.materialized().data.iter().rposition(|x| x == item)
    }
}

impl<T: fmt::Debug, U> fmt::Debug for LazyCollection<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        match slot.state {
            LoadState::Armed => f.write_str("LazyCollection(<armed>)"),
            LoadState::Loaded => f.debug_list().entries(slot.data.iter()).finish(),
        }
    }
}
