//! 实体引用
//!
//! [`LazyReference`] 在第一次访问时通过 [`ReferenceLoader`] 加载目标实体，
//! 加载只执行一次：并发访问的线程阻塞等待同一次加载完成并得到同一个 `Arc`。
//! 加载器 panic 时记录错误并按目标不存在处理，之后不再重新加载。

use crate::model::Entity;
use once_cell::sync::OnceCell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

/// 加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// 尚未加载
    Armed,
    /// 已加载
    Loaded,
}

/// 引用目标的加载器
pub trait ReferenceLoader<T>: Send + Sync {
    /// 加载目标实体，不存在时返回 `None`
    fn load_object(&self) -> Option<T>;

    /// 目标实体的主键，不触发加载
    fn id(&self) -> Option<i64>;
}

/// 基于闭包的加载器
pub struct FnReferenceLoader<T, F> {
    id: Option<i64>,
    load: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> FnReferenceLoader<T, F>
where
    F: Fn() -> Option<T> + Send + Sync,
{
    /// 创建加载器
    pub fn new(id: Option<i64>, load: F) -> Self {
        Self {
            id,
            load,
            _marker: PhantomData,
        }
    }
}

impl<T, F> ReferenceLoader<T> for FnReferenceLoader<T, F>
where
    F: Fn() -> Option<T> + Send + Sync,
{
    fn load_object(&self) -> Option<T> {
        (self.load)()
    }

    fn id(&self) -> Option<i64> {
        self.id
    }
}

/// 实体引用
pub trait Reference<T>: Send + Sync {
    /// 引用的实体
    fn object(&self) -> Option<Arc<T>>;

    /// 引用实体的主键
    fn object_ref_id(&self) -> Option<i64>;
}

/// 延迟加载的引用
pub struct LazyReference<T> {
    loader: Box<dyn ReferenceLoader<T>>,
    value: OnceCell<Option<Arc<T>>>,
}

impl<T> LazyReference<T> {
    /// 用加载器创建引用
    pub fn new(loader: impl ReferenceLoader<T> + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            value: OnceCell::new(),
        }
    }

    /// 当前加载状态
    pub fn state(&self) -> LoadState {
        if self.value.get().is_some() {
            LoadState::Loaded
        } else {
            LoadState::Armed
        }
    }
}

impl<T: Send + Sync> Reference<T> for LazyReference<T> {
    fn object(&self) -> Option<Arc<T>> {
        self.value
            .get_or_init(|| {
                trace!("加载延迟引用: {:?}", self.loader.id());
                match catch_unwind(AssertUnwindSafe(|| self.loader.load_object())) {
                    Ok(object) => object.map(Arc::new),
                    Err(_) => {
                        error!("延迟引用加载器 panic: id={:?}", self.loader.id());
                        None
                    }
                }
            })
            .clone()
    }

    fn object_ref_id(&self) -> Option<i64> {
        self.loader.id()
    }
}

impl<T> fmt::Debug for LazyReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReference")
            .field("id", &self.loader.id())
            .field("state", &self.state())
            .finish()
    }
}

/// 空引用
pub struct NullReference<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NullReference<T> {
    /// 创建空引用
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NullReference<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for NullReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NullReference")
    }
}

impl<T> Reference<T> for NullReference<T> {
    fn object(&self) -> Option<Arc<T>> {
        None
    }

    fn object_ref_id(&self) -> Option<i64> {
        None
    }
}

/// 直接持有实体的引用
#[derive(Debug)]
pub struct ObjectReference<T> {
    object: Option<Arc<T>>,
}

impl<T> ObjectReference<T> {
    /// 引用给定实体
    pub fn new(object: T) -> Self {
        Self {
            object: Some(Arc::new(object)),
        }
    }

    /// 引用共享实体
    pub fn from_arc(object: Arc<T>) -> Self {
        Self {
            object: Some(object),
        }
    }

    /// 替换引用目标
    pub fn set_object(&mut self, object: Option<T>) {
        self.object = object.map(Arc::new);
    }
}

impl<T> Clone for ObjectReference<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
        }
    }
}

impl<T: Entity> Reference<T> for ObjectReference<T> {
    fn object(&self) -> Option<Arc<T>> {
        self.object.clone()
    }

    fn object_ref_id(&self) -> Option<i64> {
        self.object.as_ref().and_then(|o| o.id())
    }
}
