//! 注入字段与注入元数据表
//!
//! 组件通过 [`Inject`] 字段声明依赖，并通过 [`Injectable::injection_points`]
//! 列出全部注入点（包括内嵌“父结构”的注入点）。容器按字段声明的类型匹配实例。

use infrastructure_common::{InjectionError, InjectionResult, TypeInfo};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 类型擦除后的共享实例
///
/// 作为注入句柄使用时，其内部载荷总是 `Arc<U>`，`U` 为注入点声明的类型。
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// 字段访问错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    #[error("注入句柄类型不匹配")]
    TypeMismatch,

    #[error("获取字段锁超时")]
    Contended,
}

/// 注入字段
///
/// 容器可能在任何停止/暂停转换时清空字段，使用方每次访问都应重新读取。
pub struct Inject<U: ?Sized> {
    value: RwLock<Option<Arc<U>>>,
}

impl<U: ?Sized> Inject<U> {
    /// 创建空字段
    pub const fn empty() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// 当前注入的实例
    pub fn get(&self) -> Option<Arc<U>> {
        self.value.read().clone()
    }

    /// 是否已注入
    pub fn is_injected(&self) -> bool {
        self.value.read().is_some()
    }
}

impl<U: ?Sized + 'static> Inject<U> {
    /// 当前注入的实例，未注入时返回错误
    pub fn require(&self) -> InjectionResult<Arc<U>> {
        self.get().ok_or_else(|| InjectionError::NotInjected {
            declared: TypeInfo::of::<U>().name,
        })
    }

    /// 手动设置实例，用于原型组件和测试
    pub fn set(&self, value: Arc<U>) {
        *self.value.write() = Some(value);
    }
}

impl<U: ?Sized> Default for Inject<U> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<U: ?Sized> fmt::Debug for Inject<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("injected", &self.is_injected())
            .finish()
    }
}

/// 类型擦除后的注入字段
pub trait InjectSlot: Send + Sync {
    /// 字段声明的类型
    fn declared_type(&self) -> TypeInfo;

    /// 用句柄赋值，句柄载荷必须为 `Arc<U>`
    fn assign(&self, handle: &AnyArc, timeout: Duration) -> Result<(), SlotError>;

    /// 清空字段，返回字段之前是否有值
    fn clear(&self, timeout: Duration) -> Result<bool, SlotError>;

    /// 是否已注入
    fn is_filled(&self) -> bool;
}

impl<U: ?Sized + Send + Sync + 'static> InjectSlot for Inject<U> {
    fn declared_type(&self) -> TypeInfo {
        TypeInfo::of::<U>()
    }

    fn assign(&self, handle: &AnyArc, timeout: Duration) -> Result<(), SlotError> {
        let value = handle
            .downcast_ref::<Arc<U>>()
            .ok_or(SlotError::TypeMismatch)?;
        let mut guard = self
            .value
            .try_write_for(timeout)
            .ok_or(SlotError::Contended)?;
        *guard = Some(Arc::clone(value));
        Ok(())
    }

    fn clear(&self, timeout: Duration) -> Result<bool, SlotError> {
        let mut guard = self
            .value
            .try_write_for(timeout)
            .ok_or(SlotError::Contended)?;
        Ok(guard.take().is_some())
    }

    fn is_filled(&self) -> bool {
        self.is_injected()
    }
}

/// 为声明类型 `U` 构造注入句柄
pub fn handle_of<U: ?Sized + Send + Sync + 'static>(value: Arc<U>) -> AnyArc {
    Arc::new(value)
}

trait SlotAccess<T>: Send + Sync {
    fn slot<'a>(&self, target: &'a T) -> &'a dyn InjectSlot;
}

struct FieldAccess<T, U: ?Sized> {
    access: fn(&T) -> &Inject<U>,
}

impl<T, U> SlotAccess<T> for FieldAccess<T, U>
where
    U: ?Sized + Send + Sync + 'static,
{
    fn slot<'a>(&self, target: &'a T) -> &'a dyn InjectSlot {
        (self.access)(target)
    }
}

struct InheritedAccess<T, B> {
    project: fn(&T) -> &B,
    inner: Arc<dyn SlotAccess<B>>,
}

impl<T, B> SlotAccess<T> for InheritedAccess<T, B>
where
    B: 'static,
{
    fn slot<'a>(&self, target: &'a T) -> &'a dyn InjectSlot {
        self.inner.slot((self.project)(target))
    }
}

struct InjectionPoint<T> {
    name: String,
    declared: TypeInfo,
    access: Arc<dyn SlotAccess<T>>,
}

/// 一个类型的全部注入点
pub struct InjectionPoints<T> {
    points: Vec<InjectionPoint<T>>,
}

impl<T: 'static> InjectionPoints<T> {
    /// 创建空的注入点表
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// 声明一个注入字段
    #[must_use]
    pub fn slot<U>(mut self, name: &str, access: fn(&T) -> &Inject<U>) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
    {
        self.points.push(InjectionPoint {
            name: name.to_string(),
            declared: TypeInfo::of::<U>(),
            access: Arc::new(FieldAccess { access }),
        });
        self
    }

    /// 继承内嵌结构的全部注入点，字段名以 `prefix.` 开头
    #[must_use]
    pub fn inherit<B: Injectable>(mut self, prefix: &str, project: fn(&T) -> &B) -> Self {
        for point in B::injection_points().points {
            self.points.push(InjectionPoint {
                name: format!("{prefix}.{}", point.name),
                declared: point.declared,
                access: Arc::new(InheritedAccess {
                    project,
                    inner: point.access,
                }),
            });
        }
        self
    }

    /// 注入点数量
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有注入点
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 注入点名称和声明类型
    pub fn describe(&self) -> Vec<(&str, &TypeInfo)> {
        self.points
            .iter()
            .map(|p| (p.name.as_str(), &p.declared))
            .collect()
    }

    /// 在目标实例上解析全部注入字段
    pub fn resolve<'a>(&self, target: &'a T) -> Vec<SlotRef<'a>> {
        self.points
            .iter()
            .map(|p| SlotRef {
                name: p.name.clone(),
                slot: p.access.slot(target),
            })
            .collect()
    }
}

impl<T: 'static> Default for InjectionPoints<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 目标实例上的一个注入字段
pub struct SlotRef<'a> {
    /// 字段名
    pub name: String,
    /// 字段
    pub slot: &'a dyn InjectSlot,
}

impl fmt::Debug for SlotRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotRef")
            .field("name", &self.name)
            .field("declared", &self.slot.declared_type().name)
            .field("filled", &self.slot.is_filled())
            .finish()
    }
}

/// 可注入类型
///
/// 通常通过 `#[derive(Injectable)]` 生成。
pub trait Injectable: Send + Sync + 'static {
    /// 注入点表
    fn injection_points() -> InjectionPoints<Self>
    where
        Self: Sized;
}

/// 对象安全的注入目标
///
/// 所有 [`Injectable`] 类型自动实现；容器用它统一处理组件、UI 界面和碎片。
pub trait InjectionTarget: Send + Sync {
    /// 目标类型
    fn target_type(&self) -> TypeInfo;

    /// 目标上的全部注入字段
    fn slots(&self) -> Vec<SlotRef<'_>>;

    /// 转为可向下转型的共享实例
    fn into_any(self: Arc<Self>) -> AnyArc;

    /// 以自身类型注入时使用的句柄
    fn into_handle(self: Arc<Self>) -> AnyArc;
}

impl<T: Injectable> InjectionTarget for T {
    fn target_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn slots(&self) -> Vec<SlotRef<'_>> {
        T::injection_points().resolve(self)
    }

    fn into_any(self: Arc<Self>) -> AnyArc {
        self
    }

    fn into_handle(self: Arc<Self>) -> AnyArc {
        handle_of(self)
    }
}
