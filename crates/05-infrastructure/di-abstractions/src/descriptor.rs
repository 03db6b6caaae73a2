//! 组件描述
//!
//! [`BeanDescriptor`] 是组件作者编写的强类型描述：构造方式、对外声明的能力类型、
//! 生命周期回调。注册时被擦除为 [`BeanDefinition`]，容器只处理擦除后的定义。

use crate::context::PlatformContext;
use crate::inject::{handle_of, AnyArc, Injectable, InjectionTarget};
use infrastructure_common::{BoxError, PostConstruct, PreDestroy, TypeInfo};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

type DefaultCtor = Arc<dyn Fn() -> Result<BeanInstance, BoxError> + Send + Sync>;
type ContextCtor =
    Arc<dyn Fn(&Arc<PlatformContext>) -> Result<BeanInstance, BoxError> + Send + Sync>;
type Hook = Arc<dyn Fn(&BeanInstance) -> Result<(), BoxError> + Send + Sync>;
type Caster = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// 一个活动的组件实例
#[derive(Clone)]
pub struct BeanInstance {
    type_info: TypeInfo,
    object: AnyArc,
    target: Arc<dyn InjectionTarget>,
    handle: AnyArc,
}

impl BeanInstance {
    /// 包装一个共享实例
    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            object: Arc::clone(&instance) as AnyArc,
            target: Arc::clone(&instance) as Arc<dyn InjectionTarget>,
            handle: handle_of(instance),
        }
    }

    /// 实例类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 可向下转型的实例
    pub fn object(&self) -> &AnyArc {
        &self.object
    }

    /// 注入目标视图
    pub fn target(&self) -> &Arc<dyn InjectionTarget> {
        &self.target
    }

    /// 以自身类型注入时使用的句柄
    pub fn handle(&self) -> &AnyArc {
        &self.handle
    }

    /// 向下转型为具体类型
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }

    /// 两个实例是否为同一个对象
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for BeanInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanInstance")
            .field("type", &self.type_info.name)
            .finish()
    }
}

/// 组件声明的能力类型
#[derive(Clone)]
pub struct Capability {
    type_info: TypeInfo,
    cast: Caster,
}

impl Capability {
    /// 能力类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 把实例转换为该能力类型的注入句柄
    pub fn cast(&self, instance: &BeanInstance) -> Option<AnyArc> {
        (self.cast)(instance.object())
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_info.name)
    }
}

/// 强类型的组件描述
pub struct BeanDescriptor<T> {
    default_ctor: Option<Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>>,
    context_ctor: Option<Arc<dyn Fn(&Arc<PlatformContext>) -> Result<T, BoxError> + Send + Sync>>,
    capabilities: Vec<Capability>,
    post_construct: Option<fn(&T) -> Result<(), BoxError>>,
    pre_destroy: Option<fn(&T) -> Result<(), BoxError>>,
    fragment: bool,
}

impl<T: Injectable> BeanDescriptor<T> {
    /// 空描述：没有构造函数、能力或回调
    pub fn new() -> Self {
        Self {
            default_ctor: None,
            context_ctor: None,
            capabilities: Vec::new(),
            post_construct: None,
            pre_destroy: None,
            fragment: false,
        }
    }

    /// 无参构造函数
    #[must_use]
    pub fn constructor(self, ctor: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.try_constructor(move || Ok(ctor()))
    }

    /// 可能失败的无参构造函数
    #[must_use]
    pub fn try_constructor(
        mut self,
        ctor: impl Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.default_ctor = Some(Arc::new(ctor));
        self
    }

    /// 使用 `Default` 作为无参构造函数
    #[must_use]
    pub fn with_default(self) -> Self
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    /// 接收平台上下文的构造函数，优先级低于无参构造函数
    #[must_use]
    pub fn context_constructor(
        mut self,
        ctor: impl Fn(&Arc<PlatformContext>) -> T + Send + Sync + 'static,
    ) -> Self {
        self.context_ctor = Some(Arc::new(move |ctx| Ok(ctor(ctx))));
        self
    }

    /// 声明实例满足能力类型 `S`，通常是 `dyn Trait`
    #[must_use]
    pub fn provides<S>(mut self, cast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let type_info = TypeInfo::of::<S>();
        if type_info.is::<T>() || self.capabilities.iter().any(|c| c.type_info == type_info) {
            return self;
        }
        self.capabilities.push(Capability {
            type_info,
            cast: Arc::new(move |object: &AnyArc| {
                Arc::clone(object)
                    .downcast::<T>()
                    .ok()
                    .map(|concrete| handle_of(cast(concrete)))
            }),
        });
        self
    }

    /// 启动序列中调用 [`PostConstruct`]
    #[must_use]
    pub fn post_construct(mut self) -> Self
    where
        T: PostConstruct,
    {
        self.post_construct = Some(<T as PostConstruct>::post_construct);
        self
    }

    /// 关闭序列中调用 [`PreDestroy`]
    #[must_use]
    pub fn pre_destroy(mut self) -> Self
    where
        T: PreDestroy,
    {
        self.pre_destroy = Some(<T as PreDestroy>::pre_destroy);
        self
    }

    /// 标记为碎片：随可见界面一起注入，注入失败时被丢弃
    #[must_use]
    pub fn fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    /// 擦除为容器使用的定义
    pub fn build(self) -> BeanDefinition {
        let default_ctor = self.default_ctor.map(|ctor| -> DefaultCtor {
            Arc::new(move || ctor().map(|bean| BeanInstance::from_arc(Arc::new(bean))))
        });
        let context_ctor = self.context_ctor.map(|ctor| -> ContextCtor {
            Arc::new(move |ctx| ctor(ctx).map(|bean| BeanInstance::from_arc(Arc::new(bean))))
        });

        BeanDefinition {
            type_info: TypeInfo::of::<T>(),
            default_ctor,
            context_ctor,
            capabilities: self.capabilities,
            post_construct: self.post_construct.map(typed_hook::<T>),
            pre_destroy: self.pre_destroy.map(typed_hook::<T>),
            fragment: self.fragment,
        }
    }

    /// 擦除为定义，构造函数始终返回同一个预先创建的实例
    pub fn build_with_instance(self, instance: Arc<T>) -> BeanDefinition {
        let mut definition = self.build();
        definition.default_ctor = Some(Arc::new(move || {
            Ok(BeanInstance::from_arc(Arc::clone(&instance)))
        }));
        definition.context_ctor = None;
        definition
    }
}

impl<T: Injectable> Default for BeanDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn typed_hook<T: Injectable>(hook: fn(&T) -> Result<(), BoxError>) -> Hook {
    Arc::new(move |instance: &BeanInstance| match instance.downcast::<T>() {
        Some(bean) => hook(&bean),
        None => Ok(()),
    })
}

/// 由容器管理的组件
pub trait Bean: Injectable + Sized {
    /// 组件描述
    fn descriptor() -> BeanDescriptor<Self>;

    /// 擦除后的定义
    fn definition() -> BeanDefinition {
        Self::descriptor().build()
    }
}

/// 类型擦除后的组件定义
#[derive(Clone)]
pub struct BeanDefinition {
    type_info: TypeInfo,
    default_ctor: Option<DefaultCtor>,
    context_ctor: Option<ContextCtor>,
    capabilities: Vec<Capability>,
    post_construct: Option<Hook>,
    pre_destroy: Option<Hook>,
    fragment: bool,
}

impl BeanDefinition {
    /// 组件类型
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    /// 组件类型ID
    pub fn type_id(&self) -> TypeId {
        self.type_info.id
    }

    /// 是否有无参构造函数
    pub fn has_default_constructor(&self) -> bool {
        self.default_ctor.is_some()
    }

    /// 是否有上下文构造函数
    pub fn has_context_constructor(&self) -> bool {
        self.context_ctor.is_some()
    }

    /// 调用无参构造函数
    pub fn construct_default(&self) -> Option<Result<BeanInstance, BoxError>> {
        self.default_ctor.as_ref().map(|ctor| ctor())
    }

    /// 调用上下文构造函数
    pub fn construct_with_context(
        &self,
        context: &Arc<PlatformContext>,
    ) -> Option<Result<BeanInstance, BoxError>> {
        self.context_ctor.as_ref().map(|ctor| ctor(context))
    }

    /// 声明的能力类型
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// 是否声明了能力类型
    pub fn provides(&self, type_id: TypeId) -> bool {
        self.capabilities.iter().any(|c| c.type_info.id == type_id)
    }

    /// 实例是否可以作为 `type_id` 类型注入
    pub fn satisfies(&self, type_id: TypeId) -> bool {
        self.type_info.id == type_id || self.provides(type_id)
    }

    /// 为 `type_id` 类型构造实例的注入句柄
    pub fn handle_for(&self, instance: &BeanInstance, type_id: TypeId) -> Option<AnyArc> {
        if self.type_info.id == type_id {
            return Some(Arc::clone(instance.handle()));
        }
        self.capabilities
            .iter()
            .find(|c| c.type_info.id == type_id)
            .and_then(|c| c.cast(instance))
    }

    /// 是否有初始化回调
    pub fn has_post_construct(&self) -> bool {
        self.post_construct.is_some()
    }

    /// 执行初始化回调
    pub fn run_post_construct(&self, instance: &BeanInstance) -> Result<(), BoxError> {
        self.post_construct
            .as_ref()
            .map_or(Ok(()), |hook| hook(instance))
    }

    /// 执行销毁回调
    pub fn run_pre_destroy(&self, instance: &BeanInstance) -> Result<(), BoxError> {
        self.pre_destroy
            .as_ref()
            .map_or(Ok(()), |hook| hook(instance))
    }

    /// 是否为碎片
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("type", &self.type_info.name)
            .field("default_ctor", &self.has_default_constructor())
            .field("context_ctor", &self.has_context_constructor())
            .field("capabilities", &self.capabilities)
            .field("fragment", &self.fragment)
            .finish()
    }
}
