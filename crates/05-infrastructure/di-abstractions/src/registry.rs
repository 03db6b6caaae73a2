//! 组件注册表抽象接口

use crate::context::PlatformContext;
use crate::descriptor::{Bean, BeanDefinition, BeanInstance};
use crate::factory::InstantiationStrategy;
use crate::inject::AnyArc;
use infrastructure_common::{InstantiationResult, RegistrationResult, TypeInfo};
use std::any::TypeId;
use std::sync::Arc;

/// 能力类型到实现类型的绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    /// 能力类型
    pub supertype: TypeInfo,
    /// 实现类型
    pub implementation: TypeInfo,
}

/// 受管组件：定义和它的活动实例
#[derive(Debug, Clone)]
pub struct ManagedBean {
    /// 组件定义
    pub definition: BeanDefinition,
    /// 活动实例
    pub instance: BeanInstance,
}

/// 组件注册表 trait
///
/// 每个注册的类型至多持有一个活动实例。注册只添加空条目，实例化只填充已有条目。
pub trait BeanRegistry: Send + Sync {
    /// 注册组件类型，已注册时不做任何事
    fn register(&self, definition: BeanDefinition);

    /// 注册能力类型到实现类型的绑定
    ///
    /// 实现类型没有声明该能力时失败，且注册表保持不变。
    fn register_binding(
        &self,
        supertype: TypeInfo,
        definition: BeanDefinition,
    ) -> RegistrationResult<()>;

    /// 替换能力类型的绑定，移除旧绑定和能力类型上的实例
    fn rebind(&self, supertype: TypeInfo, definition: BeanDefinition) -> RegistrationResult<()>;

    /// 类型是否已注册（包括绑定的能力类型）
    fn is_registered(&self, type_id: TypeId) -> bool;

    /// 类型当前的实例；绑定的能力类型返回实现实例
    fn get(&self, type_id: TypeId) -> Option<BeanInstance>;

    /// 类型当前实例的注入句柄，载荷为 `Arc<U>`
    fn handle(&self, type_id: TypeId) -> Option<AnyArc>;

    /// 所有是该类型或声明了该能力的活动实例的注入句柄，每个对象一次
    fn get_all_of_type(&self, type_id: TypeId) -> Vec<AnyArc>;

    /// 声明了该能力的活动实例及其类型，每个对象一次
    fn providers_of(&self, type_id: TypeId) -> Vec<(TypeInfo, AnyArc)>;

    /// 是否有已注册的定义声明了该能力
    fn is_provided(&self, type_id: TypeId) -> bool;

    /// 按注册顺序实例化所有空条目，返回新创建的组件
    ///
    /// 构造函数在注册表锁之外执行。
    fn instantiate_all(
        &self,
        strategy: &dyn InstantiationStrategy,
        context: &Arc<PlatformContext>,
    ) -> InstantiationResult<Vec<ManagedBean>>;

    /// 按注册顺序列出活动组件，每个对象一次
    fn managed(&self) -> Vec<ManagedBean>;

    /// 清空条目中的实例，保留注册，返回被移除的组件
    fn remove_instance(&self, type_id: TypeId) -> Option<ManagedBean>;

    /// 清空所有实例，保留注册，返回被移除的组件
    fn clear_instances(&self) -> Vec<ManagedBean>;

    /// 注册的定义，按注册顺序
    fn definitions(&self) -> Vec<BeanDefinition>;

    /// 当前的绑定
    fn bindings(&self) -> Vec<InterfaceBinding>;
}

/// 注册表的强类型扩展
pub trait BeanRegistryExt: BeanRegistry {
    /// 注册组件类型
    fn register_bean<T: Bean>(&self) {
        self.register(T::definition());
    }

    /// 注册预先创建的单例，实例化时直接使用该实例
    fn register_instance<T: Bean>(&self, instance: Arc<T>) {
        self.register(T::descriptor().build_with_instance(instance));
    }

    /// 绑定能力类型 `S` 到实现 `T`
    fn bind<S: ?Sized + 'static, T: Bean>(&self) -> RegistrationResult<()> {
        self.register_binding(TypeInfo::of::<S>(), T::definition())
    }

    /// 解析类型 `U` 的当前实例
    fn resolve<U: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<U>> {
        self.handle(TypeId::of::<U>())
            .and_then(|handle| handle.downcast_ref::<Arc<U>>().cloned())
    }
}

impl<R: BeanRegistry + ?Sized> BeanRegistryExt for R {}
