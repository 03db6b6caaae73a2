//! 组件注册表实现

use di_abstractions::{
    AnyArc, BeanDefinition, BeanInstance, BeanRegistry, InstantiationStrategy, InterfaceBinding,
    ManagedBean, PlatformContext,
};
use infrastructure_common::{InstantiationResult, RegistrationError, RegistrationResult, TypeInfo};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 条目的来源
#[derive(Clone)]
enum Source {
    /// 直接注册的组件类型
    Definition(BeanDefinition),
    /// 能力类型，实例来自实现类型的条目
    Binding(TypeId),
}

struct Entry {
    type_info: TypeInfo,
    source: Source,
    instance: Option<BeanInstance>,
    handle: Option<AnyArc>,
}

impl Entry {
    fn new(type_info: TypeInfo, source: Source) -> Self {
        Self {
            type_info,
            source,
            instance: None,
            handle: None,
        }
    }

    fn clear(&mut self) -> Option<BeanInstance> {
        self.handle = None;
        self.instance.take()
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<TypeId, Entry>,
    order: Vec<TypeId>,
}

impl State {
    fn insert_if_absent(&mut self, type_info: TypeInfo, source: Source) -> bool {
        if self.entries.contains_key(&type_info.id) {
            return false;
        }
        self.order.push(type_info.id);
        self.entries
            .insert(type_info.id, Entry::new(type_info, source));
        true
    }

    fn definition(&self, type_id: TypeId) -> Option<&BeanDefinition> {
        match &self.entries.get(&type_id)?.source {
            Source::Definition(definition) => Some(definition),
            Source::Binding(_) => None,
        }
    }

    /// 按注册顺序的活动组件，绑定条目与实现共享对象，不重复列出
    fn managed(&self) -> Vec<ManagedBean> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .filter_map(|entry| match (&entry.source, &entry.instance) {
                (Source::Definition(definition), Some(instance)) => Some(ManagedBean {
                    definition: definition.clone(),
                    instance: instance.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// 默认的组件注册表
///
/// 所有条目位于一个读写锁之后；构造函数在锁外执行。
#[derive(Default)]
pub struct BeanRegistryImpl {
    state: RwLock<State>,
}

impl BeanRegistryImpl {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册条目数量（包括能力类型）
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// 是否没有任何注册
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    fn check_compatible(supertype: &TypeInfo, definition: &BeanDefinition) -> RegistrationResult<()> {
        if definition.satisfies(supertype.id) {
            Ok(())
        } else {
            Err(RegistrationError::IncompatibleTypes {
                supertype: supertype.name.clone(),
                implementation: definition.type_info().name.clone(),
            })
        }
    }

    fn bind_unchecked(state: &mut State, supertype: TypeInfo, definition: BeanDefinition) {
        let implementation = definition.type_id();
        let impl_name = definition.type_info().name.clone();
        state.insert_if_absent(definition.type_info().clone(), Source::Definition(definition));
        if supertype.id == implementation {
            return;
        }

        match state.entries.get_mut(&supertype.id) {
            Some(entry) => {
                if !matches!(entry.source, Source::Binding(id) if id == implementation) {
                    entry.source = Source::Binding(implementation);
                    entry.clear();
                }
            }
            None => {
                state.insert_if_absent(supertype.clone(), Source::Binding(implementation));
            }
        }
        info!("注册绑定: {} -> {}", supertype, impl_name);
    }
}

impl BeanRegistry for BeanRegistryImpl {
    fn register(&self, definition: BeanDefinition) {
        let name = definition.type_info().name.clone();
        let mut state = self.state.write();
        if state.insert_if_absent(definition.type_info().clone(), Source::Definition(definition)) {
            info!("注册组件: {}", name);
        } else {
            debug!("组件已注册，忽略: {}", name);
        }
    }

    fn register_binding(
        &self,
        supertype: TypeInfo,
        definition: BeanDefinition,
    ) -> RegistrationResult<()> {
        Self::check_compatible(&supertype, &definition)?;
        let mut state = self.state.write();
        Self::bind_unchecked(&mut state, supertype, definition);
        Ok(())
    }

    fn rebind(&self, supertype: TypeInfo, definition: BeanDefinition) -> RegistrationResult<()> {
        Self::check_compatible(&supertype, &definition)?;
        let mut state = self.state.write();
        if let Some(entry) = state.entries.get_mut(&supertype.id) {
            if matches!(entry.source, Source::Binding(_)) {
                debug!("移除旧绑定: {}", supertype);
                entry.clear();
            }
        }
        Self::bind_unchecked(&mut state, supertype, definition);
        Ok(())
    }

    fn is_registered(&self, type_id: TypeId) -> bool {
        self.state.read().entries.contains_key(&type_id)
    }

    fn get(&self, type_id: TypeId) -> Option<BeanInstance> {
        self.state.read().entries.get(&type_id)?.instance.clone()
    }

    fn handle(&self, type_id: TypeId) -> Option<AnyArc> {
        self.state.read().entries.get(&type_id)?.handle.clone()
    }

    fn get_all_of_type(&self, type_id: TypeId) -> Vec<AnyArc> {
        self.state
            .read()
            .managed()
            .into_iter()
            .filter(|bean| bean.definition.satisfies(type_id))
            .filter_map(|bean| bean.definition.handle_for(&bean.instance, type_id))
            .collect()
    }

    fn providers_of(&self, type_id: TypeId) -> Vec<(TypeInfo, AnyArc)> {
        self.state
            .read()
            .managed()
            .into_iter()
            .filter(|bean| bean.definition.provides(type_id))
            .filter_map(|bean| {
                let handle = bean.definition.handle_for(&bean.instance, type_id)?;
                Some((bean.definition.type_info().clone(), handle))
            })
            .collect()
    }

    fn is_provided(&self, type_id: TypeId) -> bool {
        self.state.read().entries.values().any(|entry| match &entry.source {
            Source::Definition(definition) => definition.provides(type_id),
            Source::Binding(_) => false,
        })
    }

    fn instantiate_all(
        &self,
        strategy: &dyn InstantiationStrategy,
        context: &Arc<PlatformContext>,
    ) -> InstantiationResult<Vec<ManagedBean>> {
        let pending: Vec<BeanDefinition> = {
            let state = self.state.read();
            state
                .order
                .iter()
                .filter_map(|id| state.entries.get(id))
                .filter(|entry| entry.instance.is_none())
                .filter_map(|entry| match &entry.source {
                    Source::Definition(definition) => Some(definition.clone()),
                    Source::Binding(_) => None,
                })
                .collect()
        };

        let mut created: Vec<ManagedBean> = Vec::new();
        for definition in pending {
            let instance = match strategy.instantiate(&definition, context) {
                Ok(instance) => instance,
                Err(e) => {
                    warn!(
                        "实例化 {} 失败, 回滚本次新建的 {} 个组件",
                        definition.type_info(),
                        created.len()
                    );
                    for bean in &created {
                        self.remove_instance(bean.definition.type_id());
                    }
                    return Err(e);
                }
            };
            let mut state = self.state.write();
            let Some(entry) = state.entries.get_mut(&definition.type_id()) else {
                continue;
            };
            if entry.instance.is_some() {
                continue;
            }
            debug!("实例化组件: {} ({})", definition.type_info(), strategy.name());
            entry.handle = Some(Arc::clone(instance.handle()));
            entry.instance = Some(instance.clone());
            created.push(ManagedBean {
                definition,
                instance,
            });
        }

        let mut state = self.state.write();
        let unbound: Vec<(TypeId, TypeId)> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.instance.is_none())
            .filter_map(|(id, entry)| match entry.source {
                Source::Binding(implementation) => Some((*id, implementation)),
                Source::Definition(_) => None,
            })
            .collect();
        for (supertype, implementation) in unbound {
            let resolved = state.definition(implementation).and_then(|definition| {
                let instance = state.entries.get(&implementation)?.instance.clone()?;
                let handle = definition.handle_for(&instance, supertype)?;
                Some((instance, handle))
            });
            if let (Some((instance, handle)), Some(entry)) =
                (resolved, state.entries.get_mut(&supertype))
            {
                debug!("绑定实例: {} -> {}", entry.type_info, instance.type_info());
                entry.instance = Some(instance);
                entry.handle = Some(handle);
            }
        }

        Ok(created)
    }

    fn managed(&self) -> Vec<ManagedBean> {
        self.state.read().managed()
    }

    fn remove_instance(&self, type_id: TypeId) -> Option<ManagedBean> {
        let mut state = self.state.write();
        let definition = state.definition(type_id).cloned();
        let instance = state.entries.get_mut(&type_id)?.clear()?;
        for entry in state.entries.values_mut() {
            if matches!(entry.source, Source::Binding(id) if id == type_id) {
                entry.clear();
            }
        }
        definition.map(|definition| ManagedBean {
            definition,
            instance,
        })
    }

    fn clear_instances(&self) -> Vec<ManagedBean> {
        let mut state = self.state.write();
        let removed = state.managed();
        for entry in state.entries.values_mut() {
            entry.clear();
        }
        removed
    }

    fn definitions(&self) -> Vec<BeanDefinition> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.definition(*id).cloned())
            .collect()
    }

    fn bindings(&self) -> Vec<InterfaceBinding> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .filter_map(|entry| match entry.source {
                Source::Binding(implementation) => Some(InterfaceBinding {
                    supertype: entry.type_info.clone(),
                    implementation: state.entries.get(&implementation)?.type_info.clone(),
                }),
                Source::Definition(_) => None,
            })
            .collect()
    }
}
