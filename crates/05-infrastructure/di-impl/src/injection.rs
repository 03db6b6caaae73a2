//! 按类型注入与注出
//!
//! 注入点的声明类型依次与以下来源比较：
//!
//! 1. 注册表中的类型（包括绑定的能力类型）
//! 2. 数据库句柄
//! 3. 数据库打开助手
//! 4. 平台上下文（UI 界面除外）
//! 5. 声明了该能力的受管组件，恰好一个时注入，多个时报错
//!
//! 每个注入点至多赋值一次；已赋值的字段不会因后续失败而回滚。

use crate::infrastructure::DataInfrastructure;
use data_abstractions::{DataHandle, OpenHelper};
use di_abstractions::{
    handle_of, AnyArc, BeanRegistry, InjectionTarget, PlatformContext, SlotError, SlotRef,
};
use infrastructure_common::{ContextError, InjectionError, InjectionResult, TypeInfo};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 注入目标的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// 受管组件
    Bean,
    /// UI 界面，不接收平台上下文
    Surface,
    /// 碎片
    Fragment,
    /// 上下文初始化器
    Initializer,
    /// 原型组件
    Prototype,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bean => "组件",
            Self::Surface => "界面",
            Self::Fragment => "碎片",
            Self::Initializer => "初始化器",
            Self::Prototype => "原型",
        };
        f.write_str(name)
    }
}

/// 注入引擎
///
/// 只借用容器状态，每次使用时按需创建。
pub struct InjectionEngine<'a> {
    registry: &'a dyn BeanRegistry,
    infrastructure: &'a DataInfrastructure,
    context: &'a Arc<PlatformContext>,
    timeout: Duration,
}

impl<'a> InjectionEngine<'a> {
    /// 创建注入引擎，字段锁等待时间取自平台上下文的配置
    pub fn new(
        registry: &'a dyn BeanRegistry,
        infrastructure: &'a DataInfrastructure,
        context: &'a Arc<PlatformContext>,
    ) -> Self {
        Self {
            registry,
            infrastructure,
            context,
            timeout: context.config().slot_lock_timeout(),
        }
    }

    /// 注入所有活动的受管组件（碎片除外，它们随可见界面一起注入）
    pub fn inject_all(&self) -> InjectionResult<usize> {
        let mut assigned = 0;
        for bean in self.registry.managed() {
            if bean.definition.is_fragment() {
                continue;
            }
            assigned += self.inject(bean.instance.target().as_ref(), TargetKind::Bean)?;
        }
        Ok(assigned)
    }

    /// 注入目标的全部字段，返回赋值的字段数
    pub fn inject(&self, target: &dyn InjectionTarget, kind: TargetKind) -> InjectionResult<usize> {
        let target_type = target.target_type();
        let mut assigned = 0;
        for slot_ref in target.slots() {
            let declared = slot_ref.slot.declared_type();
            let Some(handle) = self.resolve_slot(&target_type, &slot_ref, &declared, kind)? else {
                trace!("{} {} 的字段 {} 没有候选", kind, target_type, slot_ref.name);
                continue;
            };
            slot_ref
                .slot
                .assign(&handle, self.timeout)
                .map_err(|e| slot_failure(e, &target_type, &slot_ref, &declared))?;
            debug!(
                "注入 {} {}.{} <- {}",
                kind, target_type, slot_ref.name, declared
            );
            assigned += 1;
        }
        Ok(assigned)
    }

    /// 清空目标上所有可由受管组件提供的字段，返回清空的字段数
    pub fn outject(&self, target: &dyn InjectionTarget) -> InjectionResult<usize> {
        let target_type = target.target_type();
        let mut considered = 0;
        let mut cleared = 0;
        for slot_ref in target.slots() {
            let declared = slot_ref.slot.declared_type();
            if !self.registry.is_registered(declared.id) && !self.registry.is_provided(declared.id) {
                continue;
            }
            considered += 1;
            let had_value = slot_ref
                .slot
                .clear(self.timeout)
                .map_err(|e| slot_failure(e, &target_type, &slot_ref, &declared))?;
            if had_value {
                debug!("注出 {}.{}", target_type, slot_ref.name);
                cleared += 1;
            } else {
                trace!("字段已为空: {}.{}", target_type, slot_ref.name);
            }
        }
        if considered > 0 && cleared == 0 {
            warn!("注出的字段已全部为空: {}", target_type);
        }
        Ok(cleared)
    }

    fn resolve_slot(
        &self,
        target_type: &TypeInfo,
        slot_ref: &SlotRef<'_>,
        declared: &TypeInfo,
        kind: TargetKind,
    ) -> InjectionResult<Option<AnyArc>> {
        if self.registry.is_registered(declared.id) {
            return Ok(self.registry.handle(declared.id));
        }

        if declared.is::<dyn DataHandle>() {
            return self
                .infrastructure
                .connect_data_handle(self.registry)
                .map(|handle| Some(handle_of(handle)))
                .map_err(|e| infrastructure_failure(e, target_type, slot_ref));
        }

        if declared.is::<dyn OpenHelper>() {
            return self
                .infrastructure
                .connect_open_helper(self.registry)
                .map(|helper| Some(handle_of(helper)))
                .map_err(|e| infrastructure_failure(e, target_type, slot_ref));
        }

        if declared.is::<PlatformContext>() {
            return Ok((kind != TargetKind::Surface).then(|| handle_of(Arc::clone(self.context))));
        }

        let mut providers = self.registry.providers_of(declared.id);
        match providers.len() {
            0 => Ok(None),
            1 => Ok(providers.pop().map(|(_, handle)| handle)),
            _ => Err(InjectionError::Ambiguous {
                target: target_type.name.clone(),
                field: slot_ref.name.clone(),
                declared: declared.name.clone(),
                candidates: providers
                    .into_iter()
                    .map(|(provider, _)| provider.name)
                    .collect(),
            }),
        }
    }
}

fn slot_failure(
    error: SlotError,
    target_type: &TypeInfo,
    slot_ref: &SlotRef<'_>,
    declared: &TypeInfo,
) -> InjectionError {
    match error {
        SlotError::TypeMismatch => InjectionError::TypeMismatch {
            target: target_type.name.clone(),
            field: slot_ref.name.clone(),
            declared: declared.name.clone(),
        },
        SlotError::Contended => InjectionError::SlotAccess {
            target: target_type.name.clone(),
            field: slot_ref.name.clone(),
        },
    }
}

fn infrastructure_failure(
    error: ContextError,
    target_type: &TypeInfo,
    slot_ref: &SlotRef<'_>,
) -> InjectionError {
    InjectionError::Infrastructure {
        target: target_type.name.clone(),
        field: slot_ref.name.clone(),
        source: Box::new(error),
    }
}
