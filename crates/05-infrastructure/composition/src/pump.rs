//! 界面事件泵
//!
//! UI 线程通过 [`SurfaceEventSender`] 投递界面事件，泵在一个异步任务中
//! 按到达顺序逐个交给容器注册的回调处理。

use di_abstractions::{
    InjectionTarget, LifecycleSource, SurfaceEvent, SurfaceLifecycleCallbacks,
};
use infrastructure_common::ContainerResult;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

type Envelope = (SurfaceEvent, Arc<dyn InjectionTarget>);

/// 界面事件发送端
#[derive(Clone)]
pub struct SurfaceEventSender {
    tx: UnboundedSender<Envelope>,
}

impl SurfaceEventSender {
    /// 投递事件，泵已停止时返回 `false`
    pub fn send(&self, event: SurfaceEvent, surface: Arc<dyn InjectionTarget>) -> bool {
        self.tx.send((event, surface)).is_ok()
    }
}

impl std::fmt::Debug for SurfaceEventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceEventSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// 界面事件泵
///
/// 作为 [`LifecycleSource`] 交给容器构建器，容器激活时注册回调。
pub struct SurfaceEventPump {
    rx: Mutex<Option<UnboundedReceiver<Envelope>>>,
    callbacks: RwLock<Option<Arc<dyn SurfaceLifecycleCallbacks>>>,
}

impl SurfaceEventPump {
    /// 创建泵和发送端
    ///
    /// 泵自己不持有发送端，所有发送端释放后 [`run`](Self::run) 结束。
    pub fn channel() -> (Arc<Self>, SurfaceEventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            callbacks: RwLock::new(None),
        });
        (pump, SurfaceEventSender { tx })
    }

    /// 是否已有回调
    pub fn has_callbacks(&self) -> bool {
        self.callbacks.read().is_some()
    }

    /// 处理事件直到所有发送端关闭，返回已分发的事件数
    ///
    /// 回调返回错误时立即停止。只能运行一次，再次调用直接返回 0。
    pub async fn run(&self) -> ContainerResult<usize> {
        let Some(mut rx) = self.rx.lock().take() else {
            debug!("界面事件泵已经运行过");
            return Ok(0);
        };

        info!("界面事件泵开始运行");
        let mut dispatched = 0;
        while let Some((event, surface)) = rx.recv().await {
            let callbacks = self.callbacks.read().clone();
            let Some(callbacks) = callbacks else {
                debug!("没有注册回调, 丢弃界面事件 {}", event);
                continue;
            };
            if let Err(e) = callbacks.on_surface_event(event, surface) {
                error!("界面事件 {} 处理失败: {}", event, e);
                return Err(e);
            }
            dispatched += 1;
        }

        info!("界面事件泵停止, 共分发 {} 个事件", dispatched);
        Ok(dispatched)
    }
}

impl LifecycleSource for SurfaceEventPump {
    fn register_callbacks(&self, callbacks: Arc<dyn SurfaceLifecycleCallbacks>) {
        *self.callbacks.write() = Some(callbacks);
    }

    fn unregister_callbacks(&self) {
        *self.callbacks.write() = None;
    }
}

impl std::fmt::Debug for SurfaceEventPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceEventPump")
            .field("has_callbacks", &self.has_callbacks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{InjectionPoints, Injectable};
    use infrastructure_common::{ContainerError, ContextError};

    #[derive(Default)]
    struct Blank;

    impl Injectable for Blank {
        fn injection_points() -> InjectionPoints<Self> {
            InjectionPoints::new()
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<SurfaceEvent>>,
        fail_on: Option<SurfaceEvent>,
    }

    impl SurfaceLifecycleCallbacks for Recorder {
        fn on_surface_event(
            &self,
            event: SurfaceEvent,
            _surface: Arc<dyn InjectionTarget>,
        ) -> ContainerResult<()> {
            if self.fail_on == Some(event) {
                return Err(ContainerError::Context {
                    source: ContextError::ContextNotYetCreated {
                        operation: event.to_string(),
                    },
                });
            }
            self.events.lock().push(event);
            Ok(())
        }
    }

    fn blank() -> Arc<dyn InjectionTarget> {
        Arc::new(Blank)
    }

    #[tokio::test]
    async fn test_events_are_dispatched_in_order() {
        let (pump, sender) = SurfaceEventPump::channel();
        let recorder = Arc::new(Recorder::default());
        pump.register_callbacks(recorder.clone());

        assert!(sender.send(SurfaceEvent::Created, blank()));
        assert!(sender.send(SurfaceEvent::Started, blank()));
        assert!(sender.send(SurfaceEvent::Resumed, blank()));
        drop(sender);

        assert_eq!(pump.run().await.unwrap(), 3);
        assert_eq!(
            *recorder.events.lock(),
            vec![
                SurfaceEvent::Created,
                SurfaceEvent::Started,
                SurfaceEvent::Resumed
            ]
        );
        assert_eq!(pump.run().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_events_without_callbacks_are_dropped() {
        let (pump, sender) = SurfaceEventPump::channel();
        sender.send(SurfaceEvent::Created, blank());
        drop(sender);

        assert_eq!(pump.run().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_callback_error_stops_pump() {
        let (pump, sender) = SurfaceEventPump::channel();
        let recorder = Arc::new(Recorder {
            fail_on: Some(SurfaceEvent::Started),
            ..Recorder::default()
        });
        pump.register_callbacks(recorder.clone());

        sender.send(SurfaceEvent::Created, blank());
        sender.send(SurfaceEvent::Started, blank());
        sender.send(SurfaceEvent::Resumed, blank());

        assert!(pump.run().await.is_err());
        assert_eq!(*recorder.events.lock(), vec![SurfaceEvent::Created]);
        assert!(!sender.send(SurfaceEvent::Paused, blank()));
    }
}
