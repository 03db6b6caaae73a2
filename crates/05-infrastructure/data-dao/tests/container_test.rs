//! 配置 DAO 在容器中的集成测试

use data_abstractions::MemoryDatabase;
use data_dao::{ConfigurationDao, ConfigurationParameter, CONFIGURATION_TABLE};
use di_abstractions::DataSetChangeAware;
use di_impl::ContainerBuilder;
use infrastructure_common::{BoxError, TypeInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct ChangeCounter {
    changes: AtomicUsize,
}

impl DataSetChangeAware for ChangeCounter {
    fn on_change(&self, _entity: &TypeInfo) -> Result<(), BoxError> {
        self.changes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_configuration_dao_is_wired_by_container() {
    let database = MemoryDatabase::new("app.db");
    let context = ContainerBuilder::new()
        .register_component::<ConfigurationDao>()
        .with_open_helper(Arc::new(database.clone()))
        .build()
        .unwrap();
    context.initialize().unwrap();

    let counter = Arc::new(ChangeCounter::default());
    context
        .events()
        .on_change::<ConfigurationParameter>(counter.clone());

    let dao = context.resolve::<ConfigurationDao>().unwrap();
    dao.set_value("locale", Some("de".to_string())).unwrap();

    assert_eq!(dao.get_value("locale").unwrap().as_deref(), Some("de"));
    assert_eq!(database.row_count(CONFIGURATION_TABLE), 1);
    assert_eq!(counter.changes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deactivate_closes_injected_data_handle() {
    let context = ContainerBuilder::new()
        .register_component::<ConfigurationDao>()
        .with_open_helper(Arc::new(MemoryDatabase::new("app.db")))
        .build()
        .unwrap();
    context.initialize().unwrap();
    let dao = context.resolve::<ConfigurationDao>().unwrap();

    context.deactivate(true).unwrap();

    assert!(matches!(
        dao.get_value("locale"),
        Err(data_dao::DaoError::Store {
            source: data_abstractions::StoreError::Closed
        })
    ));
}
