//! 通用数据访问对象
//!
//! [`BaseDao`] 通过行映射在实体和行存储之间转换，数据库句柄和事件出口由容器注入。
//! 具体 DAO 内嵌一个 `BaseDao` 并用 `#[injectable(inherit)]` 继承它的注入点。

use crate::error::{DaoError, DaoResult};
use chrono::{DateTime, Utc};
use crate::loader::DaoReferenceLoader;
use data_abstractions::{
    DataHandle, Entity, Field, LazyCollection, LazyReference, ModelBase, NullReference,
    OptimisticLock, Query, Reference, Row, RowMapper, Selection, Timestamps, Value, ID_COLUMN, VERSION_COLUMN,
};
use di_abstractions::{EntityEventSink, Inject, InjectionPoints, Injectable};
use infrastructure_common::TypeInfo;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 事务句柄
///
/// 由 [`BaseDao::begin_transaction`] 创建。`commit` 标记成功并结束事务，`rollback`
/// 直接结束事务；句柄未经提交被丢弃时按回滚处理。
#[must_use = "事务需要提交或回滚"]
pub struct TxHandle {
    db: Arc<dyn DataHandle>,
    finished: bool,
}

impl TxHandle {
    fn begin(db: Arc<dyn DataHandle>) -> DaoResult<Self> {
        db.begin_transaction()?;
        Ok(Self {
            db,
            finished: false,
        })
    }

    /// 提交事务
    pub fn commit(mut self) -> DaoResult<()> {
        self.db.set_transaction_successful()?;
        self.finished = true;
        self.db.end_transaction()?;
        Ok(())
    }

    /// 回滚事务
    pub fn rollback(mut self) -> DaoResult<()> {
        self.finished = true;
        self.db.end_transaction()?;
        Ok(())
    }
}

impl Drop for TxHandle {
    fn drop(&mut self) {
        if !self.finished {
            warn!("事务句柄未提交即被丢弃, 回滚事务");
            if let Err(e) = self.db.end_transaction() {
                warn!("回滚事务失败: {}", e);
            }
        }
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("finished", &self.finished)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Inserted,
    Updated,
}

/// 通用数据访问对象
pub struct BaseDao<E: Entity> {
    db: Inject<dyn DataHandle>,
    events: Inject<dyn EntityEventSink>,
    mapper: Arc<dyn RowMapper<E>>,
}

impl<E: Entity> BaseDao<E> {
    /// 用实体的行映射创建
    pub fn new(mapper: impl RowMapper<E> + 'static) -> Self {
        Self {
            db: Inject::empty(),
            events: Inject::empty(),
            mapper: Arc::new(mapper),
        }
    }

    /// 行映射
    pub fn row_mapper(&self) -> &Arc<dyn RowMapper<E>> {
        &self.mapper
    }

    /// 表名
    pub fn table_name(&self) -> &str {
        self.mapper.table_name()
    }

    /// 数据库句柄注入字段
    pub fn db_slot(&self) -> &Inject<dyn DataHandle> {
        &self.db
    }

    /// 事件出口注入字段
    pub fn events_slot(&self) -> &Inject<dyn EntityEventSink> {
        &self.events
    }

    /// 当前注入的数据库句柄
    pub fn data_handle(&self) -> DaoResult<Arc<dyn DataHandle>> {
        Ok(self.db.require()?)
    }

    /// 删除实体，尚未持久化的实体不做任何操作并返回 0
    pub fn delete(&self, item: &mut E) -> DaoResult<usize> {
        let id = match item.id() {
            Some(id) if !item.is_transient() => id,
            _ => {
                warn!("尝试删除尚未持久化的实体 {}, 未执行任何操作", entity_type::<E>());
                return Ok(0);
            }
        };

        let removed = self.delete_by_id(id)?;
        self.emit(|sink, entity| sink.emit_delete(entity));
        item.model_mut().set_transient(true);
        Ok(removed)
    }

    /// 按主键删除
    pub fn delete_by_id(&self, id: i64) -> DaoResult<usize> {
        let db = self.data_handle()?;
        let removed = db.delete(self.table_name(), &Selection::eq(ID_COLUMN, id))?;
        debug!("删除 {} 行: {} (id={})", removed, self.table_name(), id);
        Ok(removed)
    }

    /// 清空整张表
    pub fn delete_all(&self) -> DaoResult<usize> {
        let db = self.data_handle()?;
        let removed = db.delete(self.table_name(), &Selection::all())?;
        debug!("清空表 {}: {} 行", self.table_name(), removed);
        Ok(removed)
    }

    /// 按主键读取
    pub fn get_by_id(&self, id: i64) -> DaoResult<Option<E>> {
        self.unique_by_column(ID_COLUMN, Value::Integer(id))
    }

    /// 按名称字段读取，行映射必须提供名称字段
    pub fn get_by_name(&self, name: &str) -> DaoResult<Option<E>> {
        trace!("按名称读取 {}: {}", self.table_name(), name);
        let field = self
            .mapper
            .name_field()
            .ok_or_else(|| DaoError::NoNameField {
                table: self.table_name().to_string(),
            })?;
        self.unique_by_column(field.name(), Value::from(name))
    }

    /// 按字段读取唯一实体，多于一行时返回错误
    pub fn get_unique_by_field(
        &self,
        field: &Field,
        value: impl Into<Value>,
    ) -> DaoResult<Option<E>> {
        self.unique_by_column(field.name(), value.into())
    }

    /// 按字段读取全部匹配的实体
    pub fn get_by_field(&self, field: &Field, value: impl Into<Value>) -> DaoResult<Vec<E>> {
        self.query(Selection::eq(field.name(), value))
    }

    /// 按条件查询
    pub fn query(&self, selection: Selection) -> DaoResult<Vec<E>> {
        let db = self.data_handle()?;
        self.query_with(db.as_ref(), selection)
    }

    /// 读取整张表
    pub fn load_all(&self) -> DaoResult<Vec<E>> {
        self.query(Selection::all())
    }

    /// 修改时间晚于 `since` 的全部实体，行映射必须提供修改时间字段
    pub fn get_all_items_modified_after(&self, since: DateTime<Utc>) -> DaoResult<Vec<E>> {
        let field = self
            .mapper
            .last_modification_date_field()
            .ok_or_else(|| DaoError::TimestampsUnsupported {
                entity: entity_type::<E>().name,
            })?;
        self.query(Selection::gt(field.name(), Value::timestamp(since)))
    }

    /// 按样例查询，样例中非空的列之间为 AND 关系
    ///
    /// 版本号列不参与比较。`with_wildcard` 为真时文本列按 LIKE 匹配，
    /// 通配符 `%` 由调用方放入样例。
    pub fn query_by_example(&self, example: &E, with_wildcard: bool) -> DaoResult<Vec<E>> {
        let mut values = self.mapper.to_values(example);
        if example.optimistic_lock().is_some() {
            values.remove(VERSION_COLUMN);
        }

        let selection = values
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .fold(Selection::all(), |selection, (column, value)| match value {
                Value::Text(pattern) if with_wildcard => selection.and_like(column, pattern),
                value => selection.and_eq(column, value),
            });
        trace!("按样例查询 {}: {:?}", self.table_name(), selection);
        self.query(selection)
    }

    /// 开启事务
    pub fn begin_transaction(&self) -> DaoResult<TxHandle> {
        TxHandle::begin(self.data_handle()?)
    }

    /// 保存实体
    ///
    /// 未持久化的实体被插入，其余的被更新。没有传入事务时在本地事务中执行，
    /// 提交成功后才发送事件：插入后发送集合变更事件，更新后发送实体变更事件。
    /// 写入或提交失败时实体的主键、持久化标记、时间戳和版本号恢复为保存前的值。
    /// 传入外部事务时事件在写入后立即发送，事务的结果由调用方负责。
    pub fn save(&self, item: &mut E, tx: Option<&TxHandle>) -> DaoResult<()> {
        trace!("保存实体 {}", entity_type::<E>());
        let db = self.data_handle()?;
        let saved = PersistState::capture(item);

        let local = match tx {
            Some(_) => None,
            None => Some(TxHandle::begin(Arc::clone(&db))?),
        };
        let written = match self.write(db.as_ref(), item) {
            Ok(written) => written,
            Err(e) => {
                saved.restore(item);
                if let Some(local) = local {
                    rollback_quietly(local);
                }
                return Err(e);
            }
        };
        if let Some(local) = local {
            if let Err(e) = local.commit() {
                saved.restore(item);
                return Err(e);
            }
        }

        self.emit_written(written, item);
        Ok(())
    }

    /// 在一个事务中保存全部实体，任一失败时回滚并返回错误
    ///
    /// 本地事务回滚时全部实体恢复为保存前的状态，提交成功后才发送事件。
    pub fn save_all(&self, items: &mut [E], tx: Option<&TxHandle>) -> DaoResult<()> {
        if let Some(tx) = tx {
            return items.iter_mut().try_for_each(|item| self.save(item, Some(tx)));
        }

        let db = self.data_handle()?;
        let saved: Vec<PersistState> = items.iter().map(PersistState::capture).collect();
        let local = TxHandle::begin(Arc::clone(&db))?;
        let mut written = Vec::with_capacity(items.len());
        let outcome = items.iter_mut().try_for_each(|item| -> DaoResult<()> {
            written.push(self.write(db.as_ref(), item)?);
            Ok(())
        });
        let result = match outcome {
            Ok(()) => local.commit(),
            Err(e) => {
                warn!("批量保存失败, 回滚事务: {}", e);
                rollback_quietly(local);
                Err(e)
            }
        };
        if let Err(e) = result {
            for (item, state) in items.iter_mut().zip(saved) {
                state.restore(item);
            }
            return Err(e);
        }

        for (item, written) in items.iter().zip(written) {
            self.emit_written(written, item);
        }
        Ok(())
    }

    fn emit_written(&self, written: Written, item: &E) {
        match written {
            Written::Inserted => self.emit(|sink, entity| sink.emit_change(entity)),
            Written::Updated => {
                let changed: &(dyn Any + Send + Sync) = item;
                self.emit(|sink, entity| sink.emit_data_change(entity, changed));
            }
        }
    }

    fn write(&self, db: &dyn DataHandle, item: &mut E) -> DaoResult<Written> {
        let now = Utc::now();
        let table = self.table_name();

        let id = match item.id() {
            Some(id) if !item.is_transient() => id,
            _ => {
                if let Some(stamps) = item.timestamps_mut() {
                    stamps.touch_created(now);
                }
                let id = db.insert(table, &self.mapper.to_values(item))?;
                let model = item.model_mut();
                model.set_id(id);
                model.set_transient(false);
                debug!("插入实体 {}: id={}", table, id);
                return Ok(Written::Inserted);
            }
        };

        if let Some(stamps) = item.timestamps_mut() {
            if stamps.created.is_none() {
                stamps.created = Some(now);
            }
            stamps.touch_modified(now);
        }

        if let Some(expected) = item.optimistic_lock().map(|lock| lock.version) {
            let found = self
                .unique_with(db, ID_COLUMN, Value::Integer(id))?
                .and_then(|stored| stored.optimistic_lock().map(|lock| lock.version));
            if found != Some(expected) {
                return Err(DaoError::OptimisticLock {
                    entity: entity_type::<E>().name,
                    id,
                    expected,
                    found,
                });
            }
            if let Some(lock) = item.optimistic_lock_mut() {
                lock.version += 1;
            }
        }

        db.update(table, &self.mapper.to_values(item), &Selection::eq(ID_COLUMN, id))?;
        debug!("更新实体 {}: id={}", table, id);
        Ok(Written::Updated)
    }

    fn unique_by_column(&self, column: &str, value: Value) -> DaoResult<Option<E>> {
        let db = self.data_handle()?;
        self.unique_with(db.as_ref(), column, value)
    }

    fn unique_with(&self, db: &dyn DataHandle, column: &str, value: Value) -> DaoResult<Option<E>> {
        let mut found = self.query_with(db, Selection::eq(column, value))?;
        if found.len() > 1 {
            return Err(DaoError::NotUnique {
                table: self.table_name().to_string(),
                column: column.to_string(),
                count: found.len(),
            });
        }
        Ok(found.pop())
    }

    fn query_with(&self, db: &dyn DataHandle, selection: Selection) -> DaoResult<Vec<E>> {
        query_entities(db, self.mapper.as_ref(), selection)
    }

    fn emit(&self, send: impl FnOnce(&dyn EntityEventSink, &TypeInfo)) {
        match self.events.get() {
            Some(sink) => send(sink.as_ref(), &entity_type::<E>()),
            None => debug!("事件出口未注入, 跳过 {} 的变更事件", entity_type::<E>()),
        }
    }
}

/// 写入前的持久化状态
struct PersistState {
    model: ModelBase,
    timestamps: Option<Timestamps>,
    lock: Option<OptimisticLock>,
}

impl PersistState {
    fn capture<E: Entity>(item: &E) -> Self {
        Self {
            model: item.model().clone(),
            timestamps: item.timestamps().cloned(),
            lock: item.optimistic_lock().copied(),
        }
    }

    fn restore<E: Entity>(self, item: &mut E) {
        *item.model_mut() = self.model;
        if let (Some(saved), Some(stamps)) = (self.timestamps, item.timestamps_mut()) {
            *stamps = saved;
        }
        if let (Some(saved), Some(lock)) = (self.lock, item.optimistic_lock_mut()) {
            *lock = saved;
        }
    }
}

fn rollback_quietly(tx: TxHandle) {
    if let Err(e) = tx.rollback() {
        warn!("回滚事务失败: {}", e);
    }
}

/// 用行映射执行查询
pub(crate) fn query_entities<E>(
    db: &dyn DataHandle,
    mapper: &dyn RowMapper<E>,
    selection: Selection,
) -> DaoResult<Vec<E>> {
    let query = Query::table(mapper.table_name())
        .columns(mapper.field_list().field_names())
        .filter(selection);
    let rows: Vec<Row> = db.query(&query)?;
    rows.iter()
        .map(|row| mapper.from_row(row).map_err(DaoError::from))
        .collect()
}

fn entity_type<E: Entity>() -> TypeInfo {
    TypeInfo::of::<E>()
}

impl<E: Entity> Injectable for BaseDao<E> {
    fn injection_points() -> InjectionPoints<Self> {
        InjectionPoints::<Self>::new()
            .slot("db", |dao| &dao.db)
            .slot("events", |dao| &dao.events)
    }
}

impl<E: Entity> fmt::Debug for BaseDao<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseDao")
            .field("table", &self.table_name())
            .field("db", &self.db)
            .field("events", &self.events)
            .finish()
    }
}

/// 内嵌 [`BaseDao`] 的具体数据访问对象
///
/// 延迟原语持有 DAO 本身而不是数据库句柄，加载时使用 DAO 当时注入的句柄。
pub trait Dao: Send + Sync + 'static {
    /// 管理的实体类型
    type Entity: Entity;

    /// 内嵌的通用实现
    fn base(&self) -> &BaseDao<Self::Entity>;

    /// 按主键加载实体的引用加载器
    fn reference_loader(self: &Arc<Self>, id: i64) -> DaoReferenceLoader<Self>
    where
        Self: Sized,
    {
        DaoReferenceLoader::new(Arc::clone(self), id)
    }

    /// 指向实体的延迟引用，主键为空时返回空引用
    fn lazy_reference(self: &Arc<Self>, id: Option<i64>) -> Box<dyn Reference<Self::Entity>>
    where
        Self: Sized,
    {
        match id {
            Some(id) => Box::new(LazyReference::new(self.reference_loader(id))),
            None => Box::new(NullReference::new()),
        }
    }

    /// 外键字段等于 `id` 的全部实体组成的延迟集合
    fn lazy_collection_by_field(
        self: &Arc<Self>,
        foreign_key: &Field,
        id: i64,
    ) -> LazyCollection<Self::Entity>
    where
        Self: Sized,
    {
        let dao = Arc::clone(self);
        let field = foreign_key.clone();
        LazyCollection::new(move || match dao.base().get_by_field(&field, id) {
            Ok(items) => items,
            Err(e) => {
                warn!("加载延迟集合 {}.{}={} 失败: {}", dao.base().table_name(), field, id, e);
                Vec::new()
            }
        })
    }
}

impl<E: Entity> Dao for BaseDao<E> {
    type Entity = E;

    fn base(&self) -> &BaseDao<E> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{ConfigurationParameter, ConfigurationRowMapper};
    use chrono::Duration;
    use data_abstractions::{
        ContentValues, FieldList, MemoryDatabase, ModelBase, OpenHelper, OptimisticLock,
        StoreError, StoreResult, Timestamps, CREATION_DATE_COLUMN,
        LAST_MODIFICATION_DATE_COLUMN, VERSION_COLUMN,
    };
    use mockall::{mock, Sequence};
    use parking_lot::Mutex;

    const CUSTOMER_TABLE: &str = "customer";

    #[derive(Debug, Clone)]
    struct Customer {
        model: ModelBase,
        stamps: Timestamps,
        lock: OptimisticLock,
        name: String,
        group: i64,
    }

    impl Customer {
        fn new(name: &str, group: i64) -> Self {
            Self {
                model: ModelBase::new(CUSTOMER_TABLE),
                stamps: Timestamps::default(),
                lock: OptimisticLock::default(),
                name: name.to_string(),
                group,
            }
        }
    }

    impl Entity for Customer {
        fn model(&self) -> &ModelBase {
            &self.model
        }

        fn model_mut(&mut self) -> &mut ModelBase {
            &mut self.model
        }

        fn timestamps(&self) -> Option<&Timestamps> {
            Some(&self.stamps)
        }

        fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
            Some(&mut self.stamps)
        }

        fn optimistic_lock(&self) -> Option<&OptimisticLock> {
            Some(&self.lock)
        }

        fn optimistic_lock_mut(&mut self) -> Option<&mut OptimisticLock> {
            Some(&mut self.lock)
        }
    }

    struct CustomerMapper {
        fields: FieldList,
    }

    impl CustomerMapper {
        fn new() -> Self {
            let mut fields = FieldList::new("Customer");
            fields.extend_from(&ModelBase::field_list().unwrap()).unwrap();
            fields
                .add_all([
                    Field::new("name", 1),
                    Field::new("group_id", 2),
                    Field::new(CREATION_DATE_COLUMN, 3),
                    Field::new(LAST_MODIFICATION_DATE_COLUMN, 4),
                    OptimisticLock::field(5),
                ])
                .unwrap();
            fields.lock();
            Self { fields }
        }
    }

    impl RowMapper<Customer> for CustomerMapper {
        fn table_name(&self) -> &str {
            CUSTOMER_TABLE
        }

        fn field_list(&self) -> &FieldList {
            &self.fields
        }

        fn from_row(&self, row: &Row) -> StoreResult<Customer> {
            Ok(Customer {
                model: ModelBase::persisted(CUSTOMER_TABLE, row.get_i64(ID_COLUMN)?),
                stamps: Timestamps {
                    created: row.get_timestamp(CREATION_DATE_COLUMN),
                    modified: row.get_timestamp(LAST_MODIFICATION_DATE_COLUMN),
                },
                lock: OptimisticLock {
                    version: row.get_i64(VERSION_COLUMN)?,
                },
                name: row.get_str("name")?.to_string(),
                group: row.get_i64("group_id")?,
            })
        }

        fn to_values(&self, item: &Customer) -> ContentValues {
            let stamp = |at: Option<DateTime<Utc>>| at.map_or(Value::Null, Value::timestamp);
            ContentValues::from([
                ("name".to_string(), Value::from(item.name.as_str())),
                ("group_id".to_string(), Value::Integer(item.group)),
                (CREATION_DATE_COLUMN.to_string(), stamp(item.stamps.created)),
                (
                    LAST_MODIFICATION_DATE_COLUMN.to_string(),
                    stamp(item.stamps.modified),
                ),
                (VERSION_COLUMN.to_string(), Value::Integer(item.lock.version)),
            ])
        }

        fn name_field(&self) -> Option<&Field> {
            self.fields.field("name")
        }

        fn last_modification_date_field(&self) -> Option<&Field> {
            self.fields.field(LAST_MODIFICATION_DATE_COLUMN)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl EntityEventSink for RecordingSink {
        fn emit_delete(&self, _entity: &TypeInfo) {
            self.events.lock().push("delete".to_string());
        }

        fn emit_change(&self, _entity: &TypeInfo) {
            self.events.lock().push("change".to_string());
        }

        fn emit_data_change(&self, _entity: &TypeInfo, item: &(dyn Any + Send + Sync)) {
            let name = item
                .downcast_ref::<Customer>()
                .map_or("?", |c| c.name.as_str())
                .to_string();
            self.events.lock().push(format!("data_change:{name}"));
        }
    }

    mock! {
        Handle {}

        impl DataHandle for Handle {
            fn query(&self, query: &Query) -> StoreResult<Vec<Row>>;
            fn insert(&self, table: &str, values: &ContentValues) -> StoreResult<i64>;
            fn update(
                &self,
                table: &str,
                values: &ContentValues,
                selection: &Selection,
            ) -> StoreResult<usize>;
            fn delete(&self, table: &str, selection: &Selection) -> StoreResult<usize>;
            fn begin_transaction(&self) -> StoreResult<()>;
            fn set_transaction_successful(&self) -> StoreResult<()>;
            fn end_transaction(&self) -> StoreResult<()>;
            fn close(&self) -> StoreResult<()>;
            fn is_open(&self) -> bool;
        }
    }

    struct Fixture {
        database: MemoryDatabase,
        sink: Arc<RecordingSink>,
        dao: Arc<BaseDao<Customer>>,
    }

    fn fixture() -> Fixture {
        let database = MemoryDatabase::new("customers.db");
        let sink = Arc::new(RecordingSink::default());
        let dao = Arc::new(BaseDao::new(CustomerMapper::new()));
        dao.db_slot().set(database.connect().unwrap());
        dao.events_slot()
            .set(Arc::clone(&sink) as Arc<dyn EntityEventSink>);
        Fixture {
            database,
            sink,
            dao,
        }
    }

    fn mocked_dao(handle: MockHandle) -> BaseDao<Customer> {
        let dao = BaseDao::new(CustomerMapper::new());
        dao.db_slot().set(Arc::new(handle));
        dao
    }

    #[test]
    fn injection_points_cover_handle_and_events() {
        let points = BaseDao::<Customer>::injection_points();
        let names: Vec<&str> = points.describe().into_iter().map(|(name, _)| name).collect();

        assert_eq!(names, vec!["db", "events"]);
    }

    #[test]
    fn save_inserts_transient_entity() {
        let f = fixture();
        let mut ada = Customer::new("Ada", 1);

        f.dao.save(&mut ada, None).unwrap();

        assert_eq!(ada.id(), Some(1));
        assert!(!ada.is_transient());
        assert!(ada.stamps.created.is_some());
        assert_eq!(ada.stamps.created, ada.stamps.modified);
        assert_eq!(f.database.row_count(CUSTOMER_TABLE), 1);
        assert_eq!(*f.sink.events.lock(), vec!["change"]);
    }

    #[test]
    fn save_updates_and_bumps_version() {
        let f = fixture();
        let mut ada = Customer::new("Ada", 1);
        f.dao.save(&mut ada, None).unwrap();

        ada.name = "Ada L.".to_string();
        f.dao.save(&mut ada, None).unwrap();

        assert_eq!(ada.lock.version, 1);
        let stored = f.dao.get_by_id(1).unwrap().unwrap();
        assert_eq!(stored.name, "Ada L.");
        assert_eq!(stored.lock.version, 1);
        assert_eq!(
            *f.sink.events.lock(),
            vec!["change".to_string(), "data_change:Ada L.".to_string()]
        );
    }

    #[test]
    fn stale_version_is_rejected() {
        let f = fixture();
        let mut ada = Customer::new("Ada", 1);
        f.dao.save(&mut ada, None).unwrap();
        let mut stale = ada.clone();

        f.dao.save(&mut ada, None).unwrap();
        stale.name = "Stale".to_string();
        let result = f.dao.save(&mut stale, None);

        assert!(matches!(
            result,
            Err(DaoError::OptimisticLock {
                expected: 0,
                found: Some(1),
                ..
            })
        ));
        assert_eq!(stale.lock.version, 0);
        assert_eq!(f.dao.get_by_id(1).unwrap().unwrap().name, "Ada");
    }

    #[test]
    fn delete_skips_transient_entities() {
        let f = fixture();
        let mut ghost = Customer::new("Ghost", 1);
        assert_eq!(f.dao.delete(&mut ghost).unwrap(), 0);

        let mut ada = Customer::new("Ada", 1);
        f.dao.save(&mut ada, None).unwrap();
        assert_eq!(f.dao.delete(&mut ada).unwrap(), 1);

        assert!(ada.is_transient());
        assert_eq!(f.database.row_count(CUSTOMER_TABLE), 0);
        assert_eq!(*f.sink.events.lock(), vec!["change", "delete"]);
    }

    #[test]
    fn lookups_by_field_and_name() {
        let f = fixture();
        let mut customers = vec![
            Customer::new("Ada", 1),
            Customer::new("Grace", 1),
            Customer::new("Linus", 2),
        ];
        f.dao.save_all(&mut customers, None).unwrap();

        assert_eq!(f.dao.get_by_name("Grace").unwrap().unwrap().group, 1);
        assert!(f.dao.get_by_name("Nobody").unwrap().is_none());
        assert_eq!(f.dao.get_by_field(&Field::new("group_id", 2), 1_i64).unwrap().len(), 2);
        assert_eq!(f.dao.load_all().unwrap().len(), 3);
        assert!(matches!(
            f.dao.get_unique_by_field(&Field::new("group_id", 2), 1_i64),
            Err(DaoError::NotUnique { count: 2, .. })
        ));

        assert_eq!(f.dao.delete_by_id(3).unwrap(), 1);
        assert_eq!(f.dao.delete_all().unwrap(), 2);
    }

    #[test]
    fn query_by_example_matches_set_columns() {
        let f = fixture();
        let mut customers = vec![
            Customer::new("Ada", 1),
            Customer::new("Adele", 1),
            Customer::new("Ada", 2),
        ];
        f.dao.save_all(&mut customers, None).unwrap();
        f.dao.save(&mut customers[0], None).unwrap();

        // 已更新的实体版本号为 1，样例的版本号不参与比较
        let exact = f.dao.query_by_example(&Customer::new("Ada", 1), false).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id(), customers[0].id());

        let none = f.dao.query_by_example(&Customer::new("Ad%", 1), false).unwrap();
        assert!(none.is_empty());

        let wildcard = f.dao.query_by_example(&Customer::new("ad%", 1), true).unwrap();
        let mut names: Vec<_> = wildcard.into_iter().map(|c| c.name).collect();
        names.sort();
        assert_eq!(names, vec!["Ada", "Adele"]);
    }

    #[test]
    fn save_all_rolls_back_on_failure() {
        let f = fixture();
        let mut phantom = Customer::new("Phantom", 1);
        phantom.model = ModelBase::persisted(CUSTOMER_TABLE, 42);
        let mut customers = vec![Customer::new("Ada", 1), phantom];

        let result = f.dao.save_all(&mut customers, None);

        assert!(matches!(result, Err(DaoError::OptimisticLock { found: None, .. })));
        assert_eq!(f.database.row_count(CUSTOMER_TABLE), 0);
    }

    #[test]
    fn rolled_back_batch_restores_entities_and_stays_silent() {
        let f = fixture();
        let mut phantom = Customer::new("Phantom", 1);
        phantom.model = ModelBase::persisted(CUSTOMER_TABLE, 42);
        let mut customers = vec![Customer::new("Ada", 1), phantom];

        assert!(f.dao.save_all(&mut customers, None).is_err());

        let ada = &customers[0];
        assert_eq!(ada.id(), None);
        assert!(ada.is_transient());
        assert_eq!(ada.stamps, Timestamps::default());
        assert_eq!(customers[1].id(), Some(42));
        assert!(f.sink.events.lock().is_empty());

        // 修正后重试，回滚过的实体重新插入
        customers.pop();
        f.dao.save_all(&mut customers, None).unwrap();
        assert_eq!(f.database.row_count(CUSTOMER_TABLE), 1);
        assert!(!customers[0].is_transient());
        assert_eq!(*f.sink.events.lock(), vec!["change"]);
    }

    #[test]
    fn failed_commit_restores_entity() {
        let mut handle = MockHandle::new();
        handle.expect_begin_transaction().times(1).returning(|| Ok(()));
        handle.expect_insert().times(1).returning(|_, _| Ok(7));
        handle.expect_set_transaction_successful().times(1).returning(|| {
            Err(StoreError::Backend {
                message: "disk full".to_string(),
            })
        });
        handle.expect_end_transaction().times(1).returning(|| Ok(()));

        let dao = mocked_dao(handle);
        let sink = Arc::new(RecordingSink::default());
        dao.events_slot()
            .set(Arc::clone(&sink) as Arc<dyn EntityEventSink>);
        let mut ada = Customer::new("Ada", 1);

        assert!(dao.save(&mut ada, None).is_err());
        assert_eq!(ada.id(), None);
        assert!(ada.is_transient());
        assert!(ada.stamps.created.is_none());
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn items_modified_after_uses_modification_column() {
        let f = fixture();
        let mut ada = Customer::new("Ada", 1);
        f.dao.save(&mut ada, None).unwrap();
        let before = Utc::now() - Duration::hours(1);
        let after = Utc::now() + Duration::hours(1);

        assert_eq!(f.dao.get_all_items_modified_after(before).unwrap().len(), 1);
        assert!(f.dao.get_all_items_modified_after(after).unwrap().is_empty());
    }

    #[test]
    fn modified_after_requires_timestamp_mapper() {
        let dao = BaseDao::<ConfigurationParameter>::new(ConfigurationRowMapper::new().unwrap());
        dao.db_slot()
            .set(MemoryDatabase::new("config.db").connect().unwrap());

        assert!(matches!(
            dao.get_all_items_modified_after(Utc::now()),
            Err(DaoError::TimestampsUnsupported { .. })
        ));
        assert!(matches!(
            BaseDao::new(CustomerMapper::new()).load_all(),
            Err(DaoError::Injection { .. })
        ));
    }

    #[test]
    fn local_transaction_commits_around_insert() {
        let mut handle = MockHandle::new();
        let mut seq = Sequence::new();
        handle
            .expect_begin_transaction()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        handle
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(7));
        handle
            .expect_set_transaction_successful()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        handle
            .expect_end_transaction()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let dao = mocked_dao(handle);
        let mut ada = Customer::new("Ada", 1);
        dao.save(&mut ada, None).unwrap();

        assert_eq!(ada.id(), Some(7));
    }

    #[test]
    fn failed_insert_ends_transaction_without_success() {
        let mut handle = MockHandle::new();
        let mut seq = Sequence::new();
        handle
            .expect_begin_transaction()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        handle
            .expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Err(StoreError::Backend {
                    message: "disk full".to_string(),
                })
            });
        handle.expect_set_transaction_successful().never();
        handle
            .expect_end_transaction()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));

        let dao = mocked_dao(handle);
        let mut ada = Customer::new("Ada", 1);

        assert!(matches!(
            dao.save(&mut ada, None),
            Err(DaoError::Store { .. })
        ));
        assert!(ada.is_transient());
    }

    #[test]
    fn external_transaction_is_left_to_caller() {
        let mut handle = MockHandle::new();
        handle.expect_begin_transaction().times(1).returning(|| Ok(()));
        handle.expect_insert().times(2).returning(|_, _| Ok(1));
        handle.expect_end_transaction().times(1).returning(|| Ok(()));
        handle.expect_set_transaction_successful().never();

        let dao = mocked_dao(handle);
        let tx = dao.begin_transaction().unwrap();
        dao.save(&mut Customer::new("Ada", 1), Some(&tx)).unwrap();
        dao.save(&mut Customer::new("Grace", 1), Some(&tx)).unwrap();
        tx.rollback().unwrap();
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let f = fixture();
        {
            let tx = f.dao.begin_transaction().unwrap();
            f.dao
                .save(&mut Customer::new("Ada", 1), Some(&tx))
                .unwrap();
        }
        assert_eq!(f.database.row_count(CUSTOMER_TABLE), 0);
    }

    #[test]
    fn lazy_primitives_load_through_dao() {
        let f = fixture();
        let mut customers = vec![Customer::new("Ada", 7), Customer::new("Grace", 7)];
        f.dao.save_all(&mut customers, None).unwrap();

        let reference = f.dao.lazy_reference(Some(2));
        assert_eq!(reference.object_ref_id(), Some(2));
        assert_eq!(reference.object().unwrap().name, "Grace");
        assert!(f.dao.lazy_reference(None).object().is_none());

        let group = f.dao.lazy_collection_by_field(&Field::new("group_id", 2), 7);
        f.dao.delete_all().unwrap();
        assert!(group.is_empty());
    }
}
