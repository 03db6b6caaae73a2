//! 内存行存储
//!
//! 一个完全在内存中运行的 [`OpenHelper`] / [`DataHandle`] 实现，供测试和原型使用。
//! 事务语义与移动端数据库一致：嵌套事务中任一层未标记成功，最外层结束时整体回滚。

use crate::model::ID_COLUMN;
use crate::store::{
    ContentValues, DataHandle, OpenHelper, Query, Row, Selection, StoreError, StoreResult, Value,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

type Tables = BTreeMap<String, Table>;

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    snapshot: Option<Tables>,
    levels: Vec<bool>,
    failed: bool,
}

/// 内存数据库
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    connections: Arc<AtomicUsize>,
}

impl MemoryDatabase {
    /// 创建新的内存数据库
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `connect` 被调用的次数
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// 表中的行数
    pub fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len())
    }
}

impl OpenHelper for MemoryDatabase {
    fn database_name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> StoreResult<Arc<dyn DataHandle>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        debug!("打开内存数据库: {}", self.name);
        Ok(Arc::new(MemoryDataHandle {
            state: Arc::clone(&self.state),
            open: AtomicBool::new(true),
        }))
    }
}

/// 内存数据库句柄
#[derive(Debug)]
pub struct MemoryDataHandle {
    state: Arc<Mutex<MemoryState>>,
    open: AtomicBool,
}

impl MemoryDataHandle {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

impl DataHandle for MemoryDataHandle {
    fn query(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.ensure_open()?;
        let state = self.state.lock();
        let Some(table) = state.tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Row> = table
            .rows
            .values()
            .filter(|row| query.selection.matches(row))
            .cloned()
            .collect();

        if let Some(column) = &query.order_by {
            rows.sort_by(|a, b| match (a.get(column), b.get(column)) {
                (Some(x), Some(y)) => x
                    .partial_cmp_value(y)
                    .unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }

        if query.columns.is_empty() {
            return Ok(rows);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                query.columns.iter().fold(Row::new(), |projected, column| {
                    let value = row.get(column).cloned().unwrap_or(Value::Null);
                    projected.with(column.clone(), value)
                })
            })
            .collect())
    }

    fn insert(&self, table: &str, values: &ContentValues) -> StoreResult<i64> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let table = state.tables.entry(table.to_string()).or_default();

        let id = match values.get(ID_COLUMN).and_then(Value::as_i64) {
            Some(id) => id,
            None => table.next_id + 1,
        };
        table.next_id = table.next_id.max(id);

        let mut columns = values.clone();
        columns.insert(ID_COLUMN.to_string(), Value::Integer(id));
        table.rows.insert(id, Row::from(columns));
        Ok(id)
    }

    fn update(
        &self,
        table: &str,
        values: &ContentValues,
        selection: &Selection,
    ) -> StoreResult<usize> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let Some(table) = state.tables.get_mut(table) else {
            return Ok(0);
        };

        let mut affected = 0;
        for row in table.rows.values_mut() {
            if selection.matches(row) {
                *row = values
                    .iter()
                    .fold(row.clone(), |r, (k, v)| r.with(k.clone(), v.clone()));
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn delete(&self, table: &str, selection: &Selection) -> StoreResult<usize> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let Some(table) = state.tables.get_mut(table) else {
            return Ok(0);
        };

        let before = table.rows.len();
        table.rows.retain(|_, row| !selection.matches(row));
        Ok(before - table.rows.len())
    }

    fn begin_transaction(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        if state.levels.is_empty() {
            state.snapshot = Some(state.tables.clone());
            state.failed = false;
        }
        state.levels.push(false);
        Ok(())
    }

    fn set_transaction_successful(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let level = state
            .levels
            .last_mut()
            .ok_or(StoreError::NoActiveTransaction)?;
        *level = true;
        Ok(())
    }

    fn end_transaction(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let successful = state.levels.pop().ok_or(StoreError::NoActiveTransaction)?;
        if !successful {
            state.failed = true;
        }
        if state.levels.is_empty() {
            let snapshot = state.snapshot.take();
            if state.failed {
                if let Some(tables) = snapshot {
                    debug!("内存数据库事务回滚");
                    state.tables = tables;
                }
            }
            state.failed = false;
        }
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
