// ==========================================
// 课表版本与局部重排引擎 - 版本存储
// ==========================================
// 职责: 追加式版本序列 + 每课表写锁
// 红线: 同一课表的写入串行化 (读-求解-提交期间持锁)
// 红线: 多课表加锁按 timetable_id 升序,避免死锁
// ==========================================

use crate::domain::types::VersionSource;
use crate::domain::version::{NewVersion, RestorationMetadata, TimetableRecord, TimetableVersion};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::error::RepositoryError;
use crate::repository::version_repo::VersionRepository;
use chrono::Timelike;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

/// 持有的课表写锁 (drop 即释放)
pub struct TimetableLocks {
    ids: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl TimetableLocks {
    pub fn covers(&self, timetable_id: &str) -> bool {
        self.ids.iter().any(|id| id == timetable_id)
    }
}

pub struct VersionStore {
    repo: Arc<dyn VersionRepository>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl VersionStore {
    pub fn new(repo: Arc<dyn VersionRepository>) -> Self {
        Self {
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_handle(&self, timetable_id: &str) -> EngineResult<Arc<AsyncMutex<()>>> {
        let mut map = self
            .locks
            .lock()
            .map_err(|e| EngineError::Internal(format!("锁表获取失败: {}", e)))?;
        Ok(map
            .entry(timetable_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    // ==========================================
    // 写锁
    // ==========================================

    /// 按升序获取多个课表的写锁
    pub async fn lock_many<I, S>(&self, timetable_ids: I) -> EngineResult<TimetableLocks>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ordered: BTreeSet<String> = timetable_ids
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in &ordered {
            let handle = self.lock_handle(id)?;
            guards.push(handle.lock_owned().await);
        }
        debug!(timetable_ids = ?ordered, "已获取课表写锁");

        Ok(TimetableLocks {
            ids: ordered.into_iter().collect(),
            _guards: guards,
        })
    }

    pub async fn lock(&self, timetable_id: &str) -> EngineResult<TimetableLocks> {
        self.lock_many([timetable_id]).await
    }

    // ==========================================
    // 登记 / 追加
    // ==========================================

    /// 登记课表并提交 version 1
    pub async fn register(
        &self,
        record: &TimetableRecord,
        first: &NewVersion,
    ) -> EngineResult<TimetableVersion> {
        let _locks = self.lock(&record.timetable_id).await?;
        let version = self
            .repo
            .register_timetable(record, first)
            .map_err(|e| match e {
                RepositoryError::UniqueConstraintViolation(msg) => EngineError::InvalidTimetableId(
                    format!("课表或班级已登记: {} ({})", record.timetable_id, msg),
                ),
                other => EngineError::Repository(other),
            })?;
        info!(
            timetable_id = %version.timetable_id,
            section_id = %record.section_id,
            version = version.version,
            "课表已登记"
        );
        Ok(version)
    }

    /// 追加一个版本 (内部加锁)
    pub async fn append(&self, version: &NewVersion) -> EngineResult<TimetableVersion> {
        let locks = self.lock(&version.timetable_id).await?;
        let mut committed = self.commit_batch(&locks, std::slice::from_ref(version))?;
        committed
            .pop()
            .ok_or_else(|| EngineError::Internal("追加版本未返回结果".to_string()))
    }

    /// 在已持有写锁的前提下批量提交 (单事务)
    pub fn commit_batch(
        &self,
        locks: &TimetableLocks,
        versions: &[NewVersion],
    ) -> EngineResult<Vec<TimetableVersion>> {
        for v in versions {
            if !locks.covers(&v.timetable_id) {
                return Err(EngineError::Internal(format!(
                    "提交前未持有课表写锁: {}",
                    v.timetable_id
                )));
            }
        }

        self.repo.insert_next_versions(versions).map_err(|e| match e {
            RepositoryError::NotFound { id, .. } => EngineError::InvalidTimetableId(id),
            other => EngineError::Repository(other),
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, timetable_id: &str, version: i32) -> EngineResult<TimetableVersion> {
        self.repo
            .find_version(timetable_id, version)?
            .ok_or_else(|| EngineError::version_not_found(timetable_id, version))
    }

    pub fn get_by_version_id(&self, version_id: &str) -> EngineResult<TimetableVersion> {
        self.repo
            .find_version_by_id(version_id)?
            .ok_or_else(|| EngineError::version_not_found("?", version_id))
    }

    pub fn latest(&self, timetable_id: &str) -> EngineResult<TimetableVersion> {
        self.repo
            .find_latest(timetable_id)?
            .ok_or_else(|| EngineError::InvalidTimetableId(timetable_id.to_string()))
    }

    /// 版本列表 (升序)
    pub fn list(&self, timetable_id: &str) -> EngineResult<Vec<TimetableVersion>> {
        self.find_timetable(timetable_id)?;
        Ok(self.repo.list_versions(timetable_id)?)
    }

    pub fn find_timetable(&self, timetable_id: &str) -> EngineResult<TimetableRecord> {
        self.repo
            .find_timetable(timetable_id)?
            .ok_or_else(|| EngineError::InvalidTimetableId(timetable_id.to_string()))
    }

    pub fn timetable_for_section(&self, section_id: &str) -> EngineResult<TimetableRecord> {
        self.repo
            .find_timetable_by_section(section_id)?
            .ok_or_else(|| EngineError::InvalidTimetableId(format!("班级未登记课表: {}", section_id)))
    }

    pub fn list_timetables(&self) -> EngineResult<Vec<TimetableRecord>> {
        Ok(self.repo.list_timetables()?)
    }

    // ==========================================
    // 回滚
    // ==========================================

    /// 以旧版本快照创建新版本
    ///
    /// # 红线
    /// - 不修改任何已有版本
    /// - 新版本记录 restoredFrom
    pub async fn restore(
        &self,
        timetable_id: &str,
        from_version: i32,
        notes: Option<String>,
    ) -> EngineResult<TimetableVersion> {
        let locks = self.lock(timetable_id).await?;
        let source = self.get(timetable_id, from_version)?;

        let new_version = NewVersion {
            timetable_id: timetable_id.to_string(),
            timetable: source.timetable.clone(),
            score: source.score,
            health_score: source.health_score,
            notes: notes.or_else(|| Some(format!("回滚自版本 {}", from_version))),
            source: VersionSource::Restore,
            restoration_metadata: Some(RestorationMetadata {
                restored_from: from_version,
                restored_at: now_seconds(),
            }),
        };

        let mut committed = self.commit_batch(&locks, std::slice::from_ref(&new_version))?;
        let version = committed
            .pop()
            .ok_or_else(|| EngineError::Internal("回滚未返回版本".to_string()))?;
        info!(
            timetable_id = %timetable_id,
            restored_from = from_version,
            version = version.version,
            "版本已回滚"
        );
        Ok(version)
    }
}

/// 当前时间 (截断到秒,与存储精度一致)
pub(crate) fn now_seconds() -> chrono::NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::domain::context::SchedulingContext;
    use crate::domain::timetable::{SlotCell, Timetable, WeekSchedule};
    use crate::domain::types::Day;
    use crate::repository::version_repo::SqliteVersionRepository;

    fn store() -> VersionStore {
        let conn = open_in_memory().unwrap();
        VersionStore::new(Arc::new(SqliteVersionRepository::new(Arc::new(Mutex::new(conn)))))
    }

    fn new_version(timetable_id: &str, subject: &str) -> NewVersion {
        let mut week = WeekSchedule::new(3);
        week.set(Day::Mon, 0, SlotCell::theory(subject, "T1", "R1"));
        NewVersion {
            timetable_id: timetable_id.to_string(),
            timetable: Timetable::single("S1", week),
            score: 95.0,
            health_score: 90.0,
            notes: None,
            source: VersionSource::Initial,
            restoration_metadata: None,
        }
    }

    async fn register(store: &VersionStore, timetable_id: &str) -> TimetableVersion {
        let record = TimetableRecord {
            timetable_id: timetable_id.to_string(),
            section_id: "S1".to_string(),
            context: SchedulingContext::default(),
            created_at: now_seconds(),
        };
        store
            .register(&record, &new_version(timetable_id, "MATH"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_append_numbers_sequentially() {
        let store = store();
        register(&store, "TT1").await;

        let v2 = store.append(&new_version("TT1", "PHY")).await.unwrap();
        let v3 = store.append(&new_version("TT1", "ENG")).await.unwrap();
        assert_eq!((v2.version, v3.version), (2, 3));

        let latest = store.latest("TT1").unwrap();
        assert_eq!(latest.version_id, v3.version_id);
        let numbers: Vec<i32> = store.list("TT1").unwrap().iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_append_unknown_timetable() {
        let store = store();
        register(&store, "TT1").await;

        let err = store.append(&new_version("TT9", "PHY")).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimetableId(_)));
        assert_eq!(store.latest("TT1").unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_commit_requires_lock() {
        let store = store();
        register(&store, "TT1").await;
        register_other(&store).await;

        let locks = store.lock("TT2").await.unwrap();
        let err = store
            .commit_batch(&locks, &[new_version("TT1", "PHY")])
            .unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    async fn register_other(store: &VersionStore) {
        let record = TimetableRecord {
            timetable_id: "TT2".to_string(),
            section_id: "S2".to_string(),
            context: SchedulingContext::default(),
            created_at: now_seconds(),
        };
        let mut first = new_version("TT2", "MATH");
        first.timetable = Timetable::single("S2", WeekSchedule::new(3));
        store.register(&record, &first).await.unwrap();
    }
}
