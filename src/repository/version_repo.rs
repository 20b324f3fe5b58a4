// ==========================================
// 课表版本与局部重排引擎 - 课表版本数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 版本只追加,不更新,不删除
// ==========================================

use crate::domain::context::SchedulingContext;
use crate::domain::timetable::Timetable;
use crate::domain::types::VersionSource;
use crate::domain::version::{NewVersion, RestorationMetadata, TimetableRecord, TimetableVersion};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Timelike};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const VERSION_COLUMNS: &str = r#"version_id, timetable_id, version_no, snapshot_json,
       score, health_score, notes, source_json, generated_at,
       restored_from, restored_at"#;

// ==========================================
// Trait: VersionRepository - 抽象版本存储
// ==========================================
// 引擎层只依赖此 trait,不依赖具体数据库
pub trait VersionRepository: Send + Sync {
    /// 登记课表并写入 version 1 (同一事务)
    fn register_timetable(
        &self,
        record: &TimetableRecord,
        first: &NewVersion,
    ) -> RepositoryResult<TimetableVersion>;

    fn find_timetable(&self, timetable_id: &str) -> RepositoryResult<Option<TimetableRecord>>;

    fn find_timetable_by_section(&self, section_id: &str)
        -> RepositoryResult<Option<TimetableRecord>>;

    /// 全部登记课表 (按 timetable_id 升序)
    fn list_timetables(&self) -> RepositoryResult<Vec<TimetableRecord>>;

    /// 追加版本 (事务内分配 MAX(version_no)+1)
    fn insert_next_version(&self, version: &NewVersion) -> RepositoryResult<TimetableVersion>;

    /// 批量追加版本 (多个课表同一事务,全部成功或全部失败)
    fn insert_next_versions(&self, versions: &[NewVersion])
        -> RepositoryResult<Vec<TimetableVersion>>;

    fn find_version(&self, timetable_id: &str, version_no: i32)
        -> RepositoryResult<Option<TimetableVersion>>;

    fn find_version_by_id(&self, version_id: &str) -> RepositoryResult<Option<TimetableVersion>>;

    fn find_latest(&self, timetable_id: &str) -> RepositoryResult<Option<TimetableVersion>>;

    /// 版本列表 (version_no 升序)
    fn list_versions(&self, timetable_id: &str) -> RepositoryResult<Vec<TimetableVersion>>;
}

// ==========================================
// SqliteVersionRepository - SQLite 实现
// ==========================================
pub struct SqliteVersionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVersionRepository {
    /// 创建新的SqliteVersionRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 当前时间 (截断到秒,与存储精度一致)
    fn now() -> NaiveDateTime {
        let now = chrono::Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }

    /// 在事务内追加一个版本
    fn insert_in_tx(tx: &Transaction<'_>, version: &NewVersion) -> RepositoryResult<TimetableVersion> {
        let exists: Option<i32> = tx
            .query_row(
                "SELECT 1 FROM timetable WHERE timetable_id = ?",
                params![&version.timetable_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound {
                entity: "Timetable".to_string(),
                id: version.timetable_id.clone(),
            });
        }

        let max_version_no: Option<i32> = tx.query_row(
            "SELECT MAX(version_no) FROM timetable_version WHERE timetable_id = ?",
            params![&version.timetable_id],
            |row| row.get(0),
        )?;

        let committed = TimetableVersion {
            version_id: uuid::Uuid::new_v4().to_string(),
            timetable_id: version.timetable_id.clone(),
            version: max_version_no.unwrap_or(0) + 1,
            timetable: version.timetable.clone(),
            score: version.score,
            health_score: version.health_score,
            notes: version.notes.clone(),
            source: version.source.clone(),
            generated_at: Self::now(),
            restoration_metadata: version.restoration_metadata.clone(),
        };

        tx.execute(
            r#"INSERT INTO timetable_version (
                version_id, timetable_id, version_no, snapshot_json,
                score, health_score, notes, source_type, source_json,
                generated_at, restored_from, restored_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &committed.version_id,
                &committed.timetable_id,
                &committed.version,
                serde_json::to_string(&committed.timetable)?,
                &committed.score,
                &committed.health_score,
                &committed.notes,
                committed.source.to_db_str(),
                serde_json::to_string(&committed.source)?,
                committed.generated_at.format(TS_FORMAT).to_string(),
                committed.restoration_metadata.as_ref().map(|m| m.restored_from),
                committed
                    .restoration_metadata
                    .as_ref()
                    .map(|m| m.restored_at.format(TS_FORMAT).to_string()),
            ],
        )?;

        Ok(committed)
    }

    fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
        serde_json::from_str(raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    /// 映射数据库行到TimetableVersion对象
    fn map_version_row(row: &rusqlite::Row) -> rusqlite::Result<TimetableVersion> {
        let timetable: Timetable = Self::parse_json(3, &row.get::<_, String>(3)?)?;
        let source: VersionSource = Self::parse_json(7, &row.get::<_, String>(7)?)?;
        let restored_from: Option<i32> = row.get(9)?;
        let restored_at: Option<String> = row.get(10)?;
        let restoration_metadata = match (restored_from, restored_at) {
            (Some(from), Some(at)) => Some(RestorationMetadata {
                restored_from: from,
                restored_at: Self::parse_ts(10, &at)?,
            }),
            _ => None,
        };

        Ok(TimetableVersion {
            version_id: row.get(0)?,
            timetable_id: row.get(1)?,
            version: row.get(2)?,
            timetable,
            score: row.get(4)?,
            health_score: row.get(5)?,
            notes: row.get(6)?,
            source,
            generated_at: Self::parse_ts(8, &row.get::<_, String>(8)?)?,
            restoration_metadata,
        })
    }

    /// 映射数据库行到TimetableRecord对象
    fn map_record_row(row: &rusqlite::Row) -> rusqlite::Result<TimetableRecord> {
        let context: SchedulingContext = Self::parse_json(2, &row.get::<_, String>(2)?)?;
        Ok(TimetableRecord {
            timetable_id: row.get(0)?,
            section_id: row.get(1)?,
            context,
            created_at: Self::parse_ts(3, &row.get::<_, String>(3)?)?,
        })
    }

    fn query_one_version(
        &self,
        where_clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Option<TimetableVersion>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM timetable_version WHERE {}",
            VERSION_COLUMNS, where_clause
        );
        let version = conn
            .query_row(&sql, args, Self::map_version_row)
            .optional()?;
        Ok(version)
    }

    fn query_one_record(
        &self,
        where_clause: &str,
        arg: &str,
    ) -> RepositoryResult<Option<TimetableRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT timetable_id, section_id, context_json, created_at FROM timetable WHERE {}",
            where_clause
        );
        let record = conn
            .query_row(&sql, params![arg], Self::map_record_row)
            .optional()?;
        Ok(record)
    }
}

impl VersionRepository for SqliteVersionRepository {
    fn register_timetable(
        &self,
        record: &TimetableRecord,
        first: &NewVersion,
    ) -> RepositoryResult<TimetableVersion> {
        if first.timetable_id != record.timetable_id {
            return Err(RepositoryError::ValidationError(format!(
                "初始版本课表ID不一致: {} != {}",
                first.timetable_id, record.timetable_id
            )));
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO timetable (timetable_id, section_id, context_json, created_at)
               VALUES (?, ?, ?, ?)"#,
            params![
                &record.timetable_id,
                &record.section_id,
                serde_json::to_string(&record.context)?,
                record.created_at.format(TS_FORMAT).to_string(),
            ],
        )?;

        let committed = Self::insert_in_tx(&tx, first)?;
        tx.commit()?;
        Ok(committed)
    }

    fn find_timetable(&self, timetable_id: &str) -> RepositoryResult<Option<TimetableRecord>> {
        self.query_one_record("timetable_id = ?", timetable_id)
    }

    fn find_timetable_by_section(
        &self,
        section_id: &str,
    ) -> RepositoryResult<Option<TimetableRecord>> {
        self.query_one_record("section_id = ?", section_id)
    }

    fn list_timetables(&self) -> RepositoryResult<Vec<TimetableRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT timetable_id, section_id, context_json, created_at
               FROM timetable
               ORDER BY timetable_id"#,
        )?;
        let records = stmt
            .query_map([], Self::map_record_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn insert_next_version(&self, version: &NewVersion) -> RepositoryResult<TimetableVersion> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let committed = Self::insert_in_tx(&tx, version)?;
        tx.commit()?;
        Ok(committed)
    }

    fn insert_next_versions(
        &self,
        versions: &[NewVersion],
    ) -> RepositoryResult<Vec<TimetableVersion>> {
        if versions.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut committed = Vec::with_capacity(versions.len());
        for version in versions {
            committed.push(Self::insert_in_tx(&tx, version)?);
        }
        tx.commit()?;
        Ok(committed)
    }

    fn find_version(
        &self,
        timetable_id: &str,
        version_no: i32,
    ) -> RepositoryResult<Option<TimetableVersion>> {
        self.query_one_version(
            "timetable_id = ? AND version_no = ?",
            &[&timetable_id, &version_no],
        )
    }

    fn find_version_by_id(&self, version_id: &str) -> RepositoryResult<Option<TimetableVersion>> {
        self.query_one_version("version_id = ?", &[&version_id])
    }

    fn find_latest(&self, timetable_id: &str) -> RepositoryResult<Option<TimetableVersion>> {
        self.query_one_version(
            "timetable_id = ? ORDER BY version_no DESC LIMIT 1",
            &[&timetable_id],
        )
    }

    fn list_versions(&self, timetable_id: &str) -> RepositoryResult<Vec<TimetableVersion>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM timetable_version WHERE timetable_id = ? ORDER BY version_no ASC",
            VERSION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let versions = stmt
            .query_map(params![timetable_id], Self::map_version_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }
}
