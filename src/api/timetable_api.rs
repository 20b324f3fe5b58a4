// ==========================================
// 课表版本与局部重排引擎 - 课表 API
// ==========================================
// 职责: 对外契约门面 (快照/版本列表/重排/对比/回滚/登记)
// 说明: 返回类型字段均为 camelCase
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::config::EngineConfig;
use crate::domain::action_log::ActionLog;
use crate::domain::comparison::{
    SnapshotMetadata, SnapshotResponse, VersionComparisonResponse, VersionsResponse,
};
use crate::domain::context::SchedulingContext;
use crate::domain::regeneration::{RegenerationRequest, RegenerationResponse};
use crate::domain::timetable::Timetable;
use crate::domain::types::RegenerationScope;
use crate::domain::version::TimetableVersion;
use crate::engine::{DiffEngine, RegenerationOrchestrator, VersionStore};
use crate::repository::action_log_repo::ActionLogRepository;

/// 登记初始版本请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInitialRequest {
    pub timetable_id: String,
    pub section_id: String,
    #[serde(default)]
    pub context: SchedulingContext,
    pub timetable: Timetable,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

// ==========================================
// TimetableApi
// ==========================================

/// 课表 API
///
/// 职责：
/// 1. 快照与版本查询 (按班级)
/// 2. 局部重排
/// 3. 版本对比 / 回滚
/// 4. 初始版本登记与操作日志查询
pub struct TimetableApi {
    store: Arc<VersionStore>,
    orchestrator: Arc<RegenerationOrchestrator>,
    diff_engine: Arc<DiffEngine>,
    action_log_repo: Arc<ActionLogRepository>,
    config: EngineConfig,
}

impl TimetableApi {
    pub fn new(
        store: Arc<VersionStore>,
        orchestrator: Arc<RegenerationOrchestrator>,
        diff_engine: Arc<DiffEngine>,
        action_log_repo: Arc<ActionLogRepository>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            orchestrator,
            diff_engine,
            action_log_repo,
            config,
        }
    }

    /// 查询班级当前快照 (最新版本)
    pub fn get_snapshot(&self, section_id: &str) -> ApiResult<SnapshotResponse> {
        let section_id = require_non_empty(section_id, "班级ID")?;
        let record = self.store.timetable_for_section(section_id)?;
        let latest = self.store.latest(&record.timetable_id)?;

        Ok(SnapshotResponse {
            timetable_id: latest.timetable_id.clone(),
            version: latest.version,
            score: latest.score,
            health_score: latest.health_score,
            generated_at: latest.generated_at,
            metadata: SnapshotMetadata {
                slot_count: latest.timetable.slot_count(),
                days_with_classes: latest.timetable.days_with_classes(),
                last_updated: latest.generated_at,
            },
            timetable: latest.timetable,
        })
    }

    /// 查询班级课表的全部版本 (升序)
    pub fn get_versions(&self, section_id: &str) -> ApiResult<VersionsResponse> {
        let section_id = require_non_empty(section_id, "班级ID")?;
        let record = self.store.timetable_for_section(section_id)?;
        let versions = self.store.list(&record.timetable_id)?;
        let current_version = versions.last().map(|v| v.version).unwrap_or(0);

        Ok(VersionsResponse {
            timetable_id: record.timetable_id,
            current_version,
            versions,
        })
    }

    /// 局部重排
    ///
    /// # 参数
    /// - scope: 路由上的范围, 必须与请求体一致
    pub async fn regenerate(
        &self,
        scope: RegenerationScope,
        request: RegenerationRequest,
    ) -> ApiResult<RegenerationResponse> {
        if scope != request.scope {
            return Err(ApiError::InvalidScope(format!(
                "路由范围 {} 与请求范围 {} 不一致",
                scope.as_str(),
                request.scope.as_str()
            )));
        }
        Ok(self.orchestrator.regenerate(request).await?)
    }

    /// 对比同一课表的两个版本
    pub fn compare_versions(
        &self,
        timetable_id: &str,
        version1: i32,
        version2: i32,
        top_n: Option<usize>,
    ) -> ApiResult<VersionComparisonResponse> {
        let timetable_id = require_non_empty(timetable_id, "课表ID")?;
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        debug!(timetable_id, version1, version2, top_n, "对比版本");
        Ok(self
            .diff_engine
            .compare(timetable_id, version1, version2, top_n)?)
    }

    /// 按版本ID对比 (两个版本必须属于同一课表)
    pub fn compare_by_version_id(
        &self,
        version_id1: &str,
        version_id2: &str,
        top_n: Option<usize>,
    ) -> ApiResult<VersionComparisonResponse> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        Ok(self
            .diff_engine
            .compare_by_version_id(version_id1, version_id2, top_n)?)
    }

    /// 回滚: 以旧版本快照创建新版本
    pub async fn restore_version(
        &self,
        timetable_id: &str,
        version: i32,
        notes: Option<String>,
        actor: &str,
    ) -> ApiResult<TimetableVersion> {
        let timetable_id = require_non_empty(timetable_id, "课表ID")?;
        Ok(self
            .orchestrator
            .restore(timetable_id, version, notes, actor)
            .await?)
    }

    /// 登记外部求解器产出的初始课表
    pub async fn register_initial(
        &self,
        request: RegisterInitialRequest,
    ) -> ApiResult<TimetableVersion> {
        require_non_empty(&request.section_id, "班级ID")?;
        let actor = request.actor.as_deref().unwrap_or("system");
        Ok(self
            .orchestrator
            .register_initial(
                &request.timetable_id,
                &request.section_id,
                request.context.clone(),
                request.timetable.clone(),
                request.notes.clone(),
                actor,
            )
            .await?)
    }

    /// 查询课表操作日志 (按时间倒序)
    pub fn list_action_logs(&self, timetable_id: &str, limit: usize) -> ApiResult<Vec<ActionLog>> {
        let timetable_id = require_non_empty(timetable_id, "课表ID")?;
        self.store.find_timetable(timetable_id)?;
        Ok(self.action_log_repo.find_by_timetable(timetable_id, limit)?)
    }
}

fn require_non_empty<'a>(value: &'a str, field: &str) -> ApiResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(trimmed)
}
