// ==========================================
// 课表版本与局部重排引擎 - 重排编排器
// ==========================================
// 主流程:
//   校验 -> 求解器查找 -> 范围解析 -> 加锁 (升序) -> 重新解析
//   -> 求解 (spawn_blocking + 超时) -> 冲突检测 -> 评分
//   -> 单事务提交 -> ActionLog -> 版本事件
// 红线:
//   - 校验失败 / 超时 / 求解器异常时不提交任何版本
//   - 范围外课节逐格保持不变
// ==========================================

use crate::config::EngineConfig;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::context::{ResourceCatalog, SchedulingContext};
use crate::domain::regeneration::{
    ChangedSlot, CommittedVersionRef, RegenerationRequest, RegenerationResponse, SolverMetadata,
};
use crate::domain::timetable::{SlotRef, Timetable};
use crate::domain::types::VersionSource;
use crate::domain::version::{NewVersion, TimetableRecord, TimetableVersion};
use crate::engine::diff::diff_snapshots;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{
    OptionalEventPublisher, VersionEvent, VersionEventPublisher, VersionEventType,
};
use crate::engine::regeneration_job::{JobOutcome, RegenerationJob};
use crate::engine::scope::{ResolvedScope, ScopeResolver};
use crate::engine::scoring::{round2, Scorer};
use crate::engine::solver::SolverRegistry;
use crate::engine::version_store::{now_seconds, TimetableLocks, VersionStore};
use crate::engine::world::World;
use crate::repository::action_log_repo::ActionLogRepository;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 加锁后受影响课表集合变化时的最大重试次数
const MAX_RESOLVE_ATTEMPTS: usize = 3;

const SYSTEM_ACTOR: &str = "system";

// ==========================================
// RegenerationOrchestrator
// ==========================================

pub struct RegenerationOrchestrator {
    store: Arc<VersionStore>,
    action_logs: Arc<ActionLogRepository>,
    solvers: Arc<SolverRegistry>,
    config: EngineConfig,
    events: OptionalEventPublisher,
}

impl RegenerationOrchestrator {
    pub fn new(
        store: Arc<VersionStore>,
        action_logs: Arc<ActionLogRepository>,
        solvers: Arc<SolverRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            action_logs,
            solvers,
            config,
            events: OptionalEventPublisher::none(),
        }
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn VersionEventPublisher>) -> Self {
        self.events = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn solver_ids(&self) -> Vec<String> {
        self.solvers.ids()
    }

    fn scorer(&self, catalog: &ResourceCatalog) -> Scorer {
        Scorer::new(self.config.weights, self.config.default_max_periods_per_day)
            .with_teacher_limits(catalog.teacher_max_per_day.clone())
    }

    // ==========================================
    // 登记初始版本
    // ==========================================

    /// 登记外部全量求解器产出的课表为 version 1
    #[instrument(skip(self, context, timetable, notes))]
    pub async fn register_initial(
        &self,
        timetable_id: &str,
        section_id: &str,
        context: SchedulingContext,
        mut timetable: Timetable,
        notes: Option<String>,
        actor: &str,
    ) -> EngineResult<TimetableVersion> {
        if timetable_id.trim().is_empty() {
            return Err(EngineError::InvalidTimetableId("课表ID为空".to_string()));
        }
        if timetable.sections.len() != 1 || !timetable.sections.contains_key(section_id) {
            return Err(EngineError::InvalidTimetableId(format!(
                "初始快照必须且只能包含班级 {}",
                section_id
            )));
        }
        for week in timetable.sections.values_mut() {
            week.normalize();
        }

        // 教师日上限取全部登记上下文 (与冲突检测一致)
        let world = World::load(&self.store)?;
        let catalog = ResourceCatalog::build(
            world
                .entries
                .values()
                .map(|e| &e.record.context)
                .chain(std::iter::once(&context)),
            [&timetable],
        );
        let scorer = self.scorer(&catalog);
        let record = TimetableRecord {
            timetable_id: timetable_id.to_string(),
            section_id: section_id.to_string(),
            context,
            created_at: now_seconds(),
        };
        let first = NewVersion {
            timetable_id: timetable_id.to_string(),
            score: scorer.score(&timetable),
            health_score: scorer.health_score(&timetable),
            timetable,
            notes,
            source: VersionSource::Initial,
            restoration_metadata: None,
        };

        let version = self.store.register(&record, &first).await?;

        self.log_actions(vec![self.action_log(
            &version,
            ActionType::RegisterInitial,
            actor,
            Some(serde_json::json!({ "sectionId": section_id })),
            format!("登记班级 {} 初始课表", section_id),
        )]);
        self.publish(VersionEvent::new(
            &version.timetable_id,
            &version.version_id,
            version.version,
            VersionEventType::VersionRegistered,
            Some(VersionSource::Initial.to_db_str().to_string()),
        ));
        Ok(version)
    }

    // ==========================================
    // 回滚
    // ==========================================

    #[instrument(skip(self, notes))]
    pub async fn restore(
        &self,
        timetable_id: &str,
        from_version: i32,
        notes: Option<String>,
        actor: &str,
    ) -> EngineResult<TimetableVersion> {
        let version = self.store.restore(timetable_id, from_version, notes).await?;

        self.log_actions(vec![self.action_log(
            &version,
            ActionType::Restore,
            actor,
            Some(serde_json::json!({ "restoredFrom": from_version })),
            format!("回滚自版本 {}", from_version),
        )]);
        self.publish(VersionEvent::new(
            &version.timetable_id,
            &version.version_id,
            version.version,
            VersionEventType::VersionRestored,
            Some(format!("restore:{}", from_version)),
        ));
        Ok(version)
    }

    // ==========================================
    // 局部重排
    // ==========================================

    #[instrument(
        skip(self, request),
        fields(
            timetable_id = %request.timetable_id,
            scope = %request.scope.as_str(),
            target = %request.target_id,
            solver = %request.solver_type
        )
    )]
    pub async fn regenerate(
        &self,
        request: RegenerationRequest,
    ) -> EngineResult<RegenerationResponse> {
        let started = Instant::now();

        // 校验类错误必须在求解前返回
        ScopeResolver::validate(&request)?;
        let solver = self
            .solvers
            .get(&request.solver_type)
            .ok_or_else(|| EngineError::SolverUnavailable(request.solver_type.clone()))?;

        let (world, resolved, locks) = self.resolve_and_lock(&request).await?;
        debug!(
            sections = ?resolved.sections,
            mutable = resolved.mutable_slots.len(),
            frozen = resolved.frozen_slots.len(),
            "重排范围已解析"
        );

        let job = RegenerationJob {
            world: world.merged(),
            catalog: world.catalog(),
            widened_slots: if request.preserve_unchanged {
                None
            } else {
                Some(ScopeResolver::widen(&resolved, &world))
            },
            resolved: resolved.clone(),
            default_max_periods_per_day: self.config.default_max_periods_per_day,
            max_nodes: self.config.exhaustive_max_nodes,
        };

        // ===== 求解 (阻塞线程池, 超时取消) =====
        let timeout_ms = request.timeout_ms.unwrap_or(self.config.solver_timeout_ms);
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = {
            let cancel = Arc::clone(&cancel);
            let solver = Arc::clone(&solver);
            tokio::task::spawn_blocking(move || job.run(solver.as_ref(), &cancel))
        };

        let outcome = match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                return Err(EngineError::Internal(format!("求解任务异常: {}", join_err)));
            }
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(timeout_ms, "求解超时, 不提交任何版本");
                return Err(EngineError::SolverTimeout {
                    solver_type: request.solver_type.clone(),
                    timeout_ms,
                });
            }
        };

        // ===== 组装新版本并提交 =====
        let changed_slots = changed_slots(&world, &resolved, &outcome);
        let new_versions = self.build_versions(&request, &world, &resolved, &outcome);
        let committed = self.store.commit_batch(&locks, &new_versions)?;
        drop(locks);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let response = self.build_response(solver.id(), elapsed_ms, &world, outcome, changed_slots, &committed);

        info!(
            versions = ?committed.iter().map(|v| (v.timetable_id.as_str(), v.version)).collect::<Vec<_>>(),
            changed = response.changed_slots.len(),
            conflicts = response.conflicts.len(),
            elapsed_ms,
            "局部重排完成"
        );
        if response.has_conflicts() {
            warn!(conflicts = response.conflicts.len(), "重排结果存在冲突, 已随版本返回");
        }

        self.after_regeneration(&request, &committed, &response);
        Ok(response)
    }

    /// 解析范围并按升序加锁; 加锁后重新解析, 受影响课表集合变化则重试
    async fn resolve_and_lock(
        &self,
        request: &RegenerationRequest,
    ) -> EngineResult<(World, ResolvedScope, TimetableLocks)> {
        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let world = World::load(&self.store)?;
            let resolved = ScopeResolver::resolve(request, &world)?;

            let locks = self.store.lock_many(&resolved.timetable_ids).await?;

            let world = World::load(&self.store)?;
            let relocked = ScopeResolver::resolve(request, &world)?;
            if relocked.timetable_ids == resolved.timetable_ids {
                return Ok((world, relocked, locks));
            }
            debug!(attempt, "加锁期间受影响课表变化, 重新解析");
        }
        Err(EngineError::Internal(
            "受影响课表集合持续变化, 放弃加锁".to_string(),
        ))
    }

    fn build_versions(
        &self,
        request: &RegenerationRequest,
        world: &World,
        resolved: &ResolvedScope,
        outcome: &JobOutcome,
    ) -> Vec<NewVersion> {
        let scorer = self.scorer(&world.catalog());
        resolved
            .timetable_ids
            .iter()
            .filter_map(|id| world.entries.get(id))
            .map(|entry| {
                let mut snapshot = entry.latest.timetable.clone();
                for (section_id, week) in &outcome.candidate.sections {
                    if snapshot.sections.contains_key(section_id) {
                        snapshot.sections.insert(section_id.clone(), week.clone());
                    }
                }
                NewVersion {
                    timetable_id: entry.record.timetable_id.clone(),
                    score: scorer.score(&snapshot),
                    health_score: scorer.health_score(&snapshot),
                    timetable: snapshot,
                    notes: request.notes.clone(),
                    source: VersionSource::Regeneration {
                        scope: request.scope,
                        solver_type: request.solver_type.clone(),
                    },
                    restoration_metadata: None,
                }
            })
            .collect()
    }

    fn build_response(
        &self,
        strategy: &str,
        elapsed_ms: u64,
        world: &World,
        outcome: JobOutcome,
        changed_slots: Vec<ChangedSlot>,
        committed: &[TimetableVersion],
    ) -> RegenerationResponse {
        let count = committed.len().max(1) as f64;
        let score = committed.iter().map(|v| v.score).sum::<f64>() / count;
        let health_score = committed.iter().map(|v| v.health_score).sum::<f64>() / count;

        let versions = committed
            .iter()
            .map(|v| CommittedVersionRef {
                timetable_id: v.timetable_id.clone(),
                section_id: world
                    .entries
                    .get(&v.timetable_id)
                    .map(|e| e.record.section_id.clone())
                    .unwrap_or_default(),
                version_id: v.version_id.clone(),
                version: v.version,
                score: v.score,
                health_score: v.health_score,
            })
            .collect();

        RegenerationResponse {
            timetables: outcome.candidate.sections,
            score: round2(score),
            health_score: round2(health_score),
            conflicts: outcome.conflicts,
            changed_slots,
            solver_metadata: SolverMetadata {
                strategy: strategy.to_string(),
                attempts: outcome.attempts,
                elapsed_ms,
                placed_lessons: outcome.placed,
                unplaced_lessons: outcome.unplaced,
                widened: outcome.widened,
            },
            versions,
        }
    }

    /// 提交后的副作用: ActionLog + 版本事件 (失败仅告警)
    fn after_regeneration(
        &self,
        request: &RegenerationRequest,
        committed: &[TimetableVersion],
        response: &RegenerationResponse,
    ) {
        let actor = request.requested_by.as_deref().unwrap_or(SYSTEM_ACTOR);
        let logs = committed
            .iter()
            .map(|v| {
                self.action_log(
                    v,
                    ActionType::Regenerate,
                    actor,
                    Some(serde_json::json!({
                        "request": request,
                        "changedSlots": response.changed_slots.len(),
                        "conflicts": response.conflicts.len(),
                        "solver": response.solver_metadata,
                    })),
                    format!(
                        "{} 范围重排 (目标 {}), 变更 {} 节",
                        request.scope.as_str(),
                        request.target_id,
                        response.changed_slots.len()
                    ),
                )
            })
            .collect();
        self.log_actions(logs);

        for v in committed {
            let sections: BTreeSet<&String> = v.timetable.sections.keys().collect();
            let slots: Vec<SlotRef> = response
                .changed_slots
                .iter()
                .filter(|c| sections.contains(&c.section_id))
                .map(|c| SlotRef::new(&c.section_id, c.day, c.slot_index))
                .collect();
            self.publish(
                VersionEvent::new(
                    &v.timetable_id,
                    &v.version_id,
                    v.version,
                    VersionEventType::VersionRegenerated,
                    Some(v.source.to_db_str().to_string()),
                )
                .with_changed_slots(slots),
            );
        }
    }

    // ==========================================
    // 辅助
    // ==========================================

    fn action_log(
        &self,
        version: &TimetableVersion,
        action_type: ActionType,
        actor: &str,
        payload: Option<serde_json::Value>,
        detail: String,
    ) -> ActionLog {
        ActionLog {
            action_id: Uuid::new_v4().to_string(),
            timetable_id: version.timetable_id.clone(),
            version: Some(version.version),
            action_type: action_type.as_str().to_string(),
            action_ts: now_seconds(),
            actor: actor.to_string(),
            payload_json: payload,
            detail: Some(detail),
        }
    }

    fn log_actions(&self, logs: Vec<ActionLog>) {
        if let Err(e) = self.action_logs.batch_insert(&logs) {
            warn!(error = %e, count = logs.len(), "ActionLog 写入失败");
        }
    }

    fn publish(&self, event: VersionEvent) {
        let timetable_id = event.timetable_id.clone();
        if let Err(e) = self.events.publish(event) {
            warn!(timetable_id = %timetable_id, error = %e, "版本事件发布失败");
        }
    }
}

/// 受影响班级的逐节变化; 原可变集合之外的变化标记为 secondary
fn changed_slots(world: &World, resolved: &ResolvedScope, outcome: &JobOutcome) -> Vec<ChangedSlot> {
    let mut before = Timetable::new();
    for section_id in &resolved.sections {
        if let Some(week) = world.week_of(section_id) {
            before.sections.insert(section_id.clone(), week.clone());
        }
    }

    diff_snapshots(&before, &outcome.candidate, 0)
        .changes
        .into_iter()
        .map(|c| {
            let slot = SlotRef::new(&c.section_id, c.day, c.slot_index);
            ChangedSlot {
                secondary: !resolved.mutable_slots.contains(&slot),
                section_id: c.section_id,
                day: c.day,
                slot_index: c.slot_index,
                before: c.before.unwrap_or_default(),
                after: c.after.unwrap_or_default(),
                changed_fields: c.changed_fields,
            }
        })
        .collect()
}
