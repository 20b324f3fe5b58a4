// ==========================================
// 局部重排测试
// ==========================================
// 职责: 范围保持、跨班级教师重排、扩大范围、冲突报告、
//       求解器不可用 / 超时、并发提交
// ==========================================


#[cfg(test)]
mod regeneration_test {
    use crate::test_helpers::*;
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use timetable_regen::api::ApiError;
    use timetable_regen::domain::{
        ConflictKind, Day, RegenerationRequest, RegenerationScope, SlotRef,
    };
    use timetable_regen::engine::solver::{SolveOutcome, SolverProblem};
    use timetable_regen::engine::{
        SolverRegistry, TimetableSolver, VersionEvent, VersionEventPublisher, VersionEventType,
    };

    // ==========================================
    // 测试用求解器 / 事件发布者
    // ==========================================

    /// 一直运行到取消标志置位
    struct StallingSolver;

    impl TimetableSolver for StallingSolver {
        fn id(&self) -> &str {
            "stalling"
        }

        fn solve(&self, _problem: &SolverProblem, cancel: &AtomicBool) -> SolveOutcome {
            while !cancel.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(5));
            }
            SolveOutcome {
                cancelled: true,
                ..SolveOutcome::default()
            }
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<VersionEvent>>,
    }

    impl VersionEventPublisher for RecordingPublisher {
        fn publish(&self, event: VersionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok(String::new())
        }
    }

    // ==========================================
    // 单节重排
    // ==========================================

    #[tokio::test]
    async fn test_slot_regeneration_changes_only_that_slot() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        let (v1, _) = register_school(&api).await;

        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "greedy");
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();

        assert_eq!(resp.versions.len(), 1);
        assert_eq!(resp.versions[0].timetable_id, TT_S1);
        assert_eq!(resp.versions[0].version, 2);
        assert!(resp.conflicts.is_empty(), "不应有冲突: {:?}", resp.conflicts);
        assert_eq!(resp.solver_metadata.strategy, "greedy");
        assert!(!resp.solver_metadata.widened);

        // Mon 第0节: R2 被 S2 占用, 换到空闲的 R3 代价最低
        let target = SlotRef::new("S1", Day::Mon, 0);
        let after = resp.timetables["S1"].get(Day::Mon, 0).unwrap();
        assert_eq!(after.subject_code.as_deref(), Some("MATH"));
        assert_eq!(after.teacher_id.as_deref(), Some("T1"));
        assert_eq!(after.room_id.as_deref(), Some("R3"));

        assert_eq!(resp.changed_slots.len(), 1);
        assert_eq!(resp.changed_slots[0].changed_fields, vec!["roomId".to_string()]);
        assert!(!resp.changed_slots[0].secondary);

        let latest = api.get_snapshot("S1").unwrap();
        assert_unchanged_except(&v1.timetable, &latest.timetable, &[target]);

        let diff = api.compare_versions(TT_S1, 1, 2, None).unwrap();
        assert_eq!(diff.summary.modified, 1);
        assert_eq!(diff.summary.added, 0);
        assert_eq!(diff.summary.removed, 0);
    }

    #[tokio::test]
    async fn test_lab_slot_expands_to_whole_span() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        let (v1, _) = register_school(&api).await;

        // 选中实验课后续节 -> 整个跨节一起重排
        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Tue, 2, "exhaustive");
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();
        assert!(resp.conflicts.is_empty(), "不应有冲突: {:?}", resp.conflicts);

        let tue = &resp.timetables["S1"].days[&Day::Tue];
        assert!(tue[1].is_lab_head());
        assert!(tue[2].is_continuation());

        let span = [SlotRef::new("S1", Day::Tue, 1), SlotRef::new("S1", Day::Tue, 2)];
        let latest = api.get_snapshot("S1").unwrap();
        assert_unchanged_except(&v1.timetable, &latest.timetable, &span);
    }

    #[tokio::test]
    async fn test_invalid_scope_rejected_before_solving() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        register_school(&api).await;

        // 课间
        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 2, "greedy");
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidScope(_)), "课间不可重排: {}", err);

        // 越界
        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 9, "greedy");
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SCOPE");

        // 路由范围与请求不一致
        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "greedy");
        let err = api.regenerate(RegenerationScope::Day, req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SCOPE");

        // 课表ID与班级不匹配
        let req = RegenerationRequest::slot(TT_S2, "S1", Day::Mon, 0, "greedy");
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TIMETABLE_ID");

        // sectionId 与 targetId 不一致
        let mut req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "greedy");
        req.section_id = "S2".to_string();
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SCOPE");

        // 没有课的教师
        let req = RegenerationRequest::teacher(TT_S1, "S1", "T5", "greedy");
        let err = api.regenerate(RegenerationScope::Teacher, req).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_SCOPE");

        assert_eq!(api.get_versions("S1").unwrap().current_version, 1);
    }

    // ==========================================
    // 教师范围 (跨班级)
    // ==========================================

    #[tokio::test]
    async fn test_teacher_regeneration_spans_sections() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        let (s1, s2) = register_school(&api).await;

        let req = RegenerationRequest::teacher(TT_S1, "S1", "T1", "greedy");
        let resp = api.regenerate(RegenerationScope::Teacher, req).await.unwrap();

        // 两个班级各产生一个新版本
        let committed: Vec<(String, i32)> = resp
            .versions
            .iter()
            .map(|v| (v.timetable_id.clone(), v.version))
            .collect();
        assert_eq!(
            committed,
            vec![(TT_S1.to_string(), 2), (TT_S2.to_string(), 2)]
        );
        assert!(resp.timetables.contains_key("S1"));
        assert!(resp.timetables.contains_key("S2"));
        assert!(resp.conflicts.is_empty(), "不应有冲突: {:?}", resp.conflicts);

        let t1_slots_s1 = [SlotRef::new("S1", Day::Mon, 0), SlotRef::new("S1", Day::Tue, 0)];
        let t1_slots_s2 = [SlotRef::new("S2", Day::Mon, 1)];

        let new_s1 = api.get_snapshot("S1").unwrap().timetable;
        let new_s2 = api.get_snapshot("S2").unwrap().timetable;
        assert_unchanged_except(&s1.timetable, &new_s1, &t1_slots_s1);
        assert_unchanged_except(&s2.timetable, &new_s2, &t1_slots_s2);

        // MATH 课次数不变 (T1 或可替代的 T5)
        let math = |tt: &timetable_regen::domain::Timetable| {
            lesson_count(tt, "T1") + lesson_count(tt, "T5")
        };
        assert_eq!(math(&new_s1), 2);
        assert_eq!(math(&new_s2), 1);
    }

    // ==========================================
    // 扩大范围与冲突报告
    // ==========================================

    #[tokio::test]
    async fn test_unsatisfiable_slot_reports_conflict() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        api.register_initial(register_request(TT_S1, "S1", unavailable_context(), unavailable_week()))
            .await
            .unwrap();

        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "exhaustive");
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();

        // 无可行解仍提交版本, 冲突随响应返回
        assert_eq!(resp.versions[0].version, 2);
        assert!(resp.has_conflicts());
        assert!(resp
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::TeacherUnavailable
                && c.slots.contains(&SlotRef::new("S1", Day::Mon, 0))));
        assert_eq!(resp.solver_metadata.unplaced_lessons, 1);
        assert!(!resp.solver_metadata.widened);
        assert!(resp.changed_slots.is_empty());
    }

    #[tokio::test]
    async fn test_widening_reports_secondary_changes() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        api.register_initial(register_request(TT_S1, "S1", unavailable_context(), unavailable_week()))
            .await
            .unwrap();

        let mut req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "exhaustive");
        req.preserve_unchanged = false;
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();

        assert!(resp.solver_metadata.widened);
        assert!(resp.conflicts.is_empty(), "扩大范围后应无冲突: {:?}", resp.conflicts);

        let mon = &resp.timetables["S1"].days[&Day::Mon];
        assert!(mon[0].is_empty());
        assert_eq!(mon[1].subject_code.as_deref(), Some("PHY"));
        assert_eq!(mon[2].subject_code.as_deref(), Some("MATH"));
        assert_eq!(mon[2].teacher_id.as_deref(), Some("T1"));

        let primary: Vec<_> = resp.changed_slots.iter().filter(|c| !c.secondary).collect();
        let secondary: Vec<_> = resp.changed_slots.iter().filter(|c| c.secondary).collect();
        assert_eq!(primary.len(), 1);
        assert_eq!((primary[0].day, primary[0].slot_index), (Day::Mon, 0));
        assert_eq!(secondary.len(), 1);
        assert_eq!((secondary[0].day, secondary[0].slot_index), (Day::Mon, 2));
    }

    #[tokio::test]
    async fn test_existing_frozen_conflict_does_not_widen() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        let v1 = api
            .register_initial(register_request(TT_S1, "S1", unavailable_context(), unavailable_week()))
            .await
            .unwrap();

        // Mon0 的 T1 不可用冲突在 v1 中已存在, 且不在本次范围内
        let mut req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 1, "greedy");
        req.preserve_unchanged = false;
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();

        assert!(!resp.solver_metadata.widened);
        assert!(resp.changed_slots.iter().all(|c| !c.secondary));
        assert_unchanged_except(
            &v1.timetable,
            &api.get_snapshot("S1").unwrap().timetable,
            &[SlotRef::new("S1", Day::Mon, 1)],
        );
        // 原有冲突照常报告
        assert!(resp
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::TeacherUnavailable
                && c.slots.contains(&SlotRef::new("S1", Day::Mon, 0))));
    }

    // ==========================================
    // 求解器不可用 / 超时
    // ==========================================

    #[tokio::test]
    async fn test_unknown_solver_leaves_latest_unchanged() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        let (v1, _) = register_school(&api).await;

        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "quantum");
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        assert_eq!(err.code(), "SOLVER_UNAVAILABLE");

        let latest = api.get_snapshot("S1").unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.timetable, v1.timetable);
    }

    #[tokio::test]
    async fn test_solver_timeout_commits_nothing() {
        let mut solvers = SolverRegistry::with_defaults();
        solvers.register(Arc::new(StallingSolver));
        let (_tmp, state) = setup_with_solvers(solvers, None);
        let api = state.timetable_api.clone();
        register_school(&api).await;

        let mut req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "stalling");
        req.timeout_ms = Some(50);
        let err = api.regenerate(RegenerationScope::Slot, req).await.unwrap_err();
        match err {
            ApiError::SolverTimeout {
                solver_type,
                timeout_ms,
            } => {
                assert_eq!(solver_type, "stalling");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("Expected SolverTimeout, got {}", other),
        }

        assert_eq!(api.get_versions("S1").unwrap().current_version, 1);

        // 超时后写锁已释放, 后续请求可正常提交
        let req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "greedy");
        let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();
        assert_eq!(resp.versions[0].version, 2);
    }

    // ==========================================
    // 并发
    // ==========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_regenerations_get_distinct_versions() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        register_school(&api).await;

        let requests = [(Day::Mon, 0usize), (Day::Mon, 1), (Day::Mon, 3), (Day::Wed, 0)];
        let handles: Vec<_> = requests
            .iter()
            .map(|&(day, slot)| {
                let api = api.clone();
                tokio::spawn(async move {
                    let req = RegenerationRequest::slot(TT_S1, "S1", day, slot, "greedy");
                    api.regenerate(RegenerationScope::Slot, req).await
                })
            })
            .collect();

        let mut versions: Vec<i32> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("任务异常").expect("重排失败").versions[0].version)
            .collect();
        versions.sort();
        assert_eq!(versions, vec![2, 3, 4, 5]);

        let listed: Vec<i32> = api
            .get_versions("S1")
            .unwrap()
            .versions
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(listed, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_identical_requests_are_not_deduplicated() {
        let (_tmp, state) = setup_test_env();
        let api = state.timetable_api.clone();
        register_school(&api).await;

        for expected in [2, 3] {
            let req = RegenerationRequest::slot(TT_S1, "S1", Day::Wed, 3, "greedy");
            let resp = api.regenerate(RegenerationScope::Slot, req).await.unwrap();
            assert_eq!(resp.versions[0].version, expected);
        }
    }

    // ==========================================
    // 审计与事件
    // ==========================================

    #[tokio::test]
    async fn test_action_logs_and_events() {
        let publisher = Arc::new(RecordingPublisher::default());
        let shared: Arc<dyn VersionEventPublisher> = publisher.clone();
        let (_tmp, state) = setup_with_solvers(SolverRegistry::with_defaults(), Some(shared));
        let api = state.timetable_api.clone();
        register_school(&api).await;

        let mut req = RegenerationRequest::slot(TT_S1, "S1", Day::Mon, 0, "greedy");
        req.requested_by = Some("planner".to_string());
        api.regenerate(RegenerationScope::Slot, req).await.unwrap();
        api.restore_version(TT_S1, 1, None, "planner").await.unwrap();

        let logs = api.list_action_logs(TT_S1, 10).unwrap();
        let types: Vec<&str> = logs.iter().map(|l| l.action_type.as_str()).collect();
        assert_eq!(types, vec!["RESTORE", "REGENERATE", "REGISTER_INITIAL"]);
        assert_eq!(logs[1].actor, "planner");
        assert_eq!(logs[1].version, Some(2));

        let events = publisher.events.lock().unwrap();
        let s1_events: Vec<_> = events.iter().filter(|e| e.timetable_id == TT_S1).collect();
        assert_eq!(s1_events.len(), 3);
        assert_eq!(s1_events[0].event_type, VersionEventType::VersionRegistered);
        assert_eq!(s1_events[1].event_type, VersionEventType::VersionRegenerated);
        assert_eq!(
            s1_events[1].changed_slots,
            Some(vec![SlotRef::new("S1", Day::Mon, 0)])
        );
        assert_eq!(s1_events[2].event_type, VersionEventType::VersionRestored);
        assert_eq!(s1_events[2].version, 3);
    }
}
