//! End-to-end tests of the sync and reconcile pipeline through the library API

use std::fs;
use std::path::Path;

use plansync::config::{ModuleWeight, PhaseMapping, SyncConfig};
use plansync::model::load_model;
use plansync::reconcile::{Direction, Reconciler};
use plansync::sync::sync_from_markdown;
use plansync::testing::MockIssueTracker;
use plansync::tracker::{IssueState, IssueTracker, StateFilter};
use plansync::{IssuePublisher, TaskStatus};
use tempfile::TempDir;

fn config() -> SyncConfig {
    SyncConfig {
        phases: vec![
            PhaseMapping::new("🔴 阶段一：认证系统完善", "02-phase-1-auth-system.md"),
            PhaseMapping::new("阶段二：核心监控功能", "03-phase-2-core-monitoring.md"),
        ],
        modules: vec![
            ModuleWeight::new("前端应用", 0.6),
            ModuleWeight::new("后端应用", 0.4),
        ],
        ..SyncConfig::default()
    }
}

const PHASE_ONE: &str = "\
# 阶段一

### ✅ 用户登录 @done(2024-03-01)
**描述**: 邮箱密码登录
**验收标准**:
- 登录成功跳转首页
- 错误密码提示

### ☐ 找回密码
**状态**: 🔄 进行中

### ⏸ 双因素认证
";

const PHASE_TWO: &str = "### ☐ 设备列表\n\n### ☐ 实时告警\n";

const MODEL: &str = r#"{
  "projectName": "iot-monitor",
  "modules": [
    {"name": "前端应用", "status": "50%", "description": "Web"},
    {"name": "后端应用", "status": "25% done", "description": "API"}
  ],
  "phaseDetails": [],
  "milestones": ["beta"]
}
"#;

fn setup() -> TempDir {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("02-phase-1-auth-system.md"), PHASE_ONE).unwrap();
    fs::write(docs.join("03-phase-2-core-monitoring.md"), PHASE_TWO).unwrap();
    fs::write(docs.join("project-plan-structured.json"), MODEL).unwrap();
    temp
}

fn read_doc(root: &Path, name: &str) -> String {
    fs::read_to_string(root.join("docs").join(name)).unwrap()
}

#[test]
fn test_sync_builds_full_model() {
    let temp = setup();
    let cfg = config();

    let (model, report) = sync_from_markdown(&cfg, temp.path(), false).unwrap();
    assert!(report.written);
    assert_eq!(report.updated_count(), 2);
    // 0.6 * 50 + 0.4 * 25
    assert_eq!(model.overall_progress.as_deref(), Some("40.0%"));

    let phase = &model.phase_details[0];
    assert_eq!(phase.document, "./02-phase-1-auth-system.md");
    assert_eq!(phase.tasks.len(), 3);
    assert_eq!(phase.tasks[0].description.as_deref(), Some("邮箱密码登录"));
    assert_eq!(phase.tasks[0].acceptance_criteria.len(), 2);
    // Body status overrides the heading symbol
    assert_eq!(phase.tasks[1].status, TaskStatus::InProgress);
    assert_eq!(phase.tasks[2].status, TaskStatus::Paused);

    let progress = phase.progress.unwrap();
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.in_progress, 1);
    assert_eq!(progress.pending, 1);
    assert_eq!(progress.percentage, 50.0);

    let raw: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("docs/project-plan-structured.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(raw["projectName"], "iot-monitor");
    assert_eq!(raw["milestones"][0], "beta");
}

#[test]
fn test_sync_is_idempotent() {
    let temp = setup();
    let cfg = config();

    let (first, _) = sync_from_markdown(&cfg, temp.path(), false).unwrap();
    let (second, _) = sync_from_markdown(&cfg, temp.path(), false).unwrap();

    assert_eq!(first.phase_details.len(), second.phase_details.len());
    for (a, b) in first.phase_details.iter().zip(&second.phase_details) {
        assert_eq!(a.phase, b.phase);
        assert_eq!(a.progress, b.progress);
        let titles_a: Vec<_> = a.tasks.iter().map(|t| (&t.title, t.status)).collect();
        let titles_b: Vec<_> = b.tasks.iter().map(|t| (&t.title, t.status)).collect();
        assert_eq!(titles_a, titles_b);
    }
    assert_eq!(first.overall_progress, second.overall_progress);
}

#[test]
fn test_publish_then_reconcile_round_trip() {
    let temp = setup();
    let cfg = config();
    let (model, _) = sync_from_markdown(&cfg, temp.path(), false).unwrap();

    // Publish one issue per task
    let tracker = MockIssueTracker::new();
    let published = IssuePublisher::new(&cfg, &tracker).publish(&model).unwrap();
    assert_eq!(published.created.len(), 5);
    assert_eq!(published.created[0].title, "[阶段一：认证系统完善] 用户登录");

    // Push document status: only the done task closes its issue
    let report = Reconciler::new(&cfg, temp.path(), &tracker)
        .run(Direction::DocumentsToIssues)
        .unwrap();
    assert_eq!(report.issues_closed, 1);
    assert_eq!(tracker.list_issues(StateFilter::Closed).unwrap().len(), 1);

    // Someone closes the 实时告警 issue on the tracker
    let alarm = tracker
        .issues()
        .into_iter()
        .find(|i| i.title.ends_with("实时告警"))
        .unwrap();
    tracker.set_issue_state(alarm.id, IssueState::Closed).unwrap();

    let report = Reconciler::new(&cfg, temp.path(), &tracker)
        .run(Direction::IssuesToDocuments)
        .unwrap();
    assert_eq!(report.lines_updated, 1);
    assert_eq!(
        read_doc(temp.path(), "03-phase-2-core-monitoring.md"),
        "### ☐ 设备列表\n\n### ✅ 实时告警\n"
    );

    // The next sync picks the change up
    let (model, _) = sync_from_markdown(&cfg, temp.path(), false).unwrap();
    let phase_two = &model.phase_details[1];
    assert_eq!(phase_two.progress.unwrap().completed, 1);
    assert_eq!(phase_two.progress.unwrap().percentage, 50.0);

    let on_disk = load_model(&temp.path().join("docs/project-plan-structured.json")).unwrap();
    assert_eq!(on_disk, model);
}
