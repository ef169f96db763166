use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use std::fs;

fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let config_dir = temp_dir.path().join(".pipeboard");
    fs::create_dir_all(&config_dir).unwrap();
    let config_file = config_dir.join("rc");
    fs::write(&config_file, format!("data.location={}\n", db_path.display())).unwrap();
    (temp_dir, guard)
}

fn get_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pipeboard").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd.env_remove("PIPEBOARD_LOG");
    cmd
}

fn board_json(temp_dir: &TempDir, pipeline_id: &str) -> serde_json::Value {
    let output = get_cmd(temp_dir).args(["board", pipeline_id, "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn stage_names(board: &serde_json::Value) -> Vec<String> {
    board["stages"].as_array().unwrap().iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect()
}

/// Pipeline 1 with stages A(1), B(2), C(3)
fn seed_abc(temp_dir: &TempDir) {
    get_cmd(temp_dir).args(["pipelines", "add", "Sales"]).assert().success();
    for name in ["A", "B", "C"] {
        get_cmd(temp_dir).args(["stages", "add", "1", name]).assert().success();
    }
}

/// Pipeline 1 with Proposal(1) holding D1 (5000) and Negotiation(2)
fn seed_deal(temp_dir: &TempDir) {
    get_cmd(temp_dir).args(["pipelines", "add", "Sales"]).assert().success();
    get_cmd(temp_dir).args(["stages", "add", "1", "Proposal", "--probability", "40"]).assert().success();
    get_cmd(temp_dir).args(["stages", "add", "1", "Negotiation", "--probability", "60"]).assert().success();
    get_cmd(temp_dir).args(["deals", "add", "1", "D1", "--amount", "5000", "--owner", "sam"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created deal 'D1' (id: 1)"));
}

#[test]
fn test_pipelines_add_and_list() {
    let (temp_dir, _guard) = setup_test_env();

    get_cmd(&temp_dir).args(["pipelines", "add", "Sales"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created pipeline 'Sales' (id: 1)"));

    get_cmd(&temp_dir).args(["pipelines", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sales"));

    let output = get_cmd(&temp_dir).args(["pipelines", "list", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["name"], "Sales");
    assert_eq!(json[0]["dealCount"], 0);
}

#[test]
fn test_empty_pipeline_name_rejected() {
    let (temp_dir, _guard) = setup_test_env();

    get_cmd(&temp_dir).args(["pipelines", "add", "  "])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Pipeline name cannot be empty"));
}

#[test]
fn test_board_without_pipelines() {
    let (temp_dir, _guard) = setup_test_env();

    get_cmd(&temp_dir).args(["board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pipelines"));
}

#[test]
fn test_board_unknown_pipeline() {
    let (temp_dir, _guard) = setup_test_env();
    get_cmd(&temp_dir).args(["pipelines", "add", "Sales"]).assert().success();

    get_cmd(&temp_dir).args(["board", "99"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Pipeline 99 not found"));
}

#[test]
fn test_board_shows_columns() {
    let (temp_dir, _guard) = setup_test_env();
    seed_deal(&temp_dir);

    get_cmd(&temp_dir).args(["board"])
        .env("COLUMNS", "120")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Proposal"))
        .stdout(predicate::str::contains("2. Negotiation"))
        .stdout(predicate::str::contains("#1 D1"))
        .stdout(predicate::str::contains("5,000 @sam"));
}

#[test]
fn test_drag_stage_to_front() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["drag", "stage", "3", "--onto", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved stage 'C' to position 1"));

    let board = board_json(&temp_dir, "1");
    assert_eq!(stage_names(&board), vec!["C", "A", "B"]);
    let orders: Vec<i64> = board["stages"].as_array().unwrap().iter()
        .map(|s| s["stageOrder"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![1, 2, 3]);
}

#[test]
fn test_drag_stage_onto_itself() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["drag", "stage", "2", "--onto", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to move."));

    assert_eq!(stage_names(&board_json(&temp_dir, "1")), vec!["A", "B", "C"]);
}

#[test]
fn test_drag_deal_between_stages() {
    let (temp_dir, _guard) = setup_test_env();
    seed_deal(&temp_dir);

    get_cmd(&temp_dir).args(["drag", "deal", "1", "--onto", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 'D1' to Negotiation"));

    let board = board_json(&temp_dir, "1");
    assert_eq!(board["stages"][0]["deals"].as_array().unwrap().len(), 0);
    assert_eq!(board["stages"][1]["deals"][0]["id"], 1);
    assert_eq!(board["stages"][1]["totalValue"], 5000.0);
    assert_eq!(board["stages"][1]["weightedValue"], 3000.0);

    get_cmd(&temp_dir).args(["deals", "history", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(created)"))
        .stdout(predicate::str::contains("Proposal (#1)"))
        .stdout(predicate::str::contains("Negotiation (#2)"));
}

#[test]
fn test_drag_deal_onto_current_stage() {
    let (temp_dir, _guard) = setup_test_env();
    seed_deal(&temp_dir);

    get_cmd(&temp_dir).args(["drag", "deal", "1", "--onto", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to move."));
}

#[test]
fn test_drag_deal_to_other_pipeline_rejected() {
    let (temp_dir, _guard) = setup_test_env();
    seed_deal(&temp_dir);
    get_cmd(&temp_dir).args(["pipelines", "add", "Renewals"]).assert().success();
    get_cmd(&temp_dir).args(["stages", "add", "2", "Open"]).assert().success();

    get_cmd(&temp_dir).args(["drag", "deal", "1", "--onto", "3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Stage 3 is not in pipeline 1"));
}

#[test]
fn test_drag_unknown_entity() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["drag", "stage", "9", "--onto", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Stage 9 not found"));

    get_cmd(&temp_dir).args(["drag", "deal", "4", "--onto", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Deal 4 not found"));
}

#[test]
fn test_stage_add_at_position_and_update() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["stages", "add", "1", "Lead", "--order", "1", "--type", "open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created stage 'Lead' (id: 4) at position 1"));
    assert_eq!(stage_names(&board_json(&temp_dir, "1")), vec!["Lead", "A", "B", "C"]);

    get_cmd(&temp_dir).args(["stages", "update", "4", "--order", "4", "--name", "Closed", "--type", "won", "--probability", "100"])
        .assert()
        .success();
    let board = board_json(&temp_dir, "1");
    assert_eq!(stage_names(&board), vec!["A", "B", "C", "Closed"]);
    assert_eq!(board["stages"][3]["stageType"], "WON");
    assert_eq!(board["stages"][3]["winProbability"], 100);
}

#[test]
fn test_stage_add_invalid_options() {
    let (temp_dir, _guard) = setup_test_env();
    get_cmd(&temp_dir).args(["pipelines", "add", "Sales"]).assert().success();

    get_cmd(&temp_dir).args(["stages", "add", "1", "Won", "--probability", "150"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid win probability"));

    get_cmd(&temp_dir).args(["stages", "add", "1", "Won", "--type", "maybe"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid stage type"));

    get_cmd(&temp_dir).args(["stages", "add", "abc", "Won"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid pipeline ID"));
}

#[test]
fn test_stage_update_requires_a_change() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["stages", "update", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Nothing to update"));

    get_cmd(&temp_dir).args(["stages", "update", "42", "--name", "X"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Stage 42 not found"));
}

#[test]
fn test_stage_delete() {
    let (temp_dir, _guard) = setup_test_env();
    seed_deal(&temp_dir);

    get_cmd(&temp_dir).args(["stages", "delete", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to delete stage"))
        .stderr(predicate::str::contains("still holds 1 deal(s)"));

    get_cmd(&temp_dir).args(["stages", "delete", "2"]).assert().success();
    let board = board_json(&temp_dir, "1");
    assert_eq!(stage_names(&board), vec!["Proposal"]);
    assert_eq!(board["stages"][0]["stageOrder"], 1);
}

#[test]
fn test_deal_add_invalid_amount() {
    let (temp_dir, _guard) = setup_test_env();
    seed_abc(&temp_dir);

    get_cmd(&temp_dir).args(["deals", "add", "1", "D1", "--amount", "-5"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid amount"));

    get_cmd(&temp_dir).args(["deals", "add", "9", "D1", "--amount", "5"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to create deal"));
}

#[test]
fn test_deal_history_unknown_deal() {
    let (temp_dir, _guard) = setup_test_env();

    get_cmd(&temp_dir).args(["deals", "history", "3"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Deal 3 not found"));
}

#[test]
fn test_unreachable_backend_reports_error() {
    let (temp_dir, _guard) = setup_test_env();
    let rc = temp_dir.path().join(".pipeboard").join("rc");
    fs::write(&rc, "api.url=http://127.0.0.1:9\n").unwrap();

    get_cmd(&temp_dir).args(["board"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to load pipelines"));

    get_cmd(&temp_dir).args(["deals", "history", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("only available with the local store"));
}

#[test]
fn test_version() {
    let (temp_dir, _guard) = setup_test_env();

    get_cmd(&temp_dir).arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pipeboard"));
}
