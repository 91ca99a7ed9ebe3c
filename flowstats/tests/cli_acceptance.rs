use chrono::{TimeZone, Utc};
use flowstats_core::{
    ActivityEvent, AssigneeType, Database, Entry, EntryStatus, LogValue, TablePrefix, WorkflowStep,
};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const FORM: i64 = 5;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("flowstats/activity.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("flowstats");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

/// Seed a GravityFlow-shaped database for `prefix`
fn seed_database(path: &PathBuf, prefix: &TablePrefix) {
    fs::create_dir_all(path.parent().expect("missing db parent")).expect("failed to create db dir");
    let db = Database::open(path).expect("failed to open db");
    db.migrate(prefix).expect("failed to migrate db");

    for id in 1..=3 {
        db.upsert_entry(
            prefix,
            &Entry {
                id,
                form_id: FORM,
                status: EntryStatus::Active,
            },
        )
        .expect("failed to insert entry");
    }
    db.upsert_user(prefix, 2, "marta", "Marta Ruiz")
        .expect("failed to insert user");
    db.insert_step_feed(prefix, FORM, &WorkflowStep::new(21, "Approval", "approval"), 0, true)
        .expect("failed to insert feed");

    let at = |m, d| Utc.with_ymd_and_hms(2024, m, d, 10, 0, 0).unwrap();
    db.insert_activity_events(
        prefix,
        &[
            ActivityEvent::workflow_ended(1, FORM, LogValue::Complete, Some(1800), at(4, 2)),
            ActivityEvent::workflow_ended(2, FORM, LogValue::Complete, Some(3600), at(3, 5)),
            ActivityEvent::workflow_ended(3, FORM, LogValue::Approved, Some(7200), at(3, 28)),
            ActivityEvent::assignee_status(
                1,
                FORM,
                21,
                AssigneeType::User,
                "2",
                LogValue::Approved,
                Some(900),
                at(4, 1),
            ),
            ActivityEvent::assignee_status(
                2,
                FORM,
                21,
                AssigneeType::User,
                "2",
                LogValue::Pending,
                None,
                at(4, 3),
            ),
        ],
    )
    .expect("failed to insert activity");
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("flowstats"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute flowstats: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "flowstats {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn month_report_reads_default_database_location() {
    let env = CliTestEnv::new();
    seed_database(&env.db_path(), &TablePrefix::default());

    let args = [
        "--form", "5", "--dimension", "month", "--period", "custom", "--from", "2024-03-01",
        "--to", "2024-04-30", "--export", "json",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["dimension"], "month");
    let rows = json["data"]["rows"].as_array().expect("rows should be an array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["month_key"], "2024-04");
    assert_eq!(rows[0]["display_name"], "April 2024");
    assert_eq!(rows[0]["total_completed"], 1);
    assert_eq!(rows[0]["avg_duration_hours"], 0.5);
    assert_eq!(rows[1]["total_completed"], 2);
    assert_eq!(rows[1]["avg_duration_hours"], 1.5);
}

#[test]
fn config_selects_multisite_tables_and_locale() {
    let env = CliTestEnv::new();
    let db_path = env.xdg_data.join("mirror.db");
    seed_database(&db_path, &TablePrefix::for_site("wp_", 2).unwrap());
    env.write_config(&format!(
        "[database]\npath = {:?}\nblog_id = 2\n\n\
         [report]\nlocale = \"es\"\ndefault_period = \"all\"\n",
        db_path.display().to_string()
    ));

    let args = ["--form", "5", "--dimension", "month", "--export", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let json = stdout_json(&output);
    assert_eq!(json["data"]["period"], "all");
    assert_eq!(json["data"]["rows"][1]["display_name"], "marzo 2024");
}

#[test]
fn pending_report_as_markdown() {
    let env = CliTestEnv::new();
    let db_path = env.xdg_data.join("site.db");
    seed_database(&db_path, &TablePrefix::default());
    let db_arg = db_path.to_string_lossy().into_owned();

    let args = [
        "--database", db_arg.as_str(), "--form", "5", "--dimension", "pending_by_step",
        "--period", "all", "--export", "md",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| Step | Type | Pending |"), "got:\n{stdout}");
    assert!(stdout.contains("| Approval | approval | 1 |"), "got:\n{stdout}");
}

#[test]
fn assignee_report_in_terminal() {
    let env = CliTestEnv::new();
    let db_path = env.xdg_data.join("site.db");
    seed_database(&db_path, &TablePrefix::default());
    let db_arg = db_path.to_string_lossy().into_owned();

    let args = [
        "--database", db_arg.as_str(), "--form", "5", "--dimension", "encargado", "--period",
        "all",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Marta Ruiz"), "got:\n{stdout}");
    assert!(stdout.contains("0.3h"), "got:\n{stdout}");
}

#[test]
fn invalid_request_returns_error_envelope() {
    let env = CliTestEnv::new();
    seed_database(&env.db_path(), &TablePrefix::default());

    let args = ["--form", "5", "--dimension", "weekday", "--period", "all", "--export", "json"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success(), "invalid dimension should fail");

    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    assert_eq!(json["data"], "invalid report dimension: weekday");
}

#[test]
fn missing_database_is_reported() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["--form", "5", "--period", "all"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Database not found"), "got:\n{stderr}");
}

#[test]
fn store_failure_is_enveloped_and_logged() {
    let env = CliTestEnv::new();
    seed_database(&env.db_path(), &TablePrefix::default());

    // Blog 3 has no tables in this database
    let args = [
        "--form", "5", "--blog-id", "3", "--dimension", "step", "--period", "all", "--export",
        "json",
    ];
    let output = run_bin(&env, &args);
    assert!(!output.status.success(), "missing site tables should fail");

    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    let message = json["data"].as_str().expect("error message should be a string");
    assert!(message.starts_with("step aggregation query failed"), "got: {message}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to compute report"), "got:\n{stderr}");

    // The failure reaches the log file before the process exits
    let log_dir = env.xdg_state.join("flowstats");
    let logged = fs::read_dir(&log_dir)
        .expect("log dir should exist")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("flowstats.log"))
        .map(|entry| fs::read_to_string(entry.path()).unwrap_or_default())
        .collect::<String>();
    assert!(logged.contains("Aggregation failed"), "log:\n{logged}");
    assert!(logged.contains("wp_3_"), "log:\n{logged}");
}
