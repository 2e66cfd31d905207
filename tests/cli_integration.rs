use std::path::{Path, PathBuf};
use std::process::Command;

/// Path to the forestdot binary (built by cargo test).
fn forestdot_bin() -> &'static str {
    env!("CARGO_BIN_EXE_forestdot")
}

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

/// Run forestdot in `dir` with args and extra env, return (stdout, stderr, exit code).
///
/// HOME points at `dir` so no user-level config leaks into the run.
fn run_forestdot_env(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> (String, String, i32) {
    let mut cmd = Command::new(forestdot_bin());
    cmd.args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("FORESTDOT_LOG");
    for (key, value) in env {
        cmd.env(key, value);
    }
    let output = cmd.output().expect("failed to run forestdot binary");

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

fn run_forestdot(dir: &Path, args: &[&str]) -> (String, String, i32) {
    run_forestdot_env(dir, args, &[])
}

fn graphviz_available() -> bool {
    Command::new("dot")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn temp_dot_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            let name = p.file_name().unwrap().to_string_lossy();
            name.starts_with("forestdot-") && name.ends_with(".gv")
        })
        .collect()
}

// --- argument errors ---

#[test]
fn test_unknown_flag_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_forestdot(dir.path(), &["--bogus"]);

    assert_eq!(code, 1);
    assert!(stderr.contains("--bogus"), "stderr: {stderr}");
    assert!(stdout.contains("Usage:"), "stdout: {stdout}");
    assert!(stdout.contains("--direct"));
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_forestdot(dir.path(), &["--tree", "0"]);

    assert_eq!(code, 1);
    assert!(stderr.contains("Must specify -i"), "stderr: {stderr}");
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_missing_value() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_forestdot(dir.path(), &["-i"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_invalid_tree_argument() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (_, stderr, code) = run_forestdot(dir.path(), &["-i", &model, "--tree", "abc"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("invalid --tree argument (abc)"), "stderr: {stderr}");
}

#[test]
fn test_invalid_levels_argument() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (_, _, code) = run_forestdot(dir.path(), &["-i", &model, "--levels", "many"]);
    assert_eq!(code, 1);
}

#[test]
fn test_unloadable_model() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_forestdot(dir.path(), &["-i", "missing.json"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("failed to load model"), "stderr: {stderr}");
}

#[test]
fn test_load_failure_reported_before_later_bad_flag() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_forestdot(dir.path(), &["-i", "missing.json", "--bogus"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("failed to load model"), "stderr: {stderr}");
    assert!(!stderr.contains("--bogus"), "stderr: {stderr}");
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_earlier_bad_flag_reported_before_load() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_forestdot(dir.path(), &["--bogus", "-i", "missing.json"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--bogus"), "stderr: {stderr}");
    assert!(!stderr.contains("failed to load model"), "stderr: {stderr}");
}

#[test]
fn test_title_may_start_with_hyphen() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, stderr, code) = run_forestdot(
        dir.path(),
        &["-i", &model, "--tree", "0", "--title", "-neg title"],
    );
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(stdout.contains("label=\"-neg title\""), "stdout: {stdout}");
}

#[test]
fn test_help_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_forestdot(dir.path(), &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Example:"));
}

// --- model errors ---

#[test]
fn test_unsupported_model() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("glm.json");
    let (stdout, stderr, code) = run_forestdot(dir.path(), &["-i", &model]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unsupported model type: glm"), "stderr: {stderr}");
    assert!(!stdout.contains("digraph"));
}

#[test]
fn test_tree_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (_, stderr, code) = run_forestdot(dir.path(), &["-i", &model, "--tree", "9"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("tree 9 out of range"), "stderr: {stderr}");
}

// --- console and file output ---

#[test]
fn test_console_all_trees() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) = run_forestdot(dir.path(), &["-i", &model]);

    assert_eq!(code, 0);
    assert!(stdout.starts_with("/*"));
    assert!(stdout.contains("digraph G {"));
    assert_eq!(stdout.matches("subgraph cluster_").count(), 3);
}

#[test]
fn test_console_single_tree() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) = run_forestdot(dir.path(), &["--tree", "1", "-i", &model]);

    assert_eq!(code, 0);
    assert_eq!(stdout.matches("subgraph cluster_").count(), 1);
    assert!(stdout.contains("label=\"Tree 1, Class versicolor\""));
    assert!(stdout.contains("\"SG_1_Node_0\" [shape=box, fontsize=14, label=\"petal_wid < 0.8\"]"));
}

#[test]
fn test_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) = run_forestdot(
        dir.path(),
        &["-i", &model, "--tree", "0", "-o", "tree.gv", "--title", "Setosa"],
    );

    assert_eq!(code, 0);
    assert!(!stdout.contains("digraph"), "DOT must not go to stdout");
    let dot = std::fs::read_to_string(dir.path().join("tree.gv")).unwrap();
    assert!(dot.contains("digraph G {"));
    assert!(dot.contains("label=\"Setosa\""));
}

#[test]
fn test_output_file_unwritable() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (_, stderr, code) =
        run_forestdot(dir.path(), &["-i", &model, "-o", "no/such/dir/tree.gv"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("tree.gv"), "stderr: {stderr}");
}

#[test]
fn test_rounding_and_font_size() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) =
        run_forestdot(dir.path(), &["-i", &model, "--tree", "0", "-d", "2", "-f", "20"]);

    assert_eq!(code, 0);
    assert!(stdout.contains("label=\"petal_len < 2.45\""));
    assert!(stdout.contains("label=\"0.12\""));
    assert!(stdout.contains("label=\"-0.1\""));
    assert!(!stdout.contains("0.123456"));
    assert!(!stdout.contains("fontsize=14"));
    assert!(stdout.contains("fontsize=20"));
}

#[test]
fn test_levels_truncate() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) =
        run_forestdot(dir.path(), &["-i", &model, "--tree", "0", "--levels", "1"]);

    assert_eq!(code, 0);
    // Node 2 sits at depth 1 and still has children.
    assert!(stdout.contains(
        "\"SG_0_Node_2\" [shape=box, style=dashed, fontsize=14, label=\"petal_wid < 1.75\\n...\"]"
    ));
    assert!(!stdout.contains("SG_0_Node_3"));
    assert!(!stdout.contains("\"SG_0_Node_2\" ->"));
}

#[test]
fn test_raw_dump_precedes_dot() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) = run_forestdot(dir.path(), &["-i", &model, "--tree", "0", "--raw"]);

    assert_eq!(code, 0);
    let raw = stdout.find("THRESHOLD").expect("raw dump header");
    let dot = stdout.find("digraph G {").expect("DOT text");
    assert!(raw < dot);
}

#[test]
fn test_raw_dump_stays_out_of_file() {
    let dir = tempfile::tempdir().unwrap();
    let model = fixture("iris_gbm.json");
    let (stdout, _, code) =
        run_forestdot(dir.path(), &["-i", &model, "--raw", "-o", "tree.gv"]);

    assert_eq!(code, 0);
    assert!(stdout.contains("THRESHOLD"));
    let dot = std::fs::read_to_string(dir.path().join("tree.gv")).unwrap();
    assert!(!dot.contains("THRESHOLD"));
}

#[test]
fn test_project_config_sets_defaults() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".forestdot.toml"), "font_size = 11\n").unwrap();
    let model = fixture("iris_gbm.json");

    let (stdout, _, code) = run_forestdot(dir.path(), &["-i", &model, "--tree", "2"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("fontsize=11"));

    let (stdout, _, code) = run_forestdot(dir.path(), &["-i", &model, "--tree", "2", "-f", "16"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("fontsize=16"));
    assert!(!stdout.contains("fontsize=11"));
}

// --- image output ---

#[test]
fn test_direct_renderer_failure() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("tmp");
    std::fs::create_dir(&temp_dir).unwrap();
    let model = fixture("iris_gbm.json");

    let (_, stderr, code) = run_forestdot_env(
        dir.path(),
        &["-i", &model, "--direct", "tree.png"],
        &[
            ("FORESTDOT_DOT", "/nonexistent/dot"),
            ("FORESTDOT_TEMP_DIR", temp_dir.to_str().unwrap()),
        ],
    );

    assert_eq!(code, 2);
    assert!(stderr.contains("render failed"), "stderr: {stderr}");
    // The DOT detour still happened.
    let temps = temp_dot_files(&temp_dir);
    assert_eq!(temps.len(), 1);
    let dot = std::fs::read_to_string(&temps[0]).unwrap();
    assert!(dot.contains("digraph G {"));
    assert!(!dir.path().join("tree.png").exists());
}

#[test]
fn test_direct_writes_png() {
    if !graphviz_available() {
        eprintln!("skipping: graphviz `dot` not found on PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("tmp");
    std::fs::create_dir(&temp_dir).unwrap();
    let model = fixture("iris_gbm.json");

    let (stdout, stderr, code) = run_forestdot_env(
        dir.path(),
        &["-i", &model, "--tree", "0", "--direct", "out.png"],
        &[("FORESTDOT_TEMP_DIR", temp_dir.to_str().unwrap())],
    );

    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(!stdout.contains("digraph"));
    assert_eq!(temp_dot_files(&temp_dir).len(), 1);
    let png = std::fs::read(dir.path().join("out.png")).unwrap();
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[test]
fn test_direct_ignores_output_path() {
    if !graphviz_available() {
        eprintln!("skipping: graphviz `dot` not found on PATH");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = dir.path().join("tmp");
    std::fs::create_dir(&temp_dir).unwrap();
    let model = fixture("iris_gbm.json");

    let (_, stderr, code) = run_forestdot_env(
        dir.path(),
        &["-i", &model, "-o", "tree.gv", "--direct", "out.png"],
        &[("FORESTDOT_TEMP_DIR", temp_dir.to_str().unwrap())],
    );

    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(!dir.path().join("tree.gv").exists());
    assert_eq!(temp_dot_files(&temp_dir).len(), 1);
    assert!(dir.path().join("out.png").exists());
}
