mod common;

use assert_cmd::Command;
use common::{request, setup_foo_project, test_file_uri};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use testitem_runner::models::{TestStatus, TestserverResult};

fn runner() -> Command {
    let mut cmd = Command::cargo_bin("testitem-runner").unwrap();
    cmd.env_remove("TESTITEM_RUNNER_CONFIG")
        .env_remove("TESTITEM_RUNNER_LOG");
    cmd
}

fn request_json(project: &Path, code: &str) -> String {
    let uri = test_file_uri(project);
    serde_json::to_string(&request(&uri, project, "Foo", code)).unwrap()
}

fn decode_stdout(output: &std::process::Output) -> TestserverResult {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim_end()).unwrap_or_else(|e| panic!("bad stdout {stdout:?}: {e}"))
}

/// A passing item given inline prints one `passed` result and exits 0.
///
/// 以内联方式提供的通过测试项打印一个 `passed` 结果并以 0 退出。
#[test]
fn test_inline_request_passes() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "x = 1+1\n@test x == 2");

    let output = runner().arg(&json).output().unwrap();
    assert!(output.status.success());
    let result = decode_stdout(&output);
    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.messages, None);
    assert!(result.duration_ms.is_some());
}

/// Failed assertions are a normal result: exit 0, status `failed`.
///
/// 断言失败属于正常结果：退出码为 0，状态为 `failed`。
#[test]
fn test_failed_item_still_exits_successfully() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "@test 1 == 2");

    runner()
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"failed\""))
        .stdout(predicate::str::contains("\"line\":5"));
}

#[test]
fn test_package_path_without_project_uses_a_temporary_environment() {
    let (_guard, project) = setup_foo_project();
    let uri = test_file_uri(&project);
    let mut req = request(&uri, Path::new(""), "Foo", "@test greet(\"b\") == \"Hello, b\"");
    req.package_path = project.to_string_lossy().into_owned();
    let json = serde_json::to_string(&req).unwrap();

    runner()
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"passed\""));
}

#[test]
fn test_unknown_package_is_an_errored_result() {
    let (_guard, project) = setup_foo_project();
    let uri = test_file_uri(&project);
    let json = serde_json::to_string(&request(&uri, &project, "NoSuchPkg", "@test true")).unwrap();

    runner()
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"errored\""))
        .stdout(predicate::str::contains("\"line\":5"));
}

#[test]
fn test_deeply_nested_code_is_an_errored_result() {
    let (_guard, project) = setup_foo_project();
    let depth = 200_000;
    let code = format!("@test {}1{} == 1", "(".repeat(depth), ")".repeat(depth));
    let json = request_json(&project, &code);

    runner()
        .arg("-")
        .write_stdin(json)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"errored\""))
        .stdout(predicate::str::contains("nested more than"));
}

#[test]
fn test_request_from_file() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "@test double(2) == 4");
    let request_path = project.join("request.json");
    fs::write(&request_path, json).unwrap();

    runner()
        .arg(format!("@{}", request_path.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"passed\""));
}

#[test]
fn test_request_from_stdin() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "error(\"boom\")");

    let output = runner().arg("-").write_stdin(json).output().unwrap();
    assert!(output.status.success());
    let result = decode_stdout(&output);
    assert_eq!(result.status, TestStatus::Errored);
    let messages = result.messages.unwrap();
    assert!(messages[0].message.starts_with("boom"));
}

/// Printing from the test body must not corrupt the JSON on stdout.
///
/// 测试体中的打印输出不得破坏 stdout 上的 JSON。
#[test]
fn test_body_output_stays_off_stdout() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "println(\"noise\")\n@test true");

    let output = runner().arg(&json).output().unwrap();
    assert!(output.status.success());
    assert_eq!(decode_stdout(&output).status, TestStatus::Passed);
    assert!(String::from_utf8_lossy(&output.stderr).contains("noise"));
}

#[test]
fn test_report_goes_to_stderr() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "@test 1 == 2");

    runner()
        .arg("--report")
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("--- Test Item ---").not())
        .stderr(predicate::str::contains("--- Test Item ---"))
        .stderr(predicate::str::contains("t1"));
}

#[test]
fn test_verbose_shows_environment_progress() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "@test true");

    runner()
        .arg("--verbose")
        .arg(&json)
        .assert()
        .success()
        .stderr(predicate::str::contains("Activating project at"))
        .stderr(predicate::str::contains("Layering test dependencies of Foo"));
}

#[test]
fn test_config_file_is_honored() {
    let (_guard, project) = setup_foo_project();
    let json = request_json(&project, "@test true");
    let config = project.join("runner.toml");
    fs::write(&config, "manifest_name = \"Missing.toml\"\n").unwrap();

    // The manifest is looked up under the configured name, which does not exist.
    runner()
        .arg("--config")
        .arg(&config)
        .arg(&json)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Missing.toml"));
}

#[test]
fn test_invalid_json_fails_without_output() {
    runner()
        .arg("{\"uri\": ")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to decode test item request"));
}

#[test]
fn test_missing_project_fails_without_output() {
    let (_guard, project) = setup_foo_project();
    let uri = test_file_uri(&project);
    let req = request(&uri, &project.join("gone"), "", "@test true");
    let json = serde_json::to_string(&req).unwrap();

    runner()
        .arg(&json)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_request_argument_is_required() {
    runner().assert().failure().stderr(predicate::str::contains("REQUEST"));
}
