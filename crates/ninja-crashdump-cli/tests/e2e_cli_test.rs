//! E2E tests for the ninja-crashdump CLI
//!
//! Each run gets its own working directory and config home so neither the
//! developer's config files nor their environment leak in.

use ninja_crashdump_config::testing::TestEnvironment;
use ninja_crashdump_config::Config;
use std::process::{Command, Output};

fn ninja_crashdump(env: &TestEnvironment) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ninja-crashdump"));
    cmd.current_dir(env.root())
        .env("HOME", env.root())
        .env("XDG_CONFIG_HOME", env.root().join(".config"))
        .env_remove("NINJA_CRASHDUMP_DIR")
        .env_remove("NINJA_CRASHDUMP_MODULE")
        .env_remove("NINJA_CRASHDUMP_ENTRY_POINT")
        .env_remove("NINJA_CRASHDUMP_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Project config lives in the working directory, which is the env root.
fn write_project_config(env: &TestEnvironment, contents: &str) {
    std::fs::write(env.root().join(".ninja-crashdump.toml"), contents).unwrap();
}

/// Run and return the output together with the child's pid.
fn run(mut cmd: Command) -> (u32, Output) {
    let child = cmd
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .expect("Failed to execute ninja-crashdump");
    let pid = child.id();
    (pid, child.wait_with_output().unwrap())
}

// ========== E2E: Path ==========

#[test]
fn e2e_path_is_named_after_child_pid() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["--dir"]).arg(&env.dump_dir).arg("path");

    let (pid, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(
        stdout.trim(),
        env.dump_path_for(pid).display().to_string()
    );
}

#[test]
fn e2e_path_follows_env_directory() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.envs(env.env_vars()).arg("path");

    let (pid, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains(&format!("ninja_crash_dump_{pid}.dmp")));
    assert!(stdout.contains(&env.dump_dir.display().to_string()));
}

#[test]
fn e2e_path_follows_project_config() {
    let env = TestEnvironment::new().unwrap();
    let dir = env.root().join("from-project");
    write_project_config(
        &env,
        &format!("[dump]\ndirectory = {:?}\n", dir.display().to_string()),
    );
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("path");

    let (pid, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        stdout.trim(),
        dir.join(format!("ninja_crash_dump_{pid}.dmp")).display().to_string()
    );
}

// ========== E2E: Config ==========

#[test]
fn e2e_config_show_returns_valid_toml() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["config", "show"]);

    let (_, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("[dump]"), "Missing [dump] section");
    assert!(stdout.contains("[logging]"), "Missing [logging] section");

    let parsed: Config = toml::from_str(&stdout).expect("config show should return valid TOML");
    assert_eq!(parsed, Config::default());
}

#[test]
fn e2e_config_show_reflects_env_overrides() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.env("NINJA_CRASHDUMP_MODULE", "custom_dbghelp.dll")
        .args(["config", "show"]);

    let (_, output) = run(cmd);
    let parsed: Config = toml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();

    assert!(output.status.success());
    assert_eq!(parsed.dump.module, "custom_dbghelp.dll");
    assert_eq!(parsed.dump.entry_point, "MiniDumpWriteDump");
}

#[cfg(target_os = "linux")]
#[test]
fn e2e_project_config_overrides_global_with_defaults() {
    let env = TestEnvironment::new().unwrap();
    let global_dir = env.root().join(".config").join("ninja-crashdump");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        "[dump]\nmodule = \"dbgcore.dll\"\nunload_module = true\n",
    )
    .unwrap();
    write_project_config(&env, "[dump]\nmodule = \"dbghelp.dll\"\nunload_module = false\n");
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["config", "show"]);

    let (_, output) = run(cmd);
    let parsed: Config = toml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(parsed.dump.module, "dbghelp.dll");
    assert!(!parsed.dump.unload_module);
}

#[cfg(not(windows))]
#[test]
fn e2e_write_reports_failure_once() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("--dir").arg(&env.dump_dir).arg("write");

    let (_, output) = run(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert_eq!(stderr.matches("load module 'dbghelp.dll'").count(), 1, "{stderr}");
}

#[test]
fn e2e_path_rejects_nul_in_directory() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    // The environment cannot carry a NUL, so go through the project file.
    write_project_config(&env, "[dump]\ndirectory = \"dumps\\u0000evil\"\n");
    cmd.arg("path");

    let (_, output) = run(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("NUL"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn e2e_config_default_matches_defaults() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["config", "default"]);

    let (_, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("dbghelp.dll"));
    assert!(stdout.contains("unload_module = false"));
}

#[test]
fn e2e_config_path_names_project_file() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["config", "path"]);

    let (_, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Project: .ninja-crashdump.toml"));
}

#[test]
fn e2e_invalid_project_config_fails() {
    let env = TestEnvironment::new().unwrap();
    write_project_config(&env, "[dump\nmodule = ");
    let mut cmd = ninja_crashdump(&env);
    cmd.args(["config", "show"]);

    let (_, output) = run(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("failed to load configuration"), "{stderr}");
}

// ========== E2E: Write ==========

#[cfg(not(windows))]
#[test]
fn e2e_write_without_dbghelp_reports_and_creates_nothing() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("--dir").arg(&env.dump_dir).arg("write");

    let (_, output) = run(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("load module 'dbghelp.dll'"), "{stderr}");
    assert!(output.stdout.is_empty());
    assert_eq!(env.dump_count(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn e2e_write_with_missing_export_names_it() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("--dir")
        .arg(&env.dump_dir)
        .args(["write", "--module", "libc.so.6", "--entry-point", "NinjaNoSuchExport"]);

    let (_, output) = run(cmd);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("resolve 'NinjaNoSuchExport'"), "{stderr}");
    assert_eq!(env.dump_count(), 0);
}

#[cfg(windows)]
#[test]
fn e2e_write_produces_minidump() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("--dir").arg(&env.dump_dir).arg("write");

    let (pid, output) = run(cmd);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "{:?}", output);
    let path = env.dump_path_for(pid);
    assert_eq!(stdout.trim(), path.display().to_string());
    assert_eq!(&std::fs::read(path).unwrap()[..4], b"MDMP");
}

#[cfg(windows)]
#[test]
fn e2e_write_without_context_produces_minidump() {
    let env = TestEnvironment::new().unwrap();
    let mut cmd = ninja_crashdump(&env);
    cmd.arg("--dir")
        .arg(&env.dump_dir)
        .args(["write", "--no-context", "--keep-module"]);

    let (pid, output) = run(cmd);

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(&std::fs::read(env.dump_path_for(pid)).unwrap()[..4], b"MDMP");
}
