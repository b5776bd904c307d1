use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> std::process::Output {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_redking"));

    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command")
}

fn assert_success(args: &[&str]) {
    let output = run_bin(args);

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn fresh_dir(name: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");
    test_dir
}

#[test]
fn basic_workflow() {
    let test_dir = fresh_dir("basic_workflow");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[model]\n"
        + "n_bins = 12\n"
        + "who = 0.5\n"
        + "epsilon = 0.0\n"
        + "\n"
        + "[model.cost]\n"
        + "umin = 0.0\n"
        + "umax = 10.0\n"
        + "amin = 1.782\n"
        + "amax = 5.454\n"
        + "a_p = 2.615\n"
        + "\n"
        + "[solver]\n"
        + "t_window = 2.0\n"
        + "\n"
        + "[init]\n"
        + "seed = 1234\n"
        + "\n"
        + "[output]\n"
        + "n_saves = 8\n"
        + "steps_per_save = 4\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert_success(&["--sim-dir", test_dir_str, "create"]);
    assert_success(&["--sim-dir", test_dir_str, "create"]);

    for run_idx in 0..2 {
        let snapshots = test_dir
            .join(format!("run-{run_idx:04}"))
            .join("snapshots.msgpack");
        let len = fs::metadata(&snapshots)
            .expect("missing snapshot file")
            .len();
        assert!(len > 0, "empty snapshot file {snapshots:?}");
    }

    // Same seed, same trajectory.
    let first = fs::read(test_dir.join("run-0000/snapshots.msgpack")).unwrap();
    let second = fs::read(test_dir.join("run-0001/snapshots.msgpack")).unwrap();
    assert_eq!(first, second);

    assert_success(&["--sim-dir", test_dir_str, "analyze"]);

    // A gap in the numbering must not reuse an existing run.
    fs::remove_dir_all(test_dir.join("run-0000")).unwrap();
    assert_success(&["--sim-dir", test_dir_str, "create"]);
    assert!(!test_dir.join("run-0000").exists());
    let third = fs::read(test_dir.join("run-0002/snapshots.msgpack")).unwrap();
    assert_eq!(third, first);

    assert_success(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!test_dir.join("run-0001").exists());
    assert!(!test_dir.join("run-0002").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_is_rejected() {
    let test_dir = fresh_dir("invalid_config");

    let config_contents = String::new()
        + "[model]\n"
        + "n_bins = 1\n"
        + "\n"
        + "[output]\n"
        + "n_saves = 1\n"
        + "steps_per_save = 1\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--sim-dir", test_dir_str, "create"]);
    assert!(!output.status.success());
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
