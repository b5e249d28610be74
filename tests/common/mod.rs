//! Shared test helpers for dar integration tests.
//!
//! Every test builds its own Django project skeleton in a temp directory:
//! a `manage.py` marker and one `migrations/` package per app.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Create an empty Django project (just `manage.py`).
///
/// Formatting is disabled through `.dar.toml` so that tests don't depend on
/// black being installed.
pub fn setup_project() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(
        dir.path().join("manage.py"),
        "#!/usr/bin/env python\nimport sys\n",
    )
    .unwrap();
    std::fs::write(dir.path().join(".dar.toml"), "[format]\ncommand = []\n").unwrap();
    dir
}

/// Source of a migration module depending on `deps`, each `(app, name)`.
pub fn migration_source(deps: &[(&str, &str)]) -> String {
    let mut out = String::from(
        "from django.db import migrations, models\n\n\nclass Migration(migrations.Migration):\n\n    dependencies = [\n",
    );
    for (app, name) in deps {
        out.push_str(&format!("        (\"{app}\", \"{name}\"),\n"));
    }
    out.push_str("    ]\n\n    operations = []\n");
    out
}

/// Write `<root>/<app>/migrations/<name>.py` with the given dependencies.
pub fn add_migration(root: &Path, app: &str, name: &str, deps: &[(&str, &str)]) -> PathBuf {
    write_migration(root, app, name, &migration_source(deps))
}

/// Write `<root>/<app>/migrations/<name>.py` with arbitrary contents.
pub fn write_migration(root: &Path, app: &str, name: &str, contents: &str) -> PathBuf {
    let dir = root.join(app).join("migrations");
    std::fs::create_dir_all(&dir).unwrap();
    let init = dir.join("__init__.py");
    if !init.exists() {
        std::fs::write(&init, "").unwrap();
    }
    let path = dir.join(format!("{name}.py"));
    std::fs::write(&path, contents).unwrap();
    path
}

/// Path of a migration file.
pub fn migration_path(root: &Path, app: &str, name: &str) -> PathBuf {
    root.join(app).join("migrations").join(format!("{name}.py"))
}

/// Read a migration file.
pub fn read_migration(root: &Path, app: &str, name: &str) -> String {
    std::fs::read_to_string(migration_path(root, app, name))
        .unwrap_or_else(|e| panic!("failed to read {app}.{name}: {e}"))
}

/// The two-branch `testapp` project most tests start from:
///
/// ```text
/// 0001_initial ─┬─ 0002_alter_reporter_full_name
///               └─ 0002_reporter_handle
/// ```
pub fn setup_forked_project() -> TempDir {
    let dir = setup_project();
    let root = dir.path();
    add_migration(root, "testapp", "0001_initial", &[]);
    add_migration(
        root,
        "testapp",
        "0002_alter_reporter_full_name",
        &[("testapp", "0001_initial")],
    );
    add_migration(
        root,
        "testapp",
        "0002_reporter_handle",
        &[("testapp", "0001_initial")],
    );
    dir
}

/// Run dar in the given directory and return the output.
pub fn dar_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dar"))
        .args(args)
        .current_dir(dir)
        .env_remove("DAR_LOG")
        .output()
        .expect("failed to run dar")
}

/// Run dar and assert success, returning stdout.
pub fn dar_ok(dir: &Path, args: &[&str]) -> String {
    let out = dar_in(dir, args);
    assert!(
        out.status.success(),
        "dar {} failed:\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).to_string()
}

/// Run dar and assert failure, returning stderr.
pub fn dar_fails(dir: &Path, args: &[&str]) -> String {
    let out = dar_in(dir, args);
    assert!(
        !out.status.success(),
        "dar {} should have failed but succeeded:\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout)
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}
