//! End-to-end tests for `dar <app> <migration>` against real project trees.

mod common;

use common::*;

#[test]
fn fails_outside_a_django_project() {
    let dir = tempfile::TempDir::new().unwrap();
    let stderr = dar_fails(dir.path(), &["testapp", "0002_reporter_handle"]);
    assert!(
        stderr.contains("Could not locate manage.py"),
        "stderr: {stderr}"
    );
}

#[test]
fn unknown_migration_is_reported() {
    let project = setup_forked_project();
    let stderr = dar_fails(project.path(), &["testapp", "9999_unknown_migration"]);
    assert_eq!(
        stderr.trim_end(),
        "Migration testapp.9999_unknown_migration doesn't exist"
    );
}

#[test]
fn non_leaf_migration_lists_candidates() {
    let project = setup_forked_project();
    let stderr = dar_fails(project.path(), &["testapp", "0001_initial"]);
    assert_eq!(
        stderr.trim_end(),
        "Migration testapp.0001_initial is not a leaf node. Possible rebase candidates:\n\
         - testapp.0002_alter_reporter_full_name\n\
         - testapp.0002_reporter_handle"
    );
}

#[test]
fn linear_history_has_nothing_to_rebase() {
    let project = setup_project();
    let root = project.path();
    add_migration(root, "testapp", "0001_initial", &[]);
    add_migration(root, "testapp", "0002_reporter_handle", &[("testapp", "0001_initial")]);

    let stdout = dar_ok(root, &["testapp", "0002_reporter_handle"]);
    assert_eq!(stdout.trim_end(), "No migrations to rebase");
    assert!(migration_path(root, "testapp", "0002_reporter_handle").exists());
}

#[test]
fn rebases_single_migration() {
    let project = setup_forked_project();
    let root = project.path();

    let stdout = dar_ok(root, &["testapp", "0002_reporter_handle"]);
    assert_eq!(stdout.trim_end(), "Rebasing testapp.0002_reporter_handle");

    assert!(!migration_path(root, "testapp", "0002_reporter_handle").exists());
    let rebased = read_migration(root, "testapp", "0003_reporter_handle");
    assert!(
        rebased.contains("(\"testapp\", \"0002_alter_reporter_full_name\")"),
        "rebased: {rebased}"
    );
    assert!(!rebased.contains("0001_initial"));

    // The other branch is untouched.
    assert_eq!(
        read_migration(root, "testapp", "0002_alter_reporter_full_name"),
        migration_source(&[("testapp", "0001_initial")])
    );
}

#[test]
fn rebases_whole_branch_in_order() {
    let project = setup_forked_project();
    let root = project.path();
    add_migration(
        root,
        "testapp",
        "0003_reporter_level",
        &[("testapp", "0002_reporter_handle")],
    );

    let stdout = dar_ok(root, &["testapp", "0003_reporter_level"]);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec![
            "Rebasing testapp.0002_reporter_handle",
            "Rebasing testapp.0003_reporter_level",
        ]
    );

    assert!(!migration_path(root, "testapp", "0002_reporter_handle").exists());
    assert!(!migration_path(root, "testapp", "0003_reporter_level").exists());
    assert_eq!(
        read_migration(root, "testapp", "0003_reporter_handle"),
        migration_source(&[("testapp", "0002_alter_reporter_full_name")])
    );
    assert_eq!(
        read_migration(root, "testapp", "0004_reporter_level"),
        migration_source(&[("testapp", "0003_reporter_handle")])
    );

    // A second run finds a single leaf.
    let stdout = dar_ok(root, &["testapp", "0004_reporter_level"]);
    assert_eq!(stdout.trim_end(), "No migrations to rebase");
}

#[test]
fn rebases_when_another_app_depends_on_the_local_tip() {
    let project = setup_forked_project();
    let root = project.path();
    let blog = add_migration(
        root,
        "blog",
        "0001_initial",
        &[("testapp", "0002_alter_reporter_full_name")],
    );
    let before = std::fs::read_to_string(&blog).unwrap();

    let stdout = dar_ok(root, &["testapp", "0002_reporter_handle"]);
    assert_eq!(stdout.trim_end(), "Rebasing testapp.0002_reporter_handle");
    assert_eq!(
        read_migration(root, "testapp", "0003_reporter_handle"),
        migration_source(&[("testapp", "0002_alter_reporter_full_name")])
    );
    assert_eq!(std::fs::read_to_string(&blog).unwrap(), before);
}

#[test]
fn rebases_when_another_app_depends_on_the_remote_tip() {
    let project = setup_forked_project();
    let root = project.path();
    add_migration(root, "blog", "0001_initial", &[("testapp", "0002_reporter_handle")]);

    let stdout = dar_ok(root, &["testapp", "0002_reporter_handle"]);
    assert_eq!(stdout.trim_end(), "Rebasing testapp.0002_reporter_handle");
    assert!(!migration_path(root, "testapp", "0002_reporter_handle").exists());
    assert_eq!(
        read_migration(root, "testapp", "0003_reporter_handle"),
        migration_source(&[("testapp", "0002_alter_reporter_full_name")])
    );
}

#[test]
fn json_output_requires_dry_run() {
    let project = setup_forked_project();
    let root = project.path();

    dar_fails(root, &["--json", "testapp", "0002_reporter_handle"]);
    dar_fails(root, &["--format", "json", "testapp", "0002_reporter_handle"]);
    assert!(migration_path(root, "testapp", "0002_reporter_handle").exists());
    assert!(!migration_path(root, "testapp", "0003_reporter_handle").exists());
}

#[test]
fn keeps_other_dependencies() {
    let project = setup_forked_project();
    let root = project.path();
    add_migration(
        root,
        "testapp",
        "0002_reporter_handle",
        &[("auth", "0012_alter_user_first_name_max_length"), ("testapp", "0001_initial")],
    );

    dar_ok(root, &["testapp", "0002_reporter_handle"]);

    assert_eq!(
        read_migration(root, "testapp", "0003_reporter_handle"),
        migration_source(&[
            ("auth", "0012_alter_user_first_name_max_length"),
            ("testapp", "0002_alter_reporter_full_name"),
        ])
    );
}

#[test]
fn single_strategy_refuses_multiple_dependencies() {
    let project = setup_forked_project();
    let root = project.path();
    let original = add_migration(
        root,
        "testapp",
        "0002_reporter_handle",
        &[("auth", "0012_alter_user_first_name_max_length"), ("testapp", "0001_initial")],
    );
    let before = std::fs::read_to_string(&original).unwrap();

    let stderr = dar_fails(
        root,
        &["--strategy", "single", "testapp", "0002_reporter_handle"],
    );
    assert!(
        stderr.contains("Migration testapp.0002_reporter_handle has 2 dependencies"),
        "stderr: {stderr}"
    );
    assert!(stderr.contains("rebase it manually"));
    assert_eq!(std::fs::read_to_string(&original).unwrap(), before);
    assert!(!migration_path(root, "testapp", "0003_reporter_handle").exists());
}

#[test]
fn single_strategy_from_config() {
    let project = setup_forked_project();
    let root = project.path();
    std::fs::write(
        root.join(".dar.toml"),
        "[rebase]\nstrategy = \"single\"\n\n[format]\ncommand = []\n",
    )
    .unwrap();

    dar_ok(root, &["testapp", "0002_reporter_handle"]);
    let rebased = read_migration(root, "testapp", "0003_reporter_handle");
    assert!(
        rebased.contains("dependencies = [(\"testapp\", \"0002_alter_reporter_full_name\")]"),
        "rebased: {rebased}"
    );
}

#[test]
fn too_many_leaves_is_an_error() {
    let project = setup_forked_project();
    let root = project.path();
    add_migration(root, "testapp", "0002_reporter_level", &[("testapp", "0001_initial")]);

    let stderr = dar_fails(root, &["testapp", "0002_reporter_level"]);
    assert!(stderr.starts_with("Too many leaf nodes in testapp"), "stderr: {stderr}");
    assert!(migration_path(root, "testapp", "0002_reporter_level").exists());
}

#[test]
fn dry_run_json_changes_nothing() {
    let project = setup_forked_project();
    let root = project.path();

    let stdout = dar_ok(
        root,
        &["--dry-run", "--format", "json", "testapp", "0002_reporter_handle"],
    );
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["app_label"], "testapp");
    assert_eq!(report["strategy"], "targeted");
    assert_eq!(report["base"]["name"], "0001_initial");
    assert_eq!(report["local"]["name"], "0002_alter_reporter_full_name");
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["migration"]["name"], "0002_reporter_handle");
    assert_eq!(steps[0]["renamed"]["name"], "0003_reporter_handle");
    assert!(steps[0].get("contents").is_none());

    assert!(migration_path(root, "testapp", "0002_reporter_handle").exists());
    assert!(!migration_path(root, "testapp", "0003_reporter_handle").exists());
}

#[test]
fn dry_run_text_lists_renames() {
    let project = setup_forked_project();
    let stdout = dar_ok(
        project.path(),
        &["--dry-run", "testapp", "0002_reporter_handle"],
    );
    assert!(stdout.contains("testapp.0002_reporter_handle -> testapp.0003_reporter_handle"));
}

#[test]
fn preserves_everything_but_the_dependency() {
    let project = setup_forked_project();
    let root = project.path();
    let original = r#"# Generated by Django 4.2 on 2024-05-01 10:00
from django.db import migrations, models


class Migration(migrations.Migration):
    # keep this comment
    dependencies = [
        ('testapp', '0001_initial'),  # parent
    ]

    operations = [
        migrations.AddField(
            model_name='reporter',
            name='handle',
            field=models.CharField(default='', max_length=40),
        ),
    ]
"#;
    write_migration(root, "testapp", "0002_reporter_handle", original);

    dar_ok(root, &["testapp", "0002_reporter_handle"]);

    assert_eq!(
        read_migration(root, "testapp", "0003_reporter_handle"),
        original.replace("'0001_initial'", "'0002_alter_reporter_full_name'")
    );
}

#[test]
fn directory_flag_finds_project() {
    let project = setup_forked_project();
    let elsewhere = tempfile::TempDir::new().unwrap();
    let dir = project.path().to_str().unwrap();

    dar_ok(elsewhere.path(), &["-C", dir, "testapp", "0002_reporter_handle"]);
    assert!(migration_path(project.path(), "testapp", "0003_reporter_handle").exists());
}

#[test]
fn runs_from_a_subdirectory() {
    let project = setup_forked_project();
    let sub = project.path().join("testapp");

    dar_ok(&sub, &["testapp", "0002_reporter_handle"]);
    assert!(migration_path(project.path(), "testapp", "0003_reporter_handle").exists());
}

#[test]
fn invalid_config_is_reported() {
    let project = setup_forked_project();
    std::fs::write(project.path().join(".dar.toml"), "[rebase]\nbogus = 1\n").unwrap();

    let stderr = dar_fails(project.path(), &["testapp", "0002_reporter_handle"]);
    assert!(stderr.contains(".dar.toml"), "stderr: {stderr}");
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
}
