use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::{fs, path::Path};
use tempfile::{TempDir, tempdir};

fn run_cli(root: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("lang-token").expect("binary exists");
    cmd.arg("--root").arg(root).args(args);
    // Force English output for consistent test assertions
    cmd.env("LANG_TOKEN_LANG", "en");
    cmd.assert()
}

fn initialized_workspace() -> TempDir {
    let tmp = tempdir().expect("temp dir");
    run_cli(tmp.path(), &["init"]).success();
    fs::write(
        tmp.path().join("i18n/fr.json"),
        json!({ "app": { "title": "Éditeur de traductions" } }).to_string(),
    )
    .unwrap();
    tmp
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("file readable")).expect("valid json")
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8")
}

#[test]
fn init_creates_config_and_sample_reference() {
    let tmp = tempdir().expect("temp dir");

    run_cli(tmp.path(), &["init"])
        .success()
        .stdout(predicate::str::contains("Initialized workspace"));

    assert!(tmp.path().join("config.toml").is_file());
    let sample = read_json(&tmp.path().join("i18n/en.json"));
    assert_eq!(sample["app"]["title"], "Translation editor");

    run_cli(tmp.path(), &["init"])
        .success()
        .stdout(predicate::str::contains("already initialized"));
}

#[test]
fn files_lists_language_documents() {
    let tmp = initialized_workspace();
    fs::write(tmp.path().join("i18n/images.json"), "{}").unwrap();
    fs::write(tmp.path().join("i18n/logo.png"), "png").unwrap();

    let stdout = stdout_of(run_cli(tmp.path(), &["files"]).success());
    assert!(stdout.contains("en.json"), "unexpected output: {stdout}");
    assert!(stdout.contains("(reference)"), "unexpected output: {stdout}");
    assert!(stdout.contains("fr.json"), "unexpected output: {stdout}");
    assert!(!stdout.contains("images.json"), "unexpected output: {stdout}");
    assert!(!stdout.contains("logo.png"), "unexpected output: {stdout}");
}

#[test]
fn missing_lists_keys_in_reference_order() {
    let tmp = initialized_workspace();

    let stdout = stdout_of(run_cli(tmp.path(), &["missing", "fr.json"]).success());
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        [
            "app.save",
            "home.welcome",
            "home.logout",
            "footer",
            "4 of 5 tokens missing in fr.json."
        ]
    );
}

#[test]
fn missing_json_output() {
    let tmp = initialized_workspace();

    let stdout = stdout_of(run_cli(tmp.path(), &["missing", "fr.json", "--json"]).success());
    let report: Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(report["reference"], "en.json");
    assert_eq!(report["missing"], json!(["app.save", "home.welcome", "home.logout", "footer"]));
}

#[test]
fn groups_json_with_missing_only() {
    let tmp = initialized_workspace();

    let stdout = stdout_of(
        run_cli(tmp.path(), &["groups", "fr.json", "--missing-only", "--json"]).success(),
    );
    let groups: Value = serde_json::from_str(&stdout).expect("json output");
    assert_eq!(
        groups,
        json!([
            { "prefix": "app", "tokens": ["app.save"] },
            { "prefix": "home", "tokens": ["home.welcome", "home.logout"] },
            { "prefix": "root", "tokens": ["footer"] }
        ])
    );
}

#[test]
fn groups_text_marks_missing_values() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["groups", "fr.json"])
        .success()
        .stdout(predicate::str::contains("[app]"))
        .stdout(predicate::str::contains("app.title = Éditeur de traductions"))
        .stdout(predicate::str::contains("app.save = <missing>"));
}

#[test]
fn set_updates_and_saves_nested_document() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["set", "fr.json", "app.save", "Enregistrer"])
        .success()
        .stdout(predicate::str::contains("Saved app.save in fr.json."))
        .stdout(predicate::str::contains("3 tokens still missing."));

    assert_eq!(
        read_json(&tmp.path().join("i18n/fr.json")),
        json!({ "app": { "title": "Éditeur de traductions", "save": "Enregistrer" } })
    );
}

#[test]
fn set_creates_new_language_document() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["set", "de.json", "home.welcome", "Willkommen"]).success();
    assert_eq!(
        read_json(&tmp.path().join("i18n/de.json")),
        json!({ "home": { "welcome": "Willkommen" } })
    );
}

#[test]
fn set_rejects_conflicting_keys() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["set", "fr.json", "app.title.short", "Éditeur"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("app.title.short"));

    assert_eq!(
        read_json(&tmp.path().join("i18n/fr.json")),
        json!({ "app": { "title": "Éditeur de traductions" } })
    );
}

#[test]
fn save_as_exports_document() {
    let tmp = initialized_workspace();
    let out = tmp.path().join("export.json");

    run_cli(tmp.path(), &["save-as", "fr.json", out.to_str().unwrap()])
        .success()
        .stdout(predicate::str::contains("Exported fr.json"));
    assert_eq!(read_json(&out), json!({ "app": { "title": "Éditeur de traductions" } }));
}

#[test]
fn picture_is_recorded_in_images_json() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["picture", "home", "http://server/home.png"]).success();
    let shot = tmp.path().join("screen.png");
    fs::write(&shot, "png").unwrap();
    run_cli(tmp.path(), &["picture", "app", shot.to_str().unwrap(), "--upload"]).success();

    assert_eq!(
        read_json(&tmp.path().join("i18n/images.json")),
        json!({
            "app": "http://127.0.0.1:3033/file/screen.png",
            "home": "http://server/home.png"
        })
    );
    assert!(tmp.path().join("i18n/screen.png").is_file());
}

#[test]
fn unknown_document_is_an_error() {
    let tmp = initialized_workspace();

    run_cli(tmp.path(), &["missing", "de.json"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error: Document 'de.json' not found."));
}

#[test]
fn missing_reference_is_an_error() {
    let tmp = tempdir().expect("temp dir");
    fs::create_dir_all(tmp.path().join("i18n")).unwrap();
    fs::write(tmp.path().join("i18n/fr.json"), "{}").unwrap();

    run_cli(tmp.path(), &["missing", "fr.json"])
        .failure()
        .stderr(predicate::str::contains("Reference document 'en.json' could not be loaded."));
}

#[test]
fn picture_keeps_unreadable_metadata_untouched() {
    let tmp = initialized_workspace();
    let images = tmp.path().join("i18n/images.json");
    let existing = r#"{"home":"http://server/home.png","legacy":null}"#;
    fs::write(&images, existing).unwrap();

    run_cli(tmp.path(), &["picture", "app", "http://server/app.png"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Picture metadata could not be loaded"));
    assert_eq!(fs::read_to_string(&images).unwrap(), existing);
}

#[test]
fn set_refuses_to_edit_reference() {
    let tmp = initialized_workspace();
    let before = read_json(&tmp.path().join("i18n/en.json"));

    run_cli(tmp.path(), &["set", "en.json", "app.title", "Changed"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Reference document 'en.json' is read-only"));
    assert_eq!(read_json(&tmp.path().join("i18n/en.json")), before);
}
