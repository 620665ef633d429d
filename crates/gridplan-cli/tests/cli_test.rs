//! End-to-end tests for the `gridplan` binary against the file backend.
//!
//! Each test points `GRIDPLAN_DATA_DIR` and `XDG_CONFIG_HOME` at a fresh
//! temp dir so no user config or database is consulted.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn gridplan(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gridplan"))
        .args(args)
        .env("GRIDPLAN_DATA_DIR", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("GRIDPLAN_DATABASE_URL")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run gridplan binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Run `gridplan add` and return the generated post id.
fn add(home: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    let output = gridplan(home, &full);
    assert!(output.status.success(), "add failed: {}", stderr(&output));
    let text = stdout(&output);
    let line = text.lines().nth(1).expect("add prints the new post");
    line.split_whitespace()
        .next()
        .expect("post line starts with its id")
        .to_string()
}

#[test]
fn add_then_list_day_and_month() {
    let home = TempDir::new().unwrap();
    let id = add(
        home.path(),
        &["2025-01-15", "--type", "Reel", "--time", "18:30", "--topic", "Studio tour"],
    );

    let day = gridplan(home.path(), &["list", "2025-01-15"]);
    assert!(day.status.success());
    let text = stdout(&day);
    assert!(text.contains(&id));
    assert!(text.contains("18:30"));
    assert!(text.contains("Studio tour"));

    let month = gridplan(home.path(), &["list", "2025-0", "--json"]);
    assert!(month.status.success(), "{}", stderr(&month));
    let posts: serde_json::Value = serde_json::from_str(&stdout(&month)).unwrap();
    assert_eq!(posts["2025-01-15"][0]["id"], id.as_str());
    assert_eq!(posts["2025-01-15"][0]["type"], "Reel");

    assert!(home.path().join("data/plans.json").exists());
}

#[test]
fn move_relocates_post_between_days() {
    let home = TempDir::new().unwrap();
    let id = add(home.path(), &["2025-01-10", "--topic", "Launch"]);

    let moved = gridplan(home.path(), &["move", &id, "2025-01-10", "2025-01-20"]);
    assert!(moved.status.success(), "{}", stderr(&moved));

    let old_day = stdout(&gridplan(home.path(), &["list", "2025-01-10"]));
    assert!(old_day.contains("Nothing scheduled"));
    let new_day = stdout(&gridplan(home.path(), &["list", "2025-01-20"]));
    assert!(new_day.contains(&id));
}

#[test]
fn move_across_months_is_rejected() {
    let home = TempDir::new().unwrap();
    let id = add(home.path(), &["2025-01-10"]);

    let output = gridplan(home.path(), &["move", &id, "2025-01-10", "2025-02-01"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error:"));

    let still_there = stdout(&gridplan(home.path(), &["list", "2025-01-10"]));
    assert!(still_there.contains(&id));
}

#[test]
fn grid_is_chronological_and_swaps_are_not_saved() {
    let home = TempDir::new().unwrap();
    add(home.path(), &["2025-01-09", "--topic", "Third", "--media", "https://cdn/3.jpg"]);
    add(home.path(), &["2025-01-01", "--topic", "First", "--media", "https://cdn/1.jpg"]);
    add(home.path(), &["2025-01-05", "--topic", "Second", "--cover", "https://cdn/2.jpg"]);
    // Without media a post never reaches the grid.
    add(home.path(), &["2025-01-02", "--topic", "Draft"]);

    let output = gridplan(home.path(), &["grid", "2025-0", "--capacity", "4", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let slots: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let topics: Vec<_> = slots
        .as_array()
        .unwrap()
        .iter()
        .map(|slot| slot["topic"].as_str().map(str::to_string))
        .collect();
    assert_eq!(
        topics,
        [
            Some("First".to_string()),
            Some("Second".to_string()),
            Some("Third".to_string()),
            None
        ]
    );

    let swapped = gridplan(
        home.path(),
        &["grid", "2025-0", "--capacity", "4", "--swap", "0", "2"],
    );
    assert!(swapped.status.success(), "{}", stderr(&swapped));
    let text = stdout(&swapped);
    assert!(text.contains("manual order preview"));
    assert!(text.contains("3/4 slots filled"));

    let again = gridplan(home.path(), &["grid", "2025-0", "--capacity", "4", "--json"]);
    let slots: serde_json::Value = serde_json::from_str(&stdout(&again)).unwrap();
    assert_eq!(slots[0]["topic"], "First");
}

#[test]
fn swap_out_of_range_fails() {
    let home = TempDir::new().unwrap();
    add(home.path(), &["2025-01-01", "--media", "https://cdn/1.jpg"]);

    let output = gridplan(
        home.path(),
        &["grid", "2025-0", "--capacity", "3", "--swap", "0", "7"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("cannot swap slots 0 and 7"));
}

#[test]
fn delete_removes_post_once() {
    let home = TempDir::new().unwrap();
    let id = add(home.path(), &["2025-03-03", "--caption", "bye"]);

    let first = gridplan(home.path(), &["delete", &id, "2025-03-03"]);
    assert!(first.status.success(), "{}", stderr(&first));
    assert!(stdout(&first).contains("Deleted from 2025-03-03"));

    let second = gridplan(home.path(), &["delete", &id, "2025-03-03"]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("error:"));
}

#[test]
fn upload_stores_media_locally() {
    let home = TempDir::new().unwrap();
    let image = home.path().join("cover.png");
    std::fs::write(&image, b"not really a png").unwrap();

    let output = gridplan(
        home.path(),
        &["add", "2025-04-01", "--upload", image.to_str().unwrap()],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("[media]"));

    let folder = home.path().join("data/media/content_planner");
    let stored: Vec<_> = std::fs::read_dir(&folder).unwrap().collect();
    assert_eq!(stored.len(), 1);
}

#[test]
fn invalid_arguments_are_reported() {
    let home = TempDir::new().unwrap();
    let output = gridplan(home.path(), &["list", "January"]);
    assert!(!output.status.success());

    let output = gridplan(home.path(), &["add", "2025-01-01", "--type", "Podcast"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error:"));
}

#[test]
fn rejected_update_keeps_uploaded_media() {
    let home = TempDir::new().unwrap();
    let image = home.path().join("a.png");
    std::fs::write(&image, b"pixels").unwrap();
    let id = add(home.path(), &["2025-04-01", "--upload", image.to_str().unwrap()]);
    let folder = home.path().join("data/media/content_planner");

    let output = gridplan(
        home.path(),
        &["update", &id, "2025-04-01", "--clear-media", "--type", "Tweet"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("invalid post type"));

    let day = stdout(&gridplan(home.path(), &["list", "2025-04-01"]));
    assert!(day.contains("[media]"), "media should survive: {day}");
    assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 1);

    let cleared = gridplan(
        home.path(),
        &["update", &id, "2025-04-01", "--clear-media", "--type", "Reel"],
    );
    assert!(cleared.status.success(), "{}", stderr(&cleared));
    assert!(!stdout(&cleared).contains("[media]"));
    assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 0);
}

#[test]
fn months_lists_stored_plans_in_order() {
    let home = TempDir::new().unwrap();
    let empty = gridplan(home.path(), &["months"]);
    assert!(empty.status.success(), "{}", stderr(&empty));
    assert!(stdout(&empty).contains("No month plans"));

    add(home.path(), &["2025-10-02"]);
    add(home.path(), &["2025-02-03"]);
    add(home.path(), &["2025-02-04"]);

    let output = gridplan(home.path(), &["months", "--json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let months: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(months[0]["month"], "2025-1");
    assert_eq!(months[0]["posts"], 2);
    assert_eq!(months[0]["days"], 2);
    assert_eq!(months[1]["month"], "2025-9");
    assert_eq!(months[1]["posts"], 1);
}

#[test]
fn grid_rejects_zero_capacity() {
    let home = TempDir::new().unwrap();
    let output = gridplan(home.path(), &["grid", "2025-0", "--capacity", "0"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("capacity must be at least 1"));
}
