//! End-to-end lifecycle scenarios driven through the binary.

mod common;

use common::TestRepo;
use predicates::prelude::*;

#[test]
fn test_happy_path_new_start_close_cleanup() {
    let repo = TestRepo::new();

    // new → todo/
    let id = repo.new_ticket("fix-parser");
    assert!(repo.ticket_file("todo", &id).exists());

    // start → doing/, branch, worktree, symlink
    repo.tf(&["start", &id]).assert().success();
    assert!(repo.ticket_file("doing", &id).exists());
    assert!(!repo.ticket_file("todo", &id).exists());
    assert!(repo.branches().contains(&id));

    let wt = repo.worktree_path(&id);
    assert!(wt.exists());
    let link = wt.join("current-ticket.md");
    let target = std::fs::read_link(&link).unwrap();
    assert!(
        wt.join(&target)
            .ends_with(format!("tickets/doing/{id}.md"))
    );

    let shown = repo.show_json(&id);
    assert_eq!(shown["status"], "doing");
    assert!(shown["started_at"].is_string());
    assert_eq!(shown["has_worktree"], true);

    // close (inside the worktree) → done/, closed_at set, symlink gone
    repo.tf_in(&wt, &["close"]).assert().success();
    assert!(repo.ticket_file("done", &id).exists());
    assert!(!repo.ticket_file("doing", &id).exists());
    assert!(!link.exists());

    let shown = repo.show_json(&id);
    assert_eq!(shown["status"], "done");
    assert!(shown["closed_at"].is_string());

    // cleanup → worktree and branch removed
    repo.tf(&["cleanup", &id, "--force"]).assert().success();
    assert!(!repo.worktree_path(&id).exists());
    assert!(!repo.branches().contains(&id));

    // Modulo the ticket now in done/, the repo is back to its pre-start
    // shape: no extra branches, no worktrees
    assert_eq!(repo.branches(), vec!["main".to_string()]);
}

#[test]
fn test_cross_ticket_close_preserves_symlink() {
    let repo = TestRepo::new();
    let a = repo.new_ticket("ticket-a");
    let b = repo.new_ticket("ticket-b");

    repo.tf(&["start", &a]).assert().success();
    repo.tf(&["start", &b]).assert().success();

    let wt_a = repo.worktree_path(&a);
    let link_a = wt_a.join("current-ticket.md");
    assert!(link_a.exists());

    // In worktree A, close B by ID (unmerged, so a reason is required)
    repo.tf_in(&wt_a, &["close", &b, "--reason", "superseded"])
        .assert()
        .success();

    assert!(repo.ticket_file("done", &b).exists());
    // A's worktree and its symlink are untouched
    assert!(wt_a.exists());
    let target = std::fs::read_link(&link_a).unwrap();
    assert!(
        wt_a.join(target)
            .ends_with(format!("tickets/doing/{a}.md"))
    );
}

#[test]
fn test_force_restart_recreates_worktree() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("restartable");
    repo.tf(&["start", &id]).assert().success();

    let started_at = repo.show_json(&id)["started_at"].clone();

    // User deletes the worktree out from under us
    std::fs::remove_dir_all(repo.worktree_path(&id)).unwrap();

    // Plain start fails with a hint about --force
    repo.tf(&["start", &id])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    // Forced start recreates the worktree without resetting StartedAt
    repo.tf(&["start", &id, "--force"])
        .assert()
        .success()
        .stderr(predicate::str::contains("doing → doing (worktree recreated)"));

    assert!(repo.worktree_path(&id).exists());
    assert!(repo.ticket_file("doing", &id).exists());
    assert_eq!(repo.show_json(&id)["started_at"], started_at);
}

#[test]
fn test_abandoned_todo_close_requires_reason() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("abandoned");

    repo.tf(&["close", &id])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("reason"));
    assert!(repo.ticket_file("todo", &id).exists());

    repo.tf(&["close", &id, "--reason", "duplicate"])
        .assert()
        .success();
    assert!(repo.ticket_file("done", &id).exists());

    let shown = repo.show_json(&id);
    assert_eq!(shown["closure_reason"], "duplicate");
    let content = std::fs::read_to_string(repo.ticket_file("done", &id)).unwrap();
    assert!(content.contains("duplicate"));
}

#[test]
fn test_close_by_id_with_unmerged_commits_requires_reason() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("real-work");
    repo.tf(&["start", &id]).assert().success();

    // Commit real work on the ticket branch so it is genuinely unmerged
    let wt = repo.worktree_path(&id);
    std::fs::write(wt.join("work.txt"), "progress\n").unwrap();
    repo.git_in(&wt, &["add", "."]);
    repo.git_in(&wt, &["commit", "-m", "work in progress"]);

    repo.tf(&["close", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reason"));
    assert!(repo.ticket_file("doing", &id).exists());

    repo.tf(&["close", &id, "--reason", "abandoned"])
        .assert()
        .success();
    assert!(repo.ticket_file("done", &id).exists());
}

#[test]
fn test_close_already_done_fails() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("twice");
    repo.tf(&["close", &id, "--reason", "nope"]).assert().success();
    repo.tf(&["close", &id, "--reason", "again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already done"));
    // The repeated close did not corrupt state
    assert!(repo.ticket_file("done", &id).exists());
}

#[test]
fn test_close_without_current_ticket_hints_restore() {
    let repo = TestRepo::new();
    repo.tf(&["close"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("restore"));
}

#[test]
fn test_restore_by_id_reopens_done_ticket() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("reopen-me");
    repo.tf(&["start", &id]).assert().success();
    let started_at = repo.show_json(&id)["started_at"].clone();
    let wt = repo.worktree_path(&id);
    repo.tf_in(&wt, &["close"]).assert().success();

    repo.tf(&["restore", &id]).assert().success();

    let shown = repo.show_json(&id);
    assert_eq!(shown["status"], "doing");
    assert!(shown["closed_at"].is_null());
    // StartedAt survives the round trip
    assert_eq!(shown["started_at"], started_at);
}

#[test]
fn test_restore_relinks_inside_worktree() {
    let repo = TestRepo::new();
    let id = repo.new_ticket("relink");
    repo.tf(&["start", &id]).assert().success();

    let wt = repo.worktree_path(&id);
    let link = wt.join("current-ticket.md");
    std::fs::remove_file(&link).unwrap();

    repo.tf_in(&wt, &["restore"]).assert().success();
    assert!(link.exists());
    let target = std::fs::read_link(&link).unwrap();
    assert!(wt.join(target).ends_with(format!("tickets/doing/{id}.md")));
}

#[test]
fn test_sub_ticket_stacks_on_parent_branch() {
    let repo = TestRepo::new();
    let parent = repo.new_ticket("parent-epic");
    repo.tf(&["start", &parent]).assert().success();

    repo.tf(&["new", "child-task", "--parent", &parent])
        .assert()
        .success();
    let child = repo.ticket_id_for_slug("child-task");
    repo.tf(&["start", &child]).assert().success();

    // The child branch must be rooted at the parent's branch tip
    let parent_tip = repo.git(&["rev-parse", &parent]);
    let merge_base = repo.git(&["merge-base", &parent, &child]);
    assert_eq!(parent_tip.trim(), merge_base.trim());
}

#[test]
fn test_new_with_explicit_parent_records_relation() {
    let repo = TestRepo::new();
    let parent = repo.new_ticket("the-parent");
    repo.tf(&["new", "the-child", "--parent", &parent])
        .assert()
        .success();
    let child = repo.ticket_id_for_slug("the-child");

    let shown = repo.show_json(&child);
    let related = shown["related"].as_array().unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].as_str().unwrap(), format!("parent:{parent}"));
}
