use std::io::Write;
use std::process::{Command, Output, Stdio};

const DIFF: &str = "\
diff --git a/src/auth.rs b/src/auth.rs
--- a/src/auth.rs
+++ b/src/auth.rs
@@ -3,3 +3,3 @@ fn login(user: &str) {
     let hash = hash(user);
-    check(hash).unwrap();
+    check(hash)?;
     Ok(())
diff --git a/package-lock.json b/package-lock.json
--- a/package-lock.json
+++ b/package-lock.json
@@ -1 +1 @@
-{}
+{ }
";

fn run(args: &[&str], stdin: &str) -> Output {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_hunkwise"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("HUNKWISE_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // The binary may exit before reading stdin.
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().unwrap()
}

#[test]
fn parse_prints_comments_as_json() {
    let reply = "```json\n{\"reviews\": [\
        {\"lineNumber\": 4, \"reviewComment\": \"Good call.\"},\
        {\"lineNumber\": 0, \"reviewComment\": \"dropped\"}]}\n```";
    let output = run(&["parse", "--format", "json"], reply);
    assert!(output.status.success());

    let comments: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        comments,
        serde_json::json!([{ "lineNumber": 4, "reviewComment": "Good call." }])
    );
}

#[test]
fn parse_malformed_reply_is_empty() {
    let output = run(&["parse", "--format", "json"], "Sorry, I cannot help with that.");
    assert!(output.status.success());
    let comments: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(comments, serde_json::json!([]));
}

#[test]
fn prompt_lists_every_reviewable_hunk() {
    let output = run(
        &["prompt", "--format", "json", "--title", "Propagate login errors"],
        DIFF,
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let prompts: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(prompts.len(), 1, "lock file should be filtered out");
    assert_eq!(prompts[0]["path"], "src/auth.rs");
    assert_eq!(prompts[0]["hunk"], "@@ -3,3 +3,3 @@ fn login(user: &str) {");
    let prompt = prompts[0]["prompt"].as_str().unwrap();
    assert!(prompt.contains("Pull request title: Propagate login errors"));
    assert!(prompt.contains("4 +    check(hash)?;"));
}

#[test]
fn prompt_with_gemini_needs_no_key() {
    let output = run(&["prompt", "--provider", "gemini"], DIFF);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("=== src/auth.rs"));
}

#[test]
fn unknown_provider_fails() {
    let output = run(&["prompt", "--provider", "nope"], DIFF);
    assert!(!output.status.success());
}

#[test]
fn empty_diff_fails() {
    let output = run(&["prompt"], "   \n");
    assert!(!output.status.success());
}

#[test]
fn post_comments_requires_pull_request() {
    let output = run(&["review", "--post-comments"], DIFF);
    assert!(!output.status.success());
}
