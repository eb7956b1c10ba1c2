use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pricebook_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pricebook");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/pricebook.sqlite"

[ingestion]
fuzzy_threshold = 0.85

[user]
display_name = "Sam"
"#,
        root.display()
    );

    let config_path = config_dir.join("pricebook.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_receipt(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn run_pricebook(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pricebook_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pricebook binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn add_milk(config_path: &Path, price: &str, date: &str) -> (String, String, bool) {
    run_pricebook(
        config_path,
        &[
            "add", "Milk", "--price", price, "--quantity", "1", "--store", "Acme", "--date", date,
        ],
    )
}

const RECEIPT: &str = r#"[
  {"item_name": "Bananas", "price": "1.29", "quantity": 6, "store_name": "Acme", "purchased_at": "2024-03-01"},
  {"item_name": "Eggs", "price": -1, "quantity": 12, "store_name": "Acme"},
  {"item_name": "Bread", "price": 2.99, "quantity": 1, "store_name": "Acme"}
]"#;

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pricebook(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pricebook(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pricebook(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_pricebook(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_add_then_duplicate_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    let (stdout, stderr, success) = add_milk(&config_path, "4.99", "2024-03-01");
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added Milk"));
    assert!(stdout.contains("added by:   Sam"));
    assert!(stdout.contains("  recorded:   new item\n"));

    let (stdout, _, success) = add_milk(&config_path, "4.99", "2024-03-01");
    assert!(!success, "duplicate add should exit non-zero");
    assert!(stdout.contains("Duplicate entry"), "got: {}", stdout);
    assert!(stdout.contains("update the existing entry"));
}

#[test]
fn test_add_force_skips_duplicate_check() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    add_milk(&config_path, "4.99", "2024-03-01");
    let (stdout, _, success) = run_pricebook(
        &config_path,
        &[
            "add", "Milk", "--price", "4.99", "--store", "Acme", "--date", "2024-03-01", "--force",
        ],
    );
    assert!(success, "forced add failed: {}", stdout);
    assert!(stdout.contains("unchecked"));
}

#[test]
fn test_add_invalid_price() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    let (stdout, _, success) = run_pricebook(
        &config_path,
        &["add", "Milk", "--price=-1", "--store", "Acme"],
    );
    assert!(!success);
    assert!(stdout.contains("invalid: Price must be greater than zero"));
}

#[test]
fn test_add_json_and_get() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    let (stdout, _, success) = run_pricebook(
        &config_path,
        &[
            "add", "Greek Yogurt", "--price", "$10.00", "--quantity", "4", "--store", "Fresh Mart",
            "--unit", "cup", "--json",
        ],
    );
    assert!(success);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["item"]["unit_price"], 2.5);
    let id = result["item"]["id"].as_str().unwrap().to_string();

    let (stdout, _, success) = run_pricebook(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("Greek Yogurt"));
    assert!(stdout.contains("$2.50/cup"));
    assert!(stdout.contains("--- Provenance (0) ---"));
}

#[test]
fn test_get_unknown_id_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    let (_, stderr, success) = run_pricebook(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_import_stop_on_error() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT);

    let (stdout, stderr, success) = run_pricebook(
        &config_path,
        &["import", receipt.to_str().unwrap(), "--stop-on-error"],
    );
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("created: 1"));
    assert!(stdout.contains("invalid: 1"));
    assert!(stdout.contains("skipped: 1"));
}

#[test]
fn test_import_json_continues_past_errors() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT);

    let (stdout, _, success) =
        run_pricebook(&config_path, &["import", receipt.to_str().unwrap(), "--json"]);
    assert!(success);
    let results: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    let outcomes: Vec<bool> = results
        .iter()
        .map(|r| r["success"].as_bool().unwrap())
        .collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert_eq!(results[1]["error"], "Price must be greater than zero");
}

const RECEIPT_WITH_MISSING_PRICE: &str = r#"[
  {"item_name": "Bananas", "price": "1.29", "quantity": 6, "store_name": "Acme"},
  {"item_name": "Eggs", "quantity": 12, "store_name": "Acme"},
  {"item_name": "Bread", "price": 2.99, "quantity": 1, "store_name": "Acme", "purchased_at": "someday"}
]"#;

#[test]
fn test_import_keeps_going_past_malformed_records() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT_WITH_MISSING_PRICE);

    let (stdout, stderr, success) =
        run_pricebook(&config_path, &["import", receipt.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("#1 added Bananas"));
    assert!(stdout.contains("#2 skipped Eggs: Malformed record: missing field `price`"), "got: {}", stdout);
    assert!(stdout.contains("#3 skipped Bread: Malformed record:"));
    assert!(stdout.contains("created: 1"));
    assert!(stdout.contains("invalid: 2"));

    let (stdout, _, _) = run_pricebook(
        &config_path,
        &["import", receipt.to_str().unwrap(), "--json"],
    );
    let results: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[1]["error"]
        .as_str()
        .unwrap()
        .starts_with("Malformed record: missing field `price`"));
}

#[test]
fn test_import_exits_non_zero_when_nothing_is_stored() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT);

    let (_, _, success) = run_pricebook(&config_path, &["import", receipt.to_str().unwrap()]);
    assert!(success);

    // Same file again: every valid row is now a duplicate, the other is invalid.
    let (stdout, _, success) = run_pricebook(&config_path, &["import", receipt.to_str().unwrap()]);
    assert!(!success, "re-import should exit non-zero: {}", stdout);
    assert!(stdout.contains("created: 0"));
    assert!(stdout.contains("duplicates: 2"));
    assert!(stdout.contains("nothing stored"));
}

#[test]
fn test_import_flags_suspicious_rows_for_review() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(
        tmp.path(),
        "scan.json",
        r#"[
  {"item_name": "Gum", "price": 0.01, "quantity": 1, "store_name": "Acme",
   "provenance": {"source": "tesseract", "confidence": 0.9}},
  {"item_name": "Soda", "price": 1.99, "quantity": 1, "store_name": "Acme",
   "provenance": {"source": "tesseract", "confidence": 0.95}}
]"#,
    );

    let (stdout, _, _) = run_pricebook(&config_path, &["import", receipt.to_str().unwrap()]);
    assert!(stdout.contains("flagged: 1"), "got: {}", stdout);

    let (stdout, _, success) = run_pricebook(&config_path, &["review-queue"]);
    assert!(success);
    assert!(stdout.contains("Gum @ Acme"));
    assert!(stdout.contains("Suspicious price detected"));
    assert!(!stdout.contains("Soda"));
}

#[test]
fn test_import_no_flag() {
    let (tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);
    let receipt = write_receipt(
        tmp.path(),
        "scan.json",
        r#"[{"item_name": "Gum", "price": 0.01, "quantity": 1, "store_name": "Acme"}]"#,
    );

    run_pricebook(
        &config_path,
        &["import", receipt.to_str().unwrap(), "--no-flag"],
    );
    let (stdout, _, _) = run_pricebook(&config_path, &["review-queue"]);
    assert!(stdout.contains("Review queue is empty."));
}

#[test]
fn test_check_validates_without_database() {
    let (tmp, config_path) = setup_test_env();
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT);

    let (stdout, _, success) =
        run_pricebook(&config_path, &["check", receipt.to_str().unwrap()]);
    assert!(!success);
    assert!(stdout.contains("#2 Eggs: Price must be greater than zero"));
    assert!(stdout.contains("valid: 2 / 3"));
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn test_check_reports_malformed_record_by_index() {
    let (tmp, config_path) = setup_test_env();
    let receipt = write_receipt(tmp.path(), "receipt.json", RECEIPT_WITH_MISSING_PRICE);

    let (stdout, stderr, success) =
        run_pricebook(&config_path, &["check", receipt.to_str().unwrap()]);
    assert!(!success);
    assert!(!stderr.contains("Failed to parse"), "stderr: {}", stderr);
    assert!(stdout.contains("#2 Eggs: Malformed record: missing field `price`"), "got: {}", stdout);
    assert!(stdout.contains("valid: 1 / 3"));
}

#[test]
fn test_history_best_price_by_unit() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    run_pricebook(
        &config_path,
        &["add", "Chicken", "--price", "3.99", "--store", "Acme", "--unit", "lb", "--date", "2024-03-01"],
    );
    run_pricebook(
        &config_path,
        &[
            "add", "Chicken", "--price", "3.20", "--quantity", "16", "--store", "Fresh Mart",
            "--unit", "ounces", "--date", "2024-03-08",
        ],
    );

    let (stdout, _, success) = run_pricebook(&config_path, &["history", "chicken"]);
    assert!(success);
    assert!(
        stdout.contains("best: $3.20/lb at Fresh Mart on 2024-03-08 (paid $0.20/oz)"),
        "got: {}",
        stdout
    );
}

#[test]
fn test_history_shows_best_price() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    add_milk(&config_path, "4.99", "2024-03-01");
    add_milk(&config_path, "5.49", "2024-03-08");
    add_milk(&config_path, "4.49", "2024-03-15");

    let (stdout, _, success) = run_pricebook(&config_path, &["history", "milk"]);
    assert!(success);
    assert!(stdout.contains("3 observations"));
    assert!(stdout.contains("2024-03-08"));
    assert!(stdout.contains("best: $4.49/each at Acme on 2024-03-15"));
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();
    run_pricebook(&config_path, &["init"]);

    add_milk(&config_path, "4.99", "2024-03-01");
    add_milk(&config_path, "5.49", "2024-03-08");

    let (stdout, _, success) = run_pricebook(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Observations: 2"));
    assert!(stdout.contains("Items:        1"));
    assert!(stdout.contains("Acme"));
}
