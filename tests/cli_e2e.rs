//! End-to-end CLI tests for the parkmenu binary.

#![allow(deprecated)]

use std::path::Path;

use assert_cmd::Command;
use parkmenu_core::catalog::{Catalog, Category, NewMenuItem, NutritionFacts};
use parkmenu_core::estimate::{Estimate, Neighbor};
use parkmenu_core::{Database, Review};
use parkmenu_core::scrape::SourceKind;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::{Row, menu_page, profile};
use support::socket_guard::start_mock_server_or_skip;

/// Runs the binary against an isolated config home and database.
fn parkmenu(tempdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("parkmenu").unwrap();
    cmd.env("XDG_CONFIG_HOME", tempdir.path().join("xdg-config"))
        .env_remove("PARKMENU_SUPABASE_URL")
        .env_remove("PARKMENU_SUPABASE_KEY")
        .env("NO_COLOR", "1")
        .arg("--db")
        .arg(tempdir.path().join("catalog.db"));
    cmd
}

fn seed_pending_estimate(db_path: &Path) -> i64 {
    tokio_test::block_on(async {
        let db = Database::new(db_path).await.unwrap();
        let catalog = Catalog::new(db.clone());
        let park = catalog.upsert_park("EPCOT", None, None).await.unwrap();
        let venue = catalog
            .upsert_restaurant(park.id, "Sunshine Seasons", Some("The Land"))
            .await
            .unwrap();
        let item = catalog
            .upsert_menu_item(
                venue.id,
                &NewMenuItem {
                    name: "Rotisserie Chicken",
                    description: None,
                    price: Some(14.29),
                    photo_url: None,
                    category: Category::Entree,
                    is_fried: false,
                    is_vegetarian: false,
                },
            )
            .await
            .unwrap();
        let estimate = Estimate {
            menu_item_id: item.id,
            facts: NutritionFacts {
                calories: Some(640.0),
                carbs: Some(30.0),
                fat: Some(32.0),
                protein: Some(55.0),
                ..NutritionFacts::default()
            },
            confidence: 35,
            neighbors: vec![Neighbor {
                menu_item_id: 1,
                score: 0.7,
            }],
        };
        let id = Review::new(db.clone()).enqueue(&estimate).await.unwrap();
        db.close().await;
        id
    })
}

#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("parkmenu").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("scrape"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("parkmenu").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("parkmenu"));
}

#[test]
fn test_binary_requires_subcommand() {
    let mut cmd = Command::cargo_bin("parkmenu").unwrap();
    cmd.assert().failure();
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("parkmenu").unwrap();
    cmd.args(["stats", "--invalid-flag"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_estimate_rejects_out_of_range_neighbors() {
    let tempdir = TempDir::new().unwrap();
    parkmenu(&tempdir)
        .args(["estimate", "-k", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("0"));
}

#[test]
fn test_config_show_prints_effective_values_with_masked_key() {
    let tempdir = TempDir::new().unwrap();
    let config_dir = tempdir.path().join("xdg-config").join("parkmenu");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "# local settings\nrate_limit = 250\nestimate_k = 7\nsupabase_url = \"https://example.supabase.co\"\n",
    )
    .unwrap();

    parkmenu(&tempdir)
        .args(["config", "show"])
        .env("PARKMENU_SUPABASE_KEY", "secret-service-role-key")
        .assert()
        .success()
        .stdout(predicate::str::contains("config_file = loaded"))
        .stdout(predicate::str::contains("rate_limit = 250"))
        .stdout(predicate::str::contains("estimate_k = 7"))
        .stdout(predicate::str::contains("supabase_url = https://example.supabase.co"))
        .stdout(predicate::str::contains("supabase_key = ****-key"))
        .stdout(predicate::str::contains("secret-service").not());
}

#[test]
fn test_unknown_config_key_fails() {
    let tempdir = TempDir::new().unwrap();
    let config_path = tempdir.path().join("custom.toml");
    std::fs::write(&config_path, "concurrency = 4\n").unwrap();

    parkmenu(&tempdir)
        .arg("--config")
        .arg(&config_path)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_missing_supabase_credentials_fail_sync() {
    let tempdir = TempDir::new().unwrap();
    parkmenu(&tempdir)
        .args(["sync", "pull"])
        .assert()
        .failure();
}

#[test]
fn test_ingest_merge_and_stats() {
    let tempdir = TempDir::new().unwrap();
    let input = tempdir.path().join("items.jsonl");
    std::fs::write(
        &input,
        concat!(
            r#"{"source_kind":"official","source_name":"wdw","page_url":"https://wdw.example/dfb","park":"Magic Kingdom","restaurant":"Columbia Harbour House","name":"Lobster Roll","price":20.99}"#,
            "\n",
            r#"{"source_kind":"blog","source_name":"snackblog","page_url":"https://blog.example/chh","park":"Magic Kingdom","restaurant":"Columbia Harbor House","name":"Lobster Roll","price":21.49}"#,
            "\n",
            "not json\n",
        ),
    )
    .unwrap();

    parkmenu(&tempdir)
        .arg("ingest")
        .arg(&input)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("2 new items staged"))
        .stdout(predicate::str::contains("1 malformed lines"));

    parkmenu(&tempdir)
        .arg("merge")
        .assert()
        .success()
        .stdout(predicate::str::contains("into 1 items"));

    parkmenu(&tempdir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("menu_items = 1"))
        .stdout(predicate::str::contains("staged.merged = 2"));
}

#[test]
fn test_load_dump_then_audit() {
    let tempdir = TempDir::new().unwrap();
    let dump = tempdir.path().join("dump.json");
    std::fs::write(
        &dump,
        r#"{
            "parks": [{"id": 1, "name": "Animal Kingdom", "location": null, "timezone": null}],
            "restaurants": [{"id": 2, "park_id": 1, "name": "Satu'li Canteen", "land": "Pandora"}],
            "menu_items": [{"id": 3, "restaurant_id": 2, "name": "Chicken Bowl", "description": null,
                            "price": 15.99, "photo_url": null, "category": "entree",
                            "is_fried": false, "is_vegetarian": false}],
            "nutritional_data": [{"menu_item_id": 3, "calories": 610, "carbs": 40, "fat": 20,
                                  "protein": 45, "sugar": 60, "fiber": 5, "sodium": null,
                                  "cholesterol": null, "alcohol_grams": null,
                                  "source": "crowdsourced", "confidence_score": 60}]
        }"#,
    )
    .unwrap();

    parkmenu(&tempdir)
        .arg("load")
        .arg(&dump)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 menu items"));

    parkmenu(&tempdir)
        .arg("audit")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("sugar_exceeds_carbs = 1"));

    parkmenu(&tempdir)
        .args(["audit", "--fix"])
        .assert()
        .success();

    parkmenu(&tempdir).arg("audit").assert().success();
}

#[test]
fn test_review_list_and_approve() {
    let tempdir = TempDir::new().unwrap();
    let id = seed_pending_estimate(&tempdir.path().join("catalog.db"));

    parkmenu(&tempdir)
        .args(["review", "list", "--status", "pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rotisserie Chicken"));

    parkmenu(&tempdir)
        .args(["review", "approve", &id.to_string()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Approved 1 estimates"));

    parkmenu(&tempdir)
        .arg("import")
        .assert()
        .success();

    parkmenu(&tempdir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("with_nutrition = 1"))
        .stdout(predicate::str::contains("estimates.imported = 1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scrape_logs_each_failed_page_once() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let rows = [Row {
        name: "Cheeseburger Pizza",
        desc: None,
        price: Some("$12.99"),
        cal: None,
    }];
    Mock::given(method("GET"))
        .and(path("/mk/pizzeria"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(menu_page("Pinocchio Village Haus", "Fantasyland", &rows)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mk/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tempdir = TempDir::new().unwrap();
    let site = profile(
        "fanblog.example",
        SourceKind::Blog,
        "Magic Kingdom",
        vec![
            format!("{}/mk/pizzeria", server.uri()),
            format!("{}/mk/gone", server.uri()),
        ],
    );
    let profile_path = tempdir.path().join("fanblog.json");
    std::fs::write(&profile_path, serde_json::to_string(&site).unwrap()).unwrap();

    let output = parkmenu(&tempdir)
        .env("RUST_LOG", "warn")
        .args(["scrape", "-l", "0", "--profile"])
        .arg(&profile_path)
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 items from 1 pages (1 failed)"), "{stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    let logged = stderr.lines().filter(|line| line.contains("/mk/gone")).count();
    assert_eq!(logged, 1, "{stderr}");
}
