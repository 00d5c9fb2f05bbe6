use leasing_kpi::feeds::{load_local_datasets, load_payload_file, DatasetKind, FeedLoadError};
use std::fs;
use std::path::PathBuf;

struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("leasing-kpi-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        Self(dir)
    }

    fn write(&self, file: &str, contents: &str) -> PathBuf {
        let path = self.0.join(file);
        fs::write(&path, contents).expect("write scratch file");
        path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.0).ok();
    }
}

#[test]
fn csv_and_json_files_load_into_one_feed_set() {
    let scratch = ScratchDir::new("local");
    let details = scratch.write(
        "pud.csv",
        "property,unit_number,floor_plan,lease_status,rent,report_date\n\
Oak Park,101,A1,Occupied,\"$1,250\",2025-09-24\n\
Oak Park,102,A1,Vacant,,2025-09-24\n",
    );
    let leasing = scratch.write(
        "leasing.json",
        r#"[{"property": "Oak Park", "report_date": "2025-09-21", "leases_7d": 2, "leases_28d": 6}]"#,
    );

    let feeds = load_local_datasets(&[
        ("portfolioUnitDetails".to_string(), details),
        ("LEASING".to_string(), leasing),
    ])
    .expect("datasets load");

    assert_eq!(feeds.unit_details.len(), 2);
    assert_eq!(feeds.unit_details[0].rent.as_deref(), Some("$1,250"));
    assert!(feeds.unit_details[1].rent.is_none());
    assert_eq!(feeds.leasing[0].leases_28d.as_deref(), Some("6"));
    assert_eq!(
        feeds.present(),
        vec![DatasetKind::Leasing, DatasetKind::UnitDetails]
    );
}

#[test]
fn payload_file_skips_unknown_keys() {
    let scratch = ScratchDir::new("payload");
    let path = scratch.write(
        "sync.json",
        r#"{
            "MMRData": [{"property": "Harbor", "total_units": 20, "occupied_units": 18}],
            "recentrents": [{"property": "Harbor", "unit": "7", "rent": 1400}],
            "somethingElse": [{"property": "Harbor"}]
        }"#,
    );

    let feeds = load_payload_file(&path).expect("payload loads");
    assert_eq!(feeds.weekly_summary.len(), 1);
    assert_eq!(feeds.recent_leases.len(), 1);
    assert_eq!(feeds.total_rows(), 2);
}

#[test]
fn malformed_json_names_the_file() {
    let scratch = ScratchDir::new("broken");
    let path = scratch.write("units.json", "[{\"property\": ");

    let error = load_local_datasets(&[("units".to_string(), path)])
        .expect_err("broken json");
    assert!(matches!(error, FeedLoadError::Json { .. }));
    assert!(error.to_string().contains("units.json"));
}
