//! Saving and loading entity graphs through a libSQL file, including a
//! reopen of the same file.

use std::path::Path;

use mesa_config::{MesaConfig, StorageBackend, StorageConfig};
use mesa_core::entities::{DATA_SERIES, DataSeries, MEASUREMENT, Measurement};
use mesa_core::{ActiveBackend, BackendRef, Identity, Saveable, reconcile};
use mesa_db::open_backend;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn libsql_config(dir: &Path) -> MesaConfig {
    MesaConfig {
        storage: StorageConfig {
            backend: StorageBackend::Libsql,
            data_directory: dir.to_string_lossy().into_owned(),
            database_name: "lab.db".into(),
            ..StorageConfig::default()
        },
        ..MesaConfig::default()
    }
}

fn save_measurement(backend: &BackendRef) -> i64 {
    let mut t = DataSeries::time("t", vec![0.0, 1.0, 2.0], 1_700_000_000.0);
    t.save(backend, "default").unwrap();
    let mut u = DataSeries::value("U", "V", vec![0.1, 0.2, 0.3], t.clone());
    u.save(backend, "default").unwrap();

    let mut measurement = Measurement::ecms("run-1", "CV", Some([0.0, 5.0])).with_tstamp(1_700_000_000.0);
    measurement.metadata.insert("operator".into(), json!("sk"));
    measurement.add_series(t);
    measurement.add_series(u);
    measurement.save(backend, "default").unwrap();
    measurement.identity().unwrap().id()
}

#[test]
fn measurement_graph_survives_a_reopen() {
    let dir = TempDir::new().unwrap();
    let config = libsql_config(dir.path());

    let id = save_measurement(&open_backend(&config).unwrap());

    let backend = open_backend(&config).unwrap();
    let loaded = backend.load(&*MEASUREMENT, id).unwrap();
    assert_eq!(loaded.class().name(), "ECMSMeasurement");
    assert_eq!(loaded.identity(), Some(&Identity::full(backend.clone(), id)));

    let dict = loaded.as_dict().unwrap();
    assert_eq!(dict["metadata"], json!({"operator": "sk"}));
    assert_eq!(dict["ec_technique"], "CV");
    assert_eq!(dict["tspan_bg"], json!([0.0, 5.0]));
    assert_eq!(dict["s_ids"], json!([1, 2]));
}

#[test]
fn series_placeholders_resolve_from_the_file() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&libsql_config(dir.path())).unwrap();
    save_measurement(&backend);

    let active = ActiveBackend::new(backend);
    let series = reconcile(None, Some(&[2]), Some(&*DATA_SERIES), &active).unwrap();
    let value = series.get(0).unwrap().materialize().unwrap();
    assert_eq!(value.class().name(), "ValueSeries");

    let dict = value.as_dict().unwrap();
    assert_eq!(dict["unit_name"], "V");
    assert_eq!(dict["t_id"], 1);
}

#[test]
fn stores_on_one_file_share_identities() {
    let dir = TempDir::new().unwrap();
    let config = libsql_config(dir.path());
    let first = open_backend(&config).unwrap();
    let second = open_backend(&config).unwrap();
    assert_eq!(first, second);

    let mut t = DataSeries::time("t", vec![0.0], 0.0);
    t.save(&first, "default").unwrap();
    let loaded = second.load(&*DATA_SERIES, 1).unwrap();
    assert_eq!(loaded.identity(), t.identity());
}

#[test]
fn rejected_rows_leave_the_file_untouched() {
    let dir = TempDir::new().unwrap();
    let backend = open_backend(&libsql_config(dir.path())).unwrap();

    // A value series whose time series was never saved cannot be serialized.
    let t = DataSeries::time("t", vec![0.0], 0.0);
    let mut u = DataSeries::value("U", "V", vec![0.1], t);
    assert!(u.save(&backend, "default").is_err());
    assert!(u.identity().is_none());

    let err = backend.load(&*DATA_SERIES, 1).unwrap_err();
    assert!(matches!(err, mesa_core::CoreError::NotFound { .. }), "{err}");
}

#[test]
fn nan_gaps_are_kept_in_the_file() {
    let dir = TempDir::new().unwrap();
    let config = libsql_config(dir.path());
    let mut series = DataSeries::new("I", "A", vec![1.0, f64::NAN, 3.0]);
    series.save(&open_backend(&config).unwrap(), "default").unwrap();

    let loaded = open_backend(&config).unwrap().load(&*DATA_SERIES, 1).unwrap();
    assert_eq!(loaded.attributes().unwrap()["data"], json!([1.0, "NaN", 3.0]));
}
