//! Saving through a backend whose mapping is a `StorageRegistry`.

use std::sync::Arc;

use mesa_core::entities::{
    CALIBRATION, Calibration, DATA_SERIES, DataSeries, MEASUREMENT, Measurement,
};
use mesa_core::{
    BackendRef, CoreError, Dict, EntityClass, EphemeralCounter, Identity, MemoryBackend, Saveable,
};
use mesa_schema::StorageRegistry;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn validated_memory() -> (Arc<MemoryBackend>, BackendRef) {
    let registry = StorageRegistry::standard().unwrap();
    let memory = Arc::new(MemoryBackend::new(Arc::new(registry)));
    let backend = BackendRef::Memory(Arc::clone(&memory));
    (memory, backend)
}

#[test]
fn valid_entities_are_saved_and_loaded() {
    let (memory, backend) = validated_memory();
    let t = {
        let mut t = DataSeries::time("t", vec![0.0, 0.5], 1_700_000_000.0);
        t.save(&backend, "default").unwrap();
        t
    };
    let mut measurement = Measurement::ms("ms-1", Some([0.0, 5.0])).with_sample("Cu");
    measurement.add_series(t);
    measurement.save(&backend, "default").unwrap();

    assert_eq!(memory.row_count("measurement"), 1);
    let loaded = backend.load(&*MEASUREMENT, 1).unwrap();
    assert_eq!(loaded.class().name(), "MSMeasurement");
    assert_eq!(loaded.attributes().unwrap()["sample_name"], "Cu");
}

#[test]
fn series_with_gaps_pass_validation() {
    let (_, backend) = validated_memory();
    let mut series = DataSeries::new("I", "A", vec![1.0, f64::NAN, 3.0, f64::INFINITY]);
    series.save(&backend, "default").unwrap();

    let loaded = backend.load(&*DATA_SERIES, 1).unwrap();
    assert_eq!(loaded.attributes().unwrap()["data"], json!([1.0, "NaN", 3.0, "inf"]));
}

/// Claims to be a calibration but produces rows of the wrong shape.
#[derive(Debug, Default)]
struct Garbled {
    identity: Option<Identity>,
    counter: EphemeralCounter,
}

impl Saveable for Garbled {
    fn class(&self) -> &'static EntityClass {
        &*CALIBRATION
    }

    fn attributes(&self) -> mesa_core::Result<Dict> {
        let mut dict = Dict::new();
        for (key, value) in [
            ("name", json!(17)),
            ("technique", json!("EC")),
            ("tstamp", json!("yesterday")),
            ("setup", Value::Null),
        ] {
            dict.insert(key.into(), value);
        }
        Ok(dict)
    }

    fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    fn counter(&self) -> &EphemeralCounter {
        &self.counter
    }
}

#[test]
fn invalid_rows_never_reach_the_backend() {
    let (memory, backend) = validated_memory();
    let mut garbled = Garbled::default();

    let err = garbled.save(&backend, "default").unwrap_err();

    assert!(matches!(err, CoreError::Schema(_)), "{err}");
    assert_eq!(memory.row_count("calibration"), 0);
    assert!(garbled.identity().is_none());

    let mut calibration = Calibration::new("cal", "EC");
    calibration.save(&backend, "default").unwrap();
    assert_eq!(memory.row_count("calibration"), 1);
}
