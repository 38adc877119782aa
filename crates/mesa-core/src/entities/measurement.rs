use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ActiveBackend;
use crate::counter::EphemeralCounter;
use crate::entities::calibration::CALIBRATION;
use crate::entities::series::DATA_SERIES;
use crate::errors::Result;
use crate::identity::Identity;
use crate::object_list::{ObjectList, Reference, reconcile};
use crate::saveable::{Dict, EntityClass, Saveable, from_attributes, take_ids, to_attributes};
use crate::schema::{EntitySchema, Relation};

pub const MEASUREMENT_TABLE: &str = "measurement";

const SERIES: Relation = Relation::new("series_list", "s_ids");
const CALIBRATIONS: Relation = Relation::new("calibration_list", "c_ids");
const COMPONENTS: Relation = Relation::new("component_measurements", "m_ids");

pub static MEASUREMENT: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "Measurement",
        EntitySchema::new(MEASUREMENT_TABLE)
            .with_columns(&[
                "name",
                "technique",
                "metadata",
                "aliases",
                "sample_name",
                "tstamp",
            ])
            .with_child(SERIES)
            .with_child(CALIBRATIONS)
            .with_child(COMPONENTS),
        |identity, dict, active| build(MeasurementKind::Plain, identity, dict, active),
    )
});

pub static EC_MEASUREMENT: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "ECMeasurement",
        MEASUREMENT
            .schema()
            .clone()
            .with_extra_columns("ec_measurements", &["ec_technique"]),
        |identity, dict, active| build(MeasurementKind::Ec, identity, dict, active),
    )
    .with_parent(&*MEASUREMENT)
});

pub static MS_MEASUREMENT: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "MSMeasurement",
        MEASUREMENT
            .schema()
            .clone()
            .with_extra_columns("ms_measurements", &["tspan_bg"]),
        |identity, dict, active| build(MeasurementKind::Ms, identity, dict, active),
    )
    .with_parent(&*MEASUREMENT)
});

pub static ECMS_MEASUREMENT: LazyLock<EntityClass> = LazyLock::new(|| {
    let schema = EntitySchema::compose(
        MEASUREMENT_TABLE,
        &[EC_MEASUREMENT.schema(), MS_MEASUREMENT.schema()],
    )
    .expect("EC and MS measurement schemas store every attribute in one table");
    EntityClass::new("ECMSMeasurement", schema, |identity, dict, active| {
        build(MeasurementKind::Ecms, identity, dict, active)
    })
    .with_parent(&*EC_MEASUREMENT)
    .with_parent(&*MS_MEASUREMENT)
});

/// Which measurement class an instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementKind {
    #[default]
    Plain,
    Ec,
    Ms,
    Ecms,
}

impl MeasurementKind {
    #[must_use]
    pub fn class(self) -> &'static EntityClass {
        match self {
            Self::Plain => &*MEASUREMENT,
            Self::Ec => &*EC_MEASUREMENT,
            Self::Ms => &*MS_MEASUREMENT,
            Self::Ecms => &*ECMS_MEASUREMENT,
        }
    }
}

/// A measurement and the series, calibrations, and component measurements
/// it is made of.
///
/// Relations loaded from storage start out as placeholders and are loaded
/// on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Measurement {
    pub name: String,
    pub technique: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    pub sample_name: Option<String>,
    /// Unix time of the start of the measurement, in seconds.
    pub tstamp: Option<f64>,
    pub ec_technique: Option<String>,
    pub tspan_bg: Option<[f64; 2]>,

    #[serde(skip)]
    #[schemars(skip)]
    kind: MeasurementKind,
    #[serde(skip)]
    #[schemars(skip)]
    identity: Option<Identity>,
    #[serde(skip)]
    #[schemars(skip)]
    counter: EphemeralCounter,
    #[serde(skip)]
    #[schemars(skip)]
    series_list: ObjectList,
    #[serde(skip)]
    #[schemars(skip)]
    calibration_list: ObjectList,
    #[serde(skip)]
    #[schemars(skip)]
    component_measurements: ObjectList,
}

impl Measurement {
    #[must_use]
    pub fn new(name: impl Into<String>, technique: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            technique: technique.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn ec(name: impl Into<String>, ec_technique: impl Into<String>) -> Self {
        let ec_technique = ec_technique.into();
        Self {
            kind: MeasurementKind::Ec,
            ec_technique: Some(ec_technique.clone()),
            ..Self::new(name, ec_technique)
        }
    }

    #[must_use]
    pub fn ms(name: impl Into<String>, tspan_bg: Option<[f64; 2]>) -> Self {
        Self {
            kind: MeasurementKind::Ms,
            tspan_bg,
            ..Self::new(name, "MS")
        }
    }

    #[must_use]
    pub fn ecms(
        name: impl Into<String>,
        ec_technique: impl Into<String>,
        tspan_bg: Option<[f64; 2]>,
    ) -> Self {
        Self {
            kind: MeasurementKind::Ecms,
            ec_technique: Some(ec_technique.into()),
            tspan_bg,
            ..Self::new(name, "EC-MS")
        }
    }

    #[must_use]
    pub fn with_tstamp(mut self, tstamp: f64) -> Self {
        self.tstamp = Some(tstamp);
        self
    }

    #[must_use]
    pub fn with_sample(mut self, sample_name: impl Into<String>) -> Self {
        self.sample_name = Some(sample_name.into());
        self
    }

    #[must_use]
    pub const fn kind(&self) -> MeasurementKind {
        self.kind
    }

    /// Start of the measurement as a UTC datetime.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let tstamp = self.tstamp?;
        #[allow(clippy::cast_possible_truncation)]
        let secs = tstamp.floor() as i64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = ((tstamp - tstamp.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    #[must_use]
    pub const fn series_list(&self) -> &ObjectList {
        &self.series_list
    }

    pub const fn series_list_mut(&mut self) -> &mut ObjectList {
        &mut self.series_list
    }

    #[must_use]
    pub const fn calibration_list(&self) -> &ObjectList {
        &self.calibration_list
    }

    pub const fn calibration_list_mut(&mut self) -> &mut ObjectList {
        &mut self.calibration_list
    }

    #[must_use]
    pub const fn component_measurements(&self) -> &ObjectList {
        &self.component_measurements
    }

    pub const fn component_measurements_mut(&mut self) -> &mut ObjectList {
        &mut self.component_measurements
    }

    pub fn add_series(&mut self, series: impl Into<Reference>) {
        self.series_list.push(series);
    }

    pub fn add_calibration(&mut self, calibration: impl Into<Reference>) {
        self.calibration_list.push(calibration);
    }

    pub fn add_component(&mut self, measurement: impl Into<Reference>) {
        self.component_measurements.push(measurement);
    }

    /// Bring relations in line with ids known to be referenced, e.g. after
    /// another process appended series to this measurement's row.
    ///
    /// # Errors
    ///
    /// See [`reconcile`].
    pub fn reconcile_series(&mut self, s_ids: &[i64], active: &ActiveBackend) -> Result<()> {
        let existing = std::mem::take(&mut self.series_list);
        self.series_list = reconcile(Some(existing), Some(s_ids), Some(&*DATA_SERIES), active)?;
        Ok(())
    }
}

impl Saveable for Measurement {
    fn class(&self) -> &'static EntityClass {
        self.kind.class()
    }

    fn attributes(&self) -> Result<Dict> {
        to_attributes(self)
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

    fn references(&self) -> Vec<(&'static str, &Reference)> {
        [
            (SERIES, &self.series_list),
            (CALIBRATIONS, &self.calibration_list),
            (COMPONENTS, &self.component_measurements),
        ]
        .into_iter()
        .flat_map(|(relation, list)| list.iter().map(move |item| (relation.attr, item)))
        .collect()
    }

    fn as_dict(&self) -> Result<Dict> {
        let mut dict = self.get_main_dict(&[])?;
        for (relation, list) in [
            (SERIES, &self.series_list),
            (CALIBRATIONS, &self.calibration_list),
            (COMPONENTS, &self.component_measurements),
        ] {
            dict.insert(relation.ids_key.into(), list.ids(relation.attr)?.into());
        }
        Ok(dict)
    }
}

fn build(
    kind: MeasurementKind,
    identity: Identity,
    mut dict: Dict,
    active: &ActiveBackend,
) -> Result<Box<dyn Saveable>> {
    let class = kind.class();
    let s_ids = take_ids(&mut dict, SERIES.ids_key)?;
    let c_ids = take_ids(&mut dict, CALIBRATIONS.ids_key)?;
    let m_ids = take_ids(&mut dict, COMPONENTS.ids_key)?;

    let mut measurement: Measurement = from_attributes(class, dict)?;
    measurement.kind = kind;
    measurement.identity = Some(identity);
    measurement.series_list = reconcile(None, Some(&s_ids), Some(&*DATA_SERIES), active)?;
    measurement.calibration_list = reconcile(None, Some(&c_ids), Some(&*CALIBRATION), active)?;
    measurement.component_measurements =
        reconcile(None, Some(&m_ids), Some(&*MEASUREMENT), active)?;
    Ok(Box::new(measurement))
}
