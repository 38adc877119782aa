use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ActiveBackend;
use crate::counter::EphemeralCounter;
use crate::entities::floats::{self, JsonFloat};
use crate::errors::{CoreError, Result};
use crate::identity::Identity;
use crate::object_list::Reference;
use crate::placeholder::Placeholder;
use crate::saveable::{Dict, EntityClass, Saveable, from_attributes, take_id, to_attributes};
use crate::schema::{EntitySchema, Relation};

pub const DATA_SERIES_TABLE: &str = "data_series";

const TSERIES: Relation = Relation::new("tseries", "t_id");

pub static DATA_SERIES: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "DataSeries",
        EntitySchema::new(DATA_SERIES_TABLE).with_columns(&["name", "unit_name", "data"]),
        |identity, dict, active| build(SeriesKind::Data, identity, dict, active),
    )
});

pub static TIME_SERIES: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "TimeSeries",
        DATA_SERIES
            .schema()
            .clone()
            .with_extra_columns("time_series", &["tstamp"]),
        |identity, dict, active| build(SeriesKind::Time, identity, dict, active),
    )
    .with_parent(&*DATA_SERIES)
});

pub static VALUE_SERIES: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "ValueSeries",
        DATA_SERIES.schema().clone().with_linker(TSERIES),
        |identity, dict, active| build(SeriesKind::Value, identity, dict, active),
    )
    .with_parent(&*DATA_SERIES)
});

pub static CONSTANT_SERIES: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "ConstantSeries",
        VALUE_SERIES
            .schema()
            .clone()
            .with_extra_columns("constant_series", &["value"]),
        |identity, dict, active| build(SeriesKind::Constant, identity, dict, active),
    )
    .with_parent(&*VALUE_SERIES)
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesKind {
    #[default]
    Data,
    Time,
    Value,
    Constant,
}

impl SeriesKind {
    #[must_use]
    pub fn class(self) -> &'static EntityClass {
        match self {
            Self::Data => &*DATA_SERIES,
            Self::Time => &*TIME_SERIES,
            Self::Value => &*VALUE_SERIES,
            Self::Constant => &*CONSTANT_SERIES,
        }
    }

    const fn has_tseries(self) -> bool {
        matches!(self, Self::Value | Self::Constant)
    }
}

/// A named vector of numbers with a unit.
///
/// Value and constant series are measured against a time series, held in
/// `tseries` and stored by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataSeries {
    pub name: String,
    pub unit_name: Option<String>,
    /// May hold NaN gaps and infinities; they are stored as strings.
    #[serde(default, with = "floats::vec")]
    #[schemars(with = "Vec<Option<JsonFloat>>")]
    pub data: Vec<f64>,
    /// Unix time that `data` of a time series is relative to.
    pub tstamp: Option<f64>,
    /// The single value of a constant series.
    #[serde(default, with = "floats::option")]
    #[schemars(with = "Option<JsonFloat>")]
    pub value: Option<f64>,

    #[serde(skip)]
    #[schemars(skip)]
    kind: SeriesKind,
    #[serde(skip)]
    #[schemars(skip)]
    tseries: Option<Reference>,
    #[serde(skip)]
    #[schemars(skip)]
    identity: Option<Identity>,
    #[serde(skip)]
    #[schemars(skip)]
    counter: EphemeralCounter,
}

impl DataSeries {
    #[must_use]
    pub fn new(name: impl Into<String>, unit_name: impl Into<String>, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            unit_name: Some(unit_name.into()),
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn time(name: impl Into<String>, data: Vec<f64>, tstamp: f64) -> Self {
        Self {
            kind: SeriesKind::Time,
            tstamp: Some(tstamp),
            ..Self::new(name, "s", data)
        }
    }

    #[must_use]
    pub fn value(
        name: impl Into<String>,
        unit_name: impl Into<String>,
        data: Vec<f64>,
        tseries: impl Into<Reference>,
    ) -> Self {
        Self {
            kind: SeriesKind::Value,
            tseries: Some(tseries.into()),
            ..Self::new(name, unit_name, data)
        }
    }

    #[must_use]
    pub fn constant(
        name: impl Into<String>,
        unit_name: impl Into<String>,
        value: f64,
        tseries: impl Into<Reference>,
    ) -> Self {
        Self {
            kind: SeriesKind::Constant,
            value: Some(value),
            tseries: Some(tseries.into()),
            ..Self::new(name, unit_name, Vec::new())
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SeriesKind {
        self.kind
    }

    #[must_use]
    pub const fn tseries(&self) -> Option<&Reference> {
        self.tseries.as_ref()
    }

    /// Number of points; a constant series has as many as its time series.
    ///
    /// # Errors
    ///
    /// Propagates the load of an unresolved time series.
    pub fn point_count(&self) -> Result<usize> {
        match (self.kind, &self.tseries) {
            (SeriesKind::Constant, Some(tseries)) => {
                let tseries = tseries.materialize()?;
                let data = tseries.attributes()?.remove("data");
                Ok(data.as_ref().and_then(Value::as_array).map_or(0, Vec::len))
            }
            _ => Ok(self.data.len()),
        }
    }
}

impl Saveable for DataSeries {
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
        self.tseries.iter().map(|tseries| (TSERIES.attr, tseries)).collect()
    }

    fn as_dict(&self) -> Result<Dict> {
        let mut dict = self.get_main_dict(&[])?;
        if self.kind.has_tseries() {
            let t_id = match &self.tseries {
                None => Value::Null,
                Some(tseries) => tseries
                    .identity()
                    .map(|identity| identity.id().into())
                    .ok_or_else(|| {
                        CoreError::Schema(format!(
                            "`{}` of {} is unsaved; save it first",
                            TSERIES.attr, self.name
                        ))
                    })?,
            };
            dict.insert(TSERIES.ids_key.into(), t_id);
        }
        Ok(dict)
    }
}

fn build(
    kind: SeriesKind,
    identity: Identity,
    mut dict: Dict,
    active: &ActiveBackend,
) -> Result<Box<dyn Saveable>> {
    let t_id = take_id(&mut dict, TSERIES.ids_key)?;
    let mut series: DataSeries = from_attributes(kind.class(), dict)?;
    series.kind = kind;
    series.identity = Some(identity);
    series.tseries = t_id
        .map(|id| Placeholder::new(id, &*TIME_SERIES, None, active))
        .transpose()?
        .map(Reference::Unresolved);
    Ok(Box::new(series))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(SeriesKind::Data, "DataSeries")]
    #[case(SeriesKind::Time, "TimeSeries")]
    #[case(SeriesKind::Value, "ValueSeries")]
    #[case(SeriesKind::Constant, "ConstantSeries")]
    fn every_series_class_shares_one_table(#[case] kind: SeriesKind, #[case] name: &str) {
        let class = kind.class();
        assert_eq!(class.name(), name);
        assert_eq!(class.schema().table_name(), DATA_SERIES_TABLE);
    }

    #[test]
    fn constant_series_schema_inherits_the_time_linker() {
        let schema = CONSTANT_SERIES.schema();
        assert_eq!(schema.extra_linkers(), &[TSERIES]);
        assert_eq!(schema.aux_table_of("value"), Some("constant_series"));
        assert_eq!(schema.aux_table_of("tstamp"), None);
    }

    #[test]
    fn time_series_dict_carries_its_aux_column() {
        let series = DataSeries::time("t", vec![0.0, 1.0], 1_600_000_000.0);
        let dict = series.as_dict().unwrap();
        assert_eq!(dict["tstamp"], json!(1_600_000_000.0));
        assert_eq!(dict["data"], json!([0.0, 1.0]));
        assert!(!dict.contains_key("t_id"));
    }

    #[test]
    fn value_series_with_unsaved_time_series_is_a_schema_error() {
        let t = DataSeries::time("t", vec![0.0], 0.0);
        let v = DataSeries::value("I", "A", vec![1.0], t);
        assert!(matches!(v.as_dict().unwrap_err(), CoreError::Schema(_)));
    }
}
