//! Entity types persisted through the [`Saveable`](crate::Saveable) contract.
//!
//! Each type has one struct and one static [`EntityClass`](crate::EntityClass)
//! per class it can be saved as. Classes of a family share a table; derived
//! classes add aux tables or linkers.

mod calibration;
mod floats;
mod measurement;
mod series;

pub use calibration::{CALIBRATION, CALIBRATION_TABLE, Calibration};
pub use measurement::{
    EC_MEASUREMENT, ECMS_MEASUREMENT, MEASUREMENT, MEASUREMENT_TABLE, MS_MEASUREMENT,
    Measurement, MeasurementKind,
};
pub use series::{
    CONSTANT_SERIES, DATA_SERIES, DATA_SERIES_TABLE, DataSeries, SeriesKind, TIME_SERIES,
    VALUE_SERIES,
};

use crate::EntityClass;

/// Every concrete entity class with the table it is stored in.
#[must_use]
pub fn standard_classes() -> [(&'static EntityClass, &'static str); 9] {
    [
        (&*MEASUREMENT, MEASUREMENT_TABLE),
        (&*EC_MEASUREMENT, MEASUREMENT_TABLE),
        (&*MS_MEASUREMENT, MEASUREMENT_TABLE),
        (&*ECMS_MEASUREMENT, MEASUREMENT_TABLE),
        (&*DATA_SERIES, DATA_SERIES_TABLE),
        (&*TIME_SERIES, DATA_SERIES_TABLE),
        (&*VALUE_SERIES, DATA_SERIES_TABLE),
        (&*CONSTANT_SERIES, DATA_SERIES_TABLE),
        (&*CALIBRATION, CALIBRATION_TABLE),
    ]
}
