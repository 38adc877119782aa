use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::backend::ActiveBackend;
use crate::counter::EphemeralCounter;
use crate::errors::Result;
use crate::identity::Identity;
use crate::saveable::{Dict, EntityClass, Saveable, from_attributes, to_attributes};
use crate::schema::EntitySchema;

pub const CALIBRATION_TABLE: &str = "calibration";

pub static CALIBRATION: LazyLock<EntityClass> = LazyLock::new(|| {
    EntityClass::new(
        "Calibration",
        EntitySchema::new(CALIBRATION_TABLE).with_columns(&["name", "technique", "tstamp", "setup"]),
        build,
    )
});

/// Calibration parameters applied to measurements of a given setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Calibration {
    pub name: String,
    pub technique: String,
    pub tstamp: Option<f64>,
    pub setup: Option<String>,

    #[serde(skip)]
    #[schemars(skip)]
    identity: Option<Identity>,
    #[serde(skip)]
    #[schemars(skip)]
    counter: EphemeralCounter,
}

impl Calibration {
    #[must_use]
    pub fn new(name: impl Into<String>, technique: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            technique: technique.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }
}

impl Saveable for Calibration {
    fn class(&self) -> &'static EntityClass {
        &*CALIBRATION
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
}

fn build(identity: Identity, dict: Dict, _active: &ActiveBackend) -> Result<Box<dyn Saveable>> {
    let mut calibration: Calibration = from_attributes(&CALIBRATION, dict)?;
    calibration.identity = Some(identity);
    Ok(Box::new(calibration))
}
