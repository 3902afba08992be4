use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::Error;

/// Orientation of the statistics computed by a clipper.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// One population per coarse frequency row, spanning all time samples.
    #[default]
    #[strum(to_string = "AXIS_TIME", serialize = "time")]
    Time,
    /// One population per coarse time column, spanning all frequency rows.
    #[strum(to_string = "AXIS_FREQ", serialize = "freq")]
    Freq,
    /// A single population spanning the whole coarse grid.
    #[strum(to_string = "AXIS_NONE", serialize = "joint", serialize = "none")]
    Joint,
}

impl TryFrom<i32> for Axis {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Axis::Freq),
            1 => Ok(Axis::Time),
            2 => Ok(Axis::Joint),
            other => Err(Error::InvalidAxis(other)),
        }
    }
}
