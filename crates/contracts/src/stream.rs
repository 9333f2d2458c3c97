//! StreamKind - the closed catalog of telemetry streams
//!
//! Every stream the publisher emits and the store retains is one variant of
//! [`StreamKind`]. The catalog is fixed at compile time; per-stream tables are
//! plain arrays indexed by [`StreamKind::index`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named payload field of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as it appears on the wire and in readings
    pub name: &'static str,
    /// Whether a payload without this field is rejected
    pub required: bool,
}

const fn required(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
    }
}

const fn optional(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
    }
}

const BASIC_FIELDS: &[FieldSpec] = &[
    required("humidity"),
    required("temperature_c"),
    optional("temperature_from_pressure"),
    required("pressure_millibars"),
    required("compass_north"),
];

const IMU_FIELDS: &[FieldSpec] = &[
    required("roll"),
    required("pitch"),
    required("yaw"),
    optional("x"),
    optional("y"),
    optional("z"),
];

const ORIENTATION_FIELDS: &[FieldSpec] = &[required("roll"), required("pitch"), required("yaw")];

/// Telemetry stream identifier.
///
/// # Examples
/// ```
/// use contracts::StreamKind;
///
/// let kind: StreamKind = "accel".parse().unwrap();
/// assert_eq!(kind, StreamKind::Accel);
/// assert_eq!(kind.topic_suffix(), "accel");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Humidity, temperature, pressure and compass heading
    Basic,
    /// Accelerometer attitude (plus optional raw axes)
    Accel,
    /// Gyroscope attitude (plus optional raw axes)
    Gyro,
    /// Fused orientation in degrees
    Orientation,
}

impl StreamKind {
    /// Number of streams in the catalog
    pub const COUNT: usize = 4;

    /// All streams, in table order
    pub const ALL: [StreamKind; Self::COUNT] = [
        StreamKind::Basic,
        StreamKind::Accel,
        StreamKind::Gyro,
        StreamKind::Orientation,
    ];

    /// Position of this stream in per-stream tables
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            StreamKind::Basic => 0,
            StreamKind::Accel => 1,
            StreamKind::Gyro => 2,
            StreamKind::Orientation => 3,
        }
    }

    /// Stream name used by the query API
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            StreamKind::Basic => "basic",
            StreamKind::Accel => "accel",
            StreamKind::Gyro => "gyro",
            StreamKind::Orientation => "orientation",
        }
    }

    /// Last topic level the publisher uses for this stream
    #[inline]
    pub const fn topic_suffix(self) -> &'static str {
        self.name()
    }

    /// Payload fields besides the timestamp
    pub const fn fields(self) -> &'static [FieldSpec] {
        match self {
            StreamKind::Basic => BASIC_FIELDS,
            StreamKind::Accel | StreamKind::Gyro => IMU_FIELDS,
            StreamKind::Orientation => ORIENTATION_FIELDS,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a stream name is not in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStream(pub String);

impl fmt::Display for UnknownStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stream '{}'", self.0)
    }
}

impl std::error::Error for UnknownStream {}

impl FromStr for StreamKind {
    type Err = UnknownStream;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownStream(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_table_order() {
        for (i, kind) in StreamKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("basic".parse::<StreamKind>(), Ok(StreamKind::Basic));
        assert_eq!("orientation".parse::<StreamKind>(), Ok(StreamKind::Orientation));
        assert!("accel_raw".parse::<StreamKind>().is_err());
        assert!("Accel".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_field_catalog() {
        let basic: Vec<_> = StreamKind::Basic.fields().iter().map(|f| f.name).collect();
        assert!(basic.contains(&"pressure_millibars"));
        assert!(!StreamKind::Basic
            .fields()
            .iter()
            .find(|f| f.name == "temperature_from_pressure")
            .unwrap()
            .required);

        let gyro_required = StreamKind::Gyro.fields().iter().filter(|f| f.required).count();
        assert_eq!(gyro_required, 3);
        assert_eq!(StreamKind::Orientation.fields().len(), 3);
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&StreamKind::Orientation).unwrap();
        assert_eq!(json, "\"orientation\"");

        let parsed: StreamKind = serde_json::from_str("\"gyro\"").unwrap();
        assert_eq!(parsed, StreamKind::Gyro);
    }
}
