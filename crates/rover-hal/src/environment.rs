//! Environmental sensors sampled while studying a location (DHT11-class
//! temperature/humidity probe plus an analogue soil pH probe).

use rover_types::{EnvironmentReading, RoverError};

/// A combined environmental sensor package.
pub trait EnvironmentSensor: Send {
    /// Stable identifier, e.g. `"env/dht11+ph"`.
    fn id(&self) -> &str;

    /// Take one sample. Individual fields may be `None` when only part of the
    /// package responded.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::SensorUnavailable`] when nothing could be read.
    fn read(&mut self) -> Result<EnvironmentReading, RoverError>;
}
