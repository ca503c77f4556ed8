use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is {len} bytes, limit is {max}")]
    TooLarge { len: usize, max: usize },
    #[error("reading {0} cannot be represented in JSON")]
    NotFinite(f64),
    #[error("failed to serialise reading: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One telemetry sample, published as `{"temp":<float>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub temp: f64,
}

/// Produces the reading for each publish.
pub trait TelemetrySource: Send {
    fn sample(&mut self) -> Reading;
}

/// Reports the same temperature every time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTemperature(pub f64);

impl TelemetrySource for FixedTemperature {
    fn sample(&mut self) -> Reading {
        Reading { temp: self.0 }
    }
}

impl<F> TelemetrySource for F
where
    F: FnMut() -> Reading + Send,
{
    fn sample(&mut self) -> Reading {
        self()
    }
}

/// Serialises `reading`, rejecting payloads longer than `max_len` bytes.
pub fn encode(reading: &Reading, max_len: usize) -> Result<Vec<u8>, PayloadError> {
    if !reading.temp.is_finite() {
        return Err(PayloadError::NotFinite(reading.temp));
    }
    let bytes = serde_json::to_vec(reading)?;
    if bytes.len() > max_len {
        return Err(PayloadError::TooLarge {
            len: bytes.len(),
            max: max_len,
        });
    }
    Ok(bytes)
}
