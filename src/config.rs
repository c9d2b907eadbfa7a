use std::env;

use chrono::Duration;

use crate::error::AppError;

/// Tuning knobs for activation, progress and heading smoothing.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub activation_radius_m: f64,
    pub activation_window: ActivationWindow,
    pub arrival_radius_m: f64,
    pub min_movement_m: f64,
    pub heading_smoothing: f64,
}

/// Tolerance around the scheduled start inside which auto-activation may happen.
#[derive(Debug, Clone, Copy)]
pub struct ActivationWindow {
    pub before: Duration,
    pub after: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            activation_radius_m: 200.0,
            activation_window: ActivationWindow {
                before: Duration::minutes(5),
                after: Duration::minutes(10),
            },
            arrival_radius_m: 50.0,
            min_movement_m: crate::geo::MIN_MOVEMENT_M,
            heading_smoothing: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub sample_queue_size: usize,
    pub ingest_workers: usize,
    pub emergency_forfeit_ratio: f64,
    pub engine: EngineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = EngineSettings::default();
        let engine = EngineSettings {
            activation_radius_m: positive("ACTIVATION_RADIUS_M", defaults.activation_radius_m)?,
            activation_window: ActivationWindow {
                before: Duration::seconds(parse_or_default("ACTIVATION_WINDOW_BEFORE_SECS", 300)?),
                after: Duration::seconds(parse_or_default("ACTIVATION_WINDOW_AFTER_SECS", 600)?),
            },
            arrival_radius_m: positive("ARRIVAL_RADIUS_M", defaults.arrival_radius_m)?,
            min_movement_m: positive("MIN_MOVEMENT_M", defaults.min_movement_m)?,
            heading_smoothing: parse_or_default("HEADING_SMOOTHING", defaults.heading_smoothing)?,
        };

        if !(engine.heading_smoothing > 0.0 && engine.heading_smoothing <= 1.0) {
            return Err(AppError::Internal(
                "invalid HEADING_SMOOTHING: must be in (0, 1]".to_string(),
            ));
        }
        if engine.activation_window.before < Duration::zero()
            || engine.activation_window.after < Duration::zero()
        {
            return Err(AppError::Internal(
                "activation window bounds must not be negative".to_string(),
            ));
        }

        let emergency_forfeit_ratio = parse_or_default::<f64>("EMERGENCY_FORFEIT_RATIO", 1.0)?;
        if !(0.0..=1.0).contains(&emergency_forfeit_ratio) {
            return Err(AppError::Internal(
                "invalid EMERGENCY_FORFEIT_RATIO: must be in [0, 1]".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: nonzero("EVENT_BUFFER_SIZE", parse_or_default("EVENT_BUFFER_SIZE", 1024)?)?,
            sample_queue_size: nonzero("SAMPLE_QUEUE_SIZE", parse_or_default("SAMPLE_QUEUE_SIZE", 4096)?)?,
            ingest_workers: parse_or_default::<usize>("INGEST_WORKERS", 8)?.max(1),
            emergency_forfeit_ratio,
            engine,
        })
    }
}

fn positive(key: &str, default: f64) -> Result<f64, AppError> {
    let value = parse_or_default(key, default)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(AppError::Internal(format!("invalid {key}: must be > 0")))
    }
}

/// Channel capacities must be at least 1.
fn nonzero(key: &str, value: usize) -> Result<usize, AppError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(AppError::Internal(format!("invalid {key}: must be > 0")))
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::nonzero;

    #[test]
    fn zero_channel_capacity_is_rejected() {
        assert!(nonzero("SAMPLE_QUEUE_SIZE", 0).is_err());
        assert!(nonzero("EVENT_BUFFER_SIZE", 0).is_err());
        assert_eq!(nonzero("EVENT_BUFFER_SIZE", 1).unwrap(), 1);
    }
}
