use std::{collections::BTreeMap, ops::RangeInclusive};

use serde::{Deserialize, Serialize};

use crate::{
    astro::{AstronomicalTimes, MoonConfig},
    error::{ControlError, ControlResult},
    schedule::SchedulePoint,
    types::RecoveryPolicy,
};

pub const MAX_CHANNELS: u8 = 16;
/// Per-channel driver current limits are clamped into this range.
pub const CHANNEL_CURRENT_LIMIT_A: RangeInclusive<f32> = 0.1..=2.0;
pub const DEFAULT_CHANNEL_MAX_CURRENT_A: f32 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub channels: u8,
    pub update_interval_ms: u64,
    pub timezone: String,
    pub pwm_scale: f32,
    /// Driver current ceiling per channel in amps. Channels without an entry
    /// use [`DEFAULT_CHANNEL_MAX_CURRENT_A`].
    pub max_current: Vec<f32>,
    /// Event times dynamic points resolve against until replaced at runtime.
    pub astronomical: AstronomicalTimes,
    pub moon: MoonConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            channels: 8,
            update_interval_ms: 30_000,
            timezone: "UTC".to_string(),
            pwm_scale: 1.0,
            max_current: Vec::new(),
            astronomical: AstronomicalTimes::default(),
            moon: MoonConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> ControlResult<()> {
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            return Err(ControlError::validation(
                "channels",
                format!("{} is outside 1-{MAX_CHANNELS}", self.channels),
            ));
        }
        if self.update_interval_ms == 0 {
            return Err(ControlError::validation(
                "update_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.timezone.trim().is_empty() {
            return Err(ControlError::validation("timezone", "cannot be empty"));
        }
        check_range("pwm_scale", self.pwm_scale, 0.0..=1.0)?;
        let channels = usize::from(self.channels);
        if self.max_current.len() > channels {
            return Err(ControlError::validation(
                "max_current",
                format!("{} values for {channels} channels", self.max_current.len()),
            ));
        }
        if let Some(value) = self.max_current.iter().find(|value| !value.is_finite()) {
            return Err(ControlError::validation(
                "max_current",
                format!("{value} is not a current"),
            ));
        }
        self.astronomical.validate()?;
        self.moon.validate(channels)
    }

    /// One clamped current ceiling per channel.
    pub fn channel_max_currents(&self) -> Vec<f32> {
        (0..usize::from(self.channels))
            .map(|channel| {
                let limit = self
                    .max_current
                    .get(channel)
                    .copied()
                    .unwrap_or(DEFAULT_CHANNEL_MAX_CURRENT_A);
                clamp_channel_current(limit)
            })
            .collect()
    }
}

pub(crate) fn clamp_channel_current(amps: f32) -> f32 {
    amps.clamp(*CHANNEL_CURRENT_LIMIT_A.start(), *CHANNEL_CURRENT_LIMIT_A.end())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub target_temp_c: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub min_fan_pwm: f32,
    pub max_fan_pwm: f32,
    pub emergency_temp_c: f32,
    pub recovery_temp_c: f32,
    pub emergency_delay_ms: u64,
    pub update_interval_ms: u64,
    pub sensor_timeout_ms: u64,
    pub temp_filter_alpha: f32,
    pub recovery_policy: RecoveryPolicy,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            target_temp_c: 45.0,
            kp: 2.0,
            ki: 0.1,
            kd: 0.5,
            min_fan_pwm: 0.0,
            max_fan_pwm: 100.0,
            emergency_temp_c: 60.0,
            recovery_temp_c: 55.0,
            emergency_delay_ms: 5_000,
            update_interval_ms: 1_000,
            sensor_timeout_ms: 10_000,
            temp_filter_alpha: 1.0,
            recovery_policy: RecoveryPolicy::Immediate,
        }
    }
}

impl ThermalConfig {
    pub fn validate(&self) -> ControlResult<()> {
        check_range("target_temp_c", self.target_temp_c, 10.0..=80.0)?;
        check_gains(self.kp, self.ki, self.kd)?;
        check_range("min_fan_pwm", self.min_fan_pwm, 0.0..=100.0)?;
        check_range("max_fan_pwm", self.max_fan_pwm, 0.0..=100.0)?;
        if self.min_fan_pwm > self.max_fan_pwm {
            return Err(ControlError::validation(
                "min_fan_pwm",
                format!(
                    "{} exceeds max_fan_pwm {}",
                    self.min_fan_pwm, self.max_fan_pwm
                ),
            ));
        }
        check_range("emergency_temp_c", self.emergency_temp_c, 30.0..=100.0)?;
        check_range("recovery_temp_c", self.recovery_temp_c, 30.0..=100.0)?;
        if self.recovery_temp_c >= self.emergency_temp_c {
            return Err(ControlError::validation(
                "recovery_temp_c",
                format!(
                    "{} must be below emergency_temp_c {}",
                    self.recovery_temp_c, self.emergency_temp_c
                ),
            ));
        }
        if self.update_interval_ms == 0 {
            return Err(ControlError::validation(
                "update_interval_ms",
                "must be greater than zero",
            ));
        }
        if !(self.temp_filter_alpha > 0.0 && self.temp_filter_alpha <= 1.0) {
            return Err(ControlError::validation(
                "temp_filter_alpha",
                format!("{} is outside (0, 1]", self.temp_filter_alpha),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorSource {
    /// Fed by the host's thermal simulation.
    Simulated,
    Constant { value: f32 },
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub source: SensorSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub fan_pwm_output: Option<String>,
    pub fan_enable_switch: Option<String>,
    pub fan_speed_sensor: Option<SensorConfig>,
    pub temperature_sensors: Vec<SensorConfig>,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            fan_pwm_output: Some("fan_pwm".to_string()),
            fan_enable_switch: Some("fan_power".to_string()),
            fan_speed_sensor: Some(SensorConfig {
                name: "fan_rpm".to_string(),
                source: SensorSource::Simulated,
            }),
            temperature_sensors: vec![SensorConfig {
                name: "heatsink".to_string(),
                source: SensorSource::Simulated,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub thermal: ThermalConfig,
    pub hardware: HardwareConfig,
    pub schedule: Vec<SchedulePoint>,
    pub presets: BTreeMap<String, Vec<SchedulePoint>>,
    pub initial_preset: Option<String>,
}

impl RuntimeConfig {
    /// Range checks only; schedule points and presets are validated when the
    /// store is populated.
    pub fn validate(&self) -> ControlResult<()> {
        self.scheduler.validate()?;
        self.thermal.validate()
    }
}

pub(crate) fn check_gains(kp: f32, ki: f32, kd: f32) -> ControlResult<()> {
    for (field, gain) in [("kp", kp), ("ki", ki), ("kd", kd)] {
        if !gain.is_finite() || gain < 0.0 {
            return Err(ControlError::validation(
                field,
                format!("{gain} is not a non-negative gain"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_range(
    field: &'static str,
    value: f32,
    range: RangeInclusive<f32>,
) -> ControlResult<()> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(ControlError::validation(
            field,
            format!("{value} is outside {}-{}", range.start(), range.end()),
        ))
    }
}
