use tracing::{debug, error, info, warn};

use crate::{
    config::{check_gains, check_range, ThermalConfig},
    error::{ControlError, ControlResult},
    io::{PwmWriter, RpmReader, Sample, SwitchWriter, TemperatureReader},
    pid::PidController,
    scheduler::LightingScheduler,
    types::{FanCurvePoint, RecoveryPolicy, ThermalState, ThermalStatus},
};

/// PID output below this leaves the fan switched off.
pub const FAN_ENABLE_THRESHOLD: f32 = 0.1;

struct NamedSensor {
    name: String,
    reader: Box<dyn TemperatureReader>,
}

/// Fan regulation plus the Normal/Emergency/Recovering protection machine.
///
/// Protection decisions use the raw maximum across valid sensors; the
/// low-pass filtered value only feeds the PID and status.
pub struct ThermalController {
    config: ThermalConfig,
    pid: PidController,

    sensors: Vec<NamedSensor>,
    fan_pwm: Option<Box<dyn PwmWriter>>,
    fan_switch: Option<Box<dyn SwitchWriter>>,
    fan_speed: Option<Box<dyn RpmReader>>,

    state: ThermalState,
    control_enabled: bool,
    target_temp_c: f32,

    raw_temp_c: Option<f32>,
    filtered_temp_c: Option<f32>,
    sensors_valid: usize,
    faults: Vec<ControlError>,

    fan_pwm_percent: f32,
    fan_enabled: bool,
    fan_rpm: Option<f32>,
}

impl ThermalController {
    pub fn new(config: ThermalConfig) -> ControlResult<Self> {
        config.validate()?;
        Ok(Self {
            pid: PidController::new(
                config.kp,
                config.ki,
                config.kd,
                config.min_fan_pwm,
                config.max_fan_pwm,
            ),
            sensors: Vec::new(),
            fan_pwm: None,
            fan_switch: None,
            fan_speed: None,
            state: ThermalState::Normal,
            control_enabled: true,
            target_temp_c: config.target_temp_c,
            raw_temp_c: None,
            filtered_temp_c: None,
            sensors_valid: 0,
            faults: Vec::new(),
            fan_pwm_percent: 0.0,
            fan_enabled: false,
            fan_rpm: None,
            config,
        })
    }

    pub fn with_fan_pwm(mut self, writer: Box<dyn PwmWriter>) -> Self {
        self.fan_pwm = Some(writer);
        self
    }

    pub fn with_fan_switch(mut self, writer: Box<dyn SwitchWriter>) -> Self {
        self.fan_switch = Some(writer);
        self
    }

    pub fn with_fan_speed_sensor(mut self, reader: Box<dyn RpmReader>) -> Self {
        self.fan_speed = Some(reader);
        self
    }

    pub fn add_temperature_sensor(
        &mut self,
        name: impl Into<String>,
        reader: Box<dyn TemperatureReader>,
    ) {
        self.sensors.push(NamedSensor {
            name: name.into(),
            reader,
        });
    }

    pub fn config(&self) -> &ThermalConfig {
        &self.config
    }

    pub fn state(&self) -> ThermalState {
        self.state
    }

    pub fn is_emergency(&self) -> bool {
        self.state.is_protective()
    }

    /// Filtered temperature, `None` when no sensor produced a valid reading.
    pub fn current_temperature(&self) -> Option<f32> {
        self.filtered_temp_c
    }

    pub fn target_temperature(&self) -> f32 {
        self.target_temp_c
    }

    pub fn fan_pwm_percent(&self) -> f32 {
        self.fan_pwm_percent
    }

    pub fn fan_enabled(&self) -> bool {
        self.fan_enabled
    }

    pub fn faults(&self) -> &[ControlError] {
        &self.faults
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn tick(&mut self, now_ms: u64, scheduler: &mut LightingScheduler) -> ThermalState {
        self.sample_sensors(now_ms);
        self.advance_state(now_ms);
        scheduler.set_thermal_override(self.state.is_protective());
        self.drive_fan(now_ms);
        self.fan_rpm = self
            .fan_speed
            .as_ref()
            .and_then(|reader| reader.read_rpm(now_ms))
            .filter(|sample| self.is_fresh(sample, now_ms))
            .map(|sample| sample.value);
        self.state
    }

    /// Turns PID regulation on or off. Emergency protection keeps running
    /// either way.
    pub fn set_control_enabled(&mut self, enabled: bool) {
        if self.control_enabled == enabled {
            return;
        }
        self.control_enabled = enabled;
        info!(enabled, "temperature control changed");
        if enabled {
            self.pid.reset();
        } else if !self.state.is_protective() {
            self.write_fan(0.0, false);
        }
    }

    pub fn control_enabled(&self) -> bool {
        self.control_enabled
    }

    pub fn set_target_temperature(&mut self, target_c: f32) -> ControlResult<()> {
        check_range("target_temp_c", target_c, 10.0..=80.0)?;
        self.target_temp_c = target_c;
        info!(target_c, "target temperature updated");
        Ok(())
    }

    pub fn reset_pid(&mut self) {
        self.pid.reset();
    }

    /// Retunes the fan PID in place. The integral is re-clamped to the new
    /// bound rather than reset.
    pub fn set_pid_tunings(&mut self, kp: f32, ki: f32, kd: f32) -> ControlResult<()> {
        check_gains(kp, ki, kd)?;
        self.pid.set_tunings(kp, ki, kd);
        self.config.kp = kp;
        self.config.ki = ki;
        self.config.kd = kd;
        info!(kp, ki, kd, "pid tunings updated");
        Ok(())
    }

    pub fn fan_curve(&self) -> [FanCurvePoint; 7] {
        let target = self.target_temp_c;
        let min = self.config.min_fan_pwm;
        let point = |temperature: f32, fan_pwm: f32| FanCurvePoint {
            temperature,
            fan_pwm,
        };
        [
            point(target - 10.0, min),
            point(target - 5.0, min),
            point(target, 30.0),
            point(target + 5.0, 60.0),
            point(self.config.recovery_temp_c, 80.0),
            point(self.config.emergency_temp_c, 100.0),
            point(self.config.emergency_temp_c + 5.0, 100.0),
        ]
    }

    pub fn status(&self) -> ThermalStatus {
        ThermalStatus {
            enabled: self.control_enabled,
            thermal_emergency: self.state.is_protective(),
            state: self.state.as_str(),
            fan_enabled: self.fan_enabled,
            current_temp_c: self.filtered_temp_c,
            target_temp_c: self.target_temp_c,
            fan_pwm_percent: self.fan_pwm_percent,
            fan_rpm: self.fan_rpm,
            pid_error: self.pid.last_error(),
            pid_output: self.pid.output(),
            emergency_since_ms: match self.state {
                ThermalState::Emergency { since_ms } => Some(since_ms),
                _ => None,
            },
            sensors_valid: self.sensors_valid,
            sensors_total: self.sensors.len(),
            faulted_sensors: self
                .faults
                .iter()
                .filter_map(|fault| match fault {
                    ControlError::SensorFault(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
        }
    }

    fn is_fresh(&self, sample: &Sample, now_ms: u64) -> bool {
        sample.value.is_finite()
            && now_ms.saturating_sub(sample.taken_at_ms) <= self.config.sensor_timeout_ms
    }

    fn sample_sensors(&mut self, now_ms: u64) {
        let previous_valid = self.sensors_valid;
        let previous_faults = self.faults.len();
        self.faults.clear();

        let mut hottest: Option<f32> = None;
        for sensor in &self.sensors {
            match sensor.reader.read(now_ms) {
                Some(sample) if self.is_fresh(&sample, now_ms) => {
                    hottest = Some(hottest.map_or(sample.value, |max| max.max(sample.value)));
                }
                _ => self
                    .faults
                    .push(ControlError::SensorFault(sensor.name.clone())),
            }
        }
        self.sensors_valid = self.sensors.len() - self.faults.len();

        if self.faults.len() != previous_faults || self.sensors_valid != previous_valid {
            for fault in &self.faults {
                warn!("{fault}");
            }
            debug!(
                valid = self.sensors_valid,
                total = self.sensors.len(),
                "temperature sensor set changed"
            );
        }

        self.raw_temp_c = hottest;
        self.filtered_temp_c = match (hottest, self.filtered_temp_c) {
            (Some(raw), Some(previous)) => {
                let alpha = self.config.temp_filter_alpha;
                Some(alpha * raw + (1.0 - alpha) * previous)
            }
            (raw, _) => raw,
        };
    }

    fn advance_state(&mut self, now_ms: u64) {
        let raw = self.raw_temp_c;
        let at_or_below_recovery = raw.is_some_and(|temp| temp <= self.config.recovery_temp_c);

        match self.state {
            ThermalState::Normal => match raw {
                Some(temp) if temp < self.config.emergency_temp_c => {}
                Some(temp) => {
                    error!(
                        "thermal emergency: {temp:.1}C reached {:.1}C, lighting off",
                        self.config.emergency_temp_c
                    );
                    self.state = ThermalState::Emergency { since_ms: now_ms };
                }
                None => {
                    error!("thermal emergency: no valid temperature reading, lighting off");
                    self.state = ThermalState::Emergency { since_ms: now_ms };
                }
            },
            ThermalState::Emergency { since_ms } => {
                let held_ms = now_ms.saturating_sub(since_ms);
                if at_or_below_recovery && held_ms >= self.config.emergency_delay_ms {
                    info!(held_ms, "temperature below recovery threshold, recovering");
                    self.state = ThermalState::Recovering;
                    if self.config.recovery_policy == RecoveryPolicy::Immediate {
                        self.return_to_normal();
                    }
                }
            }
            ThermalState::Recovering => {
                if at_or_below_recovery {
                    self.return_to_normal();
                } else {
                    warn!("temperature rose again while recovering, re-entering emergency");
                    self.state = ThermalState::Emergency { since_ms: now_ms };
                }
            }
        }
    }

    fn return_to_normal(&mut self) {
        info!("thermal state back to normal");
        self.state = ThermalState::Normal;
        self.pid.reset();
    }

    fn drive_fan(&mut self, now_ms: u64) {
        if self.state.is_protective() {
            self.write_fan(self.config.max_fan_pwm, true);
            return;
        }
        if !self.control_enabled {
            self.write_fan(0.0, false);
            return;
        }
        // Normal implies at least one valid reading this tick.
        let Some(temp) = self.filtered_temp_c else {
            self.write_fan(self.config.max_fan_pwm, true);
            return;
        };

        let output = self.pid.compute(temp - self.target_temp_c, now_ms);
        if output > FAN_ENABLE_THRESHOLD {
            self.write_fan(output, true);
        } else {
            self.write_fan(0.0, false);
        }
    }

    fn write_fan(&mut self, percent: f32, enabled: bool) {
        self.fan_pwm_percent = percent;
        self.fan_enabled = enabled;
        if let Some(switch) = self.fan_switch.as_mut() {
            switch.write_state(enabled);
        }
        if let Some(pwm) = self.fan_pwm.as_mut() {
            pwm.write_percent(percent);
        }
    }
}
