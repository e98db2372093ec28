use tracing::{debug, info};

use crate::{
    command::Command,
    config::RuntimeConfig,
    error::{ControlError, ControlResult},
    scheduler::LightingScheduler,
    thermal::ThermalController,
    types::{ControllerStatus, ThermalState},
};

/// Owns both engines and routes commands and ticks to them.
pub struct Controller {
    scheduler: LightingScheduler,
    thermal: ThermalController,
}

impl Controller {
    pub fn new(scheduler: LightingScheduler, thermal: ThermalController) -> Self {
        Self { scheduler, thermal }
    }

    /// Registers configured presets, then installs the initial schedule.
    /// `initial_preset`, when set, replaces any configured points.
    pub fn load_schedule(&mut self, config: &RuntimeConfig) -> ControlResult<()> {
        for (name, points) in &config.presets {
            self.scheduler.insert_preset(name, points.clone())?;
        }
        if !config.schedule.is_empty() {
            self.scheduler.replace_points(config.schedule.clone())?;
        }
        if let Some(name) = config.initial_preset.as_deref() {
            self.scheduler.load_preset(name)?;
        }
        info!(
            points = self.scheduler.store().len(),
            presets = config.presets.len(),
            "schedule loaded"
        );
        Ok(())
    }

    pub fn scheduler(&self) -> &LightingScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut LightingScheduler {
        &mut self.scheduler
    }

    pub fn thermal(&self) -> &ThermalController {
        &self.thermal
    }

    pub fn thermal_mut(&mut self) -> &mut ThermalController {
        &mut self.thermal
    }

    pub fn schedule_tick(&mut self) {
        self.scheduler.tick();
    }

    pub fn thermal_tick(&mut self, now_ms: u64) -> ThermalState {
        self.thermal.tick(now_ms, &mut self.scheduler)
    }

    pub fn apply(&mut self, command: Command) -> ControlResult<()> {
        debug!(action = command.name(), "applying command");
        match command {
            Command::SetSchedulePoint {
                timepoint,
                pwm_values,
                current_values,
            } => self
                .scheduler
                .set_point(timepoint, pwm_values, current_values),
            Command::RemoveSchedulePoint { timepoint } => {
                if self.scheduler.remove_point(timepoint) {
                    Ok(())
                } else {
                    Err(ControlError::validation(
                        "timepoint",
                        format!("no schedule point at {timepoint}"),
                    ))
                }
            }
            Command::SetDynamicSchedulePoint {
                time_type,
                offset_minutes,
                pwm_values,
                current_values,
            } => self.scheduler.set_dynamic_point(
                time_type,
                offset_minutes,
                pwm_values,
                current_values,
            ),
            Command::RemoveDynamicSchedulePoint {
                time_type,
                offset_minutes,
            } => {
                if self.scheduler.remove_dynamic_point(time_type, offset_minutes) {
                    Ok(())
                } else {
                    Err(ControlError::validation(
                        "time_type",
                        format!("no schedule point at {time_type:?} {offset_minutes:+}"),
                    ))
                }
            }
            Command::ClearSchedule => {
                self.scheduler.clear_schedule();
                Ok(())
            }
            Command::LoadPreset { name } => self.scheduler.load_preset(&name),
            Command::SavePreset { name } => self.scheduler.save_preset(&name),
            Command::DeletePreset { name } => self.scheduler.delete_preset(&name),
            Command::SetEnabled { enabled } => {
                self.scheduler.set_enabled(enabled);
                Ok(())
            }
            Command::SetPwmScale { scale } => self.scheduler.set_pwm_scale(scale),
            Command::SetChannelMaxCurrent {
                channel,
                max_current,
            } => self
                .scheduler
                .set_channel_max_current(channel, max_current),
            Command::SetAstronomicalTimes { times } => {
                self.scheduler.set_astronomical_times(times)
            }
            Command::SetMoonSimulation { moon } => self.scheduler.set_moon_simulation(moon),
            Command::SetTargetTemperature { temperature } => {
                self.thermal.set_target_temperature(temperature)
            }
            Command::SetTemperatureControl { enabled } => {
                self.thermal.set_control_enabled(enabled);
                Ok(())
            }
            Command::SetPidTunings { kp, ki, kd } => self.thermal.set_pid_tunings(kp, ki, kd),
            Command::ResetPid => {
                self.thermal.reset_pid();
                Ok(())
            }
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            scheduler: self.scheduler.status(),
            thermal: self.thermal.status(),
        }
    }
}
