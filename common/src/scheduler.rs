use tracing::{debug, info, warn};

use crate::{
    astro::{AstronomicalTimes, MoonConfig, TimeAnchor},
    clock::{minute_of_day, Clock},
    config::{check_range, clamp_channel_current, SchedulerConfig},
    error::{ControlError, ControlResult},
    interpolation::interpolate_into,
    io::ChannelSink,
    schedule::{SchedulePoint, ScheduleStore},
    types::{ChannelOutput, SchedulerStatus},
};

/// Drives the LED channels from the active schedule.
///
/// Lighting is on only while the user has it enabled and no thermal override
/// is engaged. Every mutation is re-evaluated immediately so the sink never
/// lags a command by a full tick.
pub struct LightingScheduler {
    config: SchedulerConfig,
    store: ScheduleStore,
    clock: Box<dyn Clock>,
    sink: Box<dyn ChannelSink>,

    user_enabled: bool,
    thermal_override: bool,
    pwm_scale: f32,
    max_current: Vec<f32>,
    astronomical: AstronomicalTimes,
    moon: MoonConfig,

    /// Store points with dynamic times resolved, sorted by minute.
    resolved: Vec<SchedulePoint>,
    output: Vec<ChannelOutput>,
    minute_of_day: Option<f32>,
    time_synced: bool,
    moonlight: bool,
}

impl LightingScheduler {
    pub fn new(
        config: SchedulerConfig,
        clock: Box<dyn Clock>,
        sink: Box<dyn ChannelSink>,
    ) -> ControlResult<Self> {
        config.validate()?;
        let channels = usize::from(config.channels);
        Ok(Self {
            pwm_scale: config.pwm_scale,
            max_current: config.channel_max_currents(),
            astronomical: config.astronomical,
            moon: config.moon.clone(),
            store: ScheduleStore::new(channels),
            clock,
            sink,
            user_enabled: true,
            thermal_override: false,
            resolved: Vec::new(),
            output: vec![ChannelOutput::OFF; channels],
            minute_of_day: None,
            // Assume synced until the first tick says otherwise so the first
            // failure is logged.
            time_synced: true,
            moonlight: false,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn channels(&self) -> usize {
        self.output.len()
    }

    /// Last published channel levels.
    pub fn outputs(&self) -> &[ChannelOutput] {
        &self.output
    }

    pub fn is_enabled(&self) -> bool {
        self.user_enabled && !self.thermal_override
    }

    pub fn user_enabled(&self) -> bool {
        self.user_enabled
    }

    pub fn thermal_override(&self) -> bool {
        self.thermal_override
    }

    pub fn pwm_scale(&self) -> f32 {
        self.pwm_scale
    }

    pub fn minute_of_day(&self) -> Option<f32> {
        self.minute_of_day
    }

    /// Current ceiling per channel in amps.
    pub fn max_current(&self) -> &[f32] {
        &self.max_current
    }

    pub fn astronomical_times(&self) -> &AstronomicalTimes {
        &self.astronomical
    }

    /// Active points as interpolated: dynamic times resolved, sorted by minute.
    pub fn resolved_points(&self) -> &[SchedulePoint] {
        &self.resolved
    }

    pub fn tick(&mut self) {
        let now = self.clock.local_now();
        self.minute_of_day = now.as_ref().map(minute_of_day);

        let synced = self.minute_of_day.is_some();
        if synced != self.time_synced {
            if synced {
                info!("scheduler clock available again");
            } else {
                warn!(
                    "scheduler clock unavailable (timezone {}), holding outputs",
                    self.config.timezone
                );
            }
            self.time_synced = synced;
        }

        if !self.is_enabled() {
            self.moonlight = false;
            self.output.fill(ChannelOutput::OFF);
            self.sink.publish(&self.output);
            return;
        }

        let Some(minute) = self.minute_of_day else {
            return;
        };

        interpolate_into(&self.resolved, minute, &mut self.output);
        let moonlight = self.moon.apply(&self.astronomical, minute, &mut self.output);
        if moonlight != self.moonlight {
            debug!(moonlight, "moonlight changed");
            self.moonlight = moonlight;
        }
        for (channel, max_current) in self.output.iter_mut().zip(&self.max_current) {
            if self.pwm_scale < 1.0 {
                channel.pwm *= self.pwm_scale;
            }
            channel.current = channel.current.min(*max_current);
        }
        self.sink.publish(&self.output);
    }

    /// Rebuilds the resolved point list after the store or event times change.
    fn schedule_changed(&mut self) {
        self.store.resolve_into(&self.astronomical, &mut self.resolved);
        self.tick();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.user_enabled == enabled {
            return;
        }
        self.user_enabled = enabled;
        if enabled && self.thermal_override {
            info!("lighting enable recorded, held off by thermal override");
        } else {
            info!(enabled, "lighting enable changed");
        }
        self.tick();
    }

    /// Engaged by thermal protection; independent of the user enable flag.
    pub fn set_thermal_override(&mut self, engaged: bool) {
        if self.thermal_override == engaged {
            return;
        }
        self.thermal_override = engaged;
        if engaged {
            warn!("thermal override engaged, lighting forced off");
        } else {
            info!("thermal override released");
        }
        self.tick();
    }

    pub fn set_pwm_scale(&mut self, scale: f32) -> ControlResult<()> {
        check_range("pwm_scale", scale, 0.0..=1.0)?;
        self.pwm_scale = scale;
        debug!(scale, "pwm scale updated");
        self.tick();
        Ok(())
    }

    pub fn set_point(
        &mut self,
        timepoint: u16,
        pwm_values: Vec<f32>,
        current_values: Vec<f32>,
    ) -> ControlResult<()> {
        self.store.set_point(timepoint, pwm_values, current_values)?;
        self.schedule_changed();
        Ok(())
    }

    pub fn set_dynamic_point(
        &mut self,
        anchor: TimeAnchor,
        offset_minutes: i16,
        pwm_values: Vec<f32>,
        current_values: Vec<f32>,
    ) -> ControlResult<()> {
        self.store
            .set_dynamic_point(anchor, offset_minutes, pwm_values, current_values)?;
        self.schedule_changed();
        Ok(())
    }

    pub fn remove_point(&mut self, timepoint: u16) -> bool {
        let removed = self.store.remove_point(timepoint);
        if removed {
            self.schedule_changed();
        }
        removed
    }

    pub fn remove_dynamic_point(&mut self, anchor: TimeAnchor, offset_minutes: i16) -> bool {
        let removed = self.store.remove_dynamic_point(anchor, offset_minutes);
        if removed {
            self.schedule_changed();
        }
        removed
    }

    pub fn clear_schedule(&mut self) {
        self.store.clear();
        self.schedule_changed();
    }

    pub fn replace_points(&mut self, points: Vec<SchedulePoint>) -> ControlResult<()> {
        self.store.replace_points(points)?;
        self.schedule_changed();
        Ok(())
    }

    pub fn load_preset(&mut self, name: &str) -> ControlResult<()> {
        self.store.load_preset(name)?;
        info!(preset = name, points = self.store.len(), "preset loaded");
        self.schedule_changed();
        Ok(())
    }

    pub fn save_preset(&mut self, name: &str) -> ControlResult<()> {
        self.store.save_preset(name)
    }

    pub fn insert_preset(&mut self, name: &str, points: Vec<SchedulePoint>) -> ControlResult<()> {
        self.store.insert_preset(name, points)
    }

    pub fn delete_preset(&mut self, name: &str) -> ControlResult<()> {
        self.store.delete_preset(name)
    }

    pub fn import_json(&mut self, raw: &str) -> ControlResult<()> {
        self.store.import_json(raw)?;
        self.schedule_changed();
        Ok(())
    }

    /// Caps `channel`'s drive current. Values outside the driver's range are
    /// clamped into it.
    pub fn set_channel_max_current(&mut self, channel: usize, amps: f32) -> ControlResult<()> {
        if channel >= self.max_current.len() {
            return Err(ControlError::validation(
                "channel",
                format!("{channel} is outside 0-{}", self.max_current.len() - 1),
            ));
        }
        if !amps.is_finite() {
            return Err(ControlError::validation(
                "max_current",
                format!("{amps} is not a current"),
            ));
        }
        let limit = clamp_channel_current(amps);
        self.max_current[channel] = limit;
        info!(channel, max_current = limit, "channel current limit updated");
        self.tick();
        Ok(())
    }

    /// Replaces today's sun and moon event times and re-resolves dynamic points.
    pub fn set_astronomical_times(&mut self, times: AstronomicalTimes) -> ControlResult<()> {
        times.validate()?;
        self.astronomical = times;
        debug!(
            sunrise = times.sunrise,
            sunset = times.sunset,
            "astronomical times updated"
        );
        self.schedule_changed();
        Ok(())
    }

    pub fn set_moon_simulation(&mut self, moon: MoonConfig) -> ControlResult<()> {
        moon.validate(self.channels())?;
        info!(enabled = moon.enabled, "moon simulation updated");
        self.moon = moon;
        self.tick();
        Ok(())
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            enabled: self.is_enabled(),
            user_enabled: self.user_enabled,
            thermal_override: self.thermal_override,
            time_synced: self.minute_of_day.is_some(),
            minute_of_day: self.minute_of_day,
            pwm_scale: self.pwm_scale,
            schedule_points: self.store.len(),
            dynamic_points: self.store.points().iter().filter(|p| p.is_dynamic()).count(),
            presets: self.store.preset_names(),
            max_current: self.max_current.clone(),
            moonlight: self.moonlight,
            channels: self.output.clone(),
        }
    }
}
