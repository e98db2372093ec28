use ledbrick_common::{
    ChannelOutput, ChannelSink, PwmWriter, SharedChannels, SharedPwm, SharedSensor, SharedSwitch,
    SwitchWriter,
};
use tracing::{debug, info};

const AMBIENT_C: f32 = 25.0;
/// Heat added per second at full brightness on every channel.
const LIGHT_HEAT_C_PER_S: f32 = 0.5;
const PASSIVE_LOSS_PER_S: f32 = 0.005;
const FAN_LOSS_PER_S: f32 = 0.02;
const FAN_MAX_RPM: f32 = 3_000.0;

/// First-order heatsink model: lighting heats it, the fan and the enclosure
/// pull it back towards ambient.
pub struct ThermalPlant {
    temperature_c: f32,
    last_step_ms: Option<u64>,
    lighting: SharedChannels,
    fan: SharedPwm,
    fan_power: SharedSwitch,
    temperature_feeds: Vec<SharedSensor>,
    rpm_feed: Option<RpmFeed>,
}

pub enum RpmFeed {
    Simulated(SharedSensor),
    Constant(SharedSensor, f32),
}

impl ThermalPlant {
    pub fn new(lighting: SharedChannels, fan: SharedPwm, fan_power: SharedSwitch) -> Self {
        Self {
            temperature_c: AMBIENT_C,
            last_step_ms: None,
            lighting,
            fan,
            fan_power,
            temperature_feeds: Vec::new(),
            rpm_feed: None,
        }
    }

    pub fn feed_temperature(&mut self, sensor: SharedSensor) {
        self.temperature_feeds.push(sensor);
    }

    pub fn feed_rpm(&mut self, feed: RpmFeed) {
        self.rpm_feed = Some(feed);
    }

    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    /// Advances the model to `now_ms` and pushes fresh samples to every feed.
    pub fn step(&mut self, now_ms: u64) {
        let dt_s = self
            .last_step_ms
            .map(|last| now_ms.saturating_sub(last) as f32 / 1_000.0)
            .unwrap_or(0.0);
        self.last_step_ms = Some(now_ms);

        let light = self.lighting.mean_pwm() / 100.0;
        let fan = self.fan_fraction();
        let excess = self.temperature_c - AMBIENT_C;
        let rate = LIGHT_HEAT_C_PER_S * light - (PASSIVE_LOSS_PER_S + FAN_LOSS_PER_S * fan) * excess;
        self.temperature_c += rate * dt_s;

        for sensor in &self.temperature_feeds {
            sensor.push(self.temperature_c, now_ms);
        }
        match &self.rpm_feed {
            Some(RpmFeed::Simulated(sensor)) => sensor.push(fan * FAN_MAX_RPM, now_ms),
            Some(RpmFeed::Constant(sensor, rpm)) => sensor.push(*rpm, now_ms),
            None => {}
        }
        debug!(
            temperature_c = self.temperature_c,
            light, fan, "plant step"
        );
    }

    fn fan_fraction(&self) -> f32 {
        if self.fan_power.is_on() {
            self.fan.percent() / 100.0
        } else {
            0.0
        }
    }
}

/// Channel sink that logs level changes and shares the last publish with the
/// plant.
pub struct LoggedChannels {
    inner: SharedChannels,
}

impl LoggedChannels {
    pub fn new(inner: SharedChannels) -> Self {
        Self { inner }
    }
}

impl ChannelSink for LoggedChannels {
    fn publish(&mut self, outputs: &[ChannelOutput]) {
        if self.inner.last() != outputs {
            let pwm: Vec<String> = outputs
                .iter()
                .map(|output| format!("{:.1}", output.pwm))
                .collect();
            info!("led channels pwm% [{}]", pwm.join(", "));
        }
        self.inner.publish(outputs);
    }
}

pub struct LoggedPwm {
    name: String,
    inner: SharedPwm,
}

impl LoggedPwm {
    pub fn new(name: impl Into<String>, inner: SharedPwm) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl PwmWriter for LoggedPwm {
    fn write_percent(&mut self, percent: f32) {
        if (self.inner.percent() - percent).abs() >= 1.0 {
            debug!(output = %self.name, percent, "fan duty");
        }
        self.inner.write_percent(percent);
    }
}

pub struct LoggedSwitch {
    name: String,
    inner: SharedSwitch,
}

impl LoggedSwitch {
    pub fn new(name: impl Into<String>, inner: SharedSwitch) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl SwitchWriter for LoggedSwitch {
    fn write_state(&mut self, on: bool) {
        if self.inner.is_on() != on {
            info!(switch = %self.name, on, "fan power");
        }
        self.inner.write_state(on);
    }
}
