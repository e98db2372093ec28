use serde::{Deserialize, Serialize};

/// Instantaneous drive level of a single LED channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutput {
    pub pwm: f32,
    pub current: f32,
}

impl ChannelOutput {
    pub const OFF: Self = Self {
        pwm: 0.0,
        current: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Recovering resolves to Normal in the tick it is entered.
    Immediate,
    /// Recovering is held for one tick and must still be below the recovery
    /// temperature on the next tick.
    ConfirmTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalState {
    Normal,
    Emergency { since_ms: u64 },
    Recovering,
}

impl ThermalState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Emergency { .. } => "EMERGENCY",
            Self::Recovering => "RECOVERING",
        }
    }

    /// Fan forced to maximum and lighting forced off.
    pub fn is_protective(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FanCurvePoint {
    pub temperature: f32,
    #[serde(rename = "fanPwm")]
    pub fan_pwm: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    #[serde(rename = "userEnabled")]
    pub user_enabled: bool,
    #[serde(rename = "thermalOverride")]
    pub thermal_override: bool,
    #[serde(rename = "timeSynced")]
    pub time_synced: bool,
    #[serde(rename = "minuteOfDay")]
    pub minute_of_day: Option<f32>,
    #[serde(rename = "pwmScale")]
    pub pwm_scale: f32,
    #[serde(rename = "schedulePoints")]
    pub schedule_points: usize,
    #[serde(rename = "dynamicPoints")]
    pub dynamic_points: usize,
    pub presets: Vec<String>,
    #[serde(rename = "maxCurrent")]
    pub max_current: Vec<f32>,
    pub moonlight: bool,
    pub channels: Vec<ChannelOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermalStatus {
    pub enabled: bool,
    #[serde(rename = "thermalEmergency")]
    pub thermal_emergency: bool,
    pub state: &'static str,
    #[serde(rename = "fanEnabled")]
    pub fan_enabled: bool,
    #[serde(rename = "currentTemp")]
    pub current_temp_c: Option<f32>,
    #[serde(rename = "targetTemp")]
    pub target_temp_c: f32,
    #[serde(rename = "fanPwm")]
    pub fan_pwm_percent: f32,
    #[serde(rename = "fanRpm")]
    pub fan_rpm: Option<f32>,
    #[serde(rename = "pidError")]
    pub pid_error: f32,
    #[serde(rename = "pidOutput")]
    pub pid_output: f32,
    #[serde(rename = "emergencySinceMs")]
    pub emergency_since_ms: Option<u64>,
    #[serde(rename = "sensorsValid")]
    pub sensors_valid: usize,
    #[serde(rename = "sensorsTotal")]
    pub sensors_total: usize,
    #[serde(rename = "faultedSensors")]
    pub faulted_sensors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub scheduler: SchedulerStatus,
    pub thermal: ThermalStatus,
}
