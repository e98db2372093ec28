use serde::{Deserialize, Serialize};

use crate::astro::{AstronomicalTimes, MoonConfig, TimeAnchor};

/// Runtime action accepted by [`Controller::apply`](crate::Controller::apply).
///
/// Wire form is internally tagged, e.g.
/// `{"action":"load_preset","name":"simple"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    SetSchedulePoint {
        timepoint: u16,
        #[serde(alias = "pwmValues")]
        pwm_values: Vec<f32>,
        #[serde(alias = "currentValues")]
        current_values: Vec<f32>,
    },
    RemoveSchedulePoint {
        timepoint: u16,
    },
    SetDynamicSchedulePoint {
        #[serde(alias = "timeType")]
        time_type: TimeAnchor,
        #[serde(default, alias = "offsetMinutes")]
        offset_minutes: i16,
        #[serde(alias = "pwmValues")]
        pwm_values: Vec<f32>,
        #[serde(alias = "currentValues")]
        current_values: Vec<f32>,
    },
    RemoveDynamicSchedulePoint {
        #[serde(alias = "timeType")]
        time_type: TimeAnchor,
        #[serde(default, alias = "offsetMinutes")]
        offset_minutes: i16,
    },
    ClearSchedule,
    LoadPreset {
        name: String,
    },
    SavePreset {
        name: String,
    },
    DeletePreset {
        name: String,
    },
    SetEnabled {
        enabled: bool,
    },
    SetPwmScale {
        scale: f32,
    },
    SetChannelMaxCurrent {
        channel: usize,
        #[serde(alias = "maxCurrent")]
        max_current: f32,
    },
    SetAstronomicalTimes {
        times: AstronomicalTimes,
    },
    SetMoonSimulation {
        moon: MoonConfig,
    },
    SetTargetTemperature {
        temperature: f32,
    },
    SetTemperatureControl {
        enabled: bool,
    },
    SetPidTunings {
        kp: f32,
        ki: f32,
        kd: f32,
    },
    ResetPid,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetSchedulePoint { .. } => "set_schedule_point",
            Self::RemoveSchedulePoint { .. } => "remove_schedule_point",
            Self::SetDynamicSchedulePoint { .. } => "set_dynamic_schedule_point",
            Self::RemoveDynamicSchedulePoint { .. } => "remove_dynamic_schedule_point",
            Self::ClearSchedule => "clear_schedule",
            Self::LoadPreset { .. } => "load_preset",
            Self::SavePreset { .. } => "save_preset",
            Self::DeletePreset { .. } => "delete_preset",
            Self::SetEnabled { .. } => "set_enabled",
            Self::SetPwmScale { .. } => "set_pwm_scale",
            Self::SetChannelMaxCurrent { .. } => "set_channel_max_current",
            Self::SetAstronomicalTimes { .. } => "set_astronomical_times",
            Self::SetMoonSimulation { .. } => "set_moon_simulation",
            Self::SetTargetTemperature { .. } => "set_target_temperature",
            Self::SetTemperatureControl { .. } => "set_temperature_control",
            Self::SetPidTunings { .. } => "set_pid_tunings",
            Self::ResetPid => "reset_pid",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_tagged_json() {
        let raw = r#"{"action":"set_schedule_point","timepoint":480,"pwmValues":[50],"current_values":[1.0]}"#;

        let command: Command = serde_json::from_str(raw).unwrap();

        assert_eq!(
            command,
            Command::SetSchedulePoint {
                timepoint: 480,
                pwm_values: vec![50.0],
                current_values: vec![1.0],
            }
        );
        assert_eq!(command.name(), "set_schedule_point");
    }

    #[test]
    fn parses_dynamic_point_and_limits() {
        let point = r#"{"action":"set_dynamic_schedule_point","timeType":"sunset","offsetMinutes":-30,"pwm_values":[50],"current_values":[1.0]}"#;
        let limit = r#"{"action":"set_channel_max_current","channel":3,"maxCurrent":1.5}"#;
        let times = r#"{"action":"set_astronomical_times","times":{"sunrise":400,"moonrise":1300}}"#;

        assert_eq!(
            serde_json::from_str::<Command>(point).unwrap(),
            Command::SetDynamicSchedulePoint {
                time_type: TimeAnchor::Sunset,
                offset_minutes: -30,
                pwm_values: vec![50.0],
                current_values: vec![1.0],
            }
        );
        assert_eq!(
            serde_json::from_str::<Command>(limit).unwrap(),
            Command::SetChannelMaxCurrent {
                channel: 3,
                max_current: 1.5,
            }
        );
        let Command::SetAstronomicalTimes { times } = serde_json::from_str(times).unwrap() else {
            panic!("expected set_astronomical_times");
        };
        assert_eq!(times.sunrise, 400);
        assert_eq!(times.moonrise, Some(1300));
        assert_eq!(times.sunset, AstronomicalTimes::default().sunset);
    }

    #[test]
    fn unit_actions_need_only_the_tag() {
        let command: Command = serde_json::from_str(r#"{"action":"reset_pid"}"#).unwrap();
        assert_eq!(command, Command::ResetPid);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"action":"reboot"}"#).is_err());
    }
}
