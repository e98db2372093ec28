use std::collections::BTreeMap;

use ledbrick_common::{
    ChannelOutput, Command, ControlError, Controller, LightingScheduler, ManualClock,
    RuntimeConfig, SchedulePoint, SchedulerConfig, SharedChannels, SharedPwm, SharedSensor,
    SharedSwitch, ThermalConfig, ThermalController, ThermalState,
};
use pretty_assertions::assert_eq;

struct Harness {
    controller: Controller,
    clock: ManualClock,
    heatsink: SharedSensor,
    channels: SharedChannels,
    fan: SharedPwm,
    fan_power: SharedSwitch,
}

fn harness(config: RuntimeConfig) -> Harness {
    let clock = ManualClock::at(12, 0);
    let channels = SharedChannels::default();
    let heatsink = SharedSensor::new();
    let fan = SharedPwm::default();
    let fan_power = SharedSwitch::default();

    let scheduler = LightingScheduler::new(
        config.scheduler.clone(),
        Box::new(clock.clone()),
        Box::new(channels.clone()),
    )
    .unwrap();
    let mut thermal = ThermalController::new(config.thermal.clone())
        .unwrap()
        .with_fan_pwm(Box::new(fan.clone()))
        .with_fan_switch(Box::new(fan_power.clone()));
    thermal.add_temperature_sensor("heatsink", Box::new(heatsink.clone()));

    let mut controller = Controller::new(scheduler, thermal);
    controller.load_schedule(&config).unwrap();

    Harness {
        controller,
        clock,
        heatsink,
        channels,
        fan,
        fan_power,
    }
}

fn four_channel_config() -> RuntimeConfig {
    RuntimeConfig {
        scheduler: SchedulerConfig {
            channels: 4,
            ..SchedulerConfig::default()
        },
        ..RuntimeConfig::default()
    }
}

fn command(raw: &str) -> Command {
    serde_json::from_str(raw).unwrap()
}

#[test]
fn initial_preset_drives_lighting() {
    let mut config = four_channel_config();
    config.initial_preset = Some("simple".to_string());
    let mut h = harness(config);

    h.controller.schedule_tick();

    assert_eq!(h.channels.last().len(), 4);
    assert_eq!(
        h.channels.last()[0],
        ChannelOutput {
            pwm: 70.0 - 70.0 * (4.0 / 12.0),
            current: 1.2 - 1.2 * (4.0 / 12.0),
        }
    );
}

#[test]
fn configured_presets_are_loadable_by_command() {
    let mut config = four_channel_config();
    let mut presets = BTreeMap::new();
    presets.insert(
        "reef".to_string(),
        vec![SchedulePoint::uniform(12 * 60, 4, 33.0, 0.5)],
    );
    config.presets = presets;
    let mut h = harness(config);

    h.controller
        .apply(command(r#"{"action":"load_preset","name":"reef"}"#))
        .unwrap();

    assert_eq!(h.channels.mean_pwm(), 33.0);
    assert!(h
        .controller
        .status()
        .scheduler
        .presets
        .contains(&"reef".to_string()));
}

#[test]
fn unknown_preset_command_keeps_schedule() {
    let mut config = four_channel_config();
    config.initial_preset = Some("sunrise_sunset".to_string());
    let mut h = harness(config);
    let before = h.controller.scheduler().store().points().to_vec();

    let result = h
        .controller
        .apply(command(r#"{"action":"load_preset","name":"nope"}"#));

    assert_eq!(result, Err(ControlError::NotFound("nope".to_string())));
    assert_eq!(h.controller.scheduler().store().points(), before.as_slice());
}

#[test]
fn overheating_turns_lights_off_and_fan_to_max_until_recovered() {
    let mut config = four_channel_config();
    config.initial_preset = Some("simple".to_string());
    let mut h = harness(config);

    h.heatsink.push(50.0, 0);
    assert_eq!(h.controller.thermal_tick(0), ThermalState::Normal);
    assert!(h.channels.mean_pwm() > 0.0);

    h.heatsink.push(62.0, 1_000);
    assert!(h.controller.thermal_tick(1_000).is_protective());
    h.controller
        .apply(Command::SetEnabled { enabled: true })
        .unwrap();
    h.controller.schedule_tick();

    assert_eq!(h.channels.mean_pwm(), 0.0);
    assert_eq!(h.fan.percent(), 100.0);
    assert!(h.fan_power.is_on());
    let status = h.controller.status();
    assert!(status.thermal.thermal_emergency);
    assert_eq!(status.thermal.state, "EMERGENCY");
    assert_eq!(status.thermal.emergency_since_ms, Some(1_000));
    assert!(status.scheduler.user_enabled);
    assert!(!status.scheduler.enabled);

    h.heatsink.push(50.0, 7_000);
    assert_eq!(h.controller.thermal_tick(7_000), ThermalState::Normal);
    assert!(h.channels.mean_pwm() > 0.0);
}

#[test]
fn user_disable_survives_recovery() {
    let mut h = harness(four_channel_config());
    h.controller
        .apply(command(
            r#"{"action":"set_schedule_point","timepoint":720,"pwm_values":[10,20,30,40],"current_values":[0,0,0,0]}"#,
        ))
        .unwrap();
    h.controller
        .apply(Command::SetEnabled { enabled: false })
        .unwrap();

    h.heatsink.push(70.0, 0);
    h.controller.thermal_tick(0);
    h.heatsink.push(40.0, 10_000);
    h.controller.thermal_tick(10_000);

    assert_eq!(h.controller.thermal().state(), ThermalState::Normal);
    assert_eq!(h.channels.last(), vec![ChannelOutput::OFF; 4]);
}

#[test]
fn rejected_commands_leave_state_untouched() {
    let mut h = harness(four_channel_config());

    let bad_point = h.controller.apply(Command::SetSchedulePoint {
        timepoint: 1_440,
        pwm_values: vec![0.0; 4],
        current_values: vec![0.0; 4],
    });
    let bad_scale = h.controller.apply(Command::SetPwmScale { scale: -0.2 });
    let bad_target = h
        .controller
        .apply(Command::SetTargetTemperature { temperature: 5.0 });
    let missing_point = h
        .controller
        .apply(Command::RemoveSchedulePoint { timepoint: 300 });

    for result in [bad_point, bad_scale, bad_target, missing_point] {
        assert!(matches!(result, Err(ControlError::Validation { .. })));
    }
    let status = h.controller.status();
    assert_eq!(status.scheduler.schedule_points, 0);
    assert_eq!(status.scheduler.pwm_scale, 1.0);
    assert_eq!(status.thermal.target_temp_c, 45.0);
}

#[test]
fn temperature_control_toggle_by_command() {
    let mut config = four_channel_config();
    config.thermal = ThermalConfig {
        kp: 4.0,
        ki: 0.0,
        kd: 0.0,
        ..ThermalConfig::default()
    };
    let mut h = harness(config);

    h.heatsink.push(50.0, 0);
    h.controller.thermal_tick(0);
    h.heatsink.push(50.0, 1_000);
    h.controller.thermal_tick(1_000);
    assert_eq!(h.fan.percent(), 20.0);

    h.controller
        .apply(command(r#"{"action":"set_temperature_control","enabled":false}"#))
        .unwrap();
    assert_eq!(h.fan.percent(), 0.0);
    assert!(!h.fan_power.is_on());

    h.controller
        .apply(command(r#"{"action":"set_target_temperature","temperature":40}"#))
        .unwrap();
    h.controller
        .apply(command(r#"{"action":"set_temperature_control","enabled":true}"#))
        .unwrap();
    h.heatsink.push(50.0, 2_000);
    h.controller.thermal_tick(2_000);
    h.heatsink.push(50.0, 3_000);
    h.controller.thermal_tick(3_000);

    assert_eq!(h.fan.percent(), 40.0);
    assert!(h.fan_power.is_on());
}

#[test]
fn lost_clock_holds_lighting() {
    let mut config = four_channel_config();
    config.initial_preset = Some("sunrise_sunset".to_string());
    let mut h = harness(config);
    h.controller.schedule_tick();
    let lit = h.channels.last();

    h.clock.set(None);
    h.controller.schedule_tick();

    assert_eq!(h.controller.scheduler().outputs(), lit.as_slice());
    assert!(!h.controller.status().scheduler.time_synced);
}

#[test]
fn status_serializes_with_camel_case_keys() {
    let mut h = harness(four_channel_config());
    h.heatsink.push(42.0, 0);
    h.controller.thermal_tick(0);

    let json = serde_json::to_value(h.controller.status()).unwrap();

    assert_eq!(json["thermal"]["state"], "NORMAL");
    assert_eq!(json["thermal"]["currentTemp"], 42.0);
    assert_eq!(json["scheduler"]["userEnabled"], true);
    assert_eq!(json["scheduler"]["channels"].as_array().unwrap().len(), 4);
    assert_eq!(json["scheduler"]["maxCurrent"][3], 2.0);
    assert_eq!(json["scheduler"]["moonlight"], false);
}

#[test]
fn channel_current_limit_by_command() {
    let mut config = four_channel_config();
    config.initial_preset = Some("simple".to_string());
    let mut h = harness(config);
    h.controller.schedule_tick();
    let before = h.channels.last();

    h.controller
        .apply(command(
            r#"{"action":"set_channel_max_current","channel":2,"max_current":0.3}"#,
        ))
        .unwrap();

    let after = h.channels.last();
    assert_eq!(after[2].current, 0.3);
    assert_eq!(after[2].pwm, before[2].pwm);
    assert_eq!(after[0], before[0]);

    let out_of_range = h.controller.apply(command(
        r#"{"action":"set_channel_max_current","channel":4,"max_current":1.0}"#,
    ));
    assert!(matches!(out_of_range, Err(ControlError::Validation { .. })));
}

#[test]
fn dynamic_preset_follows_sun_times_by_command() {
    let mut config = four_channel_config();
    config.initial_preset = Some("dynamic_sunrise_sunset".to_string());
    let mut h = harness(config);
    h.controller.schedule_tick();
    assert!((h.channels.mean_pwm() - 81.5).abs() < 1e-3);

    h.controller
        .apply(command(
            r#"{"action":"set_astronomical_times","times":{"solar_noon":720}}"#,
        ))
        .unwrap();

    assert_eq!(h.channels.mean_pwm(), 85.0);
    assert_eq!(h.controller.status().scheduler.dynamic_points, 7);

    h.controller
        .apply(command(
            r#"{"action":"remove_dynamic_schedule_point","time_type":"solar_noon"}"#,
        ))
        .unwrap();
    assert_eq!(h.controller.scheduler().store().len(), 6);
}

#[test]
fn pid_tunings_by_command() {
    let mut h = harness(four_channel_config());

    h.controller
        .apply(command(r#"{"action":"set_pid_tunings","kp":3.0,"ki":0.2,"kd":0.0}"#))
        .unwrap();
    let negative = h
        .controller
        .apply(command(r#"{"action":"set_pid_tunings","kp":-3.0,"ki":0.2,"kd":0.0}"#));

    assert!(negative.is_err());
    assert_eq!(h.controller.thermal().pid().tunings(), (3.0, 0.2, 0.0));
}
