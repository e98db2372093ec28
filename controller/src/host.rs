use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use ledbrick_common::{
    Command, ConstantTemperature, Controller, Disconnected, LightingScheduler, RuntimeConfig,
    SensorSource, SharedChannels, SharedPwm, SharedSensor, SharedSwitch, ThermalController,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::{
    clock::SystemClock,
    sim::{LoggedChannels, LoggedPwm, LoggedSwitch, RpmFeed, ThermalPlant},
};

const DEFAULT_STATUS_INTERVAL_MS: u64 = 10_000;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("LEDBRICK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./ledbrick.json"));
    let mut config = load_config(&config_path).await?;
    config.scheduler.timezone =
        std::env::var("LEDBRICK_TIMEZONE").unwrap_or(config.scheduler.timezone.clone());
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let (mut controller, mut plant) = build_controller(&config)?;
    controller
        .load_schedule(&config)
        .context("failed to install configured schedule")?;

    if let Ok(schedule_path) = std::env::var("LEDBRICK_SCHEDULE") {
        let raw = tokio::fs::read_to_string(&schedule_path)
            .await
            .with_context(|| format!("failed to read schedule {schedule_path}"))?;
        controller
            .scheduler_mut()
            .import_json(&raw)
            .with_context(|| format!("failed to import schedule {schedule_path}"))?;
        info!("imported schedule from {schedule_path}");
    }

    let status_interval_ms = std::env::var("LEDBRICK_STATUS_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_STATUS_INTERVAL_MS);

    info!(
        channels = config.scheduler.channels,
        timezone = %config.scheduler.timezone,
        sensors = config.hardware.temperature_sensors.len(),
        "ledbrick controller started"
    );

    let mut schedule_interval =
        tokio::time::interval(Duration::from_millis(config.scheduler.update_interval_ms));
    let mut thermal_interval =
        tokio::time::interval(Duration::from_millis(config.thermal.update_interval_ms));
    let mut status_interval = tokio::time::interval(Duration::from_millis(status_interval_ms));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = thermal_interval.tick() => {
                let now_ms = monotonic_ms();
                plant.step(now_ms);
                controller.thermal_tick(now_ms);
            }
            _ = schedule_interval.tick() => controller.schedule_tick(),
            _ = status_interval.tick() => log_status(&controller),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_command_line(&mut controller, &line),
                Ok(None) => {
                    info!("stdin closed, commands disabled");
                    stdin_open = false;
                }
                Err(err) => {
                    warn!("stdin read failed: {err}");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    controller.scheduler_mut().set_enabled(false);
    log_status(&controller);
    if let Ok(export_path) = std::env::var("LEDBRICK_SCHEDULE_EXPORT") {
        export_schedule(&controller, Path::new(&export_path)).await?;
    }
    Ok(())
}

/// Writes the active points and custom presets in the form `LEDBRICK_SCHEDULE`
/// imports.
async fn export_schedule(controller: &Controller, path: &Path) -> anyhow::Result<()> {
    let body = controller
        .scheduler()
        .store()
        .export_json()
        .context("failed to serialize schedule")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write schedule {}", path.display()))?;
    info!("exported schedule to {}", path.display());
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no config at {}, using defaults", path.display());
            Ok(RuntimeConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Wires the engines to the system clock, the thermal simulation and the
/// log-backed outputs named in the hardware config.
fn build_controller(config: &RuntimeConfig) -> anyhow::Result<(Controller, ThermalPlant)> {
    let hardware = &config.hardware;
    let lighting = SharedChannels::default();
    let fan = SharedPwm::default();
    let fan_power = SharedSwitch::default();
    let mut plant = ThermalPlant::new(lighting.clone(), fan.clone(), fan_power.clone());

    let scheduler = LightingScheduler::new(
        config.scheduler.clone(),
        Box::new(SystemClock::new(config.scheduler.timezone.clone())),
        Box::new(LoggedChannels::new(lighting)),
    )
    .context("failed to create lighting scheduler")?;

    let mut thermal =
        ThermalController::new(config.thermal.clone()).context("failed to create thermal controller")?;
    if let Some(name) = &hardware.fan_pwm_output {
        thermal = thermal.with_fan_pwm(Box::new(LoggedPwm::new(name.as_str(), fan)));
    }
    if let Some(name) = &hardware.fan_enable_switch {
        thermal = thermal.with_fan_switch(Box::new(LoggedSwitch::new(name.as_str(), fan_power)));
    }
    if let Some(sensor) = &hardware.fan_speed_sensor {
        match sensor.source {
            SensorSource::Simulated => {
                let feed = SharedSensor::new();
                plant.feed_rpm(RpmFeed::Simulated(feed.clone()));
                thermal = thermal.with_fan_speed_sensor(Box::new(feed));
            }
            SensorSource::Constant { value } => {
                let feed = SharedSensor::new();
                plant.feed_rpm(RpmFeed::Constant(feed.clone(), value));
                thermal = thermal.with_fan_speed_sensor(Box::new(feed));
            }
            SensorSource::Disconnected => {
                thermal = thermal.with_fan_speed_sensor(Box::new(Disconnected));
            }
        }
    }

    if hardware.temperature_sensors.is_empty() {
        error!("no temperature sensors configured, thermal protection will hold lighting off");
    }
    for sensor in &hardware.temperature_sensors {
        match sensor.source {
            SensorSource::Simulated => {
                let feed = SharedSensor::new();
                plant.feed_temperature(feed.clone());
                thermal.add_temperature_sensor(sensor.name.as_str(), Box::new(feed));
            }
            SensorSource::Constant { value } => {
                thermal.add_temperature_sensor(
                    sensor.name.as_str(),
                    Box::new(ConstantTemperature(value)),
                );
            }
            SensorSource::Disconnected => {
                warn!("temperature sensor '{}' is disconnected", sensor.name);
                thermal.add_temperature_sensor(sensor.name.as_str(), Box::new(Disconnected));
            }
        }
    }

    Ok((Controller::new(scheduler, thermal), plant))
}

fn handle_command_line(controller: &mut Controller, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let command = match serde_json::from_str::<Command>(line) {
        Ok(command) => command,
        Err(err) => {
            warn!("ignoring malformed command: {err}");
            return;
        }
    };

    let action = command.name();
    match controller.apply(command) {
        Ok(()) => info!("applied {action}"),
        Err(err) => warn!("rejected {action}: {err}"),
    }
}

fn log_status(controller: &Controller) {
    match serde_json::to_string(&controller.status()) {
        Ok(body) => info!(target: "ledbrick::status", "{body}"),
        Err(err) => warn!("status serialization failed: {err}"),
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
