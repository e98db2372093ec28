pub mod astro;
pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod interpolation;
pub mod io;
pub mod pid;
pub mod presets;
pub mod schedule;
pub mod scheduler;
pub mod thermal;
pub mod types;

pub use astro::{AstronomicalTimes, MoonConfig, TimeAnchor};
pub use clock::{minute_of_day, Clock, ManualClock};
pub use command::Command;
pub use config::{
    HardwareConfig, RuntimeConfig, SchedulerConfig, SensorConfig, SensorSource, ThermalConfig,
};
pub use controller::Controller;
pub use error::{ControlError, ControlResult};
pub use interpolation::{interpolate, interpolate_into};
pub use io::{
    ChannelSink, ConstantTemperature, Disconnected, PwmWriter, RpmReader, Sample, SharedChannels,
    SharedPwm, SharedSensor, SharedSwitch, SwitchWriter, TemperatureReader,
};
pub use pid::PidController;
pub use schedule::{SchedulePoint, ScheduleStore};
pub use scheduler::LightingScheduler;
pub use thermal::ThermalController;
pub use types::{
    ChannelOutput, ControllerStatus, FanCurvePoint, RecoveryPolicy, SchedulerStatus,
    ThermalState, ThermalStatus,
};
