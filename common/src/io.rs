//! Hardware seams. The engines only see these traits; the host decides what
//! sits behind them.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::types::ChannelOutput;

/// A reading and the time it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f32,
    pub taken_at_ms: u64,
}

pub trait TemperatureReader {
    /// Latest reading in °C, `None` when the sensor has nothing to offer.
    fn read(&self, now_ms: u64) -> Option<Sample>;
}

pub trait RpmReader {
    fn read_rpm(&self, now_ms: u64) -> Option<Sample>;
}

pub trait PwmWriter {
    fn write_percent(&mut self, percent: f32);
}

pub trait SwitchWriter {
    fn write_state(&mut self, on: bool);
}

pub trait ChannelSink {
    fn publish(&mut self, outputs: &[ChannelOutput]);
}

/// Sensor-backed reader: whoever owns a clone pushes samples in, the engine
/// reads the latest one.
#[derive(Debug, Clone, Default)]
pub struct SharedSensor {
    latest: Rc<Cell<Option<Sample>>>,
}

impl SharedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: f32, now_ms: u64) {
        self.latest.set(Some(Sample {
            value,
            taken_at_ms: now_ms,
        }));
    }

    pub fn latest(&self) -> Option<Sample> {
        self.latest.get()
    }
}

impl TemperatureReader for SharedSensor {
    fn read(&self, _now_ms: u64) -> Option<Sample> {
        self.latest.get()
    }
}

impl RpmReader for SharedSensor {
    fn read_rpm(&self, _now_ms: u64) -> Option<Sample> {
        self.latest.get()
    }
}

/// Always reports the same value, stamped with the query time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantTemperature(pub f32);

impl TemperatureReader for ConstantTemperature {
    fn read(&self, now_ms: u64) -> Option<Sample> {
        Some(Sample {
            value: self.0,
            taken_at_ms: now_ms,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl TemperatureReader for Disconnected {
    fn read(&self, _now_ms: u64) -> Option<Sample> {
        None
    }
}

impl RpmReader for Disconnected {
    fn read_rpm(&self, _now_ms: u64) -> Option<Sample> {
        None
    }
}

/// Last duty written, observable through any clone.
#[derive(Debug, Clone, Default)]
pub struct SharedPwm(Rc<Cell<f32>>);

impl SharedPwm {
    pub fn percent(&self) -> f32 {
        self.0.get()
    }
}

impl PwmWriter for SharedPwm {
    fn write_percent(&mut self, percent: f32) {
        self.0.set(percent);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedSwitch(Rc<Cell<bool>>);

impl SharedSwitch {
    pub fn is_on(&self) -> bool {
        self.0.get()
    }
}

impl SwitchWriter for SharedSwitch {
    fn write_state(&mut self, on: bool) {
        self.0.set(on);
    }
}

/// Keeps the last published channel vector and a publish counter.
#[derive(Debug, Clone, Default)]
pub struct SharedChannels {
    last: Rc<RefCell<Vec<ChannelOutput>>>,
    publishes: Rc<Cell<u64>>,
}

impl SharedChannels {
    pub fn last(&self) -> Vec<ChannelOutput> {
        self.last.borrow().clone()
    }

    pub fn publishes(&self) -> u64 {
        self.publishes.get()
    }

    /// Mean PWM across channels of the last publish.
    pub fn mean_pwm(&self) -> f32 {
        let last = self.last.borrow();
        if last.is_empty() {
            return 0.0;
        }
        last.iter().map(|output| output.pwm).sum::<f32>() / last.len() as f32
    }
}

impl ChannelSink for SharedChannels {
    fn publish(&mut self, outputs: &[ChannelOutput]) {
        let mut last = self.last.borrow_mut();
        last.clear();
        last.extend_from_slice(outputs);
        self.publishes.set(self.publishes.get() + 1);
    }
}
