//! Sun and moon anchored schedule times.
//!
//! The controller does not compute ephemerides itself. Today's event times are
//! supplied from outside (config or a runtime command) and dynamic schedule
//! points are resolved against them before interpolation.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ControlError, ControlResult},
    schedule::MINUTES_PER_DAY,
    types::ChannelOutput,
};

/// Moon channels are only lit while every scheduled channel is at or below this pwm.
pub const MOON_DARK_PWM: f32 = 0.1;
/// Drive current per percent of moonlight pwm.
pub const MOON_CURRENT_PER_PWM: f32 = 0.02;

/// What a schedule point's time is measured from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeAnchor {
    /// `timepoint` is the minute of day.
    #[default]
    Fixed,
    Sunrise,
    Sunset,
    SolarNoon,
    CivilDawn,
    CivilDusk,
    NauticalDawn,
    NauticalDusk,
    AstronomicalDawn,
    AstronomicalDusk,
}

impl TimeAnchor {
    pub fn is_fixed(self) -> bool {
        self == Self::Fixed
    }

    /// Minute of day of the anchor event, `None` for [`TimeAnchor::Fixed`].
    pub fn base_minute(self, times: &AstronomicalTimes) -> Option<u16> {
        let minute = match self {
            Self::Fixed => return None,
            Self::Sunrise => times.sunrise,
            Self::Sunset => times.sunset,
            Self::SolarNoon => times.solar_noon,
            Self::CivilDawn => times.civil_dawn,
            Self::CivilDusk => times.civil_dusk,
            Self::NauticalDawn => times.nautical_dawn,
            Self::NauticalDusk => times.nautical_dusk,
            Self::AstronomicalDawn => times.astronomical_dawn,
            Self::AstronomicalDusk => times.astronomical_dusk,
        };
        Some(minute)
    }

    /// Anchor event plus `offset_minutes`, wrapped into the day.
    pub fn resolve(self, offset_minutes: i16, times: &AstronomicalTimes) -> Option<u16> {
        let base = i32::from(self.base_minute(times)?);
        let day = i32::from(MINUTES_PER_DAY);
        let minute = (base + i32::from(offset_minutes)).rem_euclid(day);
        u16::try_from(minute).ok()
    }
}

/// Today's sun and moon events as minutes of local day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AstronomicalTimes {
    pub sunrise: u16,
    pub sunset: u16,
    pub solar_noon: u16,
    pub civil_dawn: u16,
    pub civil_dusk: u16,
    pub nautical_dawn: u16,
    pub nautical_dusk: u16,
    pub astronomical_dawn: u16,
    pub astronomical_dusk: u16,
    pub moonrise: Option<u16>,
    pub moonset: Option<u16>,
    /// 0.0 new moon, 0.5 full moon, back towards 1.0.
    pub moon_phase: f32,
}

impl Default for AstronomicalTimes {
    fn default() -> Self {
        Self {
            sunrise: 7 * 60,
            sunset: 18 * 60,
            solar_noon: 12 * 60 + 30,
            civil_dawn: 6 * 60 + 30,
            civil_dusk: 18 * 60 + 30,
            nautical_dawn: 6 * 60,
            nautical_dusk: 19 * 60,
            astronomical_dawn: 5 * 60 + 30,
            astronomical_dusk: 19 * 60 + 30,
            moonrise: None,
            moonset: None,
            moon_phase: 0.0,
        }
    }
}

impl AstronomicalTimes {
    pub fn validate(&self) -> ControlResult<()> {
        let events = [
            ("sunrise", Some(self.sunrise)),
            ("sunset", Some(self.sunset)),
            ("solar_noon", Some(self.solar_noon)),
            ("civil_dawn", Some(self.civil_dawn)),
            ("civil_dusk", Some(self.civil_dusk)),
            ("nautical_dawn", Some(self.nautical_dawn)),
            ("nautical_dusk", Some(self.nautical_dusk)),
            ("astronomical_dawn", Some(self.astronomical_dawn)),
            ("astronomical_dusk", Some(self.astronomical_dusk)),
            ("moonrise", self.moonrise),
            ("moonset", self.moonset),
        ];
        for (field, minute) in events {
            if let Some(minute) = minute.filter(|minute| *minute >= MINUTES_PER_DAY) {
                return Err(ControlError::validation(
                    field,
                    format!("{minute} is outside 0-{}", MINUTES_PER_DAY - 1),
                ));
            }
        }
        if !(self.moon_phase.is_finite() && (0.0..=1.0).contains(&self.moon_phase)) {
            return Err(ControlError::validation(
                "moon_phase",
                format!("{} is outside 0-1", self.moon_phase),
            ));
        }
        Ok(())
    }

    /// Whether the moon is above the horizon at `minute`. Unknown rise or set
    /// times mean it is not.
    pub fn moon_visible(&self, minute: f32) -> bool {
        let (Some(rise), Some(set)) = (self.moonrise, self.moonset) else {
            return false;
        };
        let (rise, set) = (f32::from(rise), f32::from(set));
        if rise < set {
            (rise..=set).contains(&minute)
        } else {
            minute >= rise || minute <= set
        }
    }

    /// Illuminated fraction scaled to 0-1, peaking at full moon.
    pub fn moon_brightness(&self) -> f32 {
        let waxing = if self.moon_phase > 0.5 {
            1.0 - self.moon_phase
        } else {
            self.moon_phase
        };
        waxing * 2.0
    }
}

/// Night-time moonlight layered over a dark schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoonConfig {
    pub enabled: bool,
    /// Pwm percent per channel at full moon. Missing channels stay dark.
    pub base_intensity: Vec<f32>,
    /// Scale intensity by the moon phase; otherwise every visible moon is full.
    pub phase_scaling: bool,
}

impl Default for MoonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_intensity: Vec::new(),
            phase_scaling: true,
        }
    }
}

impl MoonConfig {
    pub fn validate(&self, channels: usize) -> ControlResult<()> {
        if self.base_intensity.len() > channels {
            return Err(ControlError::validation(
                "base_intensity",
                format!(
                    "{} values for {channels} channels",
                    self.base_intensity.len()
                ),
            ));
        }
        if let Some(value) = self
            .base_intensity
            .iter()
            .find(|value| !(value.is_finite() && (0.0..=100.0).contains(*value)))
        {
            return Err(ControlError::validation(
                "base_intensity",
                format!("{value} is outside 0-100"),
            ));
        }
        Ok(())
    }

    /// Replaces `out` with moonlight when the moon is up and the schedule is
    /// dark. Returns whether moonlight was applied.
    pub fn apply(
        &self,
        times: &AstronomicalTimes,
        minute: f32,
        out: &mut [ChannelOutput],
    ) -> bool {
        if !self.enabled || !times.moon_visible(minute) {
            return false;
        }
        if out.iter().any(|channel| channel.pwm > MOON_DARK_PWM) {
            return false;
        }

        let brightness = if self.phase_scaling {
            times.moon_brightness()
        } else {
            1.0
        };
        for (channel, slot) in out.iter_mut().enumerate() {
            let pwm = self.base_intensity.get(channel).copied().unwrap_or(0.0) * brightness;
            *slot = ChannelOutput {
                pwm,
                current: pwm * MOON_CURRENT_PER_PWM,
            };
        }
        true
    }
}
