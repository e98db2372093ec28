//! Built-in lighting presets. Tables are authored for eight channels; larger
//! channel counts repeat the last entry, smaller ones truncate.

use crate::{astro::TimeAnchor, schedule::SchedulePoint};

pub const SUNRISE_SUNSET: &str = "sunrise_sunset";
pub const FULL_SPECTRUM: &str = "full_spectrum";
pub const SIMPLE: &str = "simple";
pub const DYNAMIC_SUNRISE_SUNSET: &str = "dynamic_sunrise_sunset";

pub const BUILTIN_PRESETS: [&str; 4] =
    [SUNRISE_SUNSET, FULL_SPECTRUM, SIMPLE, DYNAMIC_SUNRISE_SUNSET];

/// Ramp that follows the sun: anchor, offset, pwm, current on every channel.
const DYNAMIC_TABLE: [(TimeAnchor, i16, f32, f32); 7] = [
    (TimeAnchor::Sunrise, -30, 5.0, 0.1),
    (TimeAnchor::Sunrise, 0, 20.0, 0.3),
    (TimeAnchor::Sunrise, 30, 50.0, 1.0),
    (TimeAnchor::SolarNoon, 0, 85.0, 1.8),
    (TimeAnchor::Sunset, -30, 50.0, 1.0),
    (TimeAnchor::Sunset, 0, 20.0, 0.3),
    (TimeAnchor::Sunset, 30, 5.0, 0.1),
];

const FULL_SPECTRUM_TABLE: [(u16, [f32; 8], [f32; 8]); 4] = [
    (
        8 * 60,
        [40.0, 60.0, 80.0, 100.0, 80.0, 60.0, 40.0, 20.0],
        [0.6, 1.0, 1.5, 2.0, 1.5, 1.0, 0.6, 0.3],
    ),
    (
        12 * 60,
        [80.0, 100.0, 100.0, 100.0, 100.0, 100.0, 80.0, 60.0],
        [1.5, 2.0, 2.0, 2.0, 2.0, 2.0, 1.5, 1.0],
    ),
    (
        16 * 60,
        [60.0, 80.0, 100.0, 100.0, 80.0, 60.0, 40.0, 30.0],
        [1.0, 1.5, 2.0, 2.0, 1.5, 1.0, 0.6, 0.4],
    ),
    (
        20 * 60,
        [20.0, 30.0, 40.0, 60.0, 40.0, 30.0, 20.0, 10.0],
        [0.3, 0.4, 0.6, 1.0, 0.6, 0.4, 0.3, 0.1],
    ),
];

/// Points for a built-in preset, or `None` if `name` is not built in.
pub fn builtin(name: &str, channels: usize) -> Option<Vec<SchedulePoint>> {
    let points = match name {
        SUNRISE_SUNSET => vec![
            SchedulePoint::uniform(7 * 60, channels, 20.0, 0.3),
            SchedulePoint::uniform(12 * 60, channels, 85.0, 1.8),
            SchedulePoint::uniform(17 * 60, channels, 15.0, 0.2),
            SchedulePoint::uniform(18 * 60, channels, 0.0, 0.0),
        ],
        FULL_SPECTRUM => FULL_SPECTRUM_TABLE
            .iter()
            .map(|(timepoint, pwm, current)| {
                SchedulePoint::new(
                    *timepoint,
                    fit_channels(pwm, channels),
                    fit_channels(current, channels),
                )
            })
            .collect(),
        SIMPLE => vec![
            SchedulePoint::uniform(8 * 60, channels, 70.0, 1.2),
            SchedulePoint::uniform(20 * 60, channels, 0.0, 0.0),
        ],
        DYNAMIC_SUNRISE_SUNSET => DYNAMIC_TABLE
            .iter()
            .map(|(anchor, offset, pwm, current)| {
                SchedulePoint::dynamic(
                    *anchor,
                    *offset,
                    vec![*pwm; channels],
                    vec![*current; channels],
                )
            })
            .collect(),
        _ => return None,
    };
    Some(points)
}

fn fit_channels(values: &[f32], channels: usize) -> Vec<f32> {
    let mut fitted: Vec<f32> = values.iter().copied().take(channels).collect();
    let fill = values.last().copied().unwrap_or_default();
    fitted.resize(channels, fill);
    fitted
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::astro::AstronomicalTimes;

    #[test]
    fn every_builtin_is_valid_for_any_channel_count() {
        for channels in [1, 4, 8, 16] {
            for name in BUILTIN_PRESETS {
                let points = builtin(name, channels).unwrap();
                assert!(!points.is_empty(), "{name} has no points");
                for point in &points {
                    point.validate(channels).unwrap();
                }
                let mut keys: Vec<_> = points.iter().map(SchedulePoint::key).collect();
                keys.sort();
                keys.dedup();
                assert_eq!(keys.len(), points.len(), "{name} repeats a point");
            }
        }
    }

    #[test]
    fn dynamic_preset_follows_the_sun() {
        let times = AstronomicalTimes {
            sunrise: 6 * 60,
            sunset: 20 * 60,
            solar_noon: 13 * 60,
            ..AstronomicalTimes::default()
        };
        let points = builtin(DYNAMIC_SUNRISE_SUNSET, 2).unwrap();

        let minutes: Vec<u16> = points.iter().map(|p| p.resolved_minute(&times)).collect();

        assert_eq!(minutes, vec![330, 360, 390, 780, 1170, 1200, 1230]);
        assert_eq!(points[3].pwm_values, vec![85.0, 85.0]);
    }

    #[test]
    fn full_spectrum_extends_with_last_value() {
        let points = builtin(FULL_SPECTRUM, 10).unwrap();

        assert_eq!(points[0].pwm_values[7..], [20.0, 20.0, 20.0]);
        assert_eq!(points[3].current_values[9], 0.1);
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(builtin("moonlight", 8).is_none());
    }
}
