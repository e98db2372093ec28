use crate::{
    schedule::{SchedulePoint, MINUTES_PER_DAY},
    types::ChannelOutput,
};

const DAY: f32 = MINUTES_PER_DAY as f32;

/// Writes the channel levels for `minute` (fractional minute of day) into `out`.
///
/// Points must be sorted by timepoint. The schedule is circular: between the
/// last point of the day and the first point of the next day levels are
/// blended across midnight. An empty schedule yields all channels off.
/// Channels beyond a point's value count are driven off.
pub fn interpolate_into(points: &[SchedulePoint], minute: f32, out: &mut [ChannelOutput]) {
    let Some(first) = points.first() else {
        out.fill(ChannelOutput::OFF);
        return;
    };
    let minute = if minute.is_finite() {
        minute.rem_euclid(DAY)
    } else {
        0.0
    };

    if points.len() == 1 {
        copy_point(first, out);
        return;
    }

    let next = points.partition_point(|point| f32::from(point.timepoint) <= minute);
    let before = if next == 0 {
        &points[points.len() - 1]
    } else {
        &points[next - 1]
    };
    let after = points.get(next).unwrap_or(first);

    let start = f32::from(before.timepoint);
    if minute == start {
        copy_point(before, out);
        return;
    }

    let span = (f32::from(after.timepoint) - start).rem_euclid(DAY);
    let elapsed = (minute - start).rem_euclid(DAY);
    let ratio = if span > 0.0 {
        (elapsed / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    for (channel, slot) in out.iter_mut().enumerate() {
        *slot = ChannelOutput {
            pwm: lerp(value(&before.pwm_values, channel), value(&after.pwm_values, channel), ratio),
            current: lerp(
                value(&before.current_values, channel),
                value(&after.current_values, channel),
                ratio,
            ),
        };
    }
}

/// Allocating convenience over [`interpolate_into`].
pub fn interpolate(points: &[SchedulePoint], minute: f32, channels: usize) -> Vec<ChannelOutput> {
    let mut out = vec![ChannelOutput::OFF; channels];
    interpolate_into(points, minute, &mut out);
    out
}

fn copy_point(point: &SchedulePoint, out: &mut [ChannelOutput]) {
    for (channel, slot) in out.iter_mut().enumerate() {
        *slot = ChannelOutput {
            pwm: value(&point.pwm_values, channel),
            current: value(&point.current_values, channel),
        };
    }
}

fn value(values: &[f32], channel: usize) -> f32 {
    values.get(channel).copied().unwrap_or_default()
}

fn lerp(from: f32, to: f32, ratio: f32) -> f32 {
    from + (to - from) * ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn day_schedule() -> Vec<SchedulePoint> {
        vec![
            SchedulePoint::uniform(6 * 60, 2, 0.0, 0.0),
            SchedulePoint::uniform(12 * 60, 2, 100.0, 2.0),
            SchedulePoint::uniform(18 * 60, 2, 0.0, 0.0),
        ]
    }

    #[test]
    fn empty_schedule_turns_everything_off() {
        let mut out = [ChannelOutput {
            pwm: 50.0,
            current: 1.0,
        }; 3];

        interpolate_into(&[], 600.0, &mut out);

        assert_eq!(out, [ChannelOutput::OFF; 3]);
    }

    #[test]
    fn single_point_holds_all_day() {
        let points = vec![SchedulePoint::new(600, vec![42.0], vec![0.7])];

        for minute in [0.0, 599.9, 600.0, 1439.0] {
            let out = interpolate(&points, minute, 1);
            assert_eq!(out[0].pwm, 42.0);
            assert_eq!(out[0].current, 0.7);
        }
    }

    #[test]
    fn exact_timepoint_returns_point_values() {
        let out = interpolate(&day_schedule(), 720.0, 2);

        assert_eq!(out[0].pwm, 100.0);
        assert_eq!(out[1].current, 2.0);
    }

    #[test]
    fn midpoint_is_linear() {
        let out = interpolate(&day_schedule(), 9.0 * 60.0, 2);

        assert!(close(out[0].pwm, 50.0));
        assert!(close(out[0].current, 1.0));
    }

    #[test]
    fn fractional_minutes_blend_smoothly() {
        let points = vec![
            SchedulePoint::uniform(0, 1, 0.0, 0.0),
            SchedulePoint::uniform(10, 1, 100.0, 1.0),
        ];

        let out = interpolate(&points, 2.5, 1);

        assert!(close(out[0].pwm, 25.0));
    }

    #[test]
    fn wraps_across_midnight() {
        let points = vec![
            SchedulePoint::uniform(10, 1, 10.0, 0.1),
            SchedulePoint::uniform(23 * 60 + 50, 1, 90.0, 0.9),
        ];

        let at_midnight = interpolate(&points, 0.0, 1);
        let late = interpolate(&points, 23.0 * 60.0 + 55.0, 1);

        assert!(close(at_midnight[0].pwm, 50.0));
        assert!(close(at_midnight[0].current, 0.5));
        assert!(close(late[0].pwm, 70.0));
    }

    #[test]
    fn monotonic_between_rising_points() {
        let points = day_schedule();
        let mut previous = interpolate(&points, 360.0, 2)[0].pwm;

        for step in 1..=720 {
            let minute = 360.0 + step as f32 * 0.5;
            let out = interpolate(&points, minute, 2);
            assert!(out[0].pwm > previous, "not rising at minute {minute}");
            previous = out[0].pwm;
        }
        assert_eq!(previous, 100.0);
    }

    #[test]
    fn constant_between_equal_points() {
        let points = vec![
            SchedulePoint::uniform(5 * 60, 1, 10.0, 0.2),
            SchedulePoint::uniform(10 * 60, 1, 40.0, 0.8),
            SchedulePoint::uniform(15 * 60, 1, 40.0, 0.8),
        ];

        for step in 0..=1200 {
            let minute = 600.0 + step as f32 * 0.25;
            let out = interpolate(&points, minute, 1);
            assert_eq!(out[0].pwm, 40.0, "moved at minute {minute}");
            assert_eq!(out[0].current, 0.8);
        }
    }

    #[test]
    fn output_never_leaves_bracketing_range() {
        let points = day_schedule();

        for minute in 0..1440 {
            let out = interpolate(&points, minute as f32, 2);
            assert!((0.0..=100.0).contains(&out[0].pwm));
            assert!((0.0..=2.0).contains(&out[1].current));
        }
    }

    #[test]
    fn out_of_range_minute_wraps_into_day() {
        let points = day_schedule();

        let wrapped = interpolate(&points, 1440.0 + 720.0, 2);

        assert_eq!(wrapped[0].pwm, 100.0);
    }
}
