use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    astro::{AstronomicalTimes, TimeAnchor},
    error::{ControlError, ControlResult},
    presets::{self, BUILTIN_PRESETS},
};

pub const MINUTES_PER_DAY: u16 = 24 * 60;
pub const MAX_PWM_PERCENT: f32 = 100.0;
pub const MAX_CURRENT_A: f32 = 5.0;
/// Largest offset a dynamic point may sit from its anchor event.
pub const MAX_OFFSET_MINUTES: i16 = MINUTES_PER_DAY as i16 - 1;

/// A schedule point. Fixed points sit at `timepoint`; dynamic points sit
/// `offset_minutes` from a sun event and carry `timepoint` 0 until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePoint {
    #[serde(default)]
    pub timepoint: u16,
    #[serde(default, rename = "timeType")]
    pub anchor: TimeAnchor,
    #[serde(default, rename = "offsetMinutes")]
    pub offset_minutes: i16,
    #[serde(rename = "pwmValues")]
    pub pwm_values: Vec<f32>,
    #[serde(rename = "currentValues")]
    pub current_values: Vec<f32>,
}

impl SchedulePoint {
    pub fn new(timepoint: u16, pwm_values: Vec<f32>, current_values: Vec<f32>) -> Self {
        Self {
            timepoint,
            anchor: TimeAnchor::Fixed,
            offset_minutes: 0,
            pwm_values,
            current_values,
        }
    }

    /// Point `offset_minutes` after (or before, if negative) `anchor`.
    pub fn dynamic(
        anchor: TimeAnchor,
        offset_minutes: i16,
        pwm_values: Vec<f32>,
        current_values: Vec<f32>,
    ) -> Self {
        Self {
            timepoint: 0,
            anchor,
            offset_minutes,
            pwm_values,
            current_values,
        }
    }

    /// Same pwm and current on every channel.
    pub fn uniform(timepoint: u16, channels: usize, pwm: f32, current: f32) -> Self {
        Self::new(timepoint, vec![pwm; channels], vec![current; channels])
    }

    pub fn is_dynamic(&self) -> bool {
        !self.anchor.is_fixed()
    }

    /// Store identity: fixed points by minute, dynamic points by anchor and offset.
    pub fn key(&self) -> (TimeAnchor, i32) {
        if self.is_dynamic() {
            (self.anchor, i32::from(self.offset_minutes))
        } else {
            (TimeAnchor::Fixed, i32::from(self.timepoint))
        }
    }

    /// Minute of day this point applies at under `times`.
    pub fn resolved_minute(&self, times: &AstronomicalTimes) -> u16 {
        self.anchor
            .resolve(self.offset_minutes, times)
            .unwrap_or(self.timepoint)
    }

    pub fn validate(&self, channels: usize) -> ControlResult<()> {
        if self.is_dynamic() {
            if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&self.offset_minutes) {
                return Err(ControlError::validation(
                    "offset_minutes",
                    format!(
                        "{} is outside -{MAX_OFFSET_MINUTES}-{MAX_OFFSET_MINUTES}",
                        self.offset_minutes
                    ),
                ));
            }
        } else if self.timepoint >= MINUTES_PER_DAY {
            return Err(ControlError::validation(
                "timepoint",
                format!("{} is outside 0-{}", self.timepoint, MINUTES_PER_DAY - 1),
            ));
        }
        if self.pwm_values.len() != channels {
            return Err(ControlError::validation(
                "pwm_values",
                format!("expected {channels} values, got {}", self.pwm_values.len()),
            ));
        }
        if self.current_values.len() != channels {
            return Err(ControlError::validation(
                "current_values",
                format!(
                    "expected {channels} values, got {}",
                    self.current_values.len()
                ),
            ));
        }
        if let Some((channel, pwm)) = find_out_of_range(&self.pwm_values, MAX_PWM_PERCENT) {
            return Err(ControlError::validation(
                "pwm_values",
                format!("channel {channel}: {pwm} is outside 0-{MAX_PWM_PERCENT}"),
            ));
        }
        if let Some((channel, current)) = find_out_of_range(&self.current_values, MAX_CURRENT_A)
        {
            return Err(ControlError::validation(
                "current_values",
                format!("channel {channel}: {current} is outside 0-{MAX_CURRENT_A}"),
            ));
        }
        Ok(())
    }

    /// Drops the field the point's anchor does not use.
    fn canonical(mut self) -> Self {
        if self.is_dynamic() {
            self.timepoint = 0;
        } else {
            self.offset_minutes = 0;
        }
        self
    }
}

fn find_out_of_range(values: &[f32], max: f32) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|(_, value)| !value.is_finite() || !(0.0..=max).contains(value))
}

/// Wire form of the store for JSON export and import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleDocument {
    pub channels: usize,
    pub points: Vec<SchedulePoint>,
    #[serde(default)]
    pub presets: BTreeMap<String, Vec<SchedulePoint>>,
}

/// Active schedule points plus named presets for a fixed channel count.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    channels: usize,
    points: Vec<SchedulePoint>,
    presets: BTreeMap<String, Vec<SchedulePoint>>,
}

impl ScheduleStore {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            points: Vec::new(),
            presets: BTreeMap::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Active points in key order: fixed points by timepoint, then dynamic
    /// points by anchor and offset.
    pub fn points(&self) -> &[SchedulePoint] {
        &self.points
    }

    pub fn has_dynamic_points(&self) -> bool {
        self.points.iter().any(SchedulePoint::is_dynamic)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, timepoint: u16) -> Option<&SchedulePoint> {
        self.find((TimeAnchor::Fixed, i32::from(timepoint)))
    }

    pub fn dynamic_point(&self, anchor: TimeAnchor, offset_minutes: i16) -> Option<&SchedulePoint> {
        if anchor.is_fixed() {
            return None;
        }
        self.find((anchor, i32::from(offset_minutes)))
    }

    fn find(&self, key: (TimeAnchor, i32)) -> Option<&SchedulePoint> {
        self.points
            .binary_search_by_key(&key, SchedulePoint::key)
            .ok()
            .map(|index| &self.points[index])
    }

    pub fn set_point(
        &mut self,
        timepoint: u16,
        pwm_values: Vec<f32>,
        current_values: Vec<f32>,
    ) -> ControlResult<()> {
        let point = SchedulePoint::new(timepoint, pwm_values, current_values);
        point.validate(self.channels)?;
        insert_sorted(&mut self.points, point);
        Ok(())
    }

    /// Adds or overwrites the point at `offset_minutes` from `anchor`.
    pub fn set_dynamic_point(
        &mut self,
        anchor: TimeAnchor,
        offset_minutes: i16,
        pwm_values: Vec<f32>,
        current_values: Vec<f32>,
    ) -> ControlResult<()> {
        if anchor.is_fixed() {
            return Err(ControlError::validation(
                "time_type",
                "dynamic points need a sun event anchor",
            ));
        }
        let point = SchedulePoint::dynamic(anchor, offset_minutes, pwm_values, current_values);
        point.validate(self.channels)?;
        insert_sorted(&mut self.points, point);
        Ok(())
    }

    pub fn remove_point(&mut self, timepoint: u16) -> bool {
        self.remove((TimeAnchor::Fixed, i32::from(timepoint)))
    }

    pub fn remove_dynamic_point(&mut self, anchor: TimeAnchor, offset_minutes: i16) -> bool {
        !anchor.is_fixed() && self.remove((anchor, i32::from(offset_minutes)))
    }

    fn remove(&mut self, key: (TimeAnchor, i32)) -> bool {
        match self.points.binary_search_by_key(&key, SchedulePoint::key) {
            Ok(index) => {
                self.points.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Replaces the active set with `points`; nothing changes if any point is invalid.
    pub fn replace_points(&mut self, points: Vec<SchedulePoint>) -> ControlResult<()> {
        self.points = self.normalize(points)?;
        Ok(())
    }

    pub fn load_preset(&mut self, name: &str) -> ControlResult<()> {
        let points = match presets::builtin(name, self.channels) {
            Some(points) => self.normalize(points)?,
            None => self
                .presets
                .get(name)
                .cloned()
                .ok_or_else(|| ControlError::NotFound(name.to_string()))?,
        };
        self.points = points;
        Ok(())
    }

    pub fn save_preset(&mut self, name: &str) -> ControlResult<()> {
        validate_preset_name(name)?;
        self.presets.insert(name.to_string(), self.points.clone());
        Ok(())
    }

    pub fn insert_preset(&mut self, name: &str, points: Vec<SchedulePoint>) -> ControlResult<()> {
        validate_preset_name(name)?;
        let points = self.normalize(points)?;
        self.presets.insert(name.to_string(), points);
        Ok(())
    }

    pub fn delete_preset(&mut self, name: &str) -> ControlResult<()> {
        if BUILTIN_PRESETS.contains(&name) {
            return Err(ControlError::validation(
                "preset_name",
                format!("'{name}' is a built-in preset"),
            ));
        }
        self.presets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ControlError::NotFound(name.to_string()))
    }

    pub fn preset(&self, name: &str) -> Option<&[SchedulePoint]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    pub fn preset_names(&self) -> Vec<String> {
        BUILTIN_PRESETS
            .iter()
            .map(|name| name.to_string())
            .chain(self.presets.keys().cloned())
            .collect()
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ScheduleDocument {
            channels: self.channels,
            points: self.points.clone(),
            presets: self.presets.clone(),
        })
    }

    /// Replaces points and custom presets from an exported document.
    pub fn import_json(&mut self, raw: &str) -> ControlResult<()> {
        let document: ScheduleDocument = serde_json::from_str(raw)
            .map_err(|err| ControlError::validation("schedule_json", err.to_string()))?;
        if document.channels != self.channels {
            return Err(ControlError::validation(
                "schedule_json",
                format!(
                    "document has {} channels, controller has {}",
                    document.channels, self.channels
                ),
            ));
        }

        let points = self.normalize(document.points)?;
        let mut presets = BTreeMap::new();
        for (name, preset_points) in document.presets {
            validate_preset_name(&name)?;
            let normalized = self.normalize(preset_points)?;
            presets.insert(name, normalized);
        }

        self.points = points;
        self.presets = presets;
        Ok(())
    }

    /// Writes the active points into `out` with every dynamic point moved to
    /// its minute under `times`, sorted by minute for interpolation. Points
    /// that land on the same minute keep key order.
    pub fn resolve_into(&self, times: &AstronomicalTimes, out: &mut Vec<SchedulePoint>) {
        out.clear();
        out.extend(self.points.iter().map(|point| SchedulePoint {
            timepoint: point.resolved_minute(times),
            ..point.clone()
        }));
        out.sort_by_key(|point| point.timepoint);
    }

    /// Validates every point and collapses duplicate keys, last one wins.
    fn normalize(&self, points: Vec<SchedulePoint>) -> ControlResult<Vec<SchedulePoint>> {
        let mut normalized = Vec::with_capacity(points.len());
        for point in points {
            point.validate(self.channels)?;
            insert_sorted(&mut normalized, point.canonical());
        }
        Ok(normalized)
    }
}

fn insert_sorted(points: &mut Vec<SchedulePoint>, point: SchedulePoint) {
    match points.binary_search_by_key(&point.key(), SchedulePoint::key) {
        Ok(index) => points[index] = point,
        Err(index) => points.insert(index, point),
    }
}

fn validate_preset_name(name: &str) -> ControlResult<()> {
    if name.trim().is_empty() {
        return Err(ControlError::validation("preset_name", "cannot be empty"));
    }
    if BUILTIN_PRESETS.contains(&name) {
        return Err(ControlError::validation(
            "preset_name",
            format!("'{name}' is reserved for a built-in preset"),
        ));
    }
    Ok(())
}
