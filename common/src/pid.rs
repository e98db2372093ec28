/// Discrete PID with integral anti-windup and clamped output.
///
/// `update` takes `dt` in seconds. Gains are expected to be non-negative;
/// the caller picks the error sign.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    output_min: f32,
    output_max: f32,

    integral: f32,
    previous_error: Option<f32>,
    previous_time_ms: Option<u64>,
    last_error: f32,
    last_derivative: f32,
    output: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, output_min: f32, output_max: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_min,
            output_max,
            integral: 0.0,
            previous_error: None,
            previous_time_ms: None,
            last_error: 0.0,
            last_derivative: 0.0,
            output: output_min,
        }
    }

    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        if !(dt > 0.0) || !error.is_finite() {
            return self.output;
        }

        if self.ki > 0.0 {
            let limit = self.integral_limit();
            self.integral = (self.integral + error * dt).clamp(-limit, limit);
        }

        let derivative = match self.previous_error {
            Some(previous) => (error - previous) / dt,
            None => 0.0,
        };

        let raw = self.kp * error + self.ki * self.integral + self.kd * derivative;
        self.output = raw.clamp(self.output_min, self.output_max);
        self.previous_error = Some(error);
        self.last_error = error;
        self.last_derivative = derivative;
        self.output
    }

    /// Time-stamped variant of [`update`](Self::update). The first call only
    /// records the timestamp.
    pub fn compute(&mut self, error: f32, now_ms: u64) -> f32 {
        let Some(previous) = self.previous_time_ms else {
            self.previous_time_ms = Some(now_ms);
            self.last_error = error;
            return self.output;
        };
        if now_ms <= previous {
            return self.output;
        }
        self.previous_time_ms = Some(now_ms);
        let dt = (now_ms - previous) as f32 / 1_000.0;
        self.update(error, dt)
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
        self.previous_time_ms = None;
        self.last_error = 0.0;
        self.last_derivative = 0.0;
        self.output = self.output_min;
    }

    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        if ki > 0.0 {
            let limit = self.integral_limit();
            self.integral = self.integral.clamp(-limit, limit);
        } else {
            self.integral = 0.0;
        }
    }

    /// Ignored when `min > max`.
    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        if min > max {
            return;
        }
        self.output_min = min;
        self.output_max = max;
        self.output = self.output.clamp(min, max);
        if self.ki > 0.0 {
            let limit = self.integral_limit();
            self.integral = self.integral.clamp(-limit, limit);
        }
    }

    pub fn tunings(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    pub fn output_limits(&self) -> (f32, f32) {
        (self.output_min, self.output_max)
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn last_error(&self) -> f32 {
        self.last_error
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn derivative(&self) -> f32 {
        self.last_derivative
    }

    fn integral_limit(&self) -> f32 {
        (self.output_max - self.output_min) / self.ki
    }
}
