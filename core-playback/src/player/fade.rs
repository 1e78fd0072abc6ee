//! Linear volume ramps.

/// A linear ramp from one nominal volume to another in equal steps.
///
/// Step `0` is the starting volume; step `steps` is exactly the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    pub from: f32,
    pub to: f32,
    pub steps: u32,
}

impl FadeRamp {
    pub fn new(from: f32, to: f32, steps: u32) -> Self {
        Self {
            from,
            to,
            steps: steps.max(1),
        }
    }

    /// Volume after `step` steps.
    pub fn volume_at(&self, step: u32) -> f32 {
        if step >= self.steps {
            return self.to;
        }
        self.from + (self.to - self.from) * step as f32 / self.steps as f32
    }

    pub fn is_last(&self, step: u32) -> bool {
        step >= self.steps
    }
}
