/// Fixed-step simulation clock
///
/// Frame time is added to an accumulator which is drained in whole steps;
/// the remainder carries over to the next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTimestep {
    step: f32,
    accumulated: f32,
    elapsed: f64,
}

impl FixedTimestep {
    /// Largest frame time fed to the accumulator
    pub const MAX_FRAME_TIME: f32 = 0.25;

    pub fn new(step: f32) -> Self {
        Self {
            step: step.max(f32::EPSILON),
            accumulated: 0.0,
            elapsed: 0.0,
        }
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Simulation time advanced so far, in seconds
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Time left in the accumulator after the last [`advance`](Self::advance)
    pub fn remainder(&self) -> f32 {
        self.accumulated
    }

    /// Adds `frame_time` and returns how many fixed steps are due.
    pub fn advance(&mut self, frame_time: f32) -> u32 {
        self.accumulated += frame_time.clamp(0.0, Self::MAX_FRAME_TIME);

        let mut steps = 0;
        while self.accumulated >= self.step {
            self.accumulated -= self.step;
            self.elapsed += f64::from(self.step);
            steps += 1;
        }
        steps
    }
}
