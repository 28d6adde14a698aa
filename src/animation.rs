pub const SCROLL_SEPARATOR: &str = "  •  ";
pub const SCROLL_PAUSE_TICKS: u32 = 30;
pub const SCROLL_STEP_TICKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: usize,
    pub pause: u32,
    pub tick: u32,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            pause: SCROLL_PAUSE_TICKS,
            tick: 0,
        }
    }
}

impl ScrollState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn advance(&mut self, longest: usize, width: usize) {
        if longest <= width {
            return;
        }

        self.tick = self.tick.wrapping_add(1);
        if self.pause > 0 {
            self.pause -= 1;
            return;
        }
        if self.tick % SCROLL_STEP_TICKS != 0 {
            return;
        }

        self.offset += 1;
        if self.offset >= longest + SCROLL_SEPARATOR.chars().count() {
            self.offset = 0;
            self.pause = SCROLL_PAUSE_TICKS;
        }
    }
}

pub fn scroll_text(text: &str, max: usize, offset: usize) -> String {
    let looped: Vec<char> = text.chars().chain(SCROLL_SEPARATOR.chars()).collect();
    let start = offset % looped.len();
    looped.iter().cycle().skip(start).take(max).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationState {
    pub frame: usize,
    /// Fractional frames not yet shown.
    pub accumulator: f64,
}

impl RotationState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advances by `dt_secs` at `rpm`. Returns `true` when the frame index moved.
    pub fn advance(&mut self, rpm: f64, frame_count: usize, dt_secs: f64) -> bool {
        if frame_count == 0 || !(rpm > 0.0) || !(dt_secs > 0.0) {
            return false;
        }

        self.accumulator += rpm * frame_count as f64 * dt_secs / 60.0;
        if self.accumulator < 1.0 {
            return false;
        }

        let whole = self.accumulator.floor();
        self.accumulator -= whole;
        let steps = (whole % frame_count as f64) as usize;
        self.frame = (self.frame + steps) % frame_count;
        true
    }
}
