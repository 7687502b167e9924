use crate::chip8::Chip8;
use crate::types::{AudioSignal, Chip8Error, IllegalOpcode};
use crate::u4;

pub const CPU_HZ: f32 = 500.0;
pub const TIMER_HZ: f32 = 60.0;

const CPU_TIME_STEP: f32 = 1.0 / CPU_HZ;
const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// High-level emulator runner that manages timing internally.
///
/// The machine itself never measures time; this wrapper turns wall-clock
/// delta time into the two fixed cadences (CPU steps and 60Hz timer ticks).
pub struct Chip8Runner {
    chip8: Chip8,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

/// Observable effects aggregated over one `update` call.
#[derive(Debug, Default)]
pub struct RunnerUpdate {
    /// Most recent audio edge produced during the update, if any.
    pub audio: Option<AudioSignal>,
    /// Illegal opcode reports for the diagnostics sink.
    pub illegal_opcodes: Vec<IllegalOpcode>,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self {
            chip8,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU steps and timer ticks as the elapsed time `dt` calls
    /// for. Stops stepping early after a draw so the frame can be presented.
    pub fn update(&mut self, dt: f32) -> Result<RunnerUpdate, Chip8Error> {
        let mut update = RunnerUpdate::default();

        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        while self.timer_dt_accumulator >= TIMER_TIME_STEP {
            self.timer_dt_accumulator -= TIMER_TIME_STEP;
            if let Some(signal) = self.chip8.tick_timers() {
                update.audio = Some(signal);
            }
        }

        while self.cpu_dt_accumulator >= CPU_TIME_STEP {
            self.cpu_dt_accumulator -= CPU_TIME_STEP;

            let effects = self.chip8.step()?;

            if let Some(signal) = effects.audio {
                update.audio = Some(signal);
            }
            if let Some(report) = effects.illegal_opcode {
                update.illegal_opcodes.push(report);
            }
            if effects.redraw {
                // Stop stepping until the frame is presented. Clearing the
                // accumulator avoids "catching up" in the next frame.
                self.cpu_dt_accumulator = 0.0;
                break;
            }
        }

        Ok(update)
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_runs_timer_ticks_for_elapsed_time() {
        let mut chip8 = Chip8::new();
        chip8.delay_timer = 10;
        let mut runner = Chip8Runner::new(chip8);

        // Zeroed memory decodes to native-routine no-ops, so the CPU loop
        // just advances PC while the timers tick three times.
        runner.update(3.5 * TIMER_TIME_STEP).unwrap();

        assert_eq!(runner.chip8.delay_timer, 7);
    }

    #[test]
    fn update_collects_illegal_opcode_reports() {
        let mut chip8 = Chip8::new();
        chip8.load(&[0x51, 0x23]).unwrap();
        let mut runner = Chip8Runner::new(chip8);

        let update = runner.update(CPU_TIME_STEP).unwrap();

        assert_eq!(update.illegal_opcodes.len(), 1);
        assert_eq!(update.illegal_opcodes[0].opcode, 0x5123);
    }

    #[test]
    fn update_stops_stepping_after_a_draw() {
        let mut chip8 = Chip8::new();
        // Draw a one-row sprite, then loop forever
        chip8.load(&[0xD0, 0x11, 0x12, 0x02]).unwrap();
        chip8.i = 0x300;
        chip8.memory[0x300] = 0x80;
        let mut runner = Chip8Runner::new(chip8);

        runner.update(10.0 * CPU_TIME_STEP).unwrap();

        // The draw ran, the jump after it did not
        assert!(runner.get_display_pixel(0, 0));
        assert_eq!(runner.chip8.pc, 0x202);
    }
}
