//! Stand-in engine that draws scrolling bars and plays a square wave.

use std::time::SystemTime;

use gbloop_runtime::{
    Cartridge, Engine, EngineFault, FaultKind, FrameContext,
    video::{LCD_HEIGHT, LCD_WIDTH},
};
use tracing::debug;

use crate::host::KeyScript;

const SQUARE_PERIOD: usize = 80;
const SQUARE_AMPLITUDE: i16 = 2000;
/// Where the injected fault claims to have happened.
const FAULT_ADDRESS: u16 = 0x4123;

pub struct PatternEngine {
    frame: u64,
    fault_at: Option<u64>,
    bank: u16,
    phase: usize,
    line: [u8; LCD_WIDTH],
    script: Option<KeyScript>,
}

impl PatternEngine {
    pub fn new(fault_at: Option<u64>) -> Self {
        Self {
            frame: 0,
            fault_at,
            bank: 1,
            phase: 0,
            line: [0; LCD_WIDTH],
            script: None,
        }
    }

    pub fn with_script(mut self, script: KeyScript) -> Self {
        self.script = Some(script);
        self
    }
}

impl Engine for PatternEngine {
    fn run_frame(&mut self, ctx: FrameContext<'_>) -> Result<(), EngineFault> {
        self.frame += 1;
        if let Some(script) = &self.script {
            script.advance(self.frame);
        }
        if self.fault_at == Some(self.frame) {
            return Err(EngineFault {
                kind: FaultKind::InvalidOpcode,
                address: FAULT_ADDRESS,
            });
        }

        // Held buttons shift the bars and pick the bank, so input is visible.
        let pressed = !ctx.joypad;
        self.bank = 1 + pressed.count_ones() as u16;
        let shift = self.frame as usize + usize::from(pressed);
        for y in 0..LCD_HEIGHT {
            for (x, px) in self.line.iter_mut().enumerate() {
                *px = (((x + shift) / 20 + y / 36) % 4) as u8;
            }
            ctx.lcd.draw_line(&self.line, y);
        }

        if !ctx.cart.ram().is_empty() {
            let counter = ctx.cart.ram_read(0).wrapping_add(1);
            ctx.cart.ram_write(0, counter);
        }
        Ok(())
    }

    fn render_audio(&mut self, out: &mut [i16]) {
        for frame in out.chunks_exact_mut(2) {
            let level = if self.phase < SQUARE_PERIOD / 2 {
                SQUARE_AMPLITUDE
            } else {
                -SQUARE_AMPLITUDE
            };
            frame.fill(level);
            self.phase = (self.phase + 1) % SQUARE_PERIOD;
        }
    }

    fn reset(&mut self) {
        debug!(frame = self.frame, "pattern reset");
        self.frame = 0;
        self.phase = 0;
    }

    fn set_rtc(&mut self, now: SystemTime) {
        debug!(?now, "rtc set");
    }

    fn tick_rtc(&mut self) {
        debug!("rtc tick");
    }

    fn peek(&mut self, cart: &Cartridge, addr: u16) -> u8 {
        let offset = if addr >= 0x4000 {
            u32::from(self.bank) * 0x4000 + u32::from(addr - 0x4000)
        } else {
            u32::from(addr)
        };
        cart.rom_read(offset)
    }

    fn selected_rom_bank(&self) -> u16 {
        self.bank
    }

    fn cart_mode(&self) -> u8 {
        0
    }

    fn set_interlace(&mut self, enabled: bool) {
        debug!(enabled, "interlace");
    }

    fn set_frame_skip(&mut self, enabled: bool) {
        debug!(enabled, "frame skip");
    }
}

#[cfg(test)]
mod tests {
    use gbloop_runtime::LineSink;

    use super::*;

    #[derive(Default)]
    struct Lines(usize);

    impl LineSink for Lines {
        fn draw_line(&mut self, _pixels: &[u8; LCD_WIDTH], _line: usize) {
            self.0 += 1;
        }
    }

    fn run(engine: &mut PatternEngine, cart: &mut Cartridge) -> Result<usize, EngineFault> {
        let mut lines = Lines::default();
        engine.run_frame(FrameContext {
            joypad: 0xFF,
            cart,
            lcd: &mut lines,
        })?;
        Ok(lines.0)
    }

    #[test]
    fn draws_every_line_and_counts_frames_in_ram() {
        let mut engine = PatternEngine::new(None);
        let mut cart = Cartridge::new(vec![0; 0x8000], vec![0; 4]);
        assert_eq!(run(&mut engine, &mut cart).unwrap(), LCD_HEIGHT);
        run(&mut engine, &mut cart).unwrap();
        assert_eq!(cart.ram_read(0), 2);
    }

    #[test]
    fn faults_on_the_requested_frame() {
        let mut engine = PatternEngine::new(Some(2));
        let mut cart = Cartridge::new(vec![0; 0x8000], Vec::new());
        run(&mut engine, &mut cart).unwrap();
        let fault = run(&mut engine, &mut cart).unwrap_err();
        assert_eq!(fault.kind, FaultKind::InvalidOpcode);
        assert_eq!(fault.address, FAULT_ADDRESS);
    }

    #[test]
    fn square_wave_alternates() {
        let mut engine = PatternEngine::new(None);
        let mut out = vec![0i16; SQUARE_PERIOD * 2];
        engine.render_audio(&mut out);
        assert_eq!(out[0], SQUARE_AMPLITUDE);
        assert_eq!(out[1], SQUARE_AMPLITUDE);
        assert_eq!(out[SQUARE_PERIOD], -SQUARE_AMPLITUDE);
    }
}
