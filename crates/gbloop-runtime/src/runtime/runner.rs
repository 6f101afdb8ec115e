use std::{path::PathBuf, sync::Arc, time::SystemTime};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, Options},
    engine::{self, Cartridge, Engine, EngineFault, FrameContext},
    input::Hotkeys,
    platform::{Clock, Dialogs},
    save,
    video::{Compositor, DisplaySurface, ScrollCommand},
};

use super::{
    FaultReport, RuntimeError, RuntimeNotification, SessionSummary,
    lifecycle::{AudioOutput, InputPoller, WorkerState},
    pacing::{self, DelayMeter, FramePacer},
};

/// Frames between two automatic save commits (about a minute).
pub const AUTOSAVE_FRAMES: u32 = 3600;
/// Delay after a power event before the RTC is re-synchronized.
const RTC_RESYNC_DELAY_MS: u64 = 500;
/// Frames per manual RTC tick.
pub const RTC_TICK_FRAMES: u32 = 60;

/// Rising-edge detector over the hotkey mask.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HotkeyEdges {
    previous: Hotkeys,
}

impl HotkeyEdges {
    /// Hotkeys that are held now but were not on the previous call.
    pub(crate) fn update(&mut self, current: Hotkeys) -> Hotkeys {
        let pressed = current & !self.previous;
        self.previous = current;
        pressed
    }
}

enum LoopExit {
    /// The user confirmed quitting.
    Quit,
    /// The frame limit of a bounded run was reached.
    FrameLimit,
}

pub(crate) struct Runner<E, S> {
    engine: E,
    cart: Cartridge,
    compositor: Compositor<S>,
    clock: Arc<dyn Clock>,
    dialogs: Box<dyn Dialogs>,
    input: InputPoller,
    audio: AudioOutput,
    notify_rx: Receiver<RuntimeNotification>,
    options: Options,
    save_path: PathBuf,
    pacer: FramePacer,
    delay: Option<DelayMeter>,
    edges: HotkeyEdges,
    autosave_counter: u32,
    power_event_at: Option<u64>,
    rtc_counter: u32,
    audio_buf: Vec<i16>,
    frames: u64,
    frame_limit: Option<u64>,
}

impl<E: Engine, S: DisplaySurface> Runner<E, S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: &Config,
        engine: E,
        cart: Cartridge,
        compositor: Compositor<S>,
        clock: Arc<dyn Clock>,
        dialogs: Box<dyn Dialogs>,
        input: InputPoller,
        audio: AudioOutput,
        notify_rx: Receiver<RuntimeNotification>,
        save_path: PathBuf,
    ) -> Self {
        let options = config.options.clone();
        let audio_buf = vec![0; audio.format().chunk_samples()];
        Self {
            engine,
            cart,
            compositor,
            clock,
            dialogs,
            input,
            audio,
            notify_rx,
            pacer: FramePacer::new(
                options.button_hold_compensation_num,
                options.button_hold_compensation_denom,
            ),
            delay: config.debug.show_delay_factor.then(DelayMeter::default),
            options,
            save_path,
            edges: HotkeyEdges::default(),
            autosave_counter: 0,
            power_event_at: None,
            rtc_counter: 0,
            audio_buf,
            frames: 0,
            frame_limit: None,
        }
    }

    pub(crate) fn set_frame_limit(&mut self, limit: Option<u64>) {
        self.frame_limit = limit;
    }

    pub(crate) fn run(&mut self) -> Result<SessionSummary, RuntimeError> {
        self.start()?;
        match self.run_loop() {
            Ok(exit) => {
                match exit {
                    LoopExit::Quit => info!(frames = self.frames, "quit confirmed"),
                    LoopExit::FrameLimit => info!(frames = self.frames, "frame limit reached"),
                }
                self.finish()
            }
            Err(err) => {
                self.input.end();
                self.audio.end();
                Err(err)
            }
        }
    }

    fn start(&mut self) -> Result<(), RuntimeError> {
        self.engine.set_rtc(SystemTime::now());
        self.engine.set_interlace(self.options.interlace);
        self.engine.set_frame_skip(self.options.half_refresh);

        if self.options.enable_audio {
            self.audio.begin();
        }
        if let Err(err) = self.input.begin() {
            self.audio.end();
            return Err(err);
        }

        info!(
            presenter = ?self.compositor.presenter_kind(),
            audio = self.audio.is_on(),
            mode = ?self.options.multi_press_mode,
            "session started"
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<SessionSummary, RuntimeError> {
        self.input.end();
        let saved = save::write_save(&self.save_path, self.cart.ram());
        self.audio.end();
        saved?;

        info!(frames = self.frames, "session finished");
        Ok(SessionSummary {
            frames: self.frames,
        })
    }

    fn run_loop(&mut self) -> Result<LoopExit, RuntimeError> {
        loop {
            if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
                return Ok(LoopExit::FrameLimit);
            }

            self.drain_notifications();
            self.handle_power_event();

            let start = self.clock.ticks();
            let held = self.input.held().snapshot();
            let pressed = self.edges.update(held.hotkeys);

            if pressed.contains(Hotkeys::QUIT) {
                if self.confirm_quit()? {
                    return Ok(LoopExit::Quit);
                }
                continue;
            }

            if pressed.contains(Hotkeys::MUTE) {
                if self.audio.is_on() {
                    self.audio.end();
                } else {
                    self.audio.begin();
                }
                debug!(audio = self.audio.is_on(), "mute toggled");
            }

            if let Some(command) = scroll_command(held.hotkeys) {
                self.compositor.scroll(command);
            }

            if pressed.contains(Hotkeys::RESET) {
                info!("reset");
                self.engine.reset();
            }

            let ctx = FrameContext {
                joypad: !held.pad.bits(),
                cart: &mut self.cart,
                lcd: &mut self.compositor,
            };
            if let Err(fault) = self.engine.run_frame(ctx) {
                return Err(self.fail(fault));
            }
            self.frames += 1;

            if self.audio.is_on() {
                self.engine.render_audio(&mut self.audio_buf);
                self.audio.try_produce(&self.audio_buf);
            }

            self.compositor.flush();

            if pressed.contains(Hotkeys::SRAM_COMMIT) {
                self.commit_save();
                self.autosave_counter = 0;
            }
            self.autosave_counter += 1;
            if self.autosave_counter > AUTOSAVE_FRAMES {
                if self.options.sram_auto_commit {
                    self.commit_save();
                }
                self.autosave_counter = 0;
            }

            if self.options.manual_rtc {
                self.rtc_counter += 1;
                if self.rtc_counter >= RTC_TICK_FRAMES {
                    self.engine.tick_rtc();
                    self.rtc_counter -= RTC_TICK_FRAMES;
                }
            }

            let elapsed = pacing::elapsed_millis(&*self.clock, start);
            let sleep = self.pacer.sleep_millis(elapsed, held.holding_any);
            if let Some(average) = self.delay.as_mut().and_then(|meter| meter.record(sleep)) {
                self.compositor.overlay(&format!("{average:5}"));
                debug!(average, "frame delay");
            }
            pacing::pace_sleep(&*self.clock, pacing::clamp_sleep(sleep));
        }
    }

    /// Suspends input, asks the user, and resumes input unless quitting.
    fn confirm_quit(&mut self) -> Result<bool, RuntimeError> {
        self.input.end();
        if self.dialogs.confirm_quit() {
            return Ok(true);
        }
        if self.options.sync_rtc_on_resume {
            self.engine.set_rtc(SystemTime::now());
        }
        self.input.begin()?;
        Ok(false)
    }

    fn drain_notifications(&mut self) {
        while let Ok(notification) = self.notify_rx.try_recv() {
            match notification {
                RuntimeNotification::AudioUnavailable { error } => {
                    info!("audio disabled: {error}");
                    self.audio.end();
                }
            }
        }
    }

    fn handle_power_event(&mut self) {
        let now = self.clock.millis();
        if self.input.held().take_power_event() {
            debug!("power event");
            self.power_event_at = Some(now);
        }
        if let Some(at) = self.power_event_at {
            if now.saturating_sub(at) >= RTC_RESYNC_DELAY_MS {
                if self.options.sync_rtc_on_resume {
                    debug!("resyncing rtc after resume");
                    self.engine.set_rtc(SystemTime::now());
                }
                self.power_event_at = None;
            }
        }
    }

    fn commit_save(&mut self) {
        // Failures are already logged; the session keeps running.
        let _ = save::write_save(&self.save_path, self.cart.ram());
    }

    /// Stops everything, dumps cartridge RAM and reports the fault.
    fn fail(&mut self, fault: EngineFault) -> RuntimeError {
        error!(kind = %fault.kind, address = fault.address, "emulation fault");

        self.input.end();
        let recovery = save::recovery_path_for(&self.save_path);
        let recovery_path = save::write_save(&recovery, self.cart.ram())
            .ok()
            .map(|()| recovery);
        self.audio.end();

        let bank = self.engine.selected_rom_bank();
        let file_offset = engine::banked_file_offset(fault.address, bank);
        let report = FaultReport {
            kind: fault.kind,
            address: fault.address,
            bank: file_offset.map(|_| bank),
            cart_mode: self.engine.cart_mode(),
            file_offset,
            instruction: self.engine.peek(&self.cart, fault.address),
            recovery_path,
        };
        if report.recovery_path.is_none() {
            warn!("cartridge RAM could not be dumped");
        }

        self.dialogs.report_fault(&report);
        RuntimeError::EmulationFault(report)
    }

    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub(crate) fn cart(&self) -> &Cartridge {
        &self.cart
    }

    pub(crate) fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    pub(crate) fn compositor_mut(&mut self) -> &mut Compositor<S> {
        &mut self.compositor
    }

    pub(crate) fn input_state(&self) -> WorkerState {
        self.input.state()
    }

    pub(crate) fn audio(&self) -> &AudioOutput {
        &self.audio
    }
}

/// Scroll request of the held hotkeys. Up wins over down, which wins over
/// the jump targets.
fn scroll_command(held: Hotkeys) -> Option<ScrollCommand> {
    [
        (Hotkeys::SCROLL_UP, ScrollCommand::Up),
        (Hotkeys::SCROLL_DOWN, ScrollCommand::Down),
        (Hotkeys::SCROLL_TOP, ScrollCommand::Top),
        (Hotkeys::SCROLL_CENTER, ScrollCommand::Center),
        (Hotkeys::SCROLL_BOTTOM, ScrollCommand::Bottom),
    ]
    .into_iter()
    .find(|(key, _)| held.contains(*key))
    .map(|(_, command)| command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_fire_once_per_press() {
        let mut edges = HotkeyEdges::default();
        let held = Hotkeys::MUTE | Hotkeys::SCROLL_UP;

        assert_eq!(edges.update(held), held);
        for _ in 0..20 {
            assert!(edges.update(held).is_empty());
        }
        assert!(edges.update(Hotkeys::empty()).is_empty());
        assert_eq!(edges.update(Hotkeys::MUTE), Hotkeys::MUTE);
    }

    #[test]
    fn overlapping_presses_report_only_the_new_key() {
        let mut edges = HotkeyEdges::default();
        edges.update(Hotkeys::RESET);
        assert_eq!(edges.update(Hotkeys::RESET | Hotkeys::QUIT), Hotkeys::QUIT);
    }

    #[test]
    fn scroll_priority_matches_key_order() {
        assert_eq!(scroll_command(Hotkeys::empty()), None);
        assert_eq!(
            scroll_command(Hotkeys::SCROLL_DOWN | Hotkeys::SCROLL_UP),
            Some(ScrollCommand::Up)
        );
        assert_eq!(
            scroll_command(Hotkeys::SCROLL_BOTTOM | Hotkeys::SCROLL_TOP),
            Some(ScrollCommand::Top)
        );
        assert_eq!(
            scroll_command(Hotkeys::SCROLL_CENTER | Hotkeys::MUTE),
            Some(ScrollCommand::Center)
        );
    }
}
