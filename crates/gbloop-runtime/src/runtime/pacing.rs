use crate::platform::Clock;

/// Frame budget in milliseconds, cycled every frame. Averages 16.67 ms.
pub const FRAME_ADVANCE_MS: [i64; 3] = [16, 17, 17];

/// Frames averaged by the delay overlay.
const DELAY_WINDOW: u32 = 32;

/// Requests at or above this length are skipped by [`sleep_double_rtc`].
const DOUBLE_RTC_MAX_MS: u32 = 499;

/// Per-loop timing state of the frame scheduler.
#[derive(Debug, Clone)]
pub(crate) struct FramePacer {
    phase: usize,
    num: i64,
    denom: i64,
}

impl FramePacer {
    /// `num / denom` scales the extra time subtracted while a key is held.
    pub(crate) fn new(num: u16, denom: u16) -> Self {
        Self {
            phase: 0,
            num: i64::from(num.max(1)),
            denom: i64::from(denom.max(1)),
        }
    }

    pub(crate) fn next_advance(&mut self) -> i64 {
        let advance = FRAME_ADVANCE_MS[self.phase];
        self.phase = (self.phase + 1) % FRAME_ADVANCE_MS.len();
        advance
    }

    fn compensates(&self) -> bool {
        self.num != 1 || self.denom != 1
    }

    /// Unclamped sleep for the frame that just took `elapsed` ms.
    pub(crate) fn sleep_millis(&mut self, elapsed: i64, holding_any: bool) -> i64 {
        let mut sleep = self.next_advance() - elapsed;
        if holding_any && self.compensates() {
            sleep -= elapsed * self.num / self.denom;
        }
        sleep
    }
}

/// Scheduler sleeps are never shorter than one millisecond.
pub(crate) fn clamp_sleep(raw: i64) -> u32 {
    raw.clamp(1, i64::from(u32::MAX)) as u32
}

/// Milliseconds since `start_ticks`.
pub(crate) fn elapsed_millis(clock: &dyn Clock, start_ticks: u64) -> i64 {
    let ticks = clock.ticks().saturating_sub(start_ticks) as i64;
    if clock.is_half_resolution() {
        ticks / 2
    } else {
        ticks
    }
}

/// Sleeps `ms` on the scheduler thread.
pub(crate) fn pace_sleep(clock: &dyn Clock, ms: u32) {
    if clock.is_half_resolution() {
        sleep_double_rtc(clock, ms);
    } else {
        clock.sleep_ms(ms);
    }
}

/// Sleep for clocks whose sleep primitive runs at half speed.
///
/// Polls the millisecond field of the wall clock one tick at a time until
/// twice the requested ticks went by, minus a small fudge.
pub(crate) fn sleep_double_rtc(clock: &dyn Clock, ms: u32) {
    if ms >= DOUBLE_RTC_MAX_MS {
        return;
    }

    let target = i32::try_from(ms).unwrap_or(i32::MAX) * 2 - 3;
    let start = i32::from(clock.wall_millis());
    loop {
        clock.sleep_ms(1);
        let now = i32::from(clock.wall_millis());
        let elapsed = if now < start {
            1000 + now - start
        } else {
            now - start
        };
        if elapsed >= target {
            return;
        }
    }
}

/// Running average of the computed sleep, reported once per window.
#[derive(Debug, Clone, Default)]
pub(crate) struct DelayMeter {
    sum: i64,
    count: u32,
}

impl DelayMeter {
    pub(crate) fn record(&mut self, sleep_millis: i64) -> Option<i64> {
        self.sum += sleep_millis;
        self.count += 1;
        if self.count < DELAY_WINDOW {
            return None;
        }
        let average = self.sum / i64::from(DELAY_WINDOW);
        self.sum = 0;
        self.count = 0;
        Some(average)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use proptest::prelude::*;

    use super::*;

    struct HalfClock {
        half_ticks: AtomicU64,
        sleep_calls: AtomicU64,
    }

    impl HalfClock {
        fn new(start_ms: u64) -> Self {
            Self {
                half_ticks: AtomicU64::new(start_ms * 2),
                sleep_calls: AtomicU64::new(0),
            }
        }
    }

    impl Clock for HalfClock {
        fn ticks(&self) -> u64 {
            self.half_ticks.load(Ordering::Relaxed)
        }

        fn tick_quantum_us(&self) -> u32 {
            crate::platform::HALF_RES_QUANTUM_US
        }

        fn wall_millis(&self) -> u16 {
            ((self.half_ticks.load(Ordering::Relaxed) / 2) % 1000) as u16
        }

        // The sleep primitive of such devices only lasts half the request.
        fn sleep_ms(&self, ms: u32) {
            self.sleep_calls.fetch_add(1, Ordering::Relaxed);
            self.half_ticks.fetch_add(u64::from(ms), Ordering::Relaxed);
        }
    }

    #[test]
    fn alternator_cycles_16_17_17() {
        let mut pacer = FramePacer::new(1, 1);
        let advances: Vec<_> = (0..6).map(|_| pacer.next_advance()).collect();
        assert_eq!(advances, [16, 17, 17, 16, 17, 17]);
    }

    #[test]
    fn compensation_only_applies_while_holding() {
        let mut pacer = FramePacer::new(1, 2);
        assert_eq!(pacer.sleep_millis(6, false), 10);
        assert_eq!(pacer.sleep_millis(6, true), 17 - 6 - 3);
    }

    #[test]
    fn default_ratio_never_compensates() {
        let mut pacer = FramePacer::new(1, 1);
        assert_eq!(pacer.sleep_millis(4, true), 12);
    }

    #[test]
    fn zero_ratio_is_treated_as_one() {
        let mut pacer = FramePacer::new(0, 0);
        assert_eq!(pacer.sleep_millis(4, true), 12);
    }

    #[test]
    fn sleep_is_clamped_to_one_millisecond() {
        assert_eq!(clamp_sleep(-40), 1);
        assert_eq!(clamp_sleep(0), 1);
        assert_eq!(clamp_sleep(9), 9);
    }

    #[test]
    fn half_resolution_elapsed_is_halved() {
        let clock = HalfClock::new(10);
        let start = clock.ticks();
        clock.sleep_ms(10);
        assert_eq!(elapsed_millis(&clock, start), 5);
    }

    #[test]
    fn double_rtc_sleep_waits_twice_the_ticks() {
        let clock = HalfClock::new(0);
        pace_sleep(&clock, 10);
        // 17 wall-clock ms pass at half a millisecond per one-tick sleep.
        assert_eq!(clock.sleep_calls.load(Ordering::Relaxed), 34);
    }

    #[test]
    fn double_rtc_sleep_handles_second_wrap() {
        let clock = HalfClock::new(995);
        sleep_double_rtc(&clock, 5);
        assert_eq!(clock.ticks(), 995 * 2 + 14);
    }

    #[test]
    fn double_rtc_sleep_skips_long_requests() {
        let clock = HalfClock::new(0);
        sleep_double_rtc(&clock, 499);
        assert_eq!(clock.sleep_calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn delay_meter_reports_every_window() {
        let mut meter = DelayMeter::default();
        for i in 0..31 {
            assert_eq!(meter.record(i), None);
        }
        assert_eq!(meter.record(31), Some((0..32).sum::<i64>() / 32));
        assert_eq!(meter.record(5), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn any_three_consecutive_advances_sum_to_50(skip in 0usize..100) {
            let mut pacer = FramePacer::new(1, 1);
            for _ in 0..skip {
                pacer.next_advance();
            }
            let total: i64 = (0..3).map(|_| pacer.next_advance()).sum();
            prop_assert_eq!(total, 50);
        }
    }
}
