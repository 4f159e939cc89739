use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bramble::Connection;

/// Two connections joined by a simulated link which may drop segments.
pub struct Link {
    pub a: Connection,
    pub b: Connection,
    rng: StdRng,
    loss: f64,
    pub now_ms: u64,
    pub dropped: usize,
    pub delivered: usize,
}

impl Link {
    pub fn new(a: Connection, b: Connection, seed: u64, loss: f64) -> Self {
        Self {
            a,
            b,
            rng: StdRng::seed_from_u64(seed),
            loss,
            now_ms: 0,
            dropped: 0,
            delivered: 0,
        }
    }

    /// Carries queued segments in both directions until neither side has anything to send.
    pub fn exchange(&mut self) {
        loop {
            let mut moved = false;

            while let Some(segment) = self.a.segments_out().pop_front() {
                moved = true;

                if self.rng.gen_bool(self.loss) {
                    self.dropped += 1;
                } else {
                    self.delivered += 1;
                    self.b.segment_received(&segment);
                }
            }

            while let Some(segment) = self.b.segments_out().pop_front() {
                moved = true;

                if self.rng.gen_bool(self.loss) {
                    self.dropped += 1;
                } else {
                    self.delivered += 1;
                    self.a.segment_received(&segment);
                }
            }

            if !moved {
                break;
            }
        }
    }

    /// Advances both connections' clocks.
    pub fn tick(&mut self, elapsed_ms: u64) {
        self.now_ms += elapsed_ms;
        self.a.tick(elapsed_ms);
        self.b.tick(elapsed_ms);
    }
}
