// Retransmission timer, advanced only by explicit ticks.

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Idle,
    Running { remaining_ms: u64 },
}

#[derive(Debug)]
pub struct Timer {
    state: State,
}

impl Timer {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Starts the timer with the given timeout, unless it is already running.
    pub fn start(&mut self, timeout_ms: u64) {
        if self.state == State::Idle {
            self.state = State::Running {
                remaining_ms: timeout_ms,
            };
        }
    }

    /// Starts the timer with the given timeout, whether or not it is running.
    pub fn restart(&mut self, timeout_ms: u64) {
        self.state = State::Running {
            remaining_ms: timeout_ms,
        };
    }

    pub fn stop(&mut self) {
        self.state = State::Idle;
    }

    /// Ages the timer by `elapsed_ms`. Returns true if the timer expired, in which case it is
    /// now idle.
    pub fn tick(&mut self, elapsed_ms: u64) -> bool {
        match self.state {
            State::Idle => false,
            State::Running { remaining_ms } => {
                if elapsed_ms >= remaining_ms {
                    self.state = State::Idle;
                    true
                } else {
                    self.state = State::Running {
                        remaining_ms: remaining_ms - elapsed_ms,
                    };
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_never_expires() {
        let mut timer = Timer::new();

        assert_eq!(timer.tick(u64::MAX), false);
        assert_eq!(timer.state, State::Idle);
    }

    #[test]
    fn expires_once() {
        let mut timer = Timer::new();

        timer.start(100);
        assert_eq!(timer.tick(99), false);
        assert_eq!(timer.tick(1), true);
        assert_eq!(timer.state, State::Idle);
        assert_eq!(timer.tick(1000), false);
    }

    #[test]
    fn start_does_not_reset() {
        let mut timer = Timer::new();

        timer.start(100);
        timer.tick(60);
        timer.start(100);
        assert_eq!(timer.tick(40), true);

        timer.start(100);
        timer.tick(60);
        timer.restart(100);
        assert_eq!(timer.tick(40), false);

        timer.stop();
        assert_eq!(timer.tick(1000), false);
    }
}
