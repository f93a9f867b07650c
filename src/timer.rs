//! Retransmission timeout bookkeeping.
//!
//! The stack has no wall clock; time only advances when the owner calls
//! [`RetransmitTimer::advance`] with the milliseconds elapsed since the
//! previous call.  The timer itself is a plain counter — back-off policy
//! (when to double, when to reset) is decided by the sender.

#[derive(Debug)]
pub struct RetransmitTimer {
    initial_rto_ms: u64,
    current_rto_ms: u64,
    running: bool,
    elapsed_ms: u64,
}

impl RetransmitTimer {
    pub fn new(initial_rto_ms: u64) -> Self {
        Self {
            initial_rto_ms,
            current_rto_ms: initial_rto_ms,
            running: false,
            elapsed_ms: 0,
        }
    }

    /// Arm the timer.  Accumulated elapsed time is kept: re-arming after
    /// an emission must not postpone a timeout already in progress.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Disarm and clear the elapsed count.
    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed_ms = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn rto_ms(&self) -> u64 {
        self.current_rto_ms
    }

    /// Double the timeout (exponential back-off).
    pub fn back_off(&mut self) {
        self.current_rto_ms *= 2;
    }

    /// Restore the initial timeout and clear the elapsed count.
    pub fn reset_rto(&mut self) {
        self.current_rto_ms = self.initial_rto_ms;
        self.elapsed_ms = 0;
    }

    /// Advance by `ms`.  Returns `true` exactly when the timeout expires;
    /// the timer then disarms itself until the next [`start`](Self::start).
    pub fn advance(&mut self, ms: u64) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed_ms += ms;
        if self.elapsed_ms < self.current_rto_ms {
            return false;
        }
        self.elapsed_ms = 0;
        self.running = false;
        true
    }
}
