use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared by every worker of one mining round.
///
/// Cloning yields another handle to the same flag. The flag only ever goes
/// from unset to set; a new round gets a new signal.
#[derive(Debug, Clone, Default)]
pub struct RoundSignal {
    stop: Arc<AtomicBool>,
}

impl RoundSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the round has been decided or cancelled
    pub fn is_set(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Set the flag. Returns `true` only for the call that actually flipped it.
    pub fn set(&self) -> bool {
        !self.stop.swap(true, Ordering::AcqRel)
    }

    /// Whether two handles refer to the same round
    pub fn same_round(&self, other: &RoundSignal) -> bool {
        Arc::ptr_eq(&self.stop, &other.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_is_visible_to_clones() {
        let signal = RoundSignal::new();
        let observer = signal.clone();
        assert!(!observer.is_set());
        assert!(signal.set());
        assert!(observer.is_set());
        assert!(signal.same_round(&observer));
        assert!(!signal.same_round(&RoundSignal::new()));
    }

    #[test]
    fn test_only_one_setter_wins() {
        let signal = RoundSignal::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.set())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(signal.is_set());
    }
}
