/*!
    online estimate of the cyclic datagram arrival jitter

    Arrival times are taken from the distributed reference clock, so the estimate
    measures the regularity of the host's cycle as the bus sees it. The update is the
    interarrival jitter filter of RFC 1889 §A.8: a first-order estimator with gain 1/16,
    cheap enough to run inside the receive path.

    Reads are coherent without locking: the receive path is the single writer, every
    value is published through 64-bit atomics.
*/

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// samples the estimate must integrate before it is trusted to gate OP promotion,
/// four time constants of the 1/16 filter
pub const MIN_JITTER_SAMPLES: u64 = 64;

#[derive(Default, Debug)]
pub struct JitterEstimator {
    /// previous datagram arrival in reference-clock time, 0 while no sample arrived
    previous_arrival: AtomicI64,
    /// current estimate in nanoseconds
    estimate: AtomicI64,
    /// samples integrated so far
    samples: AtomicU64,
}

impl JitterEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// feed one datagram arrival, `cycle` being the nominal cycle time in nanoseconds
    ///
    /// Called from the receive path only.
    pub(crate) fn record(&self, arrival: i64, cycle: i64) {
        let previous = self.previous_arrival.load(Ordering::Relaxed);
        if previous != 0 {
            let deviation = ((arrival - previous) - cycle).abs();
            let mut estimate = self.estimate.load(Ordering::Relaxed);
            estimate += (deviation - estimate) / 16;
            self.estimate.store(estimate, Ordering::Release);
            self.samples.fetch_add(1, Ordering::Release);
        }
        self.previous_arrival.store(arrival, Ordering::Relaxed);
    }

    /// current estimate in nanoseconds, 0 until two datagrams arrived
    pub fn estimate(&self) -> i64 {
        self.estimate.load(Ordering::Acquire)
    }

    /// number of samples the estimate integrates
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: i64 = 1_000_000;

    #[test]
    fn first_arrival_only_arms_the_filter() {
        let jitter = JitterEstimator::new();
        jitter.record(CYCLE, CYCLE);
        assert_eq!(jitter.estimate(), 0);
        assert_eq!(jitter.samples(), 0);
    }

    #[test]
    fn follows_rfc1889_gain() {
        let jitter = JitterEstimator::new();
        let mut t = 0;
        let mut expected = 0i64;
        for delta in [CYCLE, CYCLE + 200, CYCLE - 200, CYCLE + 50_000] {
            t += delta;
            jitter.record(t, CYCLE);
            if jitter.samples() > 0 {
                let deviation = (delta - CYCLE).abs();
                expected += (deviation - expected) / 16;
            }
        }
        assert_eq!(jitter.samples(), 3);
        assert_eq!(jitter.estimate(), expected);
        assert!(jitter.estimate() >= 0);
    }

    #[test]
    fn converges_towards_a_steady_deviation() {
        let jitter = JitterEstimator::new();
        let mut t = 0;
        // constant 50µs overrun per cycle
        for _ in 0..200 {
            t += CYCLE + 50_000;
            jitter.record(t, CYCLE);
        }
        assert!(jitter.estimate() > 45_000);
        assert!(jitter.estimate() <= 50_000);
    }
}
