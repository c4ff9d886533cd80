/*!
    the housekeeping state machine

    Runs outside the realtime path and does everything too slow for it: promoting
    subdevices to OP once the cycle proves healthy, acknowledging AL faults, stepwise
    re-promotion of regressed nodes, and the optional RX error statistics poll.

    Each [run_once] pass performs one bounded amount of work per subdevice (at most one
    state request each, one statistics read total), so it cooperates with whatever
    scheduling the host uses: a dedicated thread, or interleaved after `receive`.

    ## Promotion gate

    A subdevice sitting in SAFE-OP is only asked into OP when the previous cycle came
    back complete (`actual == expected` working counter), no subdevice on the segment is
    faulted, and, with distributed clocks, the jitter estimate has integrated enough
    samples and sits under the configured bound. The gate re-opens by itself when the
    estimate settles down again.

    ## Recovery

    A subdevice observed below its logical state (or raising the AL error flag, or
    vanishing from the segment) is taken through `Fault`/`Offline` into `Recovering`,
    where each pass requests the next state up the ladder until it is back in OP. When
    the host disabled recovery, the whole master latches `Fault` instead and refuses
    every further promotion.
*/

use crate::jitter::MIN_JITTER_SAMPLES;
use crate::master::{Bus, Master};
use crate::registers::AlState;
use crate::status::MasterEvent;
use crate::subdevice::{Subdevice, SubdeviceState};
use std::sync::Arc;

/// one bounded housekeeping pass, called with the driver mutex held
pub(crate) fn run_once(master: &Master, bus: &mut Bus, map: &[Arc<Subdevice>]) {
    if master.is_faulted() {
        return;
    }

    // refresh the cached AL status of the whole segment in one transaction, so the
    // decisions below run on states at most one pass old even if the host never calls
    // `receive` (during shutdown for example)
    if bus.driver.read_states().is_err() {
        return;
    }
    for (slot, subdevice) in map.iter().enumerate() {
        subdevice.update_state_variables(bus.driver.subdevice(slot));
    }

    let promotable = promotion_allowed(master, map);

    for (slot, subdevice) in map.iter().enumerate() {
        step(master, bus, slot, subdevice, promotable);
        if master.is_faulted() {
            return;
        }
    }

    // statistics poll, one subdevice per pass to stay bounded
    if master.read_rx_error_statistics() && !map.is_empty() {
        bus.rx_cursor = (bus.rx_cursor + 1) % map.len();
        if let Ok(count) = bus.driver.rx_error_count(bus.rx_cursor) {
            master.report(MasterEvent::RxErrors {
                address: map[bus.rx_cursor].address(),
                count,
            });
        }
    }
}

/// working counter and jitter conditions for letting anything into OP
fn promotion_allowed(master: &Master, map: &[Arc<Subdevice>]) -> bool {
    if map.iter().any(|subdevice| subdevice.state() == SubdeviceState::Fault) {
        return false;
    }
    if master.actual_working_counter() != master.expected_working_counter() {
        return false;
    }
    if master.dc_enabled() {
        if master.jitter().samples() < MIN_JITTER_SAMPLES {
            return false;
        }
        if master.jitter().estimate() > master.max_execution_jitter_ns() {
            return false;
        }
    }
    true
}

/// drive one subdevice one step forward (or into recovery)
fn step(master: &Master, bus: &mut Bus, slot: usize, subdevice: &Subdevice, promotable: bool) {
    let logical = subdevice.state();
    let observed = subdevice.observed_state();

    match logical {
        SubdeviceState::Shutdown => {
            if !subdevice.has_shutdown() {
                let _ = bus.driver.request_state(Some(slot), AlState::Init);
            }
        }

        SubdeviceState::Fault => {
            // acknowledge first, the slave refuses transitions while the flag stands
            let _ = bus.driver.ack_fault(slot);
            subdevice.set_state(SubdeviceState::Recovering);
        }

        SubdeviceState::Offline => {
            if observed.is_some() {
                subdevice.set_state(SubdeviceState::Recovering);
            }
        }

        SubdeviceState::Recovering => {
            let Some(word) = observed else { return };
            if word.error() {
                let _ = bus.driver.ack_fault(slot);
                return;
            }
            match word.state() {
                AlState::Bootstrap => {
                    let _ = bus.driver.request_state(Some(slot), AlState::Init);
                }
                AlState::Init => {
                    let _ = bus.driver.request_state(Some(slot), AlState::PreOperational);
                }
                AlState::PreOperational => {
                    let _ = bus.driver.request_state(Some(slot), AlState::SafeOperational);
                }
                AlState::SafeOperational => {
                    if promotable {
                        let _ = bus.driver.request_state(Some(slot), AlState::Operational);
                    }
                }
                AlState::Operational => subdevice.set_state(SubdeviceState::Op),
            }
        }

        SubdeviceState::Init
        | SubdeviceState::PreOp
        | SubdeviceState::Boot
        | SubdeviceState::SafeOp
        | SubdeviceState::Op => {
            let Some(word) = observed else {
                // vanished from the segment
                if master.recovery_disabled() {
                    refuse(master, subdevice);
                } else {
                    subdevice.set_state(SubdeviceState::Offline);
                }
                return;
            };
            if word.error() {
                if master.recovery_disabled() {
                    refuse(master, subdevice);
                } else {
                    subdevice.set_state(SubdeviceState::Fault);
                }
                return;
            }
            let on_wire = SubdeviceState::from_al(word.state());
            if on_wire < logical {
                if master.recovery_disabled() {
                    refuse(master, subdevice);
                } else {
                    subdevice.set_state(SubdeviceState::Recovering);
                }
                return;
            }
            if on_wire > logical {
                // the bus moved it forward (during init, or a recovery we requested)
                subdevice.set_state(on_wire);
            }
            if subdevice.state() == SubdeviceState::SafeOp && promotable {
                let _ = bus.driver.request_state(Some(slot), AlState::Operational);
            }
        }
    }
}

fn refuse(master: &Master, subdevice: &Subdevice) {
    master.latch_fault();
    master.report(MasterEvent::RecoveryRefused(subdevice.address()));
}
