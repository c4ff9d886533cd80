/*!
    status reporting from the master towards the host

    Initialization and housekeeping run far away from the host's eyes (often in a
    separate thread), so everything noteworthy is funneled through a [StatusCallback]
    the host can replace. The default implementation logs through `tracing`.
*/

use crate::subdevice::SubdeviceAddress;
use chrono::{Datelike, Timelike};
use core::fmt;

/// progress marker of the initialization sequence, in execution order
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TraceEvent {
    FastIrq,
    CreateContext,
    OpenInterface,
    InitializingSubdevices,
    DcEnabled,
    DcDisabled,
    ConfiguringSubdevices,
    WaitForPreOp,
    AllocateIomap,
    LinkBuffers,
    ConfigureTxRx,
    ConfigureComplete,
    StopHousekeeper,
}

/**
    one notification from the master

    A tagged variant type rather than one callback method per event, so hosts match on
    what they care about and forward the rest.
*/
#[derive(Clone, Debug)]
pub enum MasterEvent {
    /// initialization progress marker
    Trace(TraceEvent),
    /// a subdevice answered on the wire with no registration to bind to
    UnconfiguredSubdevice {
        address: SubdeviceAddress,
        name: String,
        vendor: u32,
        product: u32,
    },
    /// a registered subdevice did not answer on the wire
    SubdeviceNotFound(SubdeviceAddress),
    /// the working counter every cycle should come back with
    ExpectedWorkingCounter(i32),
    /// DC was requested but the segment carries no DC-capable reference
    DcNotCapable,
    /// NIC coalescing could not be tuned, expect extra cyclic jitter
    CoalesceTuningFailed(&'static str),
    /// RX error counter of one subdevice, polled when the statistics flag is set
    RxErrors { address: SubdeviceAddress, count: u16 },
    /// recovery is disabled and a subdevice regressed, the master is latched faulted
    RecoveryRefused(SubdeviceAddress),
}

impl fmt::Display for MasterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let now: chrono::DateTime<chrono::Utc> = chrono::Utc::now();
        write!(
            f,
            "{}/{:02}/{:02} {} {:02}:{:02}:{:02}.{:06} - ",
            now.year(),
            now.month(),
            now.day(),
            now.weekday(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_micros()
        )?;
        match self {
            Self::Trace(event) => write!(f, "{event:?}"),
            Self::UnconfiguredSubdevice { address, name, vendor, product } => write!(
                f,
                "unconfigured subdevice {address} ({name}, {vendor:#x}:{product:#x})"
            ),
            Self::SubdeviceNotFound(address) => {
                write!(f, "registered subdevice {address} not found on the wire")
            }
            Self::ExpectedWorkingCounter(wkc) => write!(f, "expected working counter {wkc}"),
            Self::DcNotCapable => write!(f, "segment is not DC capable, running without"),
            Self::CoalesceTuningFailed(reason) => write!(
                f,
                "{reason}, expect larger than usual jitter on the cyclic exchange"
            ),
            Self::RxErrors { address, count } => {
                write!(f, "subdevice {address} RX errors: {count}")
            }
            Self::RecoveryRefused(address) => write!(
                f,
                "subdevice {address} regressed and recovery is disabled, master faulted"
            ),
        }
    }
}

/// receiver for [MasterEvent]s
///
/// The calling thread is not guaranteed: events come from whichever thread runs `init`
/// or the housekeeping. Implementations must not block.
pub trait StatusCallback: Send + Sync {
    fn report(&self, event: MasterEvent);
}

/// default callback: warnings for anything a host should see, debug for trace markers
pub struct LogStatus {
    verbose: bool,
}

impl LogStatus {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StatusCallback for LogStatus {
    fn report(&self, event: MasterEvent) {
        match &event {
            MasterEvent::Trace(_) | MasterEvent::ExpectedWorkingCounter(_) => {
                if self.verbose {
                    tracing::info!("{event}");
                } else {
                    tracing::debug!("{event}");
                }
            }
            _ => tracing::warn!("{event}"),
        }
    }
}
