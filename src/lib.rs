/*!
    Ethercore is the core of an EtherCAT master: it discovers and configures the
    subdevices of one segment, walks them through the mandatory state progression
    (INIT → PRE-OP → SAFE-OP → OP), exchanges cyclic process data under realtime
    constraints, and keeps distributed clocks synchronized with an online jitter
    estimate gating the switch to operational mode.

    The wire itself is not handled here: raw sockets, mailbox transfers and SII reads
    live behind the [BusDriver] trait, so the core stays testable against a mocked
    segment and portable across datagram engines.

    ## It mainly features

    - [Master] for the lifecycle (`init`, `shutdown`) and the cyclic engine
      (`send`/`receive`)
    - [Subdevice] for declaring the expected nodes, their identities and startup hooks
    - a housekeeping state machine ([Master::do_housekeeping]) promoting subdevices to
      OP and recovering lost or faulted ones without ever touching the realtime path

    ## Complete feature list

    - [x] segment lifecycle
        + [x] bus scan with (alias, position) identity matching
        + [x] vendor/product verification against the registration
        + [x] per-subdevice configure hooks with mailbox SDO access
        + [x] process image layout with per-subdevice PDO windows
    - [x] cyclic exchange
        + [x] send/receive pair with working counter verification
        + [x] lock-free publication of counters and states to other threads
        + [x] multiple receives per cycle (`receive_simple`)
    - [x] distributed clocks
        + [x] capability probing with silent downgrade
        + [x] RFC 1889 jitter estimate of the datagram arrival
        + [x] jitter-gated promotion to OP
    - [x] housekeeping
        + [x] bounded-work passes suitable for cooperative scheduling
        + [x] stepwise recovery of regressed subdevices, optional fail-fast latch
        + [x] RX error statistics polling
    - [ ] multi-segment routing
    - [ ] redundant (dual-NIC) operation

    ## Realtime notes

    Two logical threads drive a master: the cyclic thread calling [Master::send] then
    [Master::receive] every cycle, and a housekeeping thread calling
    [Master::do_housekeeping]. Both may be the same thread. The housekeeping call must
    not run concurrently with the cyclic pair; an internal mutex keeps even a host that
    breaks this rule correct, but then the cyclic thread pays the lock.
*/

pub mod driver;
pub mod error;
pub mod image;
pub mod jitter;
pub mod master;
pub mod registers;
pub mod status;
pub mod subdevice;

mod housekeeping;

pub use crate::driver::{BusDriver, GroupRecord, SubdeviceRecord, SyncManager, SyncManagerKind, NO_FRAME};
pub use crate::error::{DriverError, EthercatResult, MasterError};
pub use crate::image::{PdoWindow, ProcessImage, IOMAP_MIN};
pub use crate::jitter::JitterEstimator;
pub use crate::master::{Master, MAX_EXECUTION_JITTER_DEFAULT, RECEIVE_TIMEOUT_DEFAULT};
pub use crate::registers::AlState;
pub use crate::status::{LogStatus, MasterEvent, StatusCallback, TraceEvent};
pub use crate::subdevice::{
    ConfigureContext, IoWindows, Sdo, SdoPart, Subdevice, SubdeviceAddress, SubdeviceState,
};
