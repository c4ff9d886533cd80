//! definition of the error types reported by the master and its driver

use crate::registers::AlState;
use crate::subdevice::SubdeviceAddress;
use std::sync::Arc;
use thiserror::Error;

/**
    error reported by the datagram driver below the master

    These errors are exterior to this crate: the driver owns the raw socket, the mailbox
    engine and the slave table, the master only maps them into [MasterError] where the
    failing initialization step is known.

    The io variant keeps the error behind an [Arc] so driver errors stay [Clone] and can
    be duplicated into status events without consuming the original.
*/
#[derive(Clone, Debug, Error)]
pub enum DriverError {
    /// error caused by the communication support (raw socket, NIC ioctl)
    #[error("io: {0}")]
    Io(#[from] Arc<std::io::Error>),

    /// the driver refused or failed the operation
    #[error("driver: {0}")]
    Failed(&'static str),

    /// too much time elapsed waiting for the bus, the operation can be retried
    #[error("timeout: {0}")]
    Timeout(&'static str),
}

/// convenient alias to simplify return annotations
pub type EthercatResult<T = ()> = core::result::Result<T, MasterError>;

/**
    everything `Master::init` and the lifecycle operations can report

    Each failing initialization step of the master has its own variant so the host can
    distinguish a wiring problem (offline or mismatched subdevices) from a host problem
    (permissions, double initialization) without parsing messages.
*/
#[derive(Clone, Debug, Error)]
pub enum MasterError {
    /// a master already claimed this process, or `init` was called twice
    #[error("a master is already initialized in this process")]
    AlreadyInitialized,

    /// the master was not initialized, or was already shut down
    #[error("master is not running")]
    NotRunning,

    /// NIC coalescing could not be tuned for lack of privileges
    #[error("no permission to configure interface {0}, run with CAP_NET_ADMIN")]
    PermissionDenied(String),

    /// the driver could not bind its raw socket to the interface
    #[error("cannot open interface {0}")]
    InterfaceUnavailable(String),

    /// bus enumeration failed or found an empty segment
    #[error("bus scan failed, no subdevice answered")]
    ScanFailed,

    /// the segment did not reach the requested state within the driver timeout
    #[error("bus did not reach {0:?}")]
    StateTransitionFailed(AlState),

    /// the subdevice found on the wire does not carry the registered vendor/product
    #[error("subdevice {address} at slot {slot}: expected {expected_vendor:#x}:{expected_product:#x}, wire reports {wire_vendor:#x}:{wire_product:#x}")]
    IdentityMismatch {
        slot: usize,
        address: SubdeviceAddress,
        expected_vendor: u32,
        expected_product: u32,
        wire_vendor: u32,
        wire_product: u32,
    },

    /// two registered subdevices share one (alias, position) pair
    #[error("duplicate registration for {0}, make alias addresses unique")]
    DuplicateRegistration(SubdeviceAddress),

    /// registered subdevices absent from the segment while all are required
    #[error("registered subdevices offline: {0:?}")]
    SubdevicesOffline(Vec<SubdeviceAddress>),

    /// wire subdevices without a registration while all are required
    #[error("subdevices on the wire without registration: {0:?}")]
    SubdevicesUnconfigured(Vec<SubdeviceAddress>),

    /// the segment population does not match the registry
    #[error("subdevice count mismatch: {actual} online for {expected} registered")]
    SubdeviceCountMismatch { expected: usize, actual: usize },

    /// the driver needs a larger process image than what was allocated
    #[error("process image too small: required {required}, allocated {allocated}")]
    ProcessImageTooSmall { required: usize, allocated: usize },

    /// the driver produced an inconsistent process image layout
    #[error("inconsistent process image layout: {0}")]
    ImageLayout(&'static str),

    /// error propagated from the datagram driver
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// unexpected driver return code, not recoverable
    #[error("internal error, driver code {0}")]
    Internal(i32),
}

impl From<std::io::Error> for DriverError {
    fn from(src: std::io::Error) -> Self {
        DriverError::Io(Arc::new(src))
    }
}
