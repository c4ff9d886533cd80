/*!
    contract between the master core and the underlying datagram engine

    The master never touches the wire itself: scanning, mailbox transfers, SII reads and
    the cyclic datagram all go through a [BusDriver] implementation. The trait mirrors the
    working set of a SOEM-style context: a table of discovered subdevice records, one
    process data group, and a handful of blocking entry points. The master serializes all
    calls into the driver (see the concurrency notes on `Master`), so implementations do
    not need to be reentrant.
*/

use crate::error::DriverError;
use crate::registers::{AlState, CoeDetails};
use std::time::Duration;

/// working counter value standing for "no datagram came back"
pub const NO_FRAME: i32 = -1;

/// sync manager slots per subdevice
pub const MAX_SYNC_MANAGERS: usize = 8;

/// raw return codes of [BusDriver::setup_fast_irq]
///
/// The values are inherited from the NIC tuning helper of the reference stack; the master
/// treats everything not listed here as fatal.
pub mod fastirq {
    /// coalescing adjusted
    pub const OK: i32 = 1;
    /// host OS exposes no coalescing control
    pub const NOT_LINUX: i32 = 10;
    /// control socket refused, needs privileges
    pub const NO_PERMISSION: i32 = 70;
    /// driver info unavailable for this NIC
    pub const NO_DRIVER_INFO: i32 = 73;
    /// current coalescing options unreadable
    pub const CANNOT_READ_COALESCE: i32 = 76;
    /// desired coalescing options rejected
    pub const CANNOT_WRITE_COALESCE: i32 = 81;
}

/// purpose of one sync manager, from the SII
#[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SyncManagerKind {
    #[default]
    Unused = 0,
    /// mailbox towards the slave
    MailboxOut = 1,
    /// mailbox towards the master
    MailboxIn = 2,
    /// cyclic outputs (RxPDO on the slave side)
    ProcessOutputs = 3,
    /// cyclic inputs (TxPDO on the slave side)
    ProcessInputs = 4,
}

/// one sync manager region of a subdevice
#[derive(Default, Copy, Clone, Debug)]
pub struct SyncManager {
    /// physical start address on the slave, 0 when the slot is not configured
    pub start_address: u16,
    /// region length in bytes
    pub length: u16,
    pub kind: SyncManagerKind,
}

/**
    one discovered subdevice in the driver's table

    Identity fields come from the SII EEPROM during the scan. `al_status` is a cache of
    the last AL status word the driver read from the slave, refreshed by
    [BusDriver::read_states] and by the cyclic exchange. The mapped window fields are
    only meaningful after [BusDriver::config_map_group].
*/
#[derive(Clone, Debug, Default)]
pub struct SubdeviceRecord {
    /// name string from the SII
    pub name: String,
    /// vendor id from the SII
    pub vendor: u32,
    /// product code from the SII
    pub product: u32,
    /// revision number from the SII
    pub revision: u32,
    /// configured station alias, 0 when none was set
    pub alias_address: u16,
    /// last AL status word read from the slave, 0 when it vanished
    pub al_status: u16,
    /// AL status code explaining the last refused transition
    pub al_status_code: u16,
    /// CoE capability byte, writable so the master can mask complete access
    pub coe_details: CoeDetails,
    /// whether the slave advertises a distributed clock unit
    pub dc_capable: bool,
    pub sync_managers: [SyncManager; MAX_SYNC_MANAGERS],
    /// byte offset of this subdevice's outputs in the process image
    pub output_offset: usize,
    /// mapped output bytes
    pub output_bytes: usize,
    /// byte offset of this subdevice's inputs in the process image
    pub input_offset: usize,
    /// mapped input bytes
    pub input_bytes: usize,
}

/// per-group working counter contributions, filled by [BusDriver::config_map_group]
#[derive(Default, Copy, Clone, Debug)]
pub struct GroupRecord {
    /// subdevices with mapped outputs, each counts twice in the expected working counter
    pub outputs_wkc: u16,
    /// subdevices with mapped inputs
    pub inputs_wkc: u16,
}

/**
    the datagram engine the master drives

    Implementations own the raw socket and every protocol detail below the process data
    abstraction. All blocking entry points take their timeout explicitly; nothing here
    spawns threads.
*/
pub trait BusDriver: Send {
    /// tune the NIC interrupt coalescing for low cyclic latency, returning a raw
    /// [fastirq] code. Called before [Self::open].
    fn setup_fast_irq(&mut self, interface: &str) -> i32;

    /// bind the raw socket to the given interface
    fn open(&mut self, interface: &str) -> Result<(), DriverError>;

    /// enumerate the segment, fill the subdevice table and request PRE-OP,
    /// returning the number of subdevices found
    fn config_init(&mut self) -> Result<usize, DriverError>;

    /// measure propagation delays and activate distributed clocks if the segment
    /// carries a DC-capable reference, returning whether it does
    fn config_dc(&mut self) -> Result<bool, DriverError>;

    /// number of discovered subdevices
    fn subdevice_count(&self) -> usize;

    /// discovered subdevice record by topological slot (0-based)
    fn subdevice(&self, slot: usize) -> &SubdeviceRecord;

    /// mutable access to a record, used to mask capabilities before mailbox startup
    fn subdevice_mut(&mut self, slot: usize) -> &mut SubdeviceRecord;

    /// wait until the addressed subdevice (or with `None` the whole segment) reaches
    /// `target`, returning the state actually observed when giving up
    fn state_check(&mut self, slot: Option<usize>, target: AlState, timeout: Duration) -> AlState;

    /// request a state transition without waiting for it
    fn request_state(&mut self, slot: Option<usize>, target: AlState) -> Result<(), DriverError>;

    /// acknowledge the AL error flag of a subdevice so it accepts transitions again
    fn ack_fault(&mut self, slot: usize) -> Result<(), DriverError>;

    /// refresh the cached `al_status` of every subdevice record
    fn read_states(&mut self) -> Result<(), DriverError>;

    /// lay every mapped PDO of the group into `image`, filling the window fields of the
    /// subdevice records, and return the byte size actually required
    fn config_map_group(&mut self, image: &mut [u8], group: u8) -> Result<usize, DriverError>;

    /// working counter contributions of a mapped group
    fn group(&self, group: u8) -> &GroupRecord;

    /// transmit the cyclic datagram carrying the output regions of `image`
    fn send_process_data(&mut self, image: &[u8]);

    /// collect the cyclic datagram, copying input regions into `image`, and return its
    /// working counter or [NO_FRAME] after `timeout`
    fn receive_process_data(&mut self, image: &mut [u8], timeout: Duration) -> i32;

    /// arm or disarm the sync-0 pulse generation of one subdevice
    fn dc_sync(
        &mut self,
        slot: usize,
        activate: bool,
        cycle_time: Duration,
        shift: Duration,
    ) -> Result<(), DriverError>;

    /// DC time of the reference clock, captured when the last datagram passed it
    fn dc_time(&self) -> i64;

    /// mailbox SDO download
    fn sdo_write(
        &mut self,
        slot: usize,
        index: u16,
        sub: u8,
        complete: bool,
        data: &[u8],
    ) -> Result<(), DriverError>;

    /// mailbox SDO upload, returning the byte count stored into `buffer`
    fn sdo_read(
        &mut self,
        slot: usize,
        index: u16,
        sub: u8,
        complete: bool,
        buffer: &mut [u8],
    ) -> Result<usize, DriverError>;

    /// read the RX error counter register of one subdevice
    fn rx_error_count(&mut self, slot: usize) -> Result<u16, DriverError>;

    /// release the socket and every driver resource; the driver may be reopened after
    fn close(&mut self);
}
