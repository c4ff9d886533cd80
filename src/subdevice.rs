/*!
    model of one EtherCAT subdevice as the master drives it

    A [Subdevice] is registered by the host before initialization, carrying the identity
    the wire must confirm and an optional configure hook for startup mailbox writes.
    During `init` it is bound to a topological slot of the driver's table, then its PDO
    windows are linked into the process image. From there on two state words live side by
    side: the *observed* AL status refreshed by the cyclic receive path, and the *logical*
    state the housekeeping machine advances (see the crate docs for the progression).

    Subdevices are shared between the host and the master, so every mutable runtime field
    is either atomic (the two state words) or touched only during initialization.
*/

use crate::driver::{BusDriver, SubdeviceRecord};
use crate::error::DriverError;
use crate::image::PdoWindow;
use crate::registers::{AlState, AlStatusWord};
use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use std::sync::Mutex;

/// the (alias, position) pair addressing one subdevice on a segment
///
/// The alias comes from the configured station alias of the nearest preceding aliased
/// subdevice; the position counts from it along the wire. Addresses survive re-cabling
/// of everything behind the aliased node, which plain topological slots do not.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SubdeviceAddress {
    pub alias: u16,
    pub position: u16,
}

impl fmt::Display for SubdeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alias, self.position)
    }
}

/// logical lifecycle state of a subdevice, as the housekeeping machine tracks it
///
/// The discriminants order the states from least to most advanced, so the aggregate
/// master state is simply the minimum over the segment. The bus progression embedded
/// in that order is `Init < PreOp < Boot < SafeOp < Op`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum SubdeviceState {
    /// not seen on the wire
    Offline = 0,
    /// refused a transition or raised the AL error flag
    Fault = 1,
    /// commanded back to INIT for shutdown
    Shutdown = 2,
    /// observed below its logical state, being re-promoted stepwise
    Recovering = 3,
    Init = 4,
    PreOp = 5,
    Boot = 6,
    SafeOp = 7,
    Op = 8,
}

impl SubdeviceState {
    pub(crate) fn from_al(state: AlState) -> Self {
        match state {
            AlState::Init => Self::Init,
            AlState::PreOperational => Self::PreOp,
            AlState::Bootstrap => Self::Boot,
            AlState::SafeOperational => Self::SafeOp,
            AlState::Operational => Self::Op,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Offline,
            1 => Self::Fault,
            2 => Self::Shutdown,
            3 => Self::Recovering,
            4 => Self::Init,
            5 => Self::PreOp,
            6 => Self::Boot,
            7 => Self::SafeOp,
            _ => Self::Op,
        }
    }
}

/// specifies which part of a dictionary object an [Sdo] descriptor addresses
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SdoPart {
    /// the whole object through complete access
    Complete,
    /// one subindex
    Sub(u8),
}

/// address of a dictionary object used for acyclic parameter access
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Sdo {
    /// index in the slave's object dictionary
    pub index: u16,
    pub part: SdoPart,
    /// transferred byte size
    pub len: usize,
}

impl Sdo {
    /// address a complete object at the given index
    pub const fn complete(index: u16, len: usize) -> Self {
        Self { index, part: SdoPart::Complete, len }
    }

    /// address one subitem
    pub const fn sub(index: u16, sub: u8, len: usize) -> Self {
        Self { index, part: SdoPart::Sub(sub), len }
    }
}

/**
    driver access handed to a subdevice's configure hook

    The hook runs once during `init`, while the segment sits in PRE-OP, and is the
    place for PDO assignment and startup CoE writes. The context borrows the driver
    for the duration of the call, so no handle can outlive configuration.
*/
pub struct ConfigureContext<'a> {
    pub(crate) driver: &'a mut dyn BusDriver,
    pub(crate) slot: usize,
    /// whether distributed clocks survived initialization so far
    pub dc_enabled: bool,
    /// nominal cycle time in nanoseconds, only meaningful with DC
    pub cycle_time_ns: u64,
}

impl ConfigureContext<'_> {
    /// topological slot of the subdevice being configured
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// the driver's record for this subdevice
    pub fn record(&self) -> &SubdeviceRecord {
        self.driver.subdevice(self.slot)
    }

    /// startup SDO download to this subdevice
    pub fn sdo_write(&mut self, sdo: &Sdo, data: &[u8]) -> Result<(), DriverError> {
        let (sub, complete) = match sdo.part {
            SdoPart::Complete => (0, true),
            SdoPart::Sub(sub) => (sub, false),
        };
        self.driver.sdo_write(self.slot, sdo.index, sub, complete, data)
    }

    /// startup SDO upload from this subdevice, returning the bytes stored
    pub fn sdo_read(&mut self, sdo: &Sdo, buffer: &mut [u8]) -> Result<usize, DriverError> {
        let (sub, complete) = match sdo.part {
            SdoPart::Complete => (0, true),
            SdoPart::Sub(sub) => (sub, false),
        };
        self.driver.sdo_read(self.slot, sdo.index, sub, complete, buffer)
    }
}

/// startup hook run once per subdevice during `init`
pub type ConfigureHook =
    Box<dyn Fn(&mut ConfigureContext<'_>) -> Result<(), DriverError> + Send + Sync>;

struct Binding {
    slot: usize,
    dc_enabled: bool,
    cycle_time_ns: u64,
}

/// the two PDO windows of a bound subdevice
#[derive(Default, Copy, Clone, Debug)]
pub struct IoWindows {
    pub outputs: PdoWindow,
    pub inputs: PdoWindow,
}

pub struct Subdevice {
    vendor: u32,
    product: u32,
    address: SubdeviceAddress,
    /// false for placeholders created for unregistered wire devices
    configured: bool,
    hook: Option<ConfigureHook>,
    name: Mutex<String>,
    sdos: Mutex<Vec<Sdo>>,
    binding: Mutex<Option<Binding>>,
    windows: Mutex<Option<IoWindows>>,
    /// raw AL status word last seen by the cyclic receive path, 0 before any frame
    observed: AtomicU16,
    /// logical state, written by the housekeeping machine
    logical: AtomicU8,
    has_shutdown: AtomicBool,
}

impl Subdevice {
    /// declare a subdevice expected at `alias:position` with the given identity
    pub fn new(vendor: u32, product: u32, alias: u16, position: u16) -> Self {
        Self {
            vendor,
            product,
            address: SubdeviceAddress { alias, position },
            configured: true,
            hook: None,
            name: Mutex::new(String::new()),
            sdos: Mutex::new(Vec::new()),
            binding: Mutex::new(None),
            windows: Mutex::new(None),
            observed: AtomicU16::new(0),
            logical: AtomicU8::new(SubdeviceState::Offline as u8),
            has_shutdown: AtomicBool::new(false),
        }
    }

    /// attach a configure hook, builder style
    pub fn on_configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ConfigureContext<'_>) -> Result<(), DriverError> + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// placeholder for a wire device nobody registered
    pub(crate) fn unconfigured(record: &SubdeviceRecord, address: SubdeviceAddress) -> Self {
        let mut placeholder = Self::new(record.vendor, record.product, address.alias, address.position);
        placeholder.configured = false;
        *placeholder.name.get_mut().unwrap() = record.name.clone();
        placeholder
    }

    /// attach an SDO descriptor for acyclic access. Only legal before `init`.
    pub fn register_sdo(&self, sdo: Sdo) {
        assert!(
            self.binding.lock().unwrap().is_none(),
            "SDO registration is only legal before init"
        );
        self.sdos.lock().unwrap().push(sdo);
    }

    /// descriptors attached with [Self::register_sdo]
    pub fn sdos(&self) -> Vec<Sdo> {
        self.sdos.lock().unwrap().clone()
    }

    pub fn vendor(&self) -> u32 {
        self.vendor
    }

    pub fn product(&self) -> u32 {
        self.product
    }

    pub fn address(&self) -> SubdeviceAddress {
        self.address
    }

    /// name string read from the SII, empty before `init`
    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    /// false for placeholders the scan created for unregistered wire devices
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// true once bound to a wire slot by `init`
    pub fn is_online(&self) -> bool {
        self.binding.lock().unwrap().is_some()
    }

    /// current logical state
    pub fn state(&self) -> SubdeviceState {
        SubdeviceState::from_raw(self.logical.load(Ordering::Acquire))
    }

    /// AL status last seen on the wire, `None` before the first frame or after the
    /// subdevice vanished
    pub fn observed_state(&self) -> Option<AlStatusWord> {
        AlStatusWord::decode(self.observed.load(Ordering::Acquire))
    }

    /// PDO windows into the process image, `None` before buffers are linked
    pub fn windows(&self) -> Option<IoWindows> {
        *self.windows.lock().unwrap()
    }

    /// request the shutdown sequence: housekeeping will command INIT and confirm
    pub fn shutdown(&self) {
        self.set_state(SubdeviceState::Shutdown);
    }

    /// true once the driver confirmed the subdevice back in INIT after [Self::shutdown]
    pub fn has_shutdown(&self) -> bool {
        self.has_shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: SubdeviceState) {
        self.logical.store(state as u8, Ordering::Release);
    }

    /// forget a previous binding before a new scan, so a failed `init` can be retried
    pub(crate) fn unbind(&self) {
        *self.binding.lock().unwrap() = None;
        *self.windows.lock().unwrap() = None;
        self.observed.store(0, Ordering::Release);
        self.has_shutdown.store(false, Ordering::Release);
        self.set_state(SubdeviceState::Offline);
    }

    /// bind to a topological slot during `init`. Re-binding is only reached when a
    /// failed `init` is retried.
    pub(crate) fn bind(&self, slot: usize, dc_enabled: bool, cycle_time_ns: u64, wire_name: &str) {
        *self.binding.lock().unwrap() = Some(Binding { slot, dc_enabled, cycle_time_ns });
        *self.windows.lock().unwrap() = None;
        *self.name.lock().unwrap() = wire_name.to_owned();
        self.observed.store(0, Ordering::Release);
        self.has_shutdown.store(false, Ordering::Release);
        self.set_state(SubdeviceState::Init);
    }

    /// run the host's configure hook, then arm sync-0 when DC is active
    pub(crate) fn configure(&self, driver: &mut dyn BusDriver) -> Result<(), DriverError> {
        let (slot, dc_enabled, cycle_time_ns) = {
            let binding = self.binding.lock().unwrap();
            let binding = binding.as_ref().expect("configure before bind");
            (binding.slot, binding.dc_enabled, binding.cycle_time_ns)
        };
        if let Some(hook) = &self.hook {
            let mut context = ConfigureContext { driver, slot, dc_enabled, cycle_time_ns };
            hook(&mut context)?;
        }
        if dc_enabled {
            driver.dc_sync(
                slot,
                true,
                std::time::Duration::from_nanos(cycle_time_ns),
                std::time::Duration::ZERO,
            )?;
        }
        Ok(())
    }

    /// store the PDO windows once the image layout is final
    ///
    /// Legal exactly once per binding, between PRE-OP and SAFE-OP; the windows are
    /// immutable afterwards.
    pub(crate) fn link_buffers(&self, windows: IoWindows) {
        let mut slot = self.windows.lock().unwrap();
        assert!(slot.is_none(), "buffers are linked exactly once");
        *slot = Some(windows);
        self.set_state(SubdeviceState::SafeOp);
    }

    /// refresh the observed state from the driver's cached record.
    /// Called from the cyclic receive path and from the housekeeping machine.
    pub(crate) fn update_state_variables(&self, record: &SubdeviceRecord) {
        self.observed.store(record.al_status, Ordering::Release);
        if self.state() == SubdeviceState::Shutdown {
            if let Some(word) = AlStatusWord::decode(record.al_status) {
                if word.state() == AlState::Init {
                    self.has_shutdown.store(true, Ordering::Release);
                }
            }
        }
    }
}

impl fmt::Debug for Subdevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subdevice")
            .field("address", &self.address)
            .field("vendor", &self.vendor)
            .field("product", &self.product)
            .field("configured", &self.configured)
            .field("state", &self.state())
            .finish()
    }
}
