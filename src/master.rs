/*!
    the master: lifecycle, configuration and the cyclic exchange

    One [Master] owns the driver, the process image and the registry of subdevices for a
    single segment. The host drives it through three entry points:

    - [Master::send] / [Master::receive] from the realtime cyclic thread
    - [Master::do_housekeeping] from a non-realtime thread (or interleaved after receive)

    ## Concurrency contract

    The driver is not reentrant, so the master serializes every driver call behind one
    internal mutex. A host honoring the documented contract (never call housekeeping
    concurrently with send/receive) never contends on it; a host that cannot guarantee
    that stays correct and only pays the lock. Everything the realtime thread publishes
    (working counter, jitter estimate, observed subdevice states) goes through atomics,
    so the getters never block.
*/

use crate::driver::{fastirq, BusDriver, GroupRecord, SubdeviceRecord, NO_FRAME};
use crate::error::{EthercatResult, MasterError};
use crate::housekeeping;
use crate::image::{PdoWindow, ProcessImage};
use crate::jitter::JitterEstimator;
use crate::registers::AlState;
use crate::status::{LogStatus, MasterEvent, StatusCallback, TraceEvent};
use crate::subdevice::{IoWindows, Subdevice, SubdeviceAddress, SubdeviceState};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// default bound on the jitter estimate before subdevices are allowed into OP
pub const MAX_EXECUTION_JITTER_DEFAULT: Duration = Duration::from_nanos(25_000);

/// default timeout of [Master::receive]
pub const RECEIVE_TIMEOUT_DEFAULT: Duration = Duration::from_micros(2_000);

/// how long `init` waits for the segment to settle in a requested state
const STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(2);

/// one master per process: the NIC tuning and the raw socket do not share
static MASTER_CLAIMED: AtomicBool = AtomicBool::new(false);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Phase {
    Created,
    Running,
    Shut,
}

/// everything living behind the driver mutex
pub(crate) struct Bus {
    pub(crate) driver: Box<dyn BusDriver>,
    pub(crate) image: ProcessImage,
    pub(crate) phase: Phase,
    /// round-robin cursor of the RX statistics poll
    pub(crate) rx_cursor: usize,
}

pub struct Master {
    interface: String,
    require_all: bool,
    recovery_disabled: bool,
    read_rx_errors: bool,
    disable_complete_access: bool,
    receive_timeout: Duration,
    dc_requested: bool,
    cycle_time: Duration,
    max_execution_jitter: Duration,
    status: Box<dyn StatusCallback>,

    /// subdevices the host registered, by registration order
    registered: Vec<Arc<Subdevice>>,
    /// subdevices bound to wire slots, by topological order. Written by `init` only.
    map: Vec<Arc<Subdevice>>,

    bus: Mutex<Bus>,
    owns_claim: AtomicBool,
    shut: AtomicBool,
    fault: AtomicBool,
    dc_enabled: AtomicBool,
    expected_wkc: AtomicI32,
    actual_wkc: AtomicI32,
    start_dc_time: AtomicI64,
    jitter: JitterEstimator,
}

impl Master {
    /**
        create a master listening on `interface`, exchanging datagrams through `driver`

        Only a single master per process is supported; a second call fails with
        [MasterError::AlreadyInitialized] until the first master is shut down or dropped.
    */
    pub fn new<D: BusDriver + 'static>(
        driver: D,
        interface: impl Into<String>,
    ) -> EthercatResult<Self> {
        if MASTER_CLAIMED.swap(true, Ordering::AcqRel) {
            return Err(MasterError::AlreadyInitialized);
        }
        Ok(Self {
            interface: interface.into(),
            require_all: true,
            recovery_disabled: false,
            read_rx_errors: false,
            disable_complete_access: true,
            receive_timeout: RECEIVE_TIMEOUT_DEFAULT,
            dc_requested: false,
            cycle_time: Duration::ZERO,
            max_execution_jitter: MAX_EXECUTION_JITTER_DEFAULT,
            status: Box::new(LogStatus::new(false)),
            registered: Vec::new(),
            map: Vec::new(),
            bus: Mutex::new(Bus {
                driver: Box::new(driver),
                image: ProcessImage::unallocated(),
                phase: Phase::Created,
                rx_cursor: 0,
            }),
            owns_claim: AtomicBool::new(true),
            shut: AtomicBool::new(false),
            fault: AtomicBool::new(false),
            dc_enabled: AtomicBool::new(false),
            expected_wkc: AtomicI32::new(0),
            actual_wkc: AtomicI32::new(0),
            start_dc_time: AtomicI64::new(0),
            jitter: JitterEstimator::new(),
        })
    }

    // ==============================  configuration  ==============================

    /// register a subdevice for cyclic operation, returning the shared handle the host
    /// keeps for process data access. Call before [Self::init].
    pub fn register_subdevice(&mut self, subdevice: Subdevice) -> Arc<Subdevice> {
        assert!(
            self.bus.lock().unwrap().phase == Phase::Created,
            "subdevices are registered before init"
        );
        let subdevice = Arc::new(subdevice);
        self.registered.push(subdevice.clone());
        subdevice
    }

    /// enable distributed clocks with the given cycle time between two [Self::send] calls
    pub fn enable_dc(&mut self, cycle_time: Duration) {
        self.dc_requested = true;
        self.cycle_time = cycle_time;
    }

    /// require every registered subdevice online and every wire device registered
    /// (default). When cleared, `init` configures what it finds and leaves the rest.
    pub fn set_require_all_subdevices(&mut self, require: bool) {
        self.require_all = require;
    }

    pub fn require_all_subdevices(&self) -> bool {
        self.require_all
    }

    /// timeout for collecting the cyclic datagram in [Self::receive]
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    /// bound on the jitter estimate before OP promotion, only used with DC.
    /// Too tight a bound makes subdevices refuse to ever reach OP.
    pub fn set_maximum_execution_jitter(&mut self, bound: Duration) {
        self.max_execution_jitter = bound;
    }

    /// never re-promote regressed subdevices: latch the whole master faulted instead.
    /// Recommended where losing a node must stop the machine rather than limp along.
    pub fn disable_recovery(&mut self) {
        self.recovery_disabled = true;
    }

    pub fn recovery_disabled(&self) -> bool {
        self.recovery_disabled
    }

    /// poll one subdevice RX error counter per housekeeping call and report it
    pub fn set_read_rx_error_statistics(&mut self, read: bool) {
        self.read_rx_errors = read;
    }

    pub fn read_rx_error_statistics(&self) -> bool {
        self.read_rx_errors
    }

    /// clear to let subdevices advertising SDO complete access actually use it.
    /// Set by default: enough devices misreport support that opting in is safer.
    pub fn set_disable_complete_access(&mut self, disable: bool) {
        self.disable_complete_access = disable;
    }

    /// replace the status callback receiving [MasterEvent]s
    pub fn set_status_callback(&mut self, callback: impl StatusCallback + 'static) {
        self.status = Box::new(callback);
    }

    /// log every status event, including initialization progress
    pub fn enable_trace(&mut self) {
        self.status = Box::new(LogStatus::new(true));
    }

    // ==============================  lifecycle  ==============================

    /**
        scan the segment, bind and configure registered subdevices, lay out the process
        image and bring every node to SAFE-OP

        On success the cyclic exchange may start immediately; subdevices reach OP through
        [Self::do_housekeeping] once the working counter (and with DC, the jitter
        estimate) proves the cycle healthy. On failure the driver is closed again and
        `init` may be retried.
    */
    pub fn init(&mut self) -> EthercatResult {
        let map = {
            let mut bus = self.bus.lock().unwrap();
            match bus.phase {
                Phase::Created => {}
                Phase::Running => return Err(MasterError::AlreadyInitialized),
                Phase::Shut => return Err(MasterError::NotRunning),
            }

            for (i, first) in self.registered.iter().enumerate() {
                for second in &self.registered[i + 1..] {
                    if first.address() == second.address() {
                        return Err(MasterError::DuplicateRegistration(first.address()));
                    }
                }
            }

            self.report(MasterEvent::Trace(TraceEvent::FastIrq));
            match bus.driver.setup_fast_irq(&self.interface) {
                fastirq::OK => {}
                fastirq::NOT_LINUX => self.report(MasterEvent::CoalesceTuningFailed(
                    "no interrupt coalescing control on this OS",
                )),
                fastirq::NO_DRIVER_INFO => self.report(MasterEvent::CoalesceTuningFailed(
                    "cannot read driver info from the network card",
                )),
                fastirq::CANNOT_READ_COALESCE => self.report(MasterEvent::CoalesceTuningFailed(
                    "cannot read current coalescing options from the network card",
                )),
                fastirq::CANNOT_WRITE_COALESCE => self.report(MasterEvent::CoalesceTuningFailed(
                    "cannot write coalescing options to the network card",
                )),
                fastirq::NO_PERMISSION => {
                    return Err(MasterError::PermissionDenied(self.interface.clone()))
                }
                code => return Err(MasterError::Internal(code)),
            }

            self.report(MasterEvent::Trace(TraceEvent::CreateContext));
            self.report(MasterEvent::Trace(TraceEvent::OpenInterface));
            bus.driver
                .open(&self.interface)
                .map_err(|_| MasterError::InterfaceUnavailable(self.interface.clone()))?;

            // past this point a failure must close the driver again so `init` stays
            // retryable
            match self.scan_and_configure(&mut bus) {
                Ok(map) => {
                    bus.phase = Phase::Running;
                    map
                }
                Err(error) => {
                    bus.driver.close();
                    return Err(error);
                }
            }
        };
        self.map = map;
        self.report(MasterEvent::Trace(TraceEvent::ConfigureComplete));
        Ok(())
    }

    fn scan_and_configure(&self, bus: &mut Bus) -> EthercatResult<Vec<Arc<Subdevice>>> {
        for subdevice in &self.registered {
            subdevice.unbind();
        }

        self.report(MasterEvent::Trace(TraceEvent::InitializingSubdevices));
        let count = bus.driver.config_init().map_err(|_| MasterError::ScanFailed)?;
        if count == 0 {
            return Err(MasterError::ScanFailed);
        }
        self.report(MasterEvent::Trace(TraceEvent::WaitForPreOp));
        if bus.driver.state_check(None, AlState::PreOperational, STATE_CHANGE_TIMEOUT)
            != AlState::PreOperational
        {
            return Err(MasterError::StateTransitionFailed(AlState::PreOperational));
        }

        let mut dc = self.dc_requested;
        if dc {
            dc = bus.driver.config_dc()?;
            if !dc {
                self.report(MasterEvent::DcNotCapable);
            }
        }
        self.dc_enabled.store(dc, Ordering::Release);
        self.report(MasterEvent::Trace(if dc {
            TraceEvent::DcEnabled
        } else {
            TraceEvent::DcDisabled
        }));

        self.report(MasterEvent::Trace(TraceEvent::ConfiguringSubdevices));
        let cycle_ns = self.cycle_time.as_nanos() as u64;
        let mut map: Vec<Arc<Subdevice>> = Vec::with_capacity(count);
        let mut unconfigured: Vec<SubdeviceAddress> = Vec::new();
        let mut image_size = 0usize;
        let mut previous: Option<SubdeviceAddress> = None;

        for slot in 0..count {
            let record = bus.driver.subdevice(slot).clone();
            let address = next_address(previous, record.alias_address);
            previous = Some(address);

            let subdevice = match self.find_registered(address) {
                Some(subdevice) => {
                    if subdevice.vendor() != record.vendor || subdevice.product() != record.product
                    {
                        return Err(MasterError::IdentityMismatch {
                            slot,
                            address,
                            expected_vendor: subdevice.vendor(),
                            expected_product: subdevice.product(),
                            wire_vendor: record.vendor,
                            wire_product: record.product,
                        });
                    }
                    subdevice.bind(slot, dc, cycle_ns, &record.name);
                    subdevice.configure(bus.driver.as_mut())?;
                    subdevice
                }
                None => {
                    let placeholder = Arc::new(Subdevice::unconfigured(&record, address));
                    placeholder.bind(slot, false, cycle_ns, &record.name);
                    self.report(MasterEvent::UnconfiguredSubdevice {
                        address,
                        name: record.name.clone(),
                        vendor: record.vendor,
                        product: record.product,
                    });
                    unconfigured.push(address);
                    placeholder
                }
            };

            // mask complete access before any mailbox startup happens on this slot
            if !record.coe_details.complete_access() || self.disable_complete_access {
                bus.driver
                    .subdevice_mut(slot)
                    .coe_details
                    .set_complete_access(false);
            }
            image_size += process_data_size(&record);
            map.push(subdevice);
        }

        let offline: Vec<SubdeviceAddress> = self
            .registered
            .iter()
            .filter(|subdevice| !subdevice.is_online())
            .map(|subdevice| subdevice.address())
            .collect();
        for address in &offline {
            self.report(MasterEvent::SubdeviceNotFound(*address));
        }
        if self.require_all {
            if !offline.is_empty() {
                return Err(MasterError::SubdevicesOffline(offline));
            }
            if !unconfigured.is_empty() {
                return Err(MasterError::SubdevicesUnconfigured(unconfigured));
            }
            if count != self.registered.len() {
                return Err(MasterError::SubdeviceCountMismatch {
                    expected: self.registered.len(),
                    actual: count,
                });
            }
        }

        self.report(MasterEvent::Trace(TraceEvent::AllocateIomap));
        let mut image = ProcessImage::allocate(image_size);
        let required = bus.driver.config_map_group(image.as_mut_slice(), 0)?;
        if required > image.len() {
            return Err(MasterError::ProcessImageTooSmall {
                required,
                allocated: image.len(),
            });
        }

        if bus.driver.state_check(None, AlState::SafeOperational, STATE_CHANGE_TIMEOUT)
            != AlState::SafeOperational
        {
            return Err(MasterError::StateTransitionFailed(AlState::SafeOperational));
        }

        self.report(MasterEvent::Trace(TraceEvent::LinkBuffers));
        let mut windows: Vec<IoWindows> = Vec::with_capacity(map.len());
        for slot in 0..map.len() {
            let record = bus.driver.subdevice(slot);
            let linked = IoWindows {
                outputs: PdoWindow { offset: record.output_offset, len: record.output_bytes },
                inputs: PdoWindow { offset: record.input_offset, len: record.input_bytes },
            };
            if linked.outputs.range().end > image.len() || linked.inputs.range().end > image.len()
            {
                return Err(MasterError::ImageLayout("window outside the process image"));
            }
            for other in &windows {
                if linked.outputs.overlaps(&other.outputs) || linked.inputs.overlaps(&other.inputs)
                {
                    return Err(MasterError::ImageLayout("windows of two subdevices overlap"));
                }
            }
            windows.push(linked);
        }
        for (subdevice, linked) in map.iter().zip(windows) {
            subdevice.link_buffers(linked);
        }

        // prime the cyclic datagram once so the group working counters are known
        self.report(MasterEvent::Trace(TraceEvent::ConfigureTxRx));
        bus.driver.send_process_data(image.as_slice());
        bus.driver.receive_process_data(image.as_mut_slice(), self.receive_timeout);
        let group: &GroupRecord = bus.driver.group(0);
        let expected = i32::from(group.outputs_wkc) * 2 + i32::from(group.inputs_wkc);
        self.expected_wkc.store(expected, Ordering::Release);
        self.actual_wkc.store(0, Ordering::Release);
        self.report(MasterEvent::ExpectedWorkingCounter(expected));

        if dc {
            self.start_dc_time.store(bus.driver.dc_time(), Ordering::Release);
        }

        self.fault.store(false, Ordering::Release);
        bus.image = image;
        Ok(map)
    }

    /**
        bring every subdevice back to INIT, close the driver and release the interface

        Terminal: the master is unusable afterwards, but the process-wide claim is
        released so a fresh master can be created. A second call is an error and has no
        further effect.
    */
    pub fn shutdown(&self) -> EthercatResult {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return Err(MasterError::NotRunning);
        }
        self.report(MasterEvent::Trace(TraceEvent::StopHousekeeper));
        let _ = bus.driver.request_state(None, AlState::Init);
        for subdevice in &self.map {
            subdevice.set_state(SubdeviceState::Shutdown);
        }
        bus.driver.close();
        bus.phase = Phase::Shut;
        self.shut.store(true, Ordering::Release);
        self.release_claim();
        Ok(())
    }

    /**
        run the subdevice shutdown sequence, commanding INIT on every node that did not
        confirm yet. Call cyclically from the housekeeping thread before
        [Self::shutdown]; returns true once every subdevice reports
        [Subdevice::has_shutdown].
    */
    pub fn shutdown_subdevices(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return true;
        }
        for (slot, subdevice) in self.map.iter().enumerate() {
            if !subdevice.has_shutdown() {
                subdevice.shutdown();
                let _ = bus.driver.request_state(Some(slot), AlState::Init);
            }
        }
        if bus.driver.read_states().is_ok() {
            for (slot, subdevice) in self.map.iter().enumerate() {
                subdevice.update_state_variables(bus.driver.subdevice(slot));
            }
        }
        self.map.iter().all(|subdevice| subdevice.has_shutdown())
    }

    // ==============================  cyclic engine  ==============================

    /// hand the current output image to the driver for transmission. Call cyclically,
    /// before [Self::receive]. May block briefly on the raw socket.
    pub fn send(&self) {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return;
        }
        let Bus { driver, image, .. } = &mut *bus;
        driver.send_process_data(image.as_slice());
    }

    /**
        collect the cyclic datagram, returning its working counter

        Blocks up to the configured receive timeout. On [NO_FRAME] nothing else happens;
        on a frame the jitter estimator (with DC), the published working counter and
        every subdevice's observed state are refreshed. Compare the result against
        [Self::expected_working_counter]; a mismatch is reported as a value, never as a
        panic or error, so the realtime thread never unwinds.
    */
    pub fn receive(&self) -> i32 {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return NO_FRAME;
        }
        let Bus { driver, image, .. } = &mut *bus;
        let wkc = driver.receive_process_data(image.as_mut_slice(), self.receive_timeout);
        if wkc == NO_FRAME {
            return NO_FRAME;
        }
        if self.dc_enabled() {
            self.jitter.record(driver.dc_time(), self.cycle_time.as_nanos() as i64);
        }
        self.actual_wkc.store(wkc, Ordering::Release);
        for (slot, subdevice) in self.map.iter().enumerate() {
            subdevice.update_state_variables(driver.subdevice(slot));
        }
        wkc
    }

    /// receive without refreshing jitter, working counter or subdevice states.
    /// Use for the extra datagrams when the host exchanges several per cycle.
    pub fn receive_simple(&self) -> i32 {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return NO_FRAME;
        }
        let Bus { driver, image, .. } = &mut *bus;
        driver.receive_process_data(image.as_mut_slice(), self.receive_timeout)
    }

    /// run one bounded pass of the housekeeping state machine: promote healthy
    /// subdevices towards OP, start recovery of regressed ones. Never call concurrently
    /// with [Self::send]/[Self::receive] (the internal mutex keeps even a misbehaving
    /// host correct, at the price of cycle latency).
    pub fn do_housekeeping(&self) {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return;
        }
        housekeeping::run_once(self, &mut bus, &self.map);
    }

    // ==============================  accessors  ==============================

    /// aggregate state: the least advanced logical state on the segment
    pub fn state(&self) -> SubdeviceState {
        if self.shut.load(Ordering::Acquire) {
            return SubdeviceState::Shutdown;
        }
        if self.fault.load(Ordering::Acquire) {
            return SubdeviceState::Fault;
        }
        self.map
            .iter()
            .map(|subdevice| subdevice.state())
            .min()
            .unwrap_or(SubdeviceState::Offline)
    }

    /// every subdevice the host registered, whether or not it is online
    pub fn subdevices(&self) -> &[Arc<Subdevice>] {
        &self.registered
    }

    /// byte size of the allocated process image, 0 before `init`
    pub fn process_image_size(&self) -> usize {
        self.bus.lock().unwrap().image.len()
    }

    /**
        run `operation` with exclusive access to the process image

        This serializes with the cyclic engine the same way [Self::do_housekeeping]
        does, so the usual contract applies: from the cyclic thread itself access is
        free, from anywhere else it must not race the cyclic pair. Returns `None`
        before `init` and after `shutdown`.
    */
    pub fn process_data<R>(&self, operation: impl FnOnce(&mut ProcessImage) -> R) -> Option<R> {
        let mut bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return None;
        }
        Some(operation(&mut bus.image))
    }

    /// working counter a healthy cycle comes back with, known after `init`
    pub fn expected_working_counter(&self) -> i32 {
        self.expected_wkc.load(Ordering::Acquire)
    }

    /// working counter of the last received datagram
    pub fn actual_working_counter(&self) -> i32 {
        self.actual_wkc.load(Ordering::Acquire)
    }

    /// whether distributed clocks survived `init`
    pub fn dc_enabled(&self) -> bool {
        self.dc_enabled.load(Ordering::Acquire)
    }

    /// reference clock time captured when the last datagram passed it
    pub fn dc_time(&self) -> i64 {
        let bus = self.bus.lock().unwrap();
        if bus.phase != Phase::Running {
            return 0;
        }
        bus.driver.dc_time()
    }

    /// reference clock time recorded when `init` completed
    pub fn start_dc_time(&self) -> i64 {
        self.start_dc_time.load(Ordering::Acquire)
    }

    /// estimate of the cyclic arrival jitter in nanoseconds, 0 without DC
    pub fn jitter_estimate(&self) -> i64 {
        self.jitter.estimate()
    }

    /// samples integrated into the jitter estimate
    pub fn jitter_samples(&self) -> u64 {
        self.jitter.samples()
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    // ==============================  internal  ==============================

    pub(crate) fn report(&self, event: MasterEvent) {
        self.status.report(event);
    }

    pub(crate) fn jitter(&self) -> &JitterEstimator {
        &self.jitter
    }

    pub(crate) fn max_execution_jitter_ns(&self) -> i64 {
        self.max_execution_jitter.as_nanos() as i64
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    pub(crate) fn latch_fault(&self) {
        self.fault.store(true, Ordering::Release);
    }

    fn find_registered(&self, address: SubdeviceAddress) -> Option<Arc<Subdevice>> {
        self.registered
            .iter()
            .find(|subdevice| subdevice.address() == address)
            .cloned()
    }

    fn release_claim(&self) {
        if self.owns_claim.swap(false, Ordering::AcqRel) {
            MASTER_CLAIMED.store(false, Ordering::Release);
        }
    }
}

impl Drop for Master {
    fn drop(&mut self) {
        let bus = self.bus.get_mut().unwrap_or_else(PoisonError::into_inner);
        if bus.phase == Phase::Running {
            bus.driver.close();
            bus.phase = Phase::Shut;
        }
        self.release_claim();
    }
}

/**
    addressing law of the segment

    A subdevice reporting alias 0 (or repeating the previous alias) sits behind the last
    aliased node and continues its position count; a fresh alias restarts positions at 0.
*/
pub(crate) fn next_address(
    previous: Option<SubdeviceAddress>,
    reported_alias: u16,
) -> SubdeviceAddress {
    match previous {
        Some(previous) if reported_alias == 0 || reported_alias == previous.alias => {
            SubdeviceAddress { alias: previous.alias, position: previous.position + 1 }
        }
        None if reported_alias == 0 => SubdeviceAddress { alias: 0, position: 0 },
        _ => SubdeviceAddress { alias: reported_alias, position: 0 },
    }
}

/// cyclic bytes one subdevice contributes to the process image: every configured
/// sync manager region carrying process data
pub(crate) fn process_data_size(record: &SubdeviceRecord) -> usize {
    use crate::driver::SyncManagerKind::{ProcessInputs, ProcessOutputs};
    record
        .sync_managers
        .iter()
        .filter(|sm| sm.start_address != 0)
        .filter(|sm| matches!(sm.kind, ProcessOutputs | ProcessInputs))
        .map(|sm| sm.length as usize)
        .sum()
}
