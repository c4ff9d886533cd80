//! structs and consts for the few slave register words the master core interprets itself.
//! Everything else on the wire is the driver's business.

use bilge::prelude::*;

/// AL state machine states, ETG.1000.6 table 9
///
/// `Bootstrap` is only reachable from `Init` and only used for firmware download.
#[bitsize(4)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlState {
    /// no mailbox, no process data
    Init = 0x1,
    /// mailbox communication possible
    PreOperational = 0x2,
    /// firmware download state
    Bootstrap = 0x3,
    /// inputs are valid, outputs are ignored by the slave
    SafeOperational = 0x4,
    /// inputs and outputs are live
    Operational = 0x8,
}

/// AL status word as cached in the driver's subdevice table, ETG.1000.6 table 14
#[bitsize(16)]
#[derive(TryFromBits, DebugBits, Copy, Clone)]
pub struct AlStatusWord {
    pub state: AlState,
    /// the slave refused or dropped a state, the AL status code tells why
    pub error: bool,
    /// device identification value loaded
    pub identification: bool,
    reserved: u10,
}

impl AlStatusWord {
    /// decode a raw status word, `None` for words whose state nibble is not a valid [AlState]
    /// (a zeroed record means the slave vanished from the segment)
    pub fn decode(raw: u16) -> Option<Self> {
        Self::try_from(raw).ok()
    }
}

/// CoE details byte from the SII mailbox section, ETG.2010 table 18
///
/// The master clears [Self::complete_access] before mailbox startup on slaves that
/// misreport support for it.
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone)]
pub struct CoeDetails {
    /// SDO requests supported
    pub sdo: bool,
    /// SDO information service supported
    pub sdo_info: bool,
    /// PDO assign objects (0x1c1x) writable
    pub pdo_assign: bool,
    /// PDO configuration objects writable
    pub pdo_config: bool,
    /// PDO upload supported
    pub upload: bool,
    /// SDO complete access supported
    pub complete_access: bool,
    reserved: u2,
}

impl Default for CoeDetails {
    fn default() -> Self {
        Self::from(0u8)
    }
}
