//! GPIO / peripheral pin assignments for the access-control board.
//!
//! Single source of truth: `main` builds every driver from these numbers
//! rather than hard-coding pins.

// ---------------------------------------------------------------------------
// Load cell (HX711)
// ---------------------------------------------------------------------------

/// HX711 PD_SCK, push-pull output.
pub const LOADCELL_SCK_GPIO: i32 = 4;
/// HX711 DOUT, input (LOW = conversion ready).
pub const LOADCELL_DOUT_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Door magnets (dual half-bridge per door)
// ---------------------------------------------------------------------------

/// High-side driver inputs, indexed by door (0 = entry outer … 3 = exit outer).
pub const DOOR_HIGH_GPIO: [i32; 4] = [6, 7, 15, 16];
/// Low-side driver inputs, same indexing.
pub const DOOR_LOW_GPIO: [i32; 4] = [8, 9, 10, 11];
/// Driver-enable lines for the two bridge ICs (active HIGH).
pub const DOOR_ENABLE_GPIO: [i32; 2] = [12, 13];
/// Door position switches, same indexing (HIGH = door open).
pub const DOOR_SENSE_GPIO: [i32; 4] = [1, 2, 3, 14];

// ---------------------------------------------------------------------------
// RFID reader (UART1)
// ---------------------------------------------------------------------------

pub const RFID_UART_TX_GPIO: i32 = 17;
pub const RFID_UART_RX_GPIO: i32 = 18;
/// RWD-QT clear-to-send input (LOW = ready).  Unused by Priority 1 modules.
pub const RFID_CTS_GPIO: i32 = 21;
/// Baud rate of both supported reader families.
pub const RFID_BAUD: u32 = 9600;

// ---------------------------------------------------------------------------
// Host link (UART0, USB bridge)
// ---------------------------------------------------------------------------

pub const HOST_UART_TX_GPIO: i32 = 43;
pub const HOST_UART_RX_GPIO: i32 = 44;
pub const HOST_BAUD: u32 = 115_200;
