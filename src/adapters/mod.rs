//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements              | Connects to                   |
//! |----------------|-------------------------|-------------------------------|
//! | `hardware`     | WeightPort, DoorPort    | HX711, door driver GPIO       |
//! |                | TagPort, ClockPort      | RFID reader, clock            |
//! | `log_sink`     | EventSink               | Serial log output             |
//! | `nvs`          | ConfigPort              | NVS / in-memory store         |
//! | `serial_link`  | HostLink                | Any `Transport`               |
//! | `time`         | ClockPort               | ESP32 system timer / `Instant`|
//! | `uart`         | Transport               | ESP-IDF UART driver           |
//! | `serial`       | Transport               | Desktop serial port (`host`)  |
//! | `file_log`     | RunLog                  | Append-only text file         |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod serial_link;
pub mod time;

#[cfg(target_os = "espidf")]
pub mod uart;

#[cfg(all(feature = "host", not(target_os = "espidf")))]
pub mod serial;

#[cfg(not(target_os = "espidf"))]
pub mod file_log;
