//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                  |
//! |------------|--------------------|------------------------------|
//! | `http`     | (control surface)  | ESP-IDF HTTP server          |
//! | `log_sink` | EventSink          | Serial log output            |
//! | `mqtt`     | EventSink          | ESP-IDF MQTT client          |
//! |            | MqttPublisher      |                              |
//! | `nvs`      | ConfigPort         | NVS / in-memory store        |
//! |            | StoragePort        |                              |
//! | `time`     | Clock              | ESP32 system timer           |
//! | `wifi`     | StationPort        | ESP-IDF WiFi STA / AP        |
//! |            | (event forwarding) | System event loop            |

pub mod http;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
