//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter            | Implements     | Connects to                   |
//! |--------------------|----------------|-------------------------------|
//! | `assignments`      | GraphResolver  | In-memory ingredient table    |
//! | `log_sink`         | EventSink      | `log` output                  |
//! | `executor_timer`   | TimerService   | edge-executor timer thread    |
//! | `manual_timer`     | TimerService   | Caller-driven clock           |
//! | `tcp_session`      | BoardSession   | Native adapter over TCP       |
//! | `sim_board`        | BoardSession   | In-process simulated board    |
//! | `adapter_listener` | —              | Drives the `LinkController`   |

pub mod adapter_listener;
pub mod assignments;
pub mod executor_timer;
pub mod log_sink;
pub mod manual_timer;
pub mod sim_board;
pub mod tcp_session;
