//! Production adapters for the application-layer ports

mod reqwest_transport;
mod system_clock;
mod tokio_sleeper;

pub use reqwest_transport::ReqwestTransport;
pub use system_clock::SystemClock;
pub use tokio_sleeper::TokioSleeper;
