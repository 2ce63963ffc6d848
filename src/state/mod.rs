//! View-side state holders wrapping the resource clients.
//!
//! Each container runs one action at a time (`&mut self`) and moves through
//! [`Phase`]: an action starts `Loading`, then ends in `Success` or `Error`.
//! A failed action keeps a display message and hands the error back so the
//! caller can react locally.

pub mod auth;
pub mod stocks;
pub mod watchlists;

use std::future::Future;

use crate::client::ClientError;

pub use auth::AuthState;
pub use stocks::StockState;
pub use watchlists::WatchlistState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct Status {
    pub phase: Phase,
    pub error: Option<String>,
}

impl Status {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    fn begin(&mut self) {
        self.phase = Phase::Loading;
        self.error = None;
    }

    fn finish(&mut self) {
        self.phase = Phase::Success;
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        self.error = Some(err.display_message());
        self.phase = Phase::Error;
        err
    }

    /// Drive `fut` through Loading into Success or Error.
    async fn track<T>(
        &mut self,
        fut: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        self.begin();
        match fut.await {
            Ok(v) => {
                self.finish();
                Ok(v)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}
