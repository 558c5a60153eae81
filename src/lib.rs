pub mod config;
pub mod dispatcher;
pub mod http;
pub mod logging;
pub mod recognition;
pub mod session;
pub mod transport;

pub use crate::config::{CliOverrides, Config};
pub use dispatcher::{DispatchError, Dispatcher, RecognitionCall, RunFailure};
pub use http::{create_router, serve, AppState};
pub use recognition::{
    load_model, EnergyModel, Recognition, RecognitionModel, Recognizer, RecognizerOptions,
    ResultKind,
};
pub use session::{ExitReason, Message, Session, SessionConfig, SessionState, SessionStats};
pub use transport::{Frame, Transport, WsTransport};
