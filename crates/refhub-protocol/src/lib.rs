//! Wire protocol for refhub.
//!
//! Defines the JSON-RPC 2.0 envelope, the hub's method surface, the typed
//! request/result payload shapes, the coded error taxonomy, and the framing
//! codec (newline-delimited JSON) used between refhub clients and servers.

pub mod codec;
pub mod error;
pub mod message;
pub mod methods;
pub mod params;

pub use codec::{RpcCodec, MAX_FRAME_SIZE};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{ErrorCode, Message, Request, RequestId, Response, RpcError, JSONRPC_VERSION};
pub use params::{
    Capabilities, ConfigureParams, DebugLogParams, InitializeParams, InitializeResult,
    RefInfoParams, RefInfoResult, RefListItem, RefUpdateNotification, RefUpdateParams,
    RepoParams, WatchParams,
};
