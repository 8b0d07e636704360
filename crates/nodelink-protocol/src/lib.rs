mod operation;
mod protocol;

pub use operation::{OperationState, OperationStatus};
pub use protocol::{
    RpcErrorBody, RpcRequest, RpcResponse, DEFAULT_REQUEST_ID, INTERNAL_ERROR, METHOD_NOT_FOUND,
    RPC_IN_WARMUP, RPC_VERSION,
};
