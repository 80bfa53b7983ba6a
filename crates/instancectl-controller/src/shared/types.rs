pub use instancectl_core::{
    Action, InstanceDescription, InstanceState, Operation, OperationRequest, OperationResult,
    StateChange, ValidatedOperation,
};
