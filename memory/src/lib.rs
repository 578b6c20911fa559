pub mod environment;
pub mod function;
pub mod heap;
pub mod scope;
pub mod value;


pub use environment::{Environment, EnvironmentFrame};
pub use function::{
    ContinuationInternal, ExternalFunction, Function, FunctionKind, InternalFunction,
    PromiseInternal,
};
pub use heap::{Arena, Heap, SweepStats};
pub use scope::Scope;
pub use value::Value;
