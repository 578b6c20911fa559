use crate::environment::Environment;
use crate::Value;

/// A callable heap object.
#[derive(Debug, Clone)]
pub enum Function {
    /// A host callback registered in the VM's native table.
    External(ExternalFunction),
    /// Bytecode living in a loaded module.
    Internal(InternalFunction),
}

#[derive(Debug, Clone)]
pub struct ExternalFunction {
    pub name: String,
    /// Index into the VM native table.
    pub native: u32,
}

#[derive(Debug, Clone)]
pub struct InternalFunction {
    pub module: u32,
    pub pc: usize,
    /// Head of the captured lexical chain. `None` means the global scope
    /// (or, for an evaluated promise, that the chain has been released).
    pub entrance: Option<u32>,
    pub kind: FunctionKind,
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    Plain,
    Lambda,
    Promise(PromiseInternal),
    Continuation(ContinuationInternal),
}

#[derive(Debug, Clone, Default)]
pub struct PromiseInternal {
    pub cached: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ContinuationInternal {
    pub environment: Environment,
    /// Smallest running stack size observed since capture.
    pub turning_point: usize,
    /// Id of the thread that captured it. Frame serials are only meaningful
    /// inside that thread.
    pub owner: usize,
}

impl ContinuationInternal {
    pub fn new(environment: Environment, turning_point: usize, owner: usize) -> Self {
        Self {
            environment,
            turning_point,
            owner,
        }
    }

    /// Record a new running stack size. The turning point only moves down.
    pub fn observe_depth(&mut self, size: usize) {
        self.turning_point = self.turning_point.min(size);
    }
}

impl Function {
    pub fn plain(module: u32, pc: usize) -> Self {
        Function::Internal(InternalFunction {
            module,
            pc,
            entrance: None,
            kind: FunctionKind::Plain,
        })
    }

    pub fn lambda(module: u32, pc: usize, entrance: u32) -> Self {
        Function::Internal(InternalFunction {
            module,
            pc,
            entrance: Some(entrance),
            kind: FunctionKind::Lambda,
        })
    }

    pub fn promise(module: u32, pc: usize, entrance: u32) -> Self {
        Function::Internal(InternalFunction {
            module,
            pc,
            entrance: Some(entrance),
            kind: FunctionKind::Promise(PromiseInternal::default()),
        })
    }

    pub fn continuation(
        module: u32,
        pc: usize,
        environment: Environment,
        turning_point: usize,
        owner: usize,
    ) -> Self {
        Function::Internal(InternalFunction {
            module,
            pc,
            entrance: None,
            kind: FunctionKind::Continuation(ContinuationInternal::new(
                environment,
                turning_point,
                owner,
            )),
        })
    }

    pub fn as_internal(&self) -> Option<&InternalFunction> {
        match self {
            Function::Internal(f) => Some(f),
            Function::External(_) => None,
        }
    }

    pub fn as_internal_mut(&mut self) -> Option<&mut InternalFunction> {
        match self {
            Function::Internal(f) => Some(f),
            Function::External(_) => None,
        }
    }

    pub fn as_continuation(&self) -> Option<&ContinuationInternal> {
        match self {
            Function::Internal(InternalFunction {
                kind: FunctionKind::Continuation(c),
                ..
            }) => Some(c),
            _ => None,
        }
    }

    pub fn as_continuation_mut(&mut self) -> Option<&mut ContinuationInternal> {
        match self {
            Function::Internal(InternalFunction {
                kind: FunctionKind::Continuation(c),
                ..
            }) => Some(c),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&PromiseInternal> {
        match self {
            Function::Internal(InternalFunction {
                kind: FunctionKind::Promise(p),
                ..
            }) => Some(p),
            _ => None,
        }
    }

    pub fn is_promise(&self) -> bool {
        self.as_promise().is_some()
    }

    pub fn is_continuation(&self) -> bool {
        self.as_continuation().is_some()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Function::External(_) => "external",
            Function::Internal(f) => match f.kind {
                FunctionKind::Plain => "function",
                FunctionKind::Lambda => "lambda",
                FunctionKind::Promise(_) => "promise",
                FunctionKind::Continuation(_) => "continuation",
            },
        }
    }

    /// Push every handle this function keeps alive onto the tracing worklist.
    pub fn trace_children(&self, worklist: &mut Vec<Value>) {
        let Function::Internal(f) = self else {
            return;
        };
        if let Some(entrance) = f.entrance {
            worklist.push(Value::scope(entrance));
        }
        match &f.kind {
            FunctionKind::Promise(p) => worklist.extend(p.cached),
            FunctionKind::Continuation(c) => c.environment.trace_children(worklist),
            FunctionKind::Plain | FunctionKind::Lambda => {}
        }
    }

    pub(crate) fn approx_size(&self) -> usize {
        let extra = match self {
            Function::External(e) => e.name.capacity(),
            Function::Internal(f) => match &f.kind {
                FunctionKind::Continuation(c) => c.environment.approx_size(),
                _ => 0,
            },
        };
        std::mem::size_of::<Function>() + extra
    }
}
