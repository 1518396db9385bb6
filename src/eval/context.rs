use std::{fmt, sync::Arc};

use crate::config::SamplingConfig;
use crate::prompt::Role;
use crate::provider::provider::CompletionProvider;

/// One step of an output address: a named slot or a position in a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for AddressSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSegment::Field(name) => write!(f, "{}", name),
            AddressSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Dotted rendering of an address, e.g. `topics.2.items`.
pub fn format_address(address: &[AddressSegment]) -> String {
    address
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Per-node execution configuration.
///
/// A context is never mutated in place: role blocks and iteration scopes derive
/// a copy with [`Context::derive`] and hand it to their children.
#[derive(Clone)]
pub struct Context {
    pub role: Role,
    /// Where `gen`/`wait` write in the output tree.
    pub output_address: Vec<AddressSegment>,
    /// Address of the innermost `map`/`repeat` element entered, if any.
    pub leaf_id: Option<Vec<AddressSegment>>,
    /// When set, `gen` appends to a list slot instead of overwriting a scalar.
    pub array_scoped: bool,
    pub stream: bool,
    pub sampling: SamplingConfig,
    pub model: Arc<dyn CompletionProvider>,
}

impl Context {
    pub fn new(model: Arc<dyn CompletionProvider>) -> Self {
        Self {
            role: Role::None,
            output_address: Vec::new(),
            leaf_id: None,
            array_scoped: false,
            stream: false,
            sampling: SamplingConfig::default(),
            model,
        }
    }

    pub fn derive(&self, patch: ContextPatch) -> Context {
        let ContextPatch {
            role,
            output_address,
            leaf_id,
            array_scoped,
            stream,
            sampling,
            model,
        } = patch;
        Context {
            role: role.unwrap_or(self.role),
            output_address: output_address.unwrap_or_else(|| self.output_address.clone()),
            leaf_id: leaf_id.or_else(|| self.leaf_id.clone()),
            array_scoped: array_scoped.unwrap_or(self.array_scoped),
            stream: stream.unwrap_or(self.stream),
            sampling: sampling.unwrap_or_else(|| self.sampling.clone()),
            model: model.unwrap_or_else(|| Arc::clone(&self.model)),
        }
    }

    /// Context for element `index` of the iteration `name`.
    pub fn enter_iteration(&self, name: &str, index: usize) -> Context {
        let mut output_address = self.output_address.clone();
        output_address.push(AddressSegment::Field(name.to_string()));
        output_address.push(AddressSegment::Index(index));
        self.derive(
            ContextPatch::default()
                .output_address(output_address.clone())
                .leaf_id(output_address)
                .array_scoped(false),
        )
    }

    /// True when this node is the direct body of a `map`/`repeat` element.
    pub fn in_iteration_body(&self) -> bool {
        self.leaf_id.as_ref() == Some(&self.output_address)
    }

    /// Whether the elements of a list evaluated here are repetitions that
    /// should collect into list slots. Lists directly inside an iteration body
    /// only group siblings; inside a role block they always repeat.
    pub fn scopes_lists(&self) -> bool {
        self.role != Role::None || !self.in_iteration_body()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("role", &self.role)
            .field("output_address", &format_address(&self.output_address))
            .field("leaf_id", &self.leaf_id.as_deref().map(format_address))
            .field("array_scoped", &self.array_scoped)
            .field("stream", &self.stream)
            .field("sampling", &self.sampling)
            .field("model", &self.model.name())
            .finish()
    }
}

/// Field-wise override for a [`Context`]. Unset fields inherit.
#[derive(Clone, Default)]
pub struct ContextPatch {
    pub role: Option<Role>,
    pub output_address: Option<Vec<AddressSegment>>,
    pub leaf_id: Option<Vec<AddressSegment>>,
    pub array_scoped: Option<bool>,
    pub stream: Option<bool>,
    pub sampling: Option<SamplingConfig>,
    pub model: Option<Arc<dyn CompletionProvider>>,
}

impl ContextPatch {
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn output_address(mut self, address: Vec<AddressSegment>) -> Self {
        self.output_address = Some(address);
        self
    }

    pub fn leaf_id(mut self, leaf_id: Vec<AddressSegment>) -> Self {
        self.leaf_id = Some(leaf_id);
        self
    }

    pub fn array_scoped(mut self, array_scoped: bool) -> Self {
        self.array_scoped = Some(array_scoped);
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = Some(sampling);
        self
    }

    pub fn model(mut self, model: Arc<dyn CompletionProvider>) -> Self {
        self.model = Some(model);
        self
    }

    /// Deep merge: fields set in `later` win, everything else is kept.
    /// Sampling settings merge per field rather than being replaced wholesale.
    pub fn merge(self, later: ContextPatch) -> ContextPatch {
        let sampling = match (self.sampling, later.sampling) {
            (Some(base), Some(over)) => Some(base.merge(over)),
            (base, over) => over.or(base),
        };
        ContextPatch {
            role: later.role.or(self.role),
            output_address: later.output_address.or(self.output_address),
            leaf_id: later.leaf_id.or(self.leaf_id),
            array_scoped: later.array_scoped.or(self.array_scoped),
            stream: later.stream.or(self.stream),
            sampling,
            model: later.model.or(self.model),
        }
    }
}
