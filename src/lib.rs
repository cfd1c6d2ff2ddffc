pub mod config;
pub mod model;
pub mod sieve;
pub mod store;

pub use config::{EngineConfig, LineEnding};
pub use model::outline::NodeOutline;
pub use sieve::ast::{Context, Node, NodeId};
pub use sieve::document::{validate, CapabilityWarning, Document};
pub use sieve::error::{Error, Result, SyntaxError};
pub use sieve::parser::{Driver, ParseState};
pub use sieve::registry::Registry;
pub use sieve::requires::Requirements;
pub use sieve::widget::WidgetBuilder;
