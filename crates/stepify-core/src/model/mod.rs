//! Estado compartido entre steps: variables por task y resultados del run.

pub mod results;
pub mod vars;

pub use results::ResultCollector;
pub use vars::VariableStore;
