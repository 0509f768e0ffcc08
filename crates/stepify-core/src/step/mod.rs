//! Definiciones relacionadas a Steps y Tasks.
//!
//! Un Step es una unidad de trabajo asíncrono: su handler se invoca con un
//! `StepContext` y señala su fin a través de él. Un Task agrupa steps que
//! comparten un ámbito de variables. Este módulo define:
//! - `Step`, `Task` y los tipos de handler.
//! - `Continuation`: lo que sigue tras un `done` exitoso.
//! - `JumpTarget`: destino de un `jump()` dentro del task.
//! - `DispatchState`: estado del contexto activo en el scheduler.

pub mod continuation;
pub mod definition;
mod status;

pub use continuation::{Continuation, DeferFn, JumpTarget};
pub use definition::{ErrorHandler, ResultHandler, Step, StepHandler, Task};
pub use status::DispatchState;
