/// Estado del contexto activo visto por el scheduler.
///
/// Las transiciones válidas son:
/// - `Running` -> `Jumping(to)` (el step llamó a `jump`)
/// - `Jumping(to)` -> despacho de `to` (se soltó la última copia del contexto)
/// - `AwaitingResume` -> primer step del task siguiente (el handler llamó a `next()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Un step está activo.
    Running,
    /// Salto aceptado; se aplica cuando el contexto emisor se suelta.
    Jumping(usize),
    /// El error handler ya se invocó; sin avance hasta que llame a `next()`.
    AwaitingResume,
}
