//! Failure outcomes reported by the set and its snapshot iterators.
//!
//! None of these terminate anything. Each is handed back to the immediate caller, who decides
//! whether it is fatal. Inserting a value that is already present is not an error at all: it is
//! the ordinary `false` result of set semantics.
//!
//! ```text
//! snapshot() ──► try_next() ──► Ok(value)
//!                   │
//!                   ├──► Err(StructuralChange)   set was mutated since snapshot()
//!                   │
//!                   └──► Err(Exhausted)          every value has been handed out
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An absent value was offered for insertion. The set is left untouched and live snapshots
    /// stay valid.
    #[error("cannot add an absent value to the set")]
    NullElement,

    /// The snapshot's source set has been mutated (by an insert or a clear) since the snapshot
    /// was taken. Once raised for a snapshot it is raised on every later attempt.
    #[error("set was structurally modified after this snapshot was taken")]
    StructuralChange,

    /// The snapshot has no more values.
    #[error("no more elements in snapshot")]
    Exhausted,
}

pub type Result<T> = std::result::Result<T, Error>;
