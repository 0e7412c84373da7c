//! Domain services for the licensing back office.
//!
//! Services contain business logic that operates on domain models, plus the
//! capability traits the API crate implements and injects.

pub mod audit;
pub mod lifecycle;
pub mod notification;
pub mod numbering;

pub use audit::{AuditError, AuditLogBuilder, AuditLogger};
pub use lifecycle::{
    DispatchReport, LifecycleEvent, LifecycleListener, ListenerError, ListenerRegistry,
};
pub use notification::{EmailSendError, EmailSender, OutgoingEmail};
pub use numbering::{collision_backoff, NumberKind, NumberScope, MAX_NUMBER_ATTEMPTS};
