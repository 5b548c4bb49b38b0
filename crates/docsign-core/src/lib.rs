//! Document signing core logic
//!
//! This crate implements the sequential multi-party signing workflow:
//! the request aggregate, signature placement normalization, the signing
//! order gate, PDF compositing, lifecycle transitions and the read-side
//! projections (request view, status category, dashboard statistics).
//!
//! Storage is reached only through the traits in [`ports`]; the
//! [`memory`] module provides in-process implementations.

pub mod category;
pub mod compositor;
pub mod editor;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod locks;
pub mod memory;
pub mod model;
pub mod placement;
pub mod ports;
pub mod signature;
pub mod stats;
pub mod view;
pub mod workflow;

pub use category::{categorize, StatusCategory};
pub use compositor::{composite, CompositeOutput};
pub use editor::{PlacementEditor, PlacementError, PlacementUpdate};
pub use error::{ErrorKind, StorageError, WorkflowError};
pub use gate::{can_sign, check_eligibility, next_signers, Eligibility, SignCheck};
pub use model::{
    PdfVersion, Placement, Recipient, Rejection, RequestStatus, SignatureRequest, SignedBy,
};
pub use placement::{Geometry, PageSize};
pub use ports::{FileStore, RequestRepository, TemplateStore, UserDirectory};
pub use signature::SignatureImage;
pub use stats::RequestStats;
pub use view::RequestView;
pub use workflow::{
    CurrentDocument, NewRecipient, NewRequest, SignAttempt, SignOutcome, SigningWorkflow,
    WorkflowConfig,
};
