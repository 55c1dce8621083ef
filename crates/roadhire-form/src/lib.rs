//! The driver-application form engine.
//!
//! A nine-step [`wizard::Wizard`] collects [`answers::FormAnswers`],
//! validates one step at a time and mirrors progress into a
//! [`draft::DraftStore`]. Signatures are captured by
//! [`signature::SignaturePad`]s, and [`submit`] turns the finished answers
//! into the multipart request the server expects.

pub mod answers;
pub mod draft;
pub mod error;
pub mod signature;
pub mod submit;
pub mod wizard;

pub use error::{Error, Result};
