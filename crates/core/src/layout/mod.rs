//! Job identity and on-disk layout.
//!
//! Every path the service reads or writes is derived from
//! `(JobId, ProfileName, filename)` by [`JobLayout`]; nothing about a job is
//! stored anywhere except the directory tree itself. The conversion writer and
//! the download resolver share this module so the two always agree.
//!
//! ```text
//! <jobs_dir>/
//!   <job id>/
//!     Original/<filename>
//!     <profile>/<filename>
//! ```

mod ids;
mod paths;

pub use ids::{JobId, ProfileName, ORIGINAL_PROFILE};
pub use paths::{JobLayout, LayoutError};
pub(crate) use paths::leaf;
