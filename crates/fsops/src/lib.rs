//! Idempotent filesystem state convergence
//!
//! Two jobs, both in service of side-effect-safe configuration
//! modules:
//!
//! - **Attribute reconciliation** ([`Reconciler`]): compare desired
//!   owner/group/mode/security-label against reality and apply only
//!   the differences, independently per attribute, honoring check
//!   mode.
//! - **Atomic replacement** ([`atomic_replace`]): swap new content
//!   into place so the destination is never observed missing or
//!   truncated, preserving metadata and label across the swap.
//!
//! Plus the supporting cast: symbolic mode arithmetic, identity
//! resolution, metadata-preserving copies, dated backups, and content
//! digests.

mod atomic;
mod copy;
mod error;
mod ident;
mod mode;
mod reconcile;
mod selabel;

pub use atomic::atomic_replace;
pub use copy::{backup_local, cleanup_path, digest_from_file, preserved_copy};
pub use error::{Error, Result};
pub use ident::{
    chown, current_umask, effective_gid, effective_uid, group_name, is_elevated, lchown,
    resolve_gid, resolve_uid, user_and_group, user_name,
};
pub use mode::{DEFAULT_PERM, EXEC_PERM_BITS, ModeSpec, PERM_BITS, symbolic_mode_to_octal};
pub use reconcile::{FileAttrs, Reconciler};
pub use selabel::{LabelSubsystem, SeContext};
