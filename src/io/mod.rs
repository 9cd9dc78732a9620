//=========================================================================
// I/O
//
// File formats read by the runtime.
//
// Responsibilities:
// - Read the entry table of package files (`package_file`)
//
//=========================================================================

//=== Module Declarations =================================================

pub mod package_file;

//=== Public API ==========================================================

pub use package_file::{PackageEntry, PackageError, PackageFile, PackageResult};
