//! Shared utilities for integration tests
//!
//! Log output is enabled with `RUST_LOG`, e.g. `RUST_LOG=libldr=debug cargo test`.

#![allow(dead_code)]

use libldr::library::{LibraryConfig, MemoryStorage, PartLibrary, UnlinkPolicy};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small in-memory library: a stud primitive, a brick using it and a
/// mirrored-wall part
pub fn brick_storage() -> MemoryStorage {
    MemoryStorage::new()
        .with_file("ldraw/p/stud.dat", "0 Stud\n0 BFC CERTIFY CCW\n4 16 -6 0 -6 6 0 -6 6 0 6 -6 0 6\n")
        .with_file("ldraw/p/48/stud.dat", "0 Hi-res Stud\n0 BFC CERTIFY CCW\n2 24 0 0 0 0 -4 0\n")
        .with_file(
            "ldraw/parts/3001.dat",
            "0 Brick 2 x 4\n0 Name: 3001.dat\n0 BFC CERTIFY CCW\n\
             4 16 -40 0 -20 40 0 -20 40 0 20 -40 0 20\n\
             1 16 -30 0 -10 1 0 0 0 1 0 0 0 1 stud.dat\n\
             1 16 30 0 10 1 0 0 0 1 0 0 0 1 STUD.DAT\n",
        )
}

/// Library over [`brick_storage`]
pub fn brick_library(policy: UnlinkPolicy) -> PartLibrary {
    PartLibrary::new(
        LibraryConfig::new()
            .with_root("ldraw")
            .with_storage(brick_storage())
            .with_unlink_policy(policy)
            .with_primitive_variants(Vec::<String>::new()),
    )
    .expect("in-memory library")
}
