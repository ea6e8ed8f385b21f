//! # pricegate Storage
//!
//! Versioned, checksummed persistence of a trained model together with the
//! preprocessor it was trained on. See [`ArtifactStore`].

pub mod artifact;
pub mod manifest;

pub use artifact::{ArtifactStore, LoadedArtifacts};
pub use manifest::{
    ArtifactManifest, BlobEntry, FORMAT_VERSION, MANIFEST_FILE, MODEL_FILE, PREPROCESSOR_FILE,
};
