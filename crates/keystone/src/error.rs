//! # Runtime Error Types

use thiserror::Error;

use keystone_core::ConfigError;
use keystone_flow::{SceneError, SequencerError};

/// Any failure surfaced by the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Asset documents could not be parsed.
    #[error("invalid asset documents: {0}")]
    Assets(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scene could not be loaded.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// A sequence failed to build or run.
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::AssetStore;

    #[test]
    fn test_invalid_assets_convert() {
        fn load(json: &str) -> Result<usize, Error> {
            Ok(AssetStore::new().insert_json_documents(json)?)
        }

        let err = load("{ not json").unwrap_err();
        assert!(matches!(err, Error::Assets(_)));
        assert!(err.to_string().starts_with("invalid asset documents"));
        assert_eq!(load(r#"{ "a": {}, "b": {} }"#).unwrap(), 2);
    }
}
