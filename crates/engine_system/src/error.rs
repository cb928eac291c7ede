//! Scene snapshot error types.

use engine_component::{ComponentBodyError, EcsError};

/// Errors that can occur while saving or loading a scene snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Failed to encode a snapshot to MessagePack.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a snapshot from MessagePack.
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Failed to encode or decode a snapshot as JSON.
    #[error("JSON snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    /// A component body could not be encoded, decoded or attached.
    #[error("component '{type_name}': {source}")]
    Component {
        /// Registered name of the component type.
        type_name: String,
        #[source]
        source: ComponentBodyError,
    },

    /// The snapshot names a component type with no registered pool.
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    /// An entity operation failed while building or reading the scene.
    #[error(transparent)]
    Ecs(#[from] EcsError),
}
