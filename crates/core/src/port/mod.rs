// Port Layer - Interfaces for external dependencies

pub mod ai_transport;
pub mod connectivity;
pub mod id_provider; // For deterministic testing
pub mod key_value_store;
pub mod location;
pub mod time_provider;

// Re-exports
pub use ai_transport::{
    AiTransport, Coordinates, GenerationConfig, ToolConfig, ToolRequest, TransportError,
};
pub use connectivity::{connectivity_channel, ConnectivityPublisher, ConnectivityWatch};
pub use id_provider::{IdProvider, TimestampIdProvider};
pub use key_value_store::KeyValueStore;
pub use location::{LocationError, LocationProvider};
pub use time_provider::{SystemTimeProvider, TimeProvider};
