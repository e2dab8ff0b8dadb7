// Nexus Infrastructure - System Adapters
// Implements: Connectivity Signal (TCP probe), LocationProvider

pub mod connectivity_probe;
pub mod location_impl;

pub use connectivity_probe::TcpConnectivityProbe;
pub use location_impl::StaticLocationProvider;
